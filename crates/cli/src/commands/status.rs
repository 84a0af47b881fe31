//! Agent health and reload commands

use anyhow::{Context, Result};
use colored::Colorize;
use tabled::Tabled;

use crate::client::{ApiClient, ClientError, HealthResponse, ReloadSummary};
use crate::output::{color_status, print_json, print_success, OutputFormat};

#[derive(Tabled)]
struct ComponentRow {
    #[tabled(rename = "Component")]
    name: String,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "Message")]
    message: String,
    #[tabled(rename = "Last Check")]
    last_check: String,
}

/// Show the agent's component health
pub async fn show_health(client: &ApiClient, format: OutputFormat) -> Result<()> {
    // An unhealthy agent answers 503 with the same body
    let health: HealthResponse = match client.get("healthz").await {
        Ok(health) => health,
        Err(err) => {
            let body = match err.downcast_ref::<ClientError>() {
                Some(ClientError::Api {
                    status: 503,
                    message,
                    ..
                }) => Some(message.clone()),
                _ => None,
            };
            match body {
                Some(body) => {
                    serde_json::from_str(&body).context("Failed to parse health response")?
                }
                None => return Err(err),
            }
        }
    };

    match format {
        OutputFormat::Json => print_json(&health)?,
        OutputFormat::Table => {
            println!("Agent: {}", color_status(&health.status).bold());

            let mut rows: Vec<ComponentRow> = health
                .components
                .iter()
                .map(|(name, c)| ComponentRow {
                    name: name.clone(),
                    status: color_status(&c.status),
                    message: c.message.clone().unwrap_or_default(),
                    last_check: format_timestamp(c.last_check_timestamp),
                })
                .collect();
            rows.sort_by(|a, b| a.name.cmp(&b.name));

            let table = tabled::Table::new(rows)
                .with(tabled::settings::Style::rounded())
                .to_string();
            println!("{}", table);
        }
    }
    Ok(())
}

/// Ask the agent to reload its CNI configuration
pub async fn reload(client: &ApiClient, format: OutputFormat) -> Result<()> {
    let summary: ReloadSummary = client.post("v1/qos/reload", &serde_json::json!({})).await?;

    match format {
        OutputFormat::Json => print_json(&summary)?,
        OutputFormat::Table => print_success(&format!(
            "Reloaded {} networks, {} net classes advertised",
            summary.networks, summary.net_classes
        )),
    }
    Ok(())
}

fn format_timestamp(secs: i64) -> String {
    chrono::DateTime::from_timestamp(secs, 0)
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| secs.to_string())
}
