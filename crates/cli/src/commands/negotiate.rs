//! Sandbox network negotiation command

use anyhow::Result;
use colored::Colorize;
use std::path::Path;

use super::read_json_file;
use crate::client::{ApiClient, NegotiatedNetwork};
use crate::output::{color_status, format_rate, print_json, print_warning, OutputFormat};

/// Draft and negotiate the network of a `{"sandbox_id": ..., "sandbox": ...}` file
pub async fn negotiate(client: &ApiClient, file: &Path, format: OutputFormat) -> Result<()> {
    let body = read_json_file(file)?;
    let result: NegotiatedNetwork = client.post("v1/qos/sandbox-network", &body).await?;

    match format {
        OutputFormat::Json => print_json(&result)?,
        OutputFormat::Table => print_network(&result),
    }
    Ok(())
}

fn print_network(result: &NegotiatedNetwork) {
    let config = &result.config;

    println!("{}", "Sandbox Network".bold());
    println!("{}", "=".repeat(50));
    println!("Outcome:    {}", color_status(&result.outcome));
    if result.outcome == "proceeded_with_draft" {
        print_warning("Policy agent unavailable, draft used unchanged");
    }

    match &config.bandwidth {
        Some(bandwidth) => {
            println!("Net class:  {}", bandwidth.class.cyan());
            if let Some(limits) = &bandwidth.limits {
                println!(
                    "Bandwidth:  in {} / out {}",
                    format_rate(limits.ingress_rate),
                    format_rate(limits.egress_rate)
                );
            }
        }
        None => println!("Net class:  -"),
    }

    if !config.port_mappings.is_empty() {
        println!();
        println!("{}", "Ports".bold());
        println!("{}", "-".repeat(50));
        for port in &config.port_mappings {
            let host_ip = if port.host_ip.is_empty() {
                "*"
            } else {
                port.host_ip.as_str()
            };
            println!(
                "{}:{} -> {}/{}",
                host_ip,
                port.host_port,
                port.container_port,
                port.protocol.to_lowercase()
            );
        }
    }

    if !config.labels.is_empty() {
        println!();
        println!("{}", "CNI Labels".bold());
        println!("{}", "-".repeat(50));
        for (key, value) in &config.labels {
            println!("{} = {}", key, value);
        }
    }

    if !config.dns.servers.is_empty() {
        println!();
        println!("DNS:        {}", config.dns.servers.join(", "));
    }
}
