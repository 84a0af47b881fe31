//! Mutation preview commands

use anyhow::Result;
use std::path::Path;
use tabled::Tabled;

use super::read_json_file;
use crate::client::{ApiClient, Mutation, MutationList};
use crate::output::{format_rate, print_info, print_table, OutputFormat};

#[derive(Tabled)]
struct MutationRow {
    #[tabled(rename = "#")]
    index: usize,
    #[tabled(rename = "Kind")]
    kind: String,
    #[tabled(rename = "Resource")]
    resource: String,
    #[tabled(rename = "Class")]
    class: String,
    #[tabled(rename = "Details")]
    details: String,
}

/// Resolve a pod sandbox config file into spec mutations
pub async fn resolve_sandbox(client: &ApiClient, file: &Path, format: OutputFormat) -> Result<()> {
    let body = read_json_file(file)?;
    let result: MutationList = client.post("v1/qos/sandbox-mutations", &body).await?;
    print_mutations(&result, format)
}

/// Resolve a `{"container": ..., "sandbox": ...}` file into spec mutations
pub async fn resolve_container(client: &ApiClient, file: &Path, format: OutputFormat) -> Result<()> {
    let body = read_json_file(file)?;
    let result: MutationList = client.post("v1/qos/container-mutations", &body).await?;
    print_mutations(&result, format)
}

fn print_mutations(result: &MutationList, format: OutputFormat) -> Result<()> {
    if result.mutations.is_empty() && matches!(format, OutputFormat::Table) {
        print_info("No QoS mutations for this config");
        return Ok(());
    }

    let rows: Vec<MutationRow> = result
        .mutations
        .iter()
        .enumerate()
        .map(|(i, m)| MutationRow {
            index: i + 1,
            kind: m.kind.clone(),
            resource: m.resource.clone().unwrap_or_else(|| m.kind.clone()),
            class: m.class.clone(),
            details: details(m),
        })
        .collect();

    print_table(&rows, result, format)
}

fn details(mutation: &Mutation) -> String {
    let Some(block_io) = &mutation.block_io else {
        return String::new();
    };
    let mut parts = Vec::new();
    if let Some(weight) = block_io.weight {
        parts.push(format!("weight={}", weight));
    }
    if let Some(read) = block_io.throttle_read_bps {
        parts.push(format!("read={}", format_rate(read * 8)));
    }
    if let Some(write) = block_io.throttle_write_bps {
        parts.push(format!("write={}", format_rate(write * 8)));
    }
    parts.join(" ")
}
