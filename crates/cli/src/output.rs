//! Output formatting utilities

use clap::ValueEnum;
use colored::Colorize;
use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};

/// Output format for CLI commands
#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub enum OutputFormat {
    /// Table format (default)
    #[default]
    Table,
    /// JSON format
    Json,
}

/// Print a list as a table, or the raw records as JSON
pub fn print_table<T: Tabled, R: Serialize>(rows: &[T], raw: &R, format: OutputFormat) -> anyhow::Result<()> {
    match format {
        OutputFormat::Table => {
            if rows.is_empty() {
                println!("{}", "No items found".yellow());
            } else {
                println!("{}", Table::new(rows).with(Style::rounded()));
            }
        }
        OutputFormat::Json => print_json(raw)?,
    }
    Ok(())
}

pub fn print_json<R: Serialize + ?Sized>(raw: &R) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(raw)?);
    Ok(())
}

pub fn print_success(message: &str) {
    println!("{} {}", "✓".green().bold(), message);
}

pub fn print_error(message: &str) {
    eprintln!("{} {}", "✗".red().bold(), message);
}

pub fn print_warning(message: &str) {
    println!("{} {}", "⚠".yellow().bold(), message);
}

pub fn print_info(message: &str) {
    println!("{} {}", "ℹ".blue().bold(), message);
}

/// Format a CNI bandwidth rate (bits per second)
pub fn format_rate(bits_per_sec: u64) -> String {
    const KBIT: u64 = 1_000;
    const MBIT: u64 = KBIT * 1_000;
    const GBIT: u64 = MBIT * 1_000;

    if bits_per_sec == 0 {
        "-".to_string()
    } else if bits_per_sec >= GBIT {
        format!("{:.1}Gbit/s", bits_per_sec as f64 / GBIT as f64)
    } else if bits_per_sec >= MBIT {
        format!("{:.1}Mbit/s", bits_per_sec as f64 / MBIT as f64)
    } else if bits_per_sec >= KBIT {
        format!("{:.1}Kbit/s", bits_per_sec as f64 / KBIT as f64)
    } else {
        format!("{}bit/s", bits_per_sec)
    }
}

pub fn color_status(status: &str) -> String {
    match status.to_lowercase().as_str() {
        "healthy" | "adjusted" | "unchanged" => status.green().to_string(),
        "degraded" | "proceeded_with_draft" => status.yellow().to_string(),
        "unhealthy" | "failed" => status.red().to_string(),
        _ => status.to_string(),
    }
}
