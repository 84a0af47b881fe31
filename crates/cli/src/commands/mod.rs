pub mod negotiate;
pub mod resolve;
pub mod resources;
pub mod status;

use anyhow::{Context, Result};
use serde_json::Value;
use std::path::Path;

/// Read a JSON request body from disk, `-` reads stdin
pub(crate) fn read_json_file(path: &Path) -> Result<Value> {
    let content = if path == Path::new("-") {
        std::io::read_to_string(std::io::stdin()).context("Failed to read stdin")?
    } else {
        std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?
    };
    serde_json::from_str(&content).with_context(|| format!("{} is not valid JSON", path.display()))
}
