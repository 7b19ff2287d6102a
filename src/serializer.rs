//! Writes mapping reports as YAML or JSON.

use crate::report::MappingReport;
use anyhow::{Context, Result};
use log::debug;
use std::fs;
use std::path::Path;

pub fn serialize_yaml(report: &MappingReport) -> Result<String> {
    debug!("Serializing mapping report to YAML");
    serde_yaml::to_string(report).context("Failed to serialize mapping report to YAML")
}

/// Pretty-printed JSON
pub fn serialize_json(report: &MappingReport) -> Result<String> {
    debug!("Serializing mapping report to JSON");
    serde_json::to_string_pretty(report).context("Failed to serialize mapping report to JSON")
}

/// Write content to a file, creating parent directories as needed
pub fn write_to_file(content: &str, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }

    fs::write(path, content).with_context(|| format!("Failed to write to file: {}", path.display()))?;

    debug!("Wrote {} bytes to {}", content.len(), path.display());
    Ok(())
}
