//! YAML configuration for the audit CLI.

use anyhow::{Context, Result};
use sched_quota::FormatOptions;
use serde::Deserialize;
use std::path::Path;

/// Settings read from `--config`. Every field has a default.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct CliConfig {
    /// Filter used when `RUST_LOG` is unset, e.g. "info" or "sched_quota=debug".
    pub log_level: String,
    pub format: FormatOptions,
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            format: FormatOptions::default(),
        }
    }
}

impl CliConfig {
    pub fn from_yaml(text: &str) -> Result<Self> {
        serde_yaml::from_str(text).context("invalid config yaml")
    }

    pub async fn load(path: &Path) -> Result<Self> {
        let text = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("reading config {}", path.display()))?;
        Self::from_yaml(&text)
    }
}
