//! Output formatters for documents and runner results
//!
//! Provides JSON and YAML output formats.

use anyhow::{Context, Result};
use clap::ValueEnum;
use serde::Serialize;

/// Output format options
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Json,
    JsonPretty,
    #[default]
    Yaml,
}

impl OutputFormat {
    /// Render any serializable value in this format
    pub fn render<T: Serialize>(self, value: &T) -> Result<String> {
        match self {
            OutputFormat::Json => serde_json::to_string(value).context("Failed to render JSON"),
            OutputFormat::JsonPretty => {
                serde_json::to_string_pretty(value).context("Failed to render JSON")
            }
            OutputFormat::Yaml => serde_yaml::to_string(value).context("Failed to render YAML"),
        }
    }
}
