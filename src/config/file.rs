//! Parameter file management
//!
//! Handles finding and loading module parameter files.

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};

use crate::kubevirt::ModuleParams;

/// Parameter file locations (in order of precedence)
const PARAMS_LOCATIONS: &[&str] = &[
    "./kubevirt-vm.yaml",
    "./kubevirt-vm.yml",
    "./kubevirt-vm.json",
    "~/.config/kubevirt-vm/params.yaml",
];

/// Find a parameter file in the standard locations
pub fn find_params_file() -> Option<PathBuf> {
    PARAMS_LOCATIONS
        .iter()
        .map(|location| expand_path(location))
        .find(|path| path.exists())
}

/// Load module parameters from a YAML or JSON file
pub fn load_params(path: impl AsRef<Path>) -> Result<ModuleParams> {
    load_document(path)
}

/// Load any YAML or JSON document, picking the parser by extension
pub fn load_document<T: DeserializeOwned>(path: impl AsRef<Path>) -> Result<T> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read file: {}", path.display()))?;

    if is_json_file(path) {
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse JSON: {}", path.display()))
    } else {
        serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse YAML: {}", path.display()))
    }
}

/// Expand ~ to home directory
fn expand_path(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(stripped);
        }
    }
    PathBuf::from(path)
}

fn is_json_file(path: &Path) -> bool {
    path.extension().map(|e| e == "json").unwrap_or(false)
}
