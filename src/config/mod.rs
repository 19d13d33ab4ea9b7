//! Configuration module
//!
//! Resolves module parameters from defaults, parameter files and the
//! environment. CLI flags are layered on top by the caller.

use anyhow::Result;
use std::path::Path;
use tracing::debug;

use crate::kubevirt::ModuleParams;

mod env;
mod file;

pub use env::EnvConfig;
pub use file::{find_params_file, load_document, load_params};

/// Resolve parameters: defaults, then a parameter file, then the environment.
///
/// An explicit `path` wins over `KUBEVIRT_VM_PARAMS`, which wins over the
/// standard locations.
pub fn resolve_params(path: Option<&Path>, env: &EnvConfig) -> Result<ModuleParams> {
    let path = path
        .map(Path::to_path_buf)
        .or_else(|| env.params_file.clone())
        .or_else(find_params_file);

    let mut params = match path {
        Some(path) => {
            debug!("Loading parameters from {}", path.display());
            load_params(&path)?
        }
        None => ModuleParams::default(),
    };

    env.apply_to(&mut params);
    Ok(params)
}
