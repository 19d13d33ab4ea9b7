//! Environment variable configuration
//!
//! Provides environment variable overrides for module parameters.

use std::env;
use std::path::PathBuf;

use crate::kubevirt::ModuleParams;

/// Environment variable prefix
const ENV_PREFIX: &str = "KUBEVIRT_VM";

/// Environment configuration from environment variables
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct EnvConfig {
    /// Parameter file from KUBEVIRT_VM_PARAMS
    pub params_file: Option<PathBuf>,
    /// Namespace from KUBEVIRT_VM_NAMESPACE
    pub namespace: Option<String>,
    /// API version from KUBEVIRT_VM_API_VERSION
    pub api_version: Option<String>,
    /// Kubeconfig from KUBEVIRT_VM_KUBECONFIG
    pub kubeconfig: Option<PathBuf>,
    /// Kubeconfig context from KUBEVIRT_VM_CONTEXT
    pub context: Option<String>,
    /// Log level from KUBEVIRT_VM_LOG
    pub log_level: Option<String>,
}

impl EnvConfig {
    /// Load configuration from environment variables
    pub fn load() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through a variable lookup function
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |name: &str| lookup(&format!("{ENV_PREFIX}_{name}")).filter(|v| !v.is_empty());

        Self {
            params_file: get("PARAMS").map(PathBuf::from),
            namespace: get("NAMESPACE"),
            api_version: get("API_VERSION"),
            kubeconfig: get("KUBECONFIG").map(PathBuf::from),
            context: get("CONTEXT"),
            log_level: get("LOG"),
        }
    }

    /// Override parameters with the values set in the environment
    pub fn apply_to(&self, params: &mut ModuleParams) {
        if let Some(namespace) = &self.namespace {
            params.vm.namespace = namespace.clone();
        }
        if let Some(api_version) = &self.api_version {
            params.vm.api_version = api_version.clone();
        }
        if let Some(kubeconfig) = &self.kubeconfig {
            params.kubeconfig = Some(kubeconfig.clone());
        }
        if let Some(context) = &self.context {
            params.context = Some(context.clone());
        }
    }
}
