//! VirtualMachine module parameters
//!
//! The argument schema of the VM module: every parameter a caller can set,
//! its default, and the cross-field rules checked before a document is built.

use clap::ValueEnum;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::PathBuf;
use thiserror::Error;

/// Default KubeVirt API version
pub const DEFAULT_API_VERSION: &str = "kubevirt.io/v1";

/// Argument schema violations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParamsError {
    #[error("missing required arguments: namespace")]
    MissingNamespace,

    #[error("parameters are mutually exclusive: name|generate_name")]
    MutuallyExclusive,

    #[error("one of the following is required: name, generate_name")]
    MissingName,

    #[error("name is required when state is absent")]
    NameRequiredForDelete,
}

/// Desired state of the VirtualMachine resource
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema, ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum State {
    #[default]
    Present,
    Absent,
}

/// Reference to an instance type or preference.
///
/// Keys not modelled here are kept in `extra` so the reference is passed
/// through to the cluster unchanged.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ResourceMatcher {
    /// Name of the referenced object
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Kind of the referenced object (cluster-wide or namespaced)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,

    /// Pinned ControllerRevision
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revision_name: Option<String>,

    /// Volume to infer the reference from
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub infer_from_volume: Option<String>,

    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl ResourceMatcher {
    /// Reference an object by name only
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Default::default()
        }
    }

    /// True when the reference carries no keys at all
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.kind.is_none()
            && self.revision_name.is_none()
            && self.infer_from_volume.is_none()
            && self.extra.is_empty()
    }
}

/// Parameters that shape the VirtualMachine document
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct VmParameters {
    /// VirtualMachine name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Prefix for a server-generated name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generate_name: Option<String>,

    /// Target namespace
    #[serde(default)]
    pub namespace: String,

    /// API version of the VirtualMachine resource
    #[serde(default = "default_api_version")]
    pub api_version: String,

    /// Whether the VM should be running
    #[serde(default = "default_running")]
    pub running: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub labels: Option<BTreeMap<String, String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub annotations: Option<BTreeMap<String, String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instancetype: Option<ResourceMatcher>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preference: Option<ResourceMatcher>,

    /// DataVolume templates, passed through as-is
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_volume_templates: Option<Vec<Value>>,

    /// VirtualMachineInstance spec, passed through as-is
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spec: Option<Value>,
}

fn default_api_version() -> String {
    DEFAULT_API_VERSION.to_string()
}

fn default_running() -> bool {
    true
}

impl Default for VmParameters {
    fn default() -> Self {
        Self {
            name: None,
            generate_name: None,
            namespace: String::new(),
            api_version: default_api_version(),
            running: default_running(),
            labels: None,
            annotations: None,
            instancetype: None,
            preference: None,
            data_volume_templates: None,
            spec: None,
        }
    }
}

impl VmParameters {
    /// Create parameters for a VM in the given namespace
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            ..Default::default()
        }
    }

    /// Set the VM name
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Set the generateName prefix
    pub fn generate_name(mut self, prefix: impl Into<String>) -> Self {
        self.generate_name = Some(prefix.into());
        self
    }

    /// Set the API version
    pub fn api_version(mut self, api_version: impl Into<String>) -> Self {
        self.api_version = api_version.into();
        self
    }

    /// Set the running flag
    pub fn running(mut self, running: bool) -> Self {
        self.running = running;
        self
    }

    /// Add label
    pub fn label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels
            .get_or_insert_with(BTreeMap::new)
            .insert(key.into(), value.into());
        self
    }

    /// Add annotation
    pub fn annotation(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.annotations
            .get_or_insert_with(BTreeMap::new)
            .insert(key.into(), value.into());
        self
    }

    /// Set the instance type reference
    pub fn instancetype(mut self, matcher: ResourceMatcher) -> Self {
        self.instancetype = Some(matcher);
        self
    }

    /// Set the preference reference
    pub fn preference(mut self, matcher: ResourceMatcher) -> Self {
        self.preference = Some(matcher);
        self
    }

    /// Append a DataVolume template
    pub fn data_volume_template(mut self, template: Value) -> Self {
        self.data_volume_templates
            .get_or_insert_with(Vec::new)
            .push(template);
        self
    }

    /// Set the VirtualMachineInstance spec
    pub fn spec(mut self, spec: Value) -> Self {
        self.spec = Some(spec);
        self
    }
}

/// Deletion propagation policy
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, JsonSchema, ValueEnum)]
pub enum PropagationPolicy {
    Foreground,
    Background,
    Orphan,
}

/// Preconditions that must hold for a delete to proceed
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Preconditions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uid: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_version: Option<String>,
}

/// Options used when deleting the VirtualMachine
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct DeleteOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub propagation_policy: Option<PropagationPolicy>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grace_period_seconds: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preconditions: Option<Preconditions>,
}

/// Full parameter set of the VM module
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ModuleParams {
    #[serde(flatten)]
    pub vm: VmParameters,

    /// Whether the VM should exist
    #[serde(default)]
    pub state: State,

    /// Replace an existing VM instead of patching it
    #[serde(default)]
    pub force: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delete_options: Option<DeleteOptions>,

    /// Path to a kubeconfig file
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kubeconfig: Option<PathBuf>,

    /// Kubeconfig context to use
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
}

impl ModuleParams {
    pub fn new(vm: VmParameters) -> Self {
        Self {
            vm,
            ..Default::default()
        }
    }

    /// Check required and mutually exclusive parameters
    pub fn validate(&self) -> Result<(), ParamsError> {
        if self.vm.namespace.trim().is_empty() {
            return Err(ParamsError::MissingNamespace);
        }

        let has_name = is_set(&self.vm.name);
        let has_generate_name = is_set(&self.vm.generate_name);

        if has_name && has_generate_name {
            return Err(ParamsError::MutuallyExclusive);
        }
        if self.state == State::Absent && !has_name {
            return Err(ParamsError::NameRequiredForDelete);
        }
        if !has_name && !has_generate_name {
            return Err(ParamsError::MissingName);
        }

        Ok(())
    }
}

fn is_set(value: &Option<String>) -> bool {
    value.as_deref().is_some_and(|v| !v.is_empty())
}
