//! VirtualMachine document construction
//!
//! Maps a [`VmParameters`] set onto the KubeVirt `VirtualMachine` resource
//! document handed to the runner.

use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::BTreeMap;

use super::params::{ResourceMatcher, VmParameters};

/// Kind of the managed resource
pub const VM_KIND: &str = "VirtualMachine";

/// VirtualMachine resource document
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VmDocument {
    pub api_version: String,
    pub kind: String,
    pub metadata: ObjectMeta,
    pub spec: VirtualMachineSpec,
}

/// VirtualMachine spec
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VirtualMachineSpec {
    /// Whether the VM should be running
    pub running: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instancetype: Option<ResourceMatcher>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preference: Option<ResourceMatcher>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_volume_templates: Option<Vec<Value>>,

    /// Template for the VMI
    pub template: VmiTemplate,
}

/// VMI template
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct VmiTemplate {
    /// Labels and annotations mirrored from the VM
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<ObjectMeta>,

    /// VMI spec
    pub spec: Value,
}

impl VmDocument {
    /// Name of the VM, if it is not server-generated
    pub fn name(&self) -> Option<&str> {
        self.metadata.name.as_deref()
    }

    /// Namespace of the VM
    pub fn namespace(&self) -> &str {
        self.metadata.namespace.as_deref().unwrap_or_default()
    }
}

/// Minimal valid VMI spec
pub fn default_template_spec() -> Value {
    json!({ "domain": { "devices": {} } })
}

/// Build the VirtualMachine document for a parameter set.
///
/// Absent or empty optional parameters leave no trace in the document.
/// Labels and annotations are written both to the VM metadata and to the
/// VMI template metadata. A caller-supplied `spec` replaces the default
/// template spec wholesale.
pub fn build_vm_document(params: &VmParameters) -> VmDocument {
    let labels = non_empty_map(params.labels.as_ref());
    let annotations = non_empty_map(params.annotations.as_ref());

    let mut metadata = ObjectMeta {
        namespace: Some(params.namespace.clone()),
        labels: labels.clone(),
        annotations: annotations.clone(),
        ..Default::default()
    };
    if let Some(name) = non_empty_str(params.name.as_ref()) {
        metadata.name = Some(name);
    } else if let Some(prefix) = non_empty_str(params.generate_name.as_ref()) {
        metadata.generate_name = Some(prefix);
    }

    let template_metadata = (labels.is_some() || annotations.is_some()).then(|| ObjectMeta {
        labels,
        annotations,
        ..Default::default()
    });

    let template_spec = params
        .spec
        .as_ref()
        .filter(|spec| !is_empty_value(spec))
        .cloned()
        .unwrap_or_else(default_template_spec);

    VmDocument {
        api_version: params.api_version.clone(),
        kind: VM_KIND.to_string(),
        metadata,
        spec: VirtualMachineSpec {
            running: params.running,
            instancetype: non_empty_matcher(params.instancetype.as_ref()),
            preference: non_empty_matcher(params.preference.as_ref()),
            data_volume_templates: params
                .data_volume_templates
                .as_ref()
                .filter(|templates| !templates.is_empty())
                .cloned(),
            template: VmiTemplate {
                metadata: template_metadata,
                spec: template_spec,
            },
        },
    }
}

fn non_empty_str(value: Option<&String>) -> Option<String> {
    value.filter(|v| !v.is_empty()).cloned()
}

fn non_empty_map(map: Option<&BTreeMap<String, String>>) -> Option<BTreeMap<String, String>> {
    map.filter(|m| !m.is_empty()).cloned()
}

fn non_empty_matcher(matcher: Option<&ResourceMatcher>) -> Option<ResourceMatcher> {
    matcher.filter(|m| !m.is_empty()).cloned()
}

fn is_empty_value(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Object(map) => map.is_empty(),
        _ => false,
    }
}
