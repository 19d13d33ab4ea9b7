//! Resource runner
//!
//! Reconciles a VirtualMachine document with the cluster: create when
//! missing, update when present, delete when `state` is absent.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use thiserror::Error;
use tracing::{debug, info};

use super::params::{DeleteOptions, ModuleParams, State};
use super::vm::VmDocument;

/// Runner errors
#[derive(Error, Debug)]
pub enum RunnerError {
    #[error("Kubernetes API error: {0}")]
    Api(#[from] kube::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid apiVersion: {0}")]
    InvalidApiVersion(String),

    #[error("A name is required to {0} a VirtualMachine")]
    MissingName(Method),
}

/// Operation performed by the runner
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Method {
    Create,
    Update,
    Delete,
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Method::Create => "create",
            Method::Update => "update",
            Method::Delete => "delete",
        };
        write!(f, "{name}")
    }
}

/// Outcome of a runner invocation
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ActionResult {
    pub method: Method,
    pub changed: bool,
    pub result: Value,
}

impl ActionResult {
    fn new(method: Method, changed: bool, result: Value) -> Self {
        Self {
            method,
            changed,
            result,
        }
    }
}

/// Address of a named VirtualMachine
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VmRef {
    pub api_version: String,
    pub namespace: String,
    pub name: String,
}

impl VmRef {
    fn of(document: &VmDocument, name: &str) -> Self {
        Self {
            api_version: document.api_version.clone(),
            namespace: document.namespace().to_string(),
            name: name.to_string(),
        }
    }
}

impl fmt::Display for VmRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

/// Cluster operations the runner relies on
#[async_trait]
pub trait ResourceClient: Send + Sync {
    /// Fetch a VM, `None` when it does not exist
    async fn get(&self, target: &VmRef) -> Result<Option<Value>, RunnerError>;

    /// Create a VM from a document
    async fn create(&self, document: &VmDocument) -> Result<Value, RunnerError>;

    /// Merge-patch an existing VM
    async fn patch(&self, target: &VmRef, document: &Value) -> Result<Value, RunnerError>;

    /// Replace an existing VM
    async fn replace(&self, target: &VmRef, document: &Value) -> Result<Value, RunnerError>;

    /// Delete a VM
    async fn delete(&self, target: &VmRef, options: &DeleteOptions) -> Result<(), RunnerError>;
}

/// Create, update or delete the VM described by `document`
pub async fn perform_action<C>(
    client: &C,
    document: &VmDocument,
    params: &ModuleParams,
) -> Result<ActionResult, RunnerError>
where
    C: ResourceClient + ?Sized,
{
    match params.state {
        State::Absent => delete(client, document, params).await,
        State::Present => apply(client, document, params).await,
    }
}

async fn apply<C>(
    client: &C,
    document: &VmDocument,
    params: &ModuleParams,
) -> Result<ActionResult, RunnerError>
where
    C: ResourceClient + ?Sized,
{
    let Some(name) = document.name() else {
        let created = client.create(document).await?;
        info!(
            "Created VirtualMachine {}/{}",
            document.namespace(),
            object_name(&created).unwrap_or("<generated>")
        );
        return Ok(ActionResult::new(Method::Create, true, created));
    };

    let target = VmRef::of(document, name);
    let Some(existing) = client.get(&target).await? else {
        let created = client.create(document).await?;
        info!("Created VirtualMachine {}", target);
        return Ok(ActionResult::new(Method::Create, true, created));
    };

    let mut desired = serde_json::to_value(document)?;
    let updated = if params.force {
        if let Some(version) = resource_version(&existing) {
            desired["metadata"]["resourceVersion"] = Value::String(version.to_string());
        }
        debug!("Replacing VirtualMachine {}", target);
        client.replace(&target, &desired).await?
    } else {
        debug!("Patching VirtualMachine {}", target);
        client.patch(&target, &desired).await?
    };

    let changed = resource_version(&existing) != resource_version(&updated);
    if changed {
        info!("Updated VirtualMachine {}", target);
    } else {
        debug!("VirtualMachine {} unchanged", target);
    }

    Ok(ActionResult::new(Method::Update, changed, updated))
}

async fn delete<C>(
    client: &C,
    document: &VmDocument,
    params: &ModuleParams,
) -> Result<ActionResult, RunnerError>
where
    C: ResourceClient + ?Sized,
{
    let name = document
        .name()
        .ok_or(RunnerError::MissingName(Method::Delete))?;
    let target = VmRef::of(document, name);

    let Some(existing) = client.get(&target).await? else {
        debug!("VirtualMachine {} already absent", target);
        return Ok(ActionResult::new(Method::Delete, false, Value::Null));
    };

    let options = params.delete_options.clone().unwrap_or_default();
    client.delete(&target, &options).await?;
    info!("Deleted VirtualMachine {}", target);

    Ok(ActionResult::new(Method::Delete, true, existing))
}

fn resource_version(object: &Value) -> Option<&str> {
    object
        .pointer("/metadata/resourceVersion")
        .and_then(Value::as_str)
}

fn object_name(object: &Value) -> Option<&str> {
    object.pointer("/metadata/name").and_then(Value::as_str)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kubevirt::params::{PropagationPolicy, VmParameters};
    use crate::kubevirt::vm::build_vm_document;
    use serde_json::json;
    use std::collections::BTreeMap;
    use std::sync::Mutex;

    /// In-memory cluster keyed by `namespace/name`
    #[derive(Default)]
    struct FakeCluster {
        objects: Mutex<BTreeMap<String, Value>>,
        calls: Mutex<Vec<String>>,
        deleted_with: Mutex<Option<DeleteOptions>>,
        version: Mutex<u64>,
        fail: bool,
        unchanged_on_patch: bool,
    }

    impl FakeCluster {
        fn with_vm(namespace: &str, name: &str) -> Self {
            let cluster = Self::default();
            cluster.objects.lock().unwrap().insert(
                format!("{namespace}/{name}"),
                json!({
                    "apiVersion": "kubevirt.io/v1",
                    "kind": "VirtualMachine",
                    "metadata": {"name": name, "namespace": namespace, "resourceVersion": "1"},
                    "spec": {"running": true}
                }),
            );
            *cluster.version.lock().unwrap() = 1;
            cluster
        }

        fn failing() -> Self {
            Self {
                fail: true,
                ..Default::default()
            }
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }

        fn record(&self, call: &str) -> Result<(), RunnerError> {
            self.calls.lock().unwrap().push(call.to_string());
            if self.fail {
                return Err(RunnerError::Api(kube::Error::Api(
                    kube::error::ErrorResponse {
                        status: "Failure".to_string(),
                        message: "connection refused".to_string(),
                        reason: "ServiceUnavailable".to_string(),
                        code: 503,
                    },
                )));
            }
            Ok(())
        }

        fn store(&self, key: String, mut object: Value) -> Value {
            let mut version = self.version.lock().unwrap();
            *version += 1;
            object["metadata"]["resourceVersion"] = json!(version.to_string());
            self.objects.lock().unwrap().insert(key, object.clone());
            object
        }
    }

    #[async_trait]
    impl ResourceClient for FakeCluster {
        async fn get(&self, target: &VmRef) -> Result<Option<Value>, RunnerError> {
            self.record("get")?;
            Ok(self.objects.lock().unwrap().get(&target.to_string()).cloned())
        }

        async fn create(&self, document: &VmDocument) -> Result<Value, RunnerError> {
            self.record("create")?;
            let mut object = serde_json::to_value(document)?;
            let name = match document.name() {
                Some(name) => name.to_string(),
                None => {
                    let name = format!(
                        "{}abcde",
                        document.metadata.generate_name.clone().unwrap_or_default()
                    );
                    object["metadata"]["name"] = json!(name);
                    name
                }
            };
            Ok(self.store(format!("{}/{}", document.namespace(), name), object))
        }

        async fn patch(&self, target: &VmRef, document: &Value) -> Result<Value, RunnerError> {
            self.record("patch")?;
            if self.unchanged_on_patch {
                let live = self.objects.lock().unwrap().get(&target.to_string()).cloned();
                return Ok(live.unwrap_or(Value::Null));
            }
            Ok(self.store(target.to_string(), document.clone()))
        }

        async fn replace(&self, target: &VmRef, document: &Value) -> Result<Value, RunnerError> {
            self.record("replace")?;
            assert_eq!(document["metadata"]["resourceVersion"], json!("1"));
            Ok(self.store(target.to_string(), document.clone()))
        }

        async fn delete(&self, target: &VmRef, options: &DeleteOptions) -> Result<(), RunnerError> {
            self.record("delete")?;
            *self.deleted_with.lock().unwrap() = Some(options.clone());
            self.objects.lock().unwrap().remove(&target.to_string());
            Ok(())
        }
    }

    fn params(vm: VmParameters) -> ModuleParams {
        ModuleParams::new(vm)
    }

    fn run(cluster: &FakeCluster, params: &ModuleParams) -> Result<ActionResult, RunnerError> {
        let document = build_vm_document(&params.vm);
        tokio_test::block_on(perform_action(cluster, &document, params))
    }

    #[test]
    fn test_create_missing_vm() {
        let cluster = FakeCluster::default();
        let params = params(VmParameters::new("default").name("testvm"));

        let result = run(&cluster, &params).unwrap();

        assert_eq!(result.method, Method::Create);
        assert!(result.changed);
        assert_eq!(result.result["metadata"]["name"], json!("testvm"));
        assert_eq!(cluster.calls(), vec!["get", "create"]);
    }

    #[test]
    fn test_create_with_generate_name_skips_lookup() {
        let cluster = FakeCluster::default();
        let params = params(VmParameters::new("default").generate_name("testvm-"));

        let result = run(&cluster, &params).unwrap();

        assert_eq!(result.method, Method::Create);
        assert_eq!(result.result["metadata"]["name"], json!("testvm-abcde"));
        assert_eq!(cluster.calls(), vec!["create"]);
    }

    #[test]
    fn test_update_running_vm() {
        let cluster = FakeCluster::with_vm("default", "testvm");
        let params = params(VmParameters::new("default").name("testvm").running(true));

        let result = run(&cluster, &params).unwrap();

        assert_eq!(result.method, Method::Update);
        assert!(result.changed);
        assert_eq!(cluster.calls(), vec!["get", "patch"]);
    }

    #[test]
    fn test_update_without_new_revision_is_unchanged() {
        let mut cluster = FakeCluster::with_vm("default", "testvm");
        cluster.unchanged_on_patch = true;
        let params = params(VmParameters::new("default").name("testvm"));

        let result = run(&cluster, &params).unwrap();

        assert_eq!(result.method, Method::Update);
        assert!(!result.changed);
        assert_eq!(result.result["metadata"]["resourceVersion"], json!("1"));
        assert_eq!(cluster.calls(), vec!["get", "patch"]);
    }

    #[test]
    fn test_update_stopped_vm() {
        let cluster = FakeCluster::with_vm("default", "testvm");
        let params = params(VmParameters::new("default").name("testvm").running(false));

        let result = run(&cluster, &params).unwrap();

        assert_eq!(result.method, Method::Update);
        assert_eq!(result.result["spec"]["running"], json!(false));
    }

    #[test]
    fn test_forced_update_replaces() {
        let cluster = FakeCluster::with_vm("default", "testvm");
        let mut params = params(VmParameters::new("default").name("testvm"));
        params.force = true;

        let result = run(&cluster, &params).unwrap();

        assert_eq!(result.method, Method::Update);
        assert_eq!(cluster.calls(), vec!["get", "replace"]);
    }

    #[test]
    fn test_delete_existing_vm() {
        let cluster = FakeCluster::with_vm("default", "testvm");
        let mut params = params(VmParameters::new("default").name("testvm"));
        params.state = State::Absent;
        params.delete_options = Some(DeleteOptions {
            propagation_policy: Some(PropagationPolicy::Foreground),
            ..Default::default()
        });

        let result = run(&cluster, &params).unwrap();

        assert_eq!(result.method, Method::Delete);
        assert!(result.changed);
        assert_eq!(result.result["metadata"]["name"], json!("testvm"));
        assert_eq!(cluster.calls(), vec!["get", "delete"]);
        assert_eq!(
            cluster
                .deleted_with
                .lock()
                .unwrap()
                .as_ref()
                .and_then(|o| o.propagation_policy),
            Some(PropagationPolicy::Foreground)
        );
    }

    #[test]
    fn test_delete_missing_vm_is_unchanged() {
        let cluster = FakeCluster::default();
        let mut params = params(VmParameters::new("default").name("testvm"));
        params.state = State::Absent;

        let result = run(&cluster, &params).unwrap();

        assert_eq!(result.method, Method::Delete);
        assert!(!result.changed);
        assert_eq!(result.result, Value::Null);
        assert_eq!(cluster.calls(), vec!["get"]);
    }

    #[test]
    fn test_delete_requires_name() {
        let cluster = FakeCluster::default();
        let mut params = params(VmParameters::new("default").generate_name("testvm-"));
        params.state = State::Absent;

        let err = run(&cluster, &params).unwrap_err();
        assert!(matches!(err, RunnerError::MissingName(Method::Delete)));
        assert!(cluster.calls().is_empty());
    }

    #[test]
    fn test_backend_errors_propagate() {
        let cluster = FakeCluster::failing();
        let params = params(VmParameters::new("default").name("testvm"));

        let err = run(&cluster, &params).unwrap_err();
        assert!(matches!(err, RunnerError::Api(kube::Error::Api(ref e)) if e.code == 503));
        assert_eq!(cluster.calls(), vec!["get"]);
    }

    #[test]
    fn test_result_serialization() {
        let result = ActionResult::new(Method::Update, true, json!("success"));
        assert_eq!(
            serde_json::to_value(&result).unwrap(),
            json!({"method": "update", "changed": true, "result": "success"})
        );
    }
}
