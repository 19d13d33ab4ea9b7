//! Kubernetes client wrapper
//!
//! Implements the runner's cluster operations on top of `kube`.

use anyhow::{Context, Result};
use async_trait::async_trait;
use kube::api::{
    Api, DeleteParams, DynamicObject, Patch, PatchParams, PostParams, Preconditions,
    PropagationPolicy,
};
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::discovery::ApiResource;
use kube::{Client, Config};
use serde_json::Value;
use std::path::Path;
use tracing::debug;

use crate::kubevirt::{
    self, DeleteOptions, ResourceClient, RunnerError, VmDocument, VmRef, VM_KIND,
};

const VM_PLURAL: &str = "virtualmachines";

/// Kubernetes client wrapper
#[derive(Clone)]
pub struct K8sClient {
    client: Client,
}

impl K8sClient {
    /// Create a client from the default kubeconfig or in-cluster config
    pub async fn new() -> Result<Self> {
        let client = Client::try_default()
            .await
            .context("Failed to create Kubernetes client")?;

        Ok(Self { client })
    }

    /// Create a client from an explicit kubeconfig file and/or context
    pub async fn connect(kubeconfig: Option<&Path>, context: Option<&str>) -> Result<Self> {
        if kubeconfig.is_none() && context.is_none() {
            return Self::new().await;
        }

        let options = KubeConfigOptions {
            context: context.map(str::to_owned),
            ..Default::default()
        };

        let config = match kubeconfig {
            Some(path) => {
                let kubeconfig = Kubeconfig::read_from(path)
                    .with_context(|| format!("Failed to read kubeconfig: {}", path.display()))?;
                Config::from_custom_kubeconfig(kubeconfig, &options).await
            }
            None => Config::from_kubeconfig(&options).await,
        }
        .context("Failed to load kubeconfig")?;

        let client =
            Client::try_from(config).context("Failed to create Kubernetes client from config")?;

        Ok(Self { client })
    }

    fn api(&self, api_version: &str, namespace: &str) -> Result<Api<DynamicObject>, RunnerError> {
        let resource = vm_api_resource(api_version)?;
        Ok(Api::namespaced_with(
            self.client.clone(),
            namespace,
            &resource,
        ))
    }
}

#[async_trait]
impl ResourceClient for K8sClient {
    async fn get(&self, target: &VmRef) -> Result<Option<Value>, RunnerError> {
        let api = self.api(&target.api_version, &target.namespace)?;
        let object = api.get_opt(&target.name).await?;
        debug!("Lookup of VirtualMachine {}: found={}", target, object.is_some());
        Ok(object.map(serde_json::to_value).transpose()?)
    }

    async fn create(&self, document: &VmDocument) -> Result<Value, RunnerError> {
        let api = self.api(&document.api_version, document.namespace())?;
        let object = to_dynamic(&serde_json::to_value(document)?)?;
        let created = api.create(&PostParams::default(), &object).await?;
        Ok(serde_json::to_value(created)?)
    }

    async fn patch(&self, target: &VmRef, document: &Value) -> Result<Value, RunnerError> {
        let api = self.api(&target.api_version, &target.namespace)?;
        let patched = api
            .patch(&target.name, &PatchParams::default(), &Patch::Merge(document))
            .await?;
        Ok(serde_json::to_value(patched)?)
    }

    async fn replace(&self, target: &VmRef, document: &Value) -> Result<Value, RunnerError> {
        let api = self.api(&target.api_version, &target.namespace)?;
        let object = to_dynamic(document)?;
        let replaced = api
            .replace(&target.name, &PostParams::default(), &object)
            .await?;
        Ok(serde_json::to_value(replaced)?)
    }

    async fn delete(&self, target: &VmRef, options: &DeleteOptions) -> Result<(), RunnerError> {
        let api = self.api(&target.api_version, &target.namespace)?;
        api.delete(&target.name, &delete_params(options)).await?;
        Ok(())
    }
}

/// Split an apiVersion into group and version
pub fn parse_api_version(api_version: &str) -> Result<(&str, &str), RunnerError> {
    let (group, version) = match api_version.split_once('/') {
        Some((group, version)) => (group, version),
        None => ("", api_version),
    };

    if version.is_empty() || version.contains('/') {
        return Err(RunnerError::InvalidApiVersion(api_version.to_string()));
    }

    Ok((group, version))
}

/// API resource of the VirtualMachine kind for an apiVersion
pub fn vm_api_resource(api_version: &str) -> Result<ApiResource, RunnerError> {
    let (group, version) = parse_api_version(api_version)?;

    Ok(ApiResource {
        group: group.to_string(),
        version: version.to_string(),
        api_version: api_version.to_string(),
        kind: VM_KIND.to_string(),
        plural: VM_PLURAL.to_string(),
    })
}

fn to_dynamic(document: &Value) -> Result<DynamicObject, RunnerError> {
    Ok(serde_json::from_value(document.clone())?)
}

/// Translate module delete options into API delete parameters
pub fn delete_params(options: &DeleteOptions) -> DeleteParams {
    let mut params = DeleteParams::default();
    params.grace_period_seconds = options.grace_period_seconds;
    params.propagation_policy = options.propagation_policy.map(|policy| match policy {
        kubevirt::PropagationPolicy::Foreground => PropagationPolicy::Foreground,
        kubevirt::PropagationPolicy::Background => PropagationPolicy::Background,
        kubevirt::PropagationPolicy::Orphan => PropagationPolicy::Orphan,
    });
    params.preconditions = options.preconditions.as_ref().map(|p| Preconditions {
        uid: p.uid.clone(),
        resource_version: p.resource_version.clone(),
    });
    params
}
