//! CLI argument parsing
//!
//! Defines command-line interface using clap.

use anyhow::Result;
use clap::{Args as ClapArgs, Parser, Subcommand};
use serde_json::Value;
use std::path::PathBuf;

use crate::config::load_document;
use crate::kubevirt::{ModuleParams, PropagationPolicy, ResourceMatcher, State};
use crate::output::OutputFormat;

/// Manage KubeVirt VirtualMachine resources
#[derive(Parser, Debug)]
#[command(name = "kubevirt-vm")]
#[command(version)]
#[command(about = "Build and apply KubeVirt VirtualMachine resources")]
#[command(long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Print the VirtualMachine document without touching the cluster
    Render(RenderArgs),

    /// Create, update or delete the VirtualMachine in the cluster
    Apply(ApplyArgs),

    /// Print the JSON Schema of the parameter file
    Schema,
}

/// Arguments for render command
#[derive(Parser, Debug)]
pub struct RenderArgs {
    #[command(flatten)]
    pub vm: VmArgs,

    /// Output format
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Yaml)]
    pub format: OutputFormat,
}

/// Arguments for apply command
#[derive(Parser, Debug)]
pub struct ApplyArgs {
    #[command(flatten)]
    pub vm: VmArgs,

    /// Desired state of the VM
    #[arg(long, value_enum)]
    pub state: Option<State>,

    /// Replace an existing VM instead of patching it
    #[arg(long)]
    pub force: bool,

    /// Deletion propagation policy
    #[arg(long, value_enum)]
    pub propagation_policy: Option<PropagationPolicy>,

    /// Deletion grace period in seconds
    #[arg(long)]
    pub grace_period: Option<u32>,

    /// Path to a kubeconfig file
    #[arg(long)]
    pub kubeconfig: Option<PathBuf>,

    /// Kubeconfig context
    #[arg(long)]
    pub context: Option<String>,

    /// Output format
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Yaml)]
    pub format: OutputFormat,
}

impl ApplyArgs {
    /// Layer apply flags and VM flags over resolved parameters
    pub fn apply_to(&self, params: &mut ModuleParams) -> Result<()> {
        self.vm.apply_to(params)?;

        if let Some(state) = self.state {
            params.state = state;
        }
        if self.force {
            params.force = true;
        }
        if self.propagation_policy.is_some() || self.grace_period.is_some() {
            let options = params.delete_options.get_or_insert_with(Default::default);
            if let Some(policy) = self.propagation_policy {
                options.propagation_policy = Some(policy);
            }
            if let Some(seconds) = self.grace_period {
                options.grace_period_seconds = Some(seconds);
            }
        }
        if let Some(kubeconfig) = &self.kubeconfig {
            params.kubeconfig = Some(kubeconfig.clone());
        }
        if let Some(context) = &self.context {
            params.context = Some(context.clone());
        }

        Ok(())
    }
}

/// VirtualMachine parameters shared by render and apply
#[derive(ClapArgs, Debug, Default)]
pub struct VmArgs {
    /// Parameter file (YAML or JSON)
    #[arg(short, long)]
    pub params: Option<PathBuf>,

    /// VM name
    #[arg(long, conflicts_with = "generate_name")]
    pub name: Option<String>,

    /// Prefix for a server-generated VM name
    #[arg(long)]
    pub generate_name: Option<String>,

    /// Namespace of the VM
    #[arg(short, long)]
    pub namespace: Option<String>,

    /// KubeVirt API version
    #[arg(long)]
    pub api_version: Option<String>,

    /// Start the VM
    #[arg(long, conflicts_with = "stopped")]
    pub running: bool,

    /// Keep the VM stopped
    #[arg(long)]
    pub stopped: bool,

    /// Label in key=value form (repeatable)
    #[arg(long = "label", value_parser = parse_key_val)]
    pub labels: Vec<(String, String)>,

    /// Annotation in key=value form (repeatable)
    #[arg(long = "annotation", value_parser = parse_key_val)]
    pub annotations: Vec<(String, String)>,

    /// Instance type name
    #[arg(long)]
    pub instancetype: Option<String>,

    /// Preference name
    #[arg(long)]
    pub preference: Option<String>,

    /// File holding a list of DataVolume templates
    #[arg(long)]
    pub data_volume_templates: Option<PathBuf>,

    /// File holding the VirtualMachineInstance spec
    #[arg(long)]
    pub spec: Option<PathBuf>,
}

impl VmArgs {
    /// Layer VM flags over resolved parameters
    pub fn apply_to(&self, params: &mut ModuleParams) -> Result<()> {
        let vm = &mut params.vm;

        if let Some(name) = &self.name {
            vm.name = Some(name.clone());
            vm.generate_name = None;
        }
        if let Some(prefix) = &self.generate_name {
            vm.generate_name = Some(prefix.clone());
            vm.name = None;
        }
        if let Some(namespace) = &self.namespace {
            vm.namespace = namespace.clone();
        }
        if let Some(api_version) = &self.api_version {
            vm.api_version = api_version.clone();
        }
        if self.running {
            vm.running = true;
        }
        if self.stopped {
            vm.running = false;
        }
        for (key, value) in &self.labels {
            vm.labels
                .get_or_insert_with(Default::default)
                .insert(key.clone(), value.clone());
        }
        for (key, value) in &self.annotations {
            vm.annotations
                .get_or_insert_with(Default::default)
                .insert(key.clone(), value.clone());
        }
        if let Some(name) = &self.instancetype {
            vm.instancetype = Some(ResourceMatcher::named(name.clone()));
        }
        if let Some(name) = &self.preference {
            vm.preference = Some(ResourceMatcher::named(name.clone()));
        }
        if let Some(path) = &self.data_volume_templates {
            vm.data_volume_templates = Some(load_document::<Vec<Value>>(path)?);
        }
        if let Some(path) = &self.spec {
            vm.spec = Some(load_document::<Value>(path)?);
        }

        Ok(())
    }
}

/// Parse a `key=value` pair
fn parse_key_val(s: &str) -> Result<(String, String), String> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("invalid key=value pair: no `=` found in `{s}`"))?;
    if key.is_empty() {
        return Err(format!("invalid key=value pair: empty key in `{s}`"));
    }
    Ok((key.to_string(), value.to_string()))
}
