//! kubevirt-vm - KubeVirt VirtualMachine management tool
//!
//! Turns a flat parameter set into a KubeVirt `VirtualMachine` resource and
//! reconciles it with a Kubernetes cluster.
//!
//! ## Usage
//!
//! ```bash
//! # Print the document for a VM
//! kubevirt-vm render --name testvm --namespace default --label app=web
//!
//! # Create or update a VM from a parameter file
//! kubevirt-vm apply --params vm.yaml
//!
//! # Delete a VM
//! kubevirt-vm apply --name testvm --namespace default --state absent
//!
//! # Show the parameter file schema
//! kubevirt-vm schema
//! ```

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{debug, info};

mod cli;
mod config;
mod k8s;
mod kubevirt;
mod output;
mod utils;

use cli::{ApplyArgs, Args, Command, RenderArgs};
use config::EnvConfig;
use k8s::K8sClient;
use kubevirt::{build_vm_document, perform_action, ModuleParams};
use utils::{init_logger, LogLevel};

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let env = EnvConfig::load();

    init_logger(LogLevel::resolve(args.verbose, env.log_level.as_deref()));

    match args.command {
        Command::Render(render_args) => {
            render_vm(render_args, &env)?;
        }
        Command::Apply(apply_args) => {
            apply_vm(apply_args, &env).await?;
        }
        Command::Schema => {
            print_schema()?;
        }
    }

    Ok(())
}

fn render_vm(args: RenderArgs, env: &EnvConfig) -> Result<()> {
    let mut params = config::resolve_params(args.vm.params.as_deref(), env)?;
    args.vm.apply_to(&mut params)?;
    params.validate()?;

    let document = build_vm_document(&params.vm);
    debug!("Rendered VirtualMachine document");

    println!("{}", args.format.render(&document)?);
    Ok(())
}

async fn apply_vm(args: ApplyArgs, env: &EnvConfig) -> Result<()> {
    let mut params = config::resolve_params(args.vm.params.as_deref(), env)?;
    args.apply_to(&mut params)?;
    params.validate()?;

    let document = build_vm_document(&params.vm);
    let client = K8sClient::connect(params.kubeconfig.as_deref(), params.context.as_deref())
        .await?;

    info!(
        "Applying VirtualMachine in namespace {} (state: {:?})",
        document.namespace(),
        params.state
    );

    let result = perform_action(&client, &document, &params)
        .await
        .context("Failed to apply VirtualMachine")?;

    println!("{}", args.format.render(&result)?);
    Ok(())
}

fn print_schema() -> Result<()> {
    let schema = schemars::schema_for!(ModuleParams);
    let rendered =
        serde_json::to_string_pretty(&schema).context("Failed to serialize parameter schema")?;
    println!("{rendered}");
    Ok(())
}
