//! KubeVirt VirtualMachine module
//!
//! Parameter schema, VirtualMachine document construction, and the runner
//! that reconciles the document with the cluster.

#![allow(dead_code)]

mod params;
mod runner;
mod vm;

pub use params::{
    DeleteOptions, ModuleParams, ParamsError, Preconditions, PropagationPolicy, ResourceMatcher,
    State, VmParameters,
};
pub use runner::{perform_action, ActionResult, Method, ResourceClient, RunnerError, VmRef};
pub use vm::{build_vm_document, VmDocument, VM_KIND};
