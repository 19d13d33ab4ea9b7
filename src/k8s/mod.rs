//! Kubernetes API client module
//!
//! Provides the cluster side of the VirtualMachine runner.

mod client;

pub use client::K8sClient;
