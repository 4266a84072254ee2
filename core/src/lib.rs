//! Bootstraps a single-host demo Kubernetes platform: a lightweight k3s
//! cluster inside a VM or container, a stack of platform controllers
//! installed through helm, an optional MetalLB address pool, and a GitOps
//! repository the installed controllers watch.
//!
//! The whole procedure is strictly sequential and idempotent: re-running it
//! against an already bootstrapped target converges to the same end state.

pub mod bootstrap;
pub mod cluster;
pub mod config;
pub mod exec;
pub mod expose;
pub mod gitops;
pub mod helm;
pub mod install;
pub mod kubeapi;
pub mod kubeconfig;
pub mod loadbalancer;
pub mod logging;
pub mod manifests;
pub mod preflight;
pub mod provider;
pub mod report;
pub mod reset;
pub mod retry;

pub use config::Config;
pub use report::Report;
