//! Chart composition for trellis
//!
//! This crate turns resolved [`TopologyOptions`] into a [`ResourceGraph`]:
//!
//! - **Database**: CloudNativePG Cluster and its connection identifiers
//! - **Env**: backend environment, wired to the database when present
//! - **Workload**: backend/frontend Deployments and Services
//! - **HttpCache**: Varnish in front of the application
//! - **Ingress**: main and maintenance Ingress resources
//! - **Compiler**: the assembler that runs the above in order

#![deny(missing_docs)]

pub mod compiler;
pub mod database;
pub mod env;
pub mod graph;
pub mod httpcache;
pub mod ingress;
pub mod k8s;
pub mod options;
pub mod workload;

pub use compiler::{ChartCompiler, ChartCompilerBuilder, Features};
pub use graph::{Resource, ResourceGraph, ResourceId};
pub use options::{DatabaseOptions, TopologyOptions};
pub use workload::{Routing, ServiceRef};
