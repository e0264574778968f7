//! CloudNativePG database cluster composition
//!
//! Builds a `postgresql.cnpg.io/v1` Cluster and publishes the two names
//! other composers need to connect to it. CloudNativePG creates a
//! read-write Service `<cluster>-rw` and an application credentials Secret
//! `<cluster>-app` for every Cluster, so both are derived from the cluster
//! name rather than emitted here.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use trellis_common::impl_api_defaults;
use trellis_common::kube_utils::{derived_label, HasApiResource, ObjectMeta};
use trellis_common::LABEL_COMPONENT;

use crate::options::DatabaseOptions;

/// Database created by initdb and used by the backend
pub const DATABASE_NAME: &str = "plone";

/// Owner role of [`DATABASE_NAME`]
pub const DATABASE_OWNER: &str = "plone";

const SHARED_BUFFERS: &str = "256MB";

// =============================================================================
// CloudNativePG Cluster
// =============================================================================

/// CloudNativePG Cluster resource
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Cluster {
    /// API version (postgresql.cnpg.io/v1)
    #[serde(default = "Cluster::default_api_version")]
    pub api_version: String,
    /// Resource kind (Cluster)
    #[serde(default = "Cluster::default_kind")]
    pub kind: String,
    /// Resource metadata
    pub metadata: ObjectMeta,
    /// Cluster specification
    pub spec: ClusterSpec,
}

impl HasApiResource for Cluster {
    const API_VERSION: &'static str = "postgresql.cnpg.io/v1";
    const KIND: &'static str = "Cluster";
}

impl_api_defaults!(Cluster);

impl Cluster {
    /// Create a new Cluster
    pub fn new(metadata: ObjectMeta, spec: ClusterSpec) -> Self {
        Self {
            api_version: Self::default_api_version(),
            kind: Self::default_kind(),
            metadata,
            spec,
        }
    }
}

/// Cluster spec
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ClusterSpec {
    /// Number of PostgreSQL instances (primary + replicas)
    pub instances: u32,
    /// PostgreSQL server configuration
    pub postgresql: PostgresConfiguration,
    /// How the cluster is initialised
    pub bootstrap: BootstrapConfiguration,
    /// Per-instance storage
    pub storage: StorageConfiguration,
}

/// PostgreSQL server parameters
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct PostgresConfiguration {
    /// postgresql.conf parameters
    pub parameters: BTreeMap<String, String>,
}

/// Bootstrap method
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct BootstrapConfiguration {
    /// Create a fresh database with initdb
    pub initdb: BootstrapInitDb,
}

/// initdb bootstrap parameters
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct BootstrapInitDb {
    /// Application database name
    pub database: String,
    /// Application database owner
    pub owner: String,
}

/// Storage configuration
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct StorageConfiguration {
    /// Volume size (e.g., "20Gi")
    pub size: String,
}

// =============================================================================
// Compiled output
// =============================================================================

/// Connection identifiers published by the database composer
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DatabaseRef {
    /// Read-write Service name, used as DSN host
    pub service_name: String,
    /// Secret holding `username` and `password`
    pub secret_name: String,
}

/// Output of [`DatabaseCompiler::compile`]
#[derive(Clone, Debug)]
pub struct CompiledDatabase {
    /// The Cluster resource
    pub cluster: Cluster,
    /// Read-write Service name (`<cluster>-rw`)
    pub service_name: String,
    /// Application Secret name (`<cluster>-app`)
    pub secret_name: String,
}

impl CompiledDatabase {
    /// Identifiers the environment composer needs
    pub fn reference(&self) -> DatabaseRef {
        DatabaseRef {
            service_name: self.service_name.clone(),
            secret_name: self.secret_name.clone(),
        }
    }
}

// =============================================================================
// Database Compiler
// =============================================================================

/// Compiler for the managed PostgreSQL cluster
pub struct DatabaseCompiler;

impl DatabaseCompiler {
    /// Compile the Cluster for a chart.
    ///
    /// `options` is assumed validated (`instances >= 1`, well-formed size).
    /// The cluster name is derived from the chart identity so it, and every
    /// DSN built from it, stays the same across runs.
    pub fn compile(
        chart_name: &str,
        namespace: Option<&str>,
        options: &DatabaseOptions,
    ) -> CompiledDatabase {
        let cluster_name = Self::cluster_name(chart_name);

        let metadata =
            ObjectMeta::new(&cluster_name, namespace).with_label(LABEL_COMPONENT, "database");

        let cluster = Cluster::new(
            metadata,
            ClusterSpec {
                instances: options.instances,
                postgresql: PostgresConfiguration {
                    parameters: BTreeMap::from([(
                        "shared_buffers".to_string(),
                        SHARED_BUFFERS.to_string(),
                    )]),
                },
                bootstrap: BootstrapConfiguration {
                    initdb: BootstrapInitDb {
                        database: DATABASE_NAME.to_string(),
                        owner: DATABASE_OWNER.to_string(),
                    },
                },
                storage: StorageConfiguration {
                    size: options.storage_size.clone(),
                },
            },
        );

        CompiledDatabase {
            service_name: format!("{}-rw", cluster_name),
            secret_name: format!("{}-app", cluster_name),
            cluster,
        }
    }

    /// Stable cluster name for a chart
    pub fn cluster_name(chart_name: &str) -> String {
        derived_label(&[chart_name, "db", "cluster"])
    }
}
