//! Resolved topology configuration
//!
//! [`TopologyOptions`] is the already-validated configuration snapshot the
//! composers read. Parsing and validation of raw operator input happens at
//! the process boundary, before composition starts.

use serde::{Deserialize, Serialize};

/// Default chart identity, used as the prefix for every resource name
pub const DEFAULT_CHART_NAME: &str = "plone";

/// Default container image for backend and frontend
pub const DEFAULT_IMAGE: &str = "ghcr.io/plone/plone:latest";

/// Default image tag, reported as the application version label
pub const DEFAULT_IMAGE_TAG: &str = "latest";

/// Default replica count for backend and frontend workloads
pub const DEFAULT_REPLICAS: u32 = 2;

/// Default number of PostgreSQL instances in the managed cluster
pub const DEFAULT_PG_INSTANCES: u32 = 2;

/// Default PostgreSQL volume size
pub const DEFAULT_PG_STORAGE: &str = "20Gi";

/// Managed database sizing
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DatabaseOptions {
    /// Number of PostgreSQL instances (at least 1)
    pub instances: u32,
    /// Volume size per instance, e.g. "20Gi"
    pub storage_size: String,
}

impl Default for DatabaseOptions {
    fn default() -> Self {
        Self {
            instances: DEFAULT_PG_INSTANCES,
            storage_size: DEFAULT_PG_STORAGE.to_string(),
        }
    }
}

/// Resolved configuration for one chart assembly
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TopologyOptions {
    /// Chart identity; prefixes resource names and seeds derived labels
    pub chart_name: String,
    /// Namespace stamped on every resource, if any
    pub namespace: Option<String>,
    /// Primary public host
    pub domain: String,
    /// Second host that bypasses frontend and cache
    pub domain_maintenance: Option<String>,
    /// cert-manager ClusterIssuer; enables TLS when set
    pub cert_issuer: Option<String>,
    /// Backend replicas (0 scales the backend to zero)
    pub backend_replicas: u32,
    /// Frontend replicas, only used when a frontend is generated
    pub frontend_replicas: u32,
    /// Container image reference for backend and frontend
    pub image: String,
    /// Image tag, reported as the application version
    pub image_tag: String,
    /// Managed database sizing, only used when the database is generated
    pub database: DatabaseOptions,
}

impl TopologyOptions {
    /// Options for `domain` with every other value at its default
    pub fn new(domain: impl Into<String>) -> Self {
        Self {
            chart_name: DEFAULT_CHART_NAME.to_string(),
            namespace: None,
            domain: domain.into(),
            domain_maintenance: None,
            cert_issuer: None,
            backend_replicas: DEFAULT_REPLICAS,
            frontend_replicas: DEFAULT_REPLICAS,
            image: DEFAULT_IMAGE.to_string(),
            image_tag: DEFAULT_IMAGE_TAG.to_string(),
            database: DatabaseOptions::default(),
        }
    }

    /// Name of a resource belonging to this chart: `<chart>-<suffix>`
    pub fn resource_name(&self, suffix: &str) -> String {
        format!("{}-{}", self.chart_name, suffix)
    }
}
