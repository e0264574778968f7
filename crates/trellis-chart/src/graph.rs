//! Ordered resource graph produced by one chart assembly
//!
//! Resources are keyed by a stable `<Kind>/<name>` identifier. Insertion
//! order is preserved and is the order resources are rendered.

use std::fmt;

use serde::Serialize;
use trellis_common::kube_utils::ObjectMeta;
use trellis_common::{yaml, Error, Result};

use crate::database::Cluster;
use crate::ingress::Ingress;
use crate::k8s::{ConfigMap, Deployment, Service};

/// Any resource trellis emits
#[derive(Clone, Debug, Serialize, PartialEq)]
#[serde(untagged)]
pub enum Resource {
    /// CloudNativePG Cluster
    Cluster(Cluster),
    /// ConfigMap
    ConfigMap(ConfigMap),
    /// Deployment
    Deployment(Deployment),
    /// Service
    Service(Service),
    /// Ingress
    Ingress(Ingress),
}

impl Resource {
    /// Resource kind as rendered
    pub fn kind(&self) -> &str {
        match self {
            Self::Cluster(r) => &r.kind,
            Self::ConfigMap(r) => &r.kind,
            Self::Deployment(r) => &r.kind,
            Self::Service(r) => &r.kind,
            Self::Ingress(r) => &r.kind,
        }
    }

    /// Resource metadata
    pub fn metadata(&self) -> &ObjectMeta {
        match self {
            Self::Cluster(r) => &r.metadata,
            Self::ConfigMap(r) => &r.metadata,
            Self::Deployment(r) => &r.metadata,
            Self::Service(r) => &r.metadata,
            Self::Ingress(r) => &r.metadata,
        }
    }

    /// Stable identifier of this resource
    pub fn id(&self) -> ResourceId {
        ResourceId(format!("{}/{}", self.kind(), self.metadata().name))
    }
}

macro_rules! impl_from_resource {
    ($($variant:ident),*) => {
        $(
            impl From<$variant> for Resource {
                fn from(r: $variant) -> Self {
                    Self::$variant(r)
                }
            }
        )*
    };
}

impl_from_resource!(Cluster, ConfigMap, Deployment, Service, Ingress);

/// Stable key of a resource in the graph (`<Kind>/<name>`)
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceId(String);

impl ResourceId {
    /// Identifier as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Ordered, keyed collection of emitted resources
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ResourceGraph {
    entries: Vec<(ResourceId, Resource)>,
}

impl ResourceGraph {
    /// Create an empty graph
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a resource.
    ///
    /// # Errors
    ///
    /// Returns `Error::Precondition` if a resource with the same id was
    /// already inserted; two composers claiming one name is an assembler bug.
    pub fn insert(&mut self, resource: impl Into<Resource>) -> Result<ResourceId> {
        let resource = resource.into();
        let id = resource.id();
        if self.contains(&id) {
            return Err(Error::precondition(
                "graph",
                format!("duplicate resource {}", id),
            ));
        }
        self.entries.push((id.clone(), resource));
        Ok(id)
    }

    /// Whether a resource with this id exists
    pub fn contains(&self, id: &ResourceId) -> bool {
        self.entries.iter().any(|(existing, _)| existing == id)
    }

    /// Look up a resource by `<Kind>/<name>`
    pub fn get(&self, id: &str) -> Option<&Resource> {
        self.entries
            .iter()
            .find(|(existing, _)| existing.as_str() == id)
            .map(|(_, r)| r)
    }

    /// Ids in emission order
    pub fn ids(&self) -> impl Iterator<Item = &ResourceId> {
        self.entries.iter().map(|(id, _)| id)
    }

    /// Resources in emission order
    pub fn resources(&self) -> impl Iterator<Item = &Resource> {
        self.entries.iter().map(|(_, r)| r)
    }

    /// Ingress resources in emission order
    pub fn ingresses(&self) -> impl Iterator<Item = &Ingress> {
        self.resources().filter_map(|r| match r {
            Resource::Ingress(i) => Some(i),
            _ => None,
        })
    }

    /// Deployments in emission order
    pub fn deployments(&self) -> impl Iterator<Item = &Deployment> {
        self.resources().filter_map(|r| match r {
            Resource::Deployment(d) => Some(d),
            _ => None,
        })
    }

    /// The database cluster, if one was generated
    pub fn cluster(&self) -> Option<&Cluster> {
        self.resources().find_map(|r| match r {
            Resource::Cluster(c) => Some(c),
            _ => None,
        })
    }

    /// Number of resources
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the graph is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Render the graph as a multi-document YAML stream
    pub fn to_yaml(&self) -> Result<String> {
        yaml::to_documents(self.resources())
    }
}
