//! Kubernetes resource helpers shared by all composers
//!
//! - [`ObjectMeta`]: canonical metadata for every emitted resource
//! - [`HasApiResource`]: compile-time apiVersion/kind for typed resources
//! - [`derived_label`]: stable, label-safe names derived from a construct path

use std::collections::BTreeMap;

use aws_lc_rs::digest;
use serde::{Deserialize, Serialize};

use crate::{LABEL_MANAGED_BY, LABEL_MANAGED_BY_TRELLIS, LABEL_NAME, MAX_LABEL_LENGTH};

// =============================================================================
// ObjectMeta - Canonical Kubernetes metadata for all emitted resources
// =============================================================================

/// Standard Kubernetes ObjectMeta for emitted resources.
///
/// Used by all resource types (workloads, ingress, database cluster) as the
/// unified metadata representation. Adds the trellis management labels on
/// construction. The namespace is optional: charts rendered without one are
/// applied into whatever namespace the apply tool targets.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ObjectMeta {
    /// Resource name
    pub name: String,
    /// Resource namespace
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    /// Labels
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,
    /// Annotations
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub annotations: BTreeMap<String, String>,
}

impl ObjectMeta {
    /// Create new metadata with standard trellis labels
    pub fn new(name: impl Into<String>, namespace: Option<&str>) -> Self {
        let name = name.into();
        let mut labels = BTreeMap::new();
        labels.insert(LABEL_NAME.to_string(), name.clone());
        labels.insert(
            LABEL_MANAGED_BY.to_string(),
            LABEL_MANAGED_BY_TRELLIS.to_string(),
        );
        Self {
            name,
            namespace: namespace.map(str::to_string),
            labels,
            annotations: BTreeMap::new(),
        }
    }

    /// Add a label
    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(key.into(), value.into());
        self
    }

    /// Replace all annotations
    pub fn with_annotations(mut self, annotations: BTreeMap<String, String>) -> Self {
        self.annotations = annotations;
        self
    }
}

// =============================================================================
// HasApiResource Trait
// =============================================================================

/// Trait for types that have a known API version and kind.
///
/// The version is baked into the type, so every construction site emits the
/// same `apiVersion`/`kind` pair.
///
/// # Example
/// ```ignore
/// impl HasApiResource for Ingress {
///     const API_VERSION: &'static str = "networking.k8s.io/v1";
///     const KIND: &'static str = "Ingress";
/// }
/// ```
pub trait HasApiResource {
    /// Full API version (e.g., "networking.k8s.io/v1", "v1")
    const API_VERSION: &'static str;
    /// Resource kind (e.g., "Ingress")
    const KIND: &'static str;
}

/// Implement `default_api_version()` and `default_kind()` for a type
/// implementing [`HasApiResource`], for use as serde defaults and in
/// constructors.
#[macro_export]
macro_rules! impl_api_defaults {
    ($type:ty) => {
        impl $type {
            fn default_api_version() -> String {
                <Self as $crate::kube_utils::HasApiResource>::API_VERSION.to_string()
            }
            fn default_kind() -> String {
                <Self as $crate::kube_utils::HasApiResource>::KIND.to_string()
            }
        }
    };
}

// =============================================================================
// Derived names
// =============================================================================

/// Number of hash hex characters appended to derived labels
const HASH_SUFFIX_LEN: usize = 8;

/// Derive a stable, label-safe name from a construct path.
///
/// Each part is lowercased and characters outside `[a-z0-9-]` become `-`.
/// The parts are joined with `-` and suffixed with the first 8 hex chars of
/// SHA-256 over the original path, so two paths that sanitize to the same
/// text still get distinct names. The result never exceeds 63 characters.
///
/// ```text
/// derived_label(&["plone", "db", "cluster"]) == "plone-db-cluster-<hash8>"
/// ```
pub fn derived_label(parts: &[&str]) -> String {
    let input = parts.join("/");
    let hash = digest::digest(&digest::SHA256, input.as_bytes());
    let hex: String = hash.as_ref()[..HASH_SUFFIX_LEN / 2]
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect();

    let mut base = parts
        .iter()
        .map(|p| sanitize_label_part(p))
        .filter(|p| !p.is_empty())
        .collect::<Vec<_>>()
        .join("-");

    let max_base = MAX_LABEL_LENGTH - HASH_SUFFIX_LEN - 1;
    if base.len() > max_base {
        base.truncate(max_base);
    }
    let base = base.trim_end_matches('-');

    if base.is_empty() {
        hex
    } else {
        format!("{}-{}", base, hex)
    }
}

fn sanitize_label_part(part: &str) -> String {
    let mut out = String::with_capacity(part.len());
    for c in part.chars().flat_map(char::to_lowercase) {
        let c = if c.is_ascii_lowercase() || c.is_ascii_digit() {
            c
        } else {
            '-'
        };
        if c == '-' && (out.is_empty() || out.ends_with('-')) {
            continue;
        }
        out.push(c);
    }
    out.trim_end_matches('-').to_string()
}
