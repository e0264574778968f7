//! Common types for trellis: errors, resource metadata, and manifest emission

#![deny(missing_docs)]

pub mod error;
pub mod kube_utils;
pub mod yaml;

pub use error::Error;

/// Result type alias using our custom Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Standard Kubernetes label for the application name
pub const LABEL_NAME: &str = "app.kubernetes.io/name";

/// Standard Kubernetes label for the component within the application
pub const LABEL_COMPONENT: &str = "app.kubernetes.io/component";

/// Standard Kubernetes label for the application version
pub const LABEL_VERSION: &str = "app.kubernetes.io/version";

/// Standard Kubernetes label for the tool managing a resource
pub const LABEL_MANAGED_BY: &str = "app.kubernetes.io/managed-by";

/// Value of [`LABEL_MANAGED_BY`] on everything trellis emits
pub const LABEL_MANAGED_BY_TRELLIS: &str = "trellis";

/// Maximum length of a Kubernetes label value
pub const MAX_LABEL_LENGTH: usize = 63;
