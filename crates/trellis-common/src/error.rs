//! Error types for trellis
//!
//! Composition performs no I/O, so the taxonomy is small:
//! configuration problems found before composition starts, contract
//! violations between composers, and failures rendering or writing output.

use thiserror::Error;

/// Main error type for trellis operations
#[derive(Debug, Error)]
pub enum Error {
    /// Missing or malformed operator input, reported before composition runs
    #[error("configuration error for {field}: {message}")]
    Configuration {
        /// The option that is missing or invalid (e.g., "domain")
        field: String,
        /// Description of what's wrong
        message: String,
    },

    /// A composer was invoked without an identifier its upstream must provide
    #[error("precondition violated in {component}: {message}")]
    Precondition {
        /// Composer that detected the violation (e.g., "ingress")
        component: String,
        /// Description of the broken contract
        message: String,
    },

    /// Serialization error while rendering manifests
    #[error("serialization error: {message}")]
    Serialization {
        /// Description of what failed
        message: String,
        /// The resource kind being serialized (if known)
        kind: Option<String>,
    },

    /// Failure writing rendered output
    #[error("io error [{context}]: {source}")]
    Io {
        /// What was being written (e.g., a file path or "stdout")
        context: String,
        /// Underlying io error
        #[source]
        source: std::io::Error,
    },
}

impl Error {
    /// Create a configuration error for the given option
    pub fn configuration(field: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Configuration {
            field: field.into(),
            message: msg.into(),
        }
    }

    /// Create a precondition violation raised by a composer
    pub fn precondition(component: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Precondition {
            component: component.into(),
            message: msg.into(),
        }
    }

    /// Create a serialization error with the given message
    pub fn serialization(msg: impl Into<String>) -> Self {
        Self::Serialization {
            message: msg.into(),
            kind: None,
        }
    }

    /// Create a serialization error for a specific resource kind
    pub fn serialization_for(kind: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Serialization {
            message: msg.into(),
            kind: Some(kind.into()),
        }
    }

    /// Create an io error with context
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }
}

impl From<serde_yaml::Error> for Error {
    fn from(err: serde_yaml::Error) -> Self {
        Self::serialization(err.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::serialization(err.to_string())
    }
}
