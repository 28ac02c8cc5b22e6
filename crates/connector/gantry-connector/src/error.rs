//! Error types for connector registries and connector modules

use gantry_core::GantryError;
use thiserror::Error;

/// Result type alias for connector operations
pub type ConnectorResult<T> = Result<T, ConnectorError>;

/// Errors raised by registries and by connector-module code
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConnectorError {
    /// Unknown attribute, notification list or operation
    #[error("Not found: {0}")]
    NotFound(String),

    /// Fetch, push or invocation exceeded its budget
    #[error("Timed out: {0}")]
    Timeout(String),

    /// No converter from a type to the requested representation
    #[error("Unsupported projection of '{type_name}' to {target}")]
    UnsupportedProjection {
        /// Name of the source entity type
        type_name: String,
        /// Requested representation
        target: String,
    },

    /// A converter rejected a concrete value
    #[error("Invalid value: {0}")]
    InvalidValue(String),

    /// The connector instance has been closed
    #[error("Connector '{0}' is closed")]
    Closed(String),

    /// The instance does not carry the requested feature registry
    #[error("Unsupported feature: {0}")]
    Unsupported(String),

    /// Invalid caller input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Opaque failure from connector-module code
    #[error("Connector failure: {0}")]
    Failure(String),
}

impl ConnectorError {
    /// Create a new timeout error
    pub fn timeout(msg: impl Into<String>) -> Self {
        Self::Timeout(msg.into())
    }

    /// Create a new connector failure
    pub fn failure(msg: impl Into<String>) -> Self {
        Self::Failure(msg.into())
    }

    /// Create a new not-found error
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    /// Create a new invalid-value error
    pub fn invalid_value(msg: impl Into<String>) -> Self {
        Self::InvalidValue(msg.into())
    }

    /// Whether this error is a timeout
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout(_))
    }
}

impl From<GantryError> for ConnectorError {
    fn from(err: GantryError) -> Self {
        match err {
            GantryError::NotFound(msg) => Self::NotFound(msg),
            GantryError::Timeout(msg) => Self::Timeout(msg),
            GantryError::Closed(msg) => Self::Closed(msg),
            GantryError::InvalidInput(msg) => Self::InvalidInput(msg),
            GantryError::UnsupportedProjection(msg) => Self::UnsupportedProjection {
                type_name: msg,
                target: "unknown".to_string(),
            },
            other => Self::Failure(other.to_string()),
        }
    }
}

impl From<ConnectorError> for GantryError {
    fn from(err: ConnectorError) -> Self {
        match err {
            ConnectorError::NotFound(msg) => GantryError::NotFound(msg),
            ConnectorError::Timeout(msg) => GantryError::Timeout(msg),
            ConnectorError::Closed(name) => GantryError::Closed(name),
            ConnectorError::InvalidInput(msg) => GantryError::InvalidInput(msg),
            err @ ConnectorError::UnsupportedProjection { .. } => {
                GantryError::UnsupportedProjection(err.to_string())
            }
            other => GantryError::ConnectorFailure(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_round_trips_through_core_taxonomy() {
        let err = ConnectorError::timeout("fetch 'cpu'");
        assert!(err.is_timeout());

        let core: GantryError = err.clone().into();
        assert_eq!(core, GantryError::Timeout("fetch 'cpu'".to_string()));

        let back: ConnectorError = core.into();
        assert_eq!(back, err);
    }

    #[test]
    fn test_failures_map_to_connector_failure() {
        let core: GantryError = ConnectorError::failure("socket reset").into();
        assert!(matches!(core, GantryError::ConnectorFailure(_)));

        let core: GantryError = ConnectorError::Unsupported("operations".into()).into();
        assert!(matches!(core, GantryError::ConnectorFailure(_)));
    }

    #[test]
    fn test_projection_error_message() {
        let err = ConnectorError::UnsupportedProjection {
            type_name: "int64".to_string(),
            target: "Bytes".to_string(),
        };
        assert_eq!(err.to_string(), "Unsupported projection of 'int64' to Bytes");
        let core: GantryError = err.into();
        assert!(matches!(core, GantryError::UnsupportedProjection(_)));
    }
}
