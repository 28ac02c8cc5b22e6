//! Error types for reconciliation and configuration sources

use gantry_connector::ConnectorError;
use gantry_core::GantryError;
use thiserror::Error;

/// Result type alias for runtime operations
pub type RuntimeResult<T> = Result<T, RuntimeError>;

/// Errors raised while reconciling resources or loading configuration
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// Connector-module code failed during create, update or release
    #[error("Connector error: {0}")]
    Connector(#[from] ConnectorError),

    /// No factory is registered for the record's connector type
    #[error("No factory registered for connector type '{0}'")]
    UnknownConnectorType(String),

    /// A configuration record is malformed
    #[error("Invalid configuration record: {0}")]
    InvalidRecord(String),

    /// A configuration source could not produce a snapshot
    #[error("Configuration source '{source_name}' failed: {message}")]
    Source {
        /// Name of the failing source
        source_name: String,
        /// What went wrong
        message: String,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Shared Gantry error
    #[error(transparent)]
    Core(#[from] GantryError),
}

impl RuntimeError {
    /// Create a new source error
    pub fn source_failed(source_name: impl Into<String>, message: impl std::fmt::Display) -> Self {
        Self::Source {
            source_name: source_name.into(),
            message: message.to_string(),
        }
    }

    /// Whether retrying the same reconciliation may succeed
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Connector(err) => matches!(err, ConnectorError::Timeout(_) | ConnectorError::Failure(_)),
            Self::Source { .. } | Self::Io(_) => true,
            Self::Core(err) => err.is_retryable(),
            Self::UnknownConnectorType(_) | Self::InvalidRecord(_) => false,
        }
    }
}

impl From<RuntimeError> for GantryError {
    fn from(err: RuntimeError) -> Self {
        match err {
            RuntimeError::Connector(err) => err.into(),
            RuntimeError::UnknownConnectorType(ty) => GantryError::not_found(format!("connector type '{ty}'")),
            RuntimeError::InvalidRecord(msg) => GantryError::invalid_input(msg),
            RuntimeError::Source { source_name, message } => {
                GantryError::config(format!("{source_name}: {message}"))
            }
            RuntimeError::Io(err) => err.into(),
            RuntimeError::Core(err) => err,
        }
    }
}
