//! Error handling types shared across Gantry crates.
//!
//! Registries swallow "unknown id" into default values or `false` at their
//! boundary; everything else travels as a [`GantryError`] variant so callers can
//! tell a timeout from a missing converter from a failing connector.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// The main error type for the Gantry ecosystem.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum GantryError {
    /// Unknown attribute, notification list, operation or resource
    #[error("Not found: {0}")]
    NotFound(String),

    /// A fetch, push or invocation exceeded its time budget
    #[error("Operation timed out: {0}")]
    Timeout(String),

    /// No converter is registered for the requested representation
    #[error("Unsupported projection: {0}")]
    UnsupportedProjection(String),

    /// Opaque failure raised by connector-module code
    #[error("Connector failure: {0}")]
    ConnectorFailure(String),

    /// The target has been closed and accepts no further calls
    #[error("Closed: {0}")]
    Closed(String),

    /// Configuration related errors
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Invalid input parameters
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Internal errors
    #[error("Internal error: {0}")]
    Internal(String),
}

impl GantryError {
    /// Create a new not-found error
    pub fn not_found<T: fmt::Display>(msg: T) -> Self {
        Self::NotFound(msg.to_string())
    }

    /// Create a new timeout error
    pub fn timeout<T: fmt::Display>(msg: T) -> Self {
        Self::Timeout(msg.to_string())
    }

    /// Create a new unsupported-projection error
    pub fn unsupported_projection<T: fmt::Display>(msg: T) -> Self {
        Self::UnsupportedProjection(msg.to_string())
    }

    /// Create a new connector failure
    pub fn connector<T: fmt::Display>(msg: T) -> Self {
        Self::ConnectorFailure(msg.to_string())
    }

    /// Create a new closed error
    pub fn closed<T: fmt::Display>(msg: T) -> Self {
        Self::Closed(msg.to_string())
    }

    /// Create a new configuration error
    pub fn config<T: fmt::Display>(msg: T) -> Self {
        Self::Configuration(msg.to_string())
    }

    /// Create a new invalid input error
    pub fn invalid_input<T: fmt::Display>(msg: T) -> Self {
        Self::InvalidInput(msg.to_string())
    }

    /// Create a new internal error
    pub fn internal<T: fmt::Display>(msg: T) -> Self {
        Self::Internal(msg.to_string())
    }

    /// Check if retrying the same call may succeed
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Timeout(_) | Self::ConnectorFailure(_))
    }

    /// Check if this error was caused by the caller's input
    #[must_use]
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::NotFound(_) | Self::InvalidInput(_) | Self::UnsupportedProjection(_) | Self::Closed(_)
        )
    }
}

/// Result type alias for Gantry operations
pub type GantryResult<T> = Result<T, GantryError>;

impl From<std::io::Error> for GantryError {
    fn from(err: std::io::Error) -> Self {
        Self::Internal(err.to_string())
    }
}

impl From<serde_json::Error> for GantryError {
    fn from(err: serde_json::Error) -> Self {
        Self::Configuration(err.to_string())
    }
}

impl From<config::ConfigError> for GantryError {
    fn from(err: config::ConfigError) -> Self {
        Self::Configuration(err.to_string())
    }
}

impl From<toml::de::Error> for GantryError {
    fn from(err: toml::de::Error) -> Self {
        Self::Configuration(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let err = GantryError::config("missing timeout");
        assert_eq!(err, GantryError::Configuration("missing timeout".to_string()));
        assert_eq!(err.to_string(), "Configuration error: missing timeout");
    }

    #[test]
    fn test_error_classification() {
        let timeout = GantryError::timeout("fetch cpu");
        assert!(timeout.is_retryable());
        assert!(!timeout.is_client_error());

        let missing = GantryError::not_found("attribute 'cpu'");
        assert!(missing.is_client_error());
        assert!(!missing.is_retryable());

        let projection = GantryError::unsupported_projection("Integer -> Bytes");
        assert!(projection.is_client_error());

        let failure = GantryError::connector("socket reset");
        assert!(failure.is_retryable());
        assert!(!failure.is_client_error());
    }

    #[test]
    fn test_error_conversions() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: GantryError = io_err.into();
        assert!(matches!(err, GantryError::Internal(_)));

        let toml_err = toml::from_str::<toml::Value>("= broken").unwrap_err();
        let err: GantryError = toml_err.into();
        assert!(matches!(err, GantryError::Configuration(_)));
    }
}
