//! Error types for the Registry Storage Operator
//!
//! Provides structured error types for storage backend selection,
//! configuration validation, and the controller loop.

use std::time::Duration;
use thiserror::Error;

/// Unified error type for the operator
#[derive(Error, Debug)]
pub enum Error {
    // =========================================================================
    // Configuration Errors
    // =========================================================================
    #[error("no storage backend is configured")]
    NoBackendConfigured,

    #[error("exactly one storage backend must be configured, got: {}", backends.join(", "))]
    AmbiguousBackendConfigured { backends: Vec<&'static str> },

    #[error("{key} change is not supported: expected {previous}, but got {requested}")]
    ConfigurationChangeRejected {
        key: String,
        previous: String,
        requested: String,
    },

    #[error("unable to resolve volume source: multiple sources are populated: {}", populated.join(", "))]
    VolumeSourceUnresolvable { populated: Vec<&'static str> },

    #[error("configuration error: {0}")]
    Configuration(String),

    // =========================================================================
    // Kubernetes Errors
    // =========================================================================
    #[error("Kubernetes API error: {0}")]
    Kube(#[from] kube::Error),

    #[error("resource is missing required metadata: {0}")]
    MissingMetadata(&'static str),

    // =========================================================================
    // Serialization Errors
    // =========================================================================
    #[error("JSON serialization error: {0}")]
    JsonParse(#[from] serde_json::Error),

    // =========================================================================
    // Internal Errors
    // =========================================================================
    #[error("internal error: {0}")]
    Internal(String),
}

/// Action to take on error during reconciliation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorAction {
    /// Requeue with exponential backoff
    RequeueWithBackoff,
    /// Requeue after specific duration
    RequeueAfter(Duration),
    /// Don't requeue, wait for changes
    NoRequeue,
}

impl Error {
    /// Determine what action to take for this error
    pub fn action(&self) -> ErrorAction {
        match self {
            // Rejected configuration stays rejected until the spec changes,
            // so retrying with the same input is pointless.
            Error::NoBackendConfigured
            | Error::AmbiguousBackendConfigured { .. }
            | Error::ConfigurationChangeRejected { .. }
            | Error::VolumeSourceUnresolvable { .. }
            | Error::Configuration(_)
            | Error::MissingMetadata(_) => ErrorAction::NoRequeue,

            // All other errors - retry with backoff
            _ => ErrorAction::RequeueWithBackoff,
        }
    }

    /// Check if this error is retryable
    pub fn is_retryable(&self) -> bool {
        !matches!(self.action(), ErrorAction::NoRequeue)
    }
}

/// Result type alias for the operator
pub type Result<T> = std::result::Result<T, Error>;
