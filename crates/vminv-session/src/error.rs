//! Error types for vminv-session

use thiserror::Error;

/// Errors that can occur while talking to the management endpoint
#[derive(Error, Debug, Clone)]
pub enum SessionError {
    /// Endpoint could not be reached
    #[error("connection to {endpoint} failed: {reason}")]
    Connectivity {
        /// Endpoint hostname
        endpoint: String,
        /// Underlying cause
        reason: String,
    },

    /// Endpoint rejected the credentials
    #[error("authentication against {endpoint} failed for user {username}")]
    Authentication {
        /// Endpoint hostname
        endpoint: String,
        /// Username that was rejected
        username: String,
    },

    /// Snapshot file could not be decoded
    #[error("invalid endpoint snapshot: {0}")]
    Snapshot(String),

    /// Extended fact collection failed for a VM
    #[error("fact gathering failed for {vm}: {reason}")]
    FactGathering {
        /// VM name
        vm: String,
        /// Underlying cause
        reason: String,
    },
}

impl SessionError {
    /// Check if the error ends the run (connect-time failures)
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            SessionError::Connectivity { .. }
                | SessionError::Authentication { .. }
                | SessionError::Snapshot(_)
        )
    }
}

/// A dotted attribute path did not resolve against an object
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("cannot resolve '{path}' on {object}: no attribute '{segment}'")]
pub struct AttributeLookupError {
    /// Name of the object being inspected
    pub object: String,
    /// Full dotted path requested
    pub path: String,
    /// First segment that failed to resolve
    pub segment: String,
}
