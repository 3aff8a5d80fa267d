//! Error types for vminv-inventory

use std::path::PathBuf;

use thiserror::Error;
use vminv_session::{AttributeLookupError, SessionError};

use crate::document::InventoryDocument;

/// Configuration could not be resolved
#[derive(Error, Debug, Clone)]
pub enum ConfigError {
    /// Required key missing or empty
    #[error("missing required configuration value: {0}")]
    MissingRequired(String),

    /// Value does not match the key's declared type
    #[error("configuration value '{key}' must be {expected}")]
    WrongType {
        /// Offending key
        key: String,
        /// Expected type class
        expected: &'static str,
    },

    /// Value could not be coerced to an integer
    #[error("configuration value '{key}' is not an integer: {value}")]
    InvalidInteger {
        /// Offending key
        key: String,
        /// Raw value
        value: String,
    },

    /// Merged values do not form a valid configuration
    #[error("invalid configuration: {0}")]
    Invalid(String),

    /// Configuration file exists but could not be read
    #[error("failed to read {path}: {reason}")]
    FileRead {
        /// File path
        path: PathBuf,
        /// Underlying cause
        reason: String,
    },

    /// Configuration file is not valid TOML
    #[error("failed to parse {path}: {reason}")]
    FileParse {
        /// File path
        path: PathBuf,
        /// Underlying cause
        reason: String,
    },
}

/// Cache file could not be read or written
#[derive(Error, Debug)]
pub enum CacheError {
    /// Filesystem failure
    #[error("cache I/O error on {path}: {source}")]
    Io {
        /// Cache file path
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// Cached content is not an inventory document
    #[error("cache serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Errors raised while building the inventory
#[derive(Error, Debug)]
pub enum BuildError {
    /// Configured cluster is unknown to the endpoint
    #[error("cluster not found: {0}")]
    ClusterNotFound(String),

    /// Property rule path did not resolve
    #[error(transparent)]
    AttributeLookup(#[from] AttributeLookupError),

    /// Session call failed
    #[error(transparent)]
    Session(#[from] SessionError),

    /// Traversal was cancelled; carries what had been built so far
    #[error("inventory build interrupted")]
    Interrupted(Box<InventoryDocument>),
}

impl BuildError {
    /// Check if the run can continue past this error
    ///
    /// Unknown clusters and per-VM fact failures are skipped; connectivity and
    /// authentication failures end the run.
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        match self {
            BuildError::ClusterNotFound(_) => true,
            BuildError::Session(e) => !e.is_fatal(),
            BuildError::AttributeLookup(_) | BuildError::Interrupted(_) => false,
        }
    }
}
