//! Run errors and exit codes

use thiserror::Error;
use vminv_inventory::{BuildError, ConfigError};
use vminv_session::SessionError;

/// Exit status for unexpected failures
pub const EXIT_FAILURE: i32 = 1;
/// Exit status for configuration errors
pub const EXIT_CONFIG: i32 = 2;
/// Exit status for connection and authentication errors
pub const EXIT_SESSION: i32 = 3;
/// Exit status after an interrupt
pub const EXIT_INTERRUPTED: i32 = 130;

/// Errors that end an inventory run
#[derive(Error, Debug)]
pub enum RunError {
    /// Configuration could not be resolved
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Session could not be opened
    #[error(transparent)]
    Session(#[from] SessionError),

    /// Traversal failed or was interrupted
    #[error(transparent)]
    Build(#[from] BuildError),

    /// Document could not be rendered
    #[error("failed to render inventory: {0}")]
    Output(#[from] serde_json::Error),
}

impl RunError {
    /// Process exit status for this error
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        match self {
            RunError::Config(_) => EXIT_CONFIG,
            RunError::Session(e) | RunError::Build(BuildError::Session(e)) if e.is_fatal() => {
                EXIT_SESSION
            }
            RunError::Build(BuildError::Interrupted(_)) => EXIT_INTERRUPTED,
            _ => EXIT_FAILURE,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vminv_inventory::InventoryDocument;

    #[test]
    fn test_exit_codes_are_distinct() {
        let config = RunError::from(ConfigError::MissingRequired("hostname".to_string()));
        let auth = RunError::from(SessionError::Authentication {
            endpoint: "vc1".to_string(),
            username: "u".to_string(),
        });
        let interrupted = RunError::from(BuildError::Interrupted(Box::new(
            InventoryDocument::new(),
        )));
        let facts = RunError::from(BuildError::Session(SessionError::FactGathering {
            vm: "web01".to_string(),
            reason: "timeout".to_string(),
        }));

        assert_eq!(config.exit_code(), EXIT_CONFIG);
        assert_eq!(auth.exit_code(), EXIT_SESSION);
        assert_eq!(interrupted.exit_code(), EXIT_INTERRUPTED);
        assert_eq!(facts.exit_code(), EXIT_FAILURE);
    }
}
