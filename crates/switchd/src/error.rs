//! Error types for daemon operations.

use switch_hal::HalError;
use thiserror::Error;

/// Result type alias for daemon operations.
pub type SwitchdResult<T> = Result<T, SwitchdError>;

/// Errors that can occur while executing a command or task.
#[derive(Debug, Error)]
pub enum SwitchdError {
    /// Device access failed.
    #[error(transparent)]
    Hal(#[from] HalError),

    /// A command argument failed to parse or was out of range.
    #[error("invalid argument for {what}: {value}")]
    InvalidArgument { what: &'static str, value: String },

    /// The active user's role does not authorize the command.
    #[error("elevated permissions required")]
    Unauthorized,

    /// User table constraint violated.
    #[error("user table: {0}")]
    UserTable(String),

    /// The command exists but has no behavior attached.
    #[error("function not implemented")]
    NotImplemented,

    /// The operation needs another confirmation before it runs.
    #[error("confirmation required")]
    ConfirmationPending,
}

impl SwitchdError {
    /// Creates an invalid-argument error.
    pub fn invalid_argument(what: &'static str, value: impl Into<String>) -> Self {
        SwitchdError::InvalidArgument {
            what,
            value: value.into(),
        }
    }

    /// Creates a user-table error.
    pub fn user_table(message: impl Into<String>) -> Self {
        SwitchdError::UserTable(message.into())
    }

    /// Returns true if this failure indicates a transient device condition.
    pub fn is_retryable(&self) -> bool {
        matches!(self, SwitchdError::Hal(hal) if hal.is_retryable())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        let err = SwitchdError::invalid_argument("vlan-id", "9999");
        assert_eq!(err.to_string(), "invalid argument for vlan-id: 9999");
    }

    #[test]
    fn test_retryable_follows_hal() {
        let err = SwitchdError::Hal(HalError::BitPollTimeout { attempts: 10 });
        assert!(err.is_retryable());
        assert!(!SwitchdError::Unauthorized.is_retryable());
    }
}
