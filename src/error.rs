//! Error types for LoopClaw
//!
//! This module defines all error types used throughout the agent loop.
//! Uses `thiserror` for ergonomic error handling with automatic `Display` and
//! `Error` trait implementations.

use std::fmt;
use thiserror::Error;

// ============================================================================
// Connection Error Classification
// ============================================================================

/// Structured classification of a failed connection action.
///
/// The execution engine decides whether to stamp the cooldown, keep looping
/// or stop entirely purely from this classification, never from message text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionError {
    /// Credentials missing or invalid; the connection cannot act at all.
    NotConfigured(String),
    /// The external provider reported a rate limit of its own.
    RateLimited(String),
    /// Network hiccup, timeout or provider-side temporary failure.
    Transient(String),
    /// The provider refused the request in a way retrying will not fix.
    Permanent(String),
    /// Arguments do not satisfy the action's parameter contract.
    InvalidArguments(String),
    /// The connection does not expose the requested action.
    UnsupportedAction(String),
}

impl fmt::Display for ConnectionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionError::NotConfigured(msg) => write!(f, "Not configured: {}", msg),
            ConnectionError::RateLimited(msg) => write!(f, "Rate limited: {}", msg),
            ConnectionError::Transient(msg) => write!(f, "Transient error: {}", msg),
            ConnectionError::Permanent(msg) => write!(f, "Permanent error: {}", msg),
            ConnectionError::InvalidArguments(msg) => write!(f, "Invalid arguments: {}", msg),
            ConnectionError::UnsupportedAction(msg) => write!(f, "Unsupported action: {}", msg),
        }
    }
}

impl std::error::Error for ConnectionError {}

impl ConnectionError {
    /// Returns `true` for failures caused by configuration rather than the
    /// external system. These never count against the cooldown so a fixed
    /// configuration is retried on the next cycle.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            ConnectionError::NotConfigured(_)
                | ConnectionError::InvalidArguments(_)
                | ConnectionError::UnsupportedAction(_)
        )
    }

    /// Returns `true` if the attempt must be stamped in the rate tracker.
    pub fn counts_against_cooldown(&self) -> bool {
        matches!(
            self,
            ConnectionError::RateLimited(_) | ConnectionError::Transient(_)
        )
    }

    /// Returns `true` if the loop must stop and surface this error.
    pub fn is_fatal(&self) -> bool {
        matches!(self, ConnectionError::Permanent(_))
    }

    /// Classify an HTTP status code returned by a connection's remote end.
    ///
    /// Returns `None` for success codes.
    pub fn from_status(status: u16, body: &str) -> Option<Self> {
        let msg = if body.is_empty() {
            format!("HTTP {}", status)
        } else {
            format!("HTTP {}: {}", status, body)
        };
        match status {
            200..=299 => None,
            401 | 403 => Some(ConnectionError::NotConfigured(msg)),
            429 => Some(ConnectionError::RateLimited(msg)),
            408 | 500..=599 => Some(ConnectionError::Transient(msg)),
            _ => Some(ConnectionError::Permanent(msg)),
        }
    }
}

impl From<ConnectionError> for LoopError {
    fn from(err: ConnectionError) -> Self {
        LoopError::Connection(err)
    }
}

// ============================================================================
// Primary Error Type
// ============================================================================

/// The primary error type for LoopClaw operations.
#[derive(Error, Debug)]
pub enum LoopError {
    /// Configuration-related errors (invalid profile, bad field values, etc.)
    #[error("Configuration error: {0}")]
    Config(String),

    /// A connection with the same name is already registered.
    #[error("Duplicate connection: {0}")]
    DuplicateConnection(String),

    /// No connection with that name is registered.
    #[error("Unknown connection: {0}")]
    UnknownConnection(String),

    /// The task name is not in the profile or cannot be mapped to an action.
    #[error("Unknown task: {0}")]
    UnknownTask(String),

    /// Classified failure from a connection action.
    #[error("Connection error: {0}")]
    Connection(ConnectionError),

    /// The moderation collaborator itself failed.
    #[error("Moderation error: {0}")]
    Moderation(String),

    /// The loop was started twice.
    #[error("Agent loop already running")]
    AlreadyRunning,

    /// Standard I/O errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP request errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

impl LoopError {
    /// Configuration-class errors are skipped without a cooldown penalty.
    pub fn is_configuration(&self) -> bool {
        match self {
            LoopError::UnknownConnection(_) | LoopError::UnknownTask(_) => true,
            LoopError::Connection(e) => e.is_configuration(),
            _ => false,
        }
    }

    /// Errors that stop the loop instead of being absorbed by the cycle.
    pub fn is_fatal(&self) -> bool {
        match self {
            LoopError::Connection(e) => e.is_fatal(),
            LoopError::Config(_)
            | LoopError::DuplicateConnection(_)
            | LoopError::AlreadyRunning
            | LoopError::Io(_)
            | LoopError::Json(_) => true,
            _ => false,
        }
    }
}

/// A specialized `Result` type for LoopClaw operations.
pub type Result<T> = std::result::Result<T, LoopError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = LoopError::Config("loop_delay must be positive".to_string());
        assert_eq!(
            err.to_string(),
            "Configuration error: loop_delay must be positive"
        );
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: LoopError = io_err.into();
        assert!(matches!(err, LoopError::Io(_)));
    }

    #[test]
    fn test_connection_error_display() {
        assert!(ConnectionError::NotConfigured("twitter".into())
            .to_string()
            .contains("Not configured"));
        assert!(ConnectionError::RateLimited("429".into())
            .to_string()
            .contains("Rate limited"));
        assert!(ConnectionError::Transient("reset".into())
            .to_string()
            .contains("Transient error"));
        assert!(ConnectionError::Permanent("gone".into())
            .to_string()
            .contains("Permanent error"));
    }

    #[test]
    fn test_configuration_class() {
        assert!(ConnectionError::NotConfigured("x".into()).is_configuration());
        assert!(ConnectionError::InvalidArguments("x".into()).is_configuration());
        assert!(ConnectionError::UnsupportedAction("x".into()).is_configuration());
        assert!(!ConnectionError::Transient("x".into()).is_configuration());
        assert!(!ConnectionError::RateLimited("x".into()).is_configuration());
    }

    #[test]
    fn test_counts_against_cooldown() {
        assert!(ConnectionError::RateLimited("x".into()).counts_against_cooldown());
        assert!(ConnectionError::Transient("x".into()).counts_against_cooldown());
        assert!(!ConnectionError::NotConfigured("x".into()).counts_against_cooldown());
        assert!(!ConnectionError::Permanent("x".into()).counts_against_cooldown());
    }

    #[test]
    fn test_only_permanent_is_fatal() {
        assert!(ConnectionError::Permanent("x".into()).is_fatal());
        assert!(!ConnectionError::Transient("x".into()).is_fatal());
        assert!(!ConnectionError::RateLimited("x".into()).is_fatal());
        assert!(!ConnectionError::NotConfigured("x".into()).is_fatal());
    }

    #[test]
    fn test_from_status() {
        assert_eq!(ConnectionError::from_status(200, ""), None);
        assert_eq!(ConnectionError::from_status(204, ""), None);
        assert!(matches!(
            ConnectionError::from_status(401, ""),
            Some(ConnectionError::NotConfigured(_))
        ));
        assert!(matches!(
            ConnectionError::from_status(403, ""),
            Some(ConnectionError::NotConfigured(_))
        ));
        assert!(matches!(
            ConnectionError::from_status(429, "slow down"),
            Some(ConnectionError::RateLimited(_))
        ));
        assert!(matches!(
            ConnectionError::from_status(503, ""),
            Some(ConnectionError::Transient(_))
        ));
        assert!(matches!(
            ConnectionError::from_status(422, ""),
            Some(ConnectionError::Permanent(_))
        ));
    }

    #[test]
    fn test_from_status_keeps_body() {
        let err = ConnectionError::from_status(429, "quota exceeded").unwrap();
        assert_eq!(err.to_string(), "Rate limited: HTTP 429: quota exceeded");
    }

    #[test]
    fn test_loop_error_classification() {
        assert!(LoopError::UnknownConnection("x".into()).is_configuration());
        assert!(LoopError::UnknownTask("x".into()).is_configuration());
        assert!(LoopError::from(ConnectionError::NotConfigured("x".into())).is_configuration());
        assert!(!LoopError::from(ConnectionError::Transient("x".into())).is_configuration());

        assert!(LoopError::from(ConnectionError::Permanent("x".into())).is_fatal());
        assert!(LoopError::Config("x".into()).is_fatal());
        assert!(!LoopError::UnknownConnection("x".into()).is_fatal());
        assert!(!LoopError::Moderation("x".into()).is_fatal());
    }

    #[test]
    fn test_connection_into_loop_error() {
        let err: LoopError = ConnectionError::RateLimited("too fast".into()).into();
        assert!(matches!(err, LoopError::Connection(_)));
        assert!(err.to_string().contains("Rate limited"));
    }
}
