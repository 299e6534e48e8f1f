//! Error types for clipwatch.
//!
//! All errors in clipwatch are strongly typed using thiserror.
//! None of them is allowed to abort the host: the observer core turns every
//! failure into a log line, an `AccessDenied` event, or a dropped notification.

use thiserror::Error;

use crate::storage::StorageError;

/// The platform refused a buffer read at this instant.
///
/// Expected and transient (e.g., the host lacks foreground focus). The
/// detector turns it into an `AccessDenied` event and leaves the snapshot
/// untouched.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Clipboard access denied: {reason}")]
pub struct AccessDenied {
    /// Human-readable reason, forwarded as the event payload.
    pub reason: String,
}

impl AccessDenied {
    /// Creates a denial with the given reason.
    #[must_use]
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

/// The native high-confidence trigger source could not be registered.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Native trigger registration failed: {message}")]
pub struct RegistrationError {
    /// Platform-provided detail.
    pub message: String,
}

impl RegistrationError {
    /// Creates a registration error.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// A subscriber failed while an event was being delivered to it.
#[allow(missing_docs)]
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeliveryError {
    #[error("Subscriber unavailable: {reason}")]
    Unavailable {
        reason: String,
    },

    #[error("Subscriber rejected event: {reason}")]
    Rejected {
        reason: String,
    },

    #[error("Subscriber panicked during delivery")]
    Panicked,
}

/// Errors crossing the observer runtime's command channel.
#[allow(missing_docs)]
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RuntimeError {
    #[error("Observer runtime disconnected ({path})")]
    Disconnected {
        path: String,
    },

    #[error("Observer command queue full")]
    QueueFull,

    #[error("Operation timed out after {duration_ms}ms")]
    Timeout {
        duration_ms: u64,
    },
}

/// Invalid configuration values.
#[allow(missing_docs)]
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("Field '{field}' is out of range: {reason}")]
    OutOfRange {
        field: String,
        reason: String,
    },

    #[error("Failed to parse configuration: {message}")]
    Parse {
        message: String,
    },
}

/// Top-level error type for clipwatch.
#[allow(missing_docs)]
#[derive(Debug, Error)]
pub enum ObserverError {
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Runtime error: {0}")]
    Runtime(#[from] RuntimeError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Internal error: {message}")]
    Internal {
        message: String,
    },
}

impl ObserverError {
    /// Creates an internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Returns true if this is a storage error.
    #[must_use]
    pub const fn is_storage(&self) -> bool {
        matches!(self, Self::Storage(_))
    }

    /// Returns true if this is a runtime error.
    #[must_use]
    pub const fn is_runtime(&self) -> bool {
        matches!(self, Self::Runtime(_))
    }

    /// Returns true if this is a configuration error.
    #[must_use]
    pub const fn is_config(&self) -> bool {
        matches!(self, Self::Config(_))
    }

    /// Returns true if retrying the same call may succeed.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        match self {
            Self::Storage(e) => matches!(e, StorageError::Locked { .. }),
            Self::Runtime(e) => matches!(e, RuntimeError::QueueFull | RuntimeError::Timeout { .. }),
            Self::Config(_) | Self::Internal { .. } => false,
        }
    }
}

/// Result type alias for clipwatch operations.
pub type ObserverResult<T> = Result<T, ObserverError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_access_denied_message() {
        let err = AccessDenied::new("no focus");
        let msg = format!("{err}");
        assert!(msg.contains("access denied"));
        assert!(msg.contains("no focus"));
    }

    #[test]
    fn test_delivery_error_variants() {
        let err = DeliveryError::Rejected {
            reason: "closed".to_string(),
        };
        assert!(format!("{err}").contains("closed"));
        assert!(format!("{}", DeliveryError::Panicked).contains("panicked"));
    }

    #[test]
    fn test_storage_error_from_io() {
        let io = std::io::Error::new(std::io::ErrorKind::Other, "disk gone");
        let err: ObserverError = StorageError::from(io).into();
        assert!(err.is_storage());
        assert!(!err.is_retryable());
        assert!(format!("{err}").contains("disk gone"));
    }

    #[test]
    fn test_locked_is_retryable() {
        let err: ObserverError = StorageError::Locked {
            path: "/tmp/x".to_string(),
        }
        .into();
        assert!(err.is_retryable());
    }

    #[test]
    fn test_runtime_errors() {
        let err: ObserverError = RuntimeError::QueueFull.into();
        assert!(err.is_runtime());
        assert!(err.is_retryable());

        let err: ObserverError = RuntimeError::Disconnected {
            path: "observer_commands".to_string(),
        }
        .into();
        assert!(!err.is_retryable());

        let msg = format!("{}", RuntimeError::Timeout { duration_ms: 250 });
        assert!(msg.contains("250ms"));
    }

    #[test]
    fn test_internal_error() {
        let err = ObserverError::internal("unexpected state");
        assert!(!err.is_retryable());
        assert!(!err.is_config());
        assert!(format!("{err}").contains("unexpected state"));
    }
}
