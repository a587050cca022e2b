use hostlink_shared::{ConfigurationFailureReason, RegistrationFailureReason};
use thiserror::Error;

/// Main error type for host link operations
#[derive(Error, Debug)]
pub enum HostLinkError {
    // ========================================
    // Connection Errors
    // ========================================
    #[error("Connection to {addr} failed: {reason}")]
    ConnectFailed { addr: String, reason: String },

    #[error("Connection to {addr} timed out after {timeout_ms}ms")]
    ConnectTimeout { addr: String, timeout_ms: u64 },

    #[error("Not connected to host")]
    NotConnected,

    #[error("Network allowance for {addr} failed: {reason}")]
    AllowanceFailed { addr: String, reason: String },

    // ========================================
    // System Errors
    // ========================================
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Host link actor has stopped")]
    ActorGone,

    #[error("Internal error: {0}")]
    InternalError(String),

    // ========================================
    // Network Errors
    // ========================================
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl HostLinkError {
    /// Get error severity level
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            Self::ConnectFailed { .. } | Self::ConnectTimeout { .. } | Self::Io(_) => {
                ErrorSeverity::Warning
            }
            Self::NotConnected | Self::AllowanceFailed { .. } => ErrorSeverity::Error,
            Self::ConfigError(_) => ErrorSeverity::Error,
            Self::ActorGone | Self::InternalError(_) => ErrorSeverity::Critical,
        }
    }

    /// Check if error is retryable
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::ConnectFailed { .. } | Self::ConnectTimeout { .. } | Self::Io(_)
        )
    }
}

/// Error severity levels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorSeverity {
    Info,
    Warning,
    Error,
    Critical,
}

impl std::fmt::Display for ErrorSeverity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Info => write!(f, "info"),
            Self::Warning => write!(f, "warning"),
            Self::Error => write!(f, "error"),
            Self::Critical => write!(f, "critical"),
        }
    }
}

/// Registration handshake failure, classified by reason
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Registration failed ({reason:?}): {message}")]
pub struct RegistrationError {
    pub reason: RegistrationFailureReason,
    pub message: String,
}

impl RegistrationError {
    pub fn new(reason: RegistrationFailureReason, message: impl Into<String>) -> Self {
        Self {
            reason,
            message: message.into(),
        }
    }

    pub fn rejected(message: impl Into<String>) -> Self {
        Self::new(RegistrationFailureReason::Rejected, message)
    }

    pub fn invalid_token(message: impl Into<String>) -> Self {
        Self::new(RegistrationFailureReason::InvalidToken, message)
    }

    pub fn other(message: impl Into<String>) -> Self {
        Self::new(RegistrationFailureReason::Other, message)
    }
}

/// Configuration handshake failure, classified by reason
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Configuration failed ({reason:?}): {message}")]
pub struct ConfigurationError {
    pub reason: ConfigurationFailureReason,
    pub message: String,
}

impl ConfigurationError {
    pub fn new(reason: ConfigurationFailureReason, message: impl Into<String>) -> Self {
        Self {
            reason,
            message: message.into(),
        }
    }

    pub fn mismatch(message: impl Into<String>) -> Self {
        Self::new(ConfigurationFailureReason::ConfigurationMismatch, message)
    }

    pub fn other(message: impl Into<String>) -> Self {
        Self::new(ConfigurationFailureReason::Other, message)
    }
}

/// Result type alias for host link operations
pub type Result<T> = std::result::Result<T, HostLinkError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_severity() {
        let err = HostLinkError::ConnectFailed {
            addr: "10.0.0.1:9000".to_string(),
            reason: "refused".to_string(),
        };
        assert_eq!(err.severity(), ErrorSeverity::Warning);
        assert_eq!(HostLinkError::ActorGone.severity(), ErrorSeverity::Critical);
    }

    #[test]
    fn test_error_retryable() {
        let timeout = HostLinkError::ConnectTimeout {
            addr: "host:1".to_string(),
            timeout_ms: 5000,
        };
        assert!(timeout.is_retryable());
        assert!(!HostLinkError::ConfigError("bad".to_string()).is_retryable());
        assert!(!HostLinkError::ActorGone.is_retryable());
    }

    #[test]
    fn test_io_error_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused");
        let err: HostLinkError = io.into();
        assert!(err.is_retryable());
        assert!(err.to_string().starts_with("I/O error"));
    }

    #[test]
    fn test_handshake_error_display() {
        let err = RegistrationError::invalid_token("token expired");
        assert_eq!(err.reason, RegistrationFailureReason::InvalidToken);
        assert_eq!(
            err.to_string(),
            "Registration failed (InvalidToken): token expired"
        );

        let err = ConfigurationError::mismatch("denomination differs");
        assert_eq!(err.reason, ConfigurationFailureReason::ConfigurationMismatch);
    }

    #[test]
    fn test_severity_display() {
        assert_eq!(ErrorSeverity::Info.to_string(), "info");
        assert_eq!(ErrorSeverity::Critical.to_string(), "critical");
    }
}
