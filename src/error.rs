//! WolfShare Error Types

use thiserror::Error;

use crate::network::protocol::ErrorCode;

/// Result type alias for WolfShare operations
pub type Result<T> = std::result::Result<T, Error>;

/// WolfShare error types
#[derive(Error, Debug)]
pub enum Error {
    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid configuration file: {0}")]
    ConfigParse(#[from] toml::de::Error),

    // Wire errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] bincode::Error),

    #[error("Unexpected response: expected {expected}, got {got}")]
    UnexpectedResponse { expected: &'static str, got: &'static str },

    #[error("Remote error ({code:?}): {message}")]
    Remote { code: ErrorCode, message: String },

    // Network errors
    #[error("Network error: {0}")]
    Network(String),

    #[error("Connection failed to {address}: {reason}")]
    ConnectionFailed { address: String, reason: String },

    #[error("Connection timeout to {0}")]
    ConnectionTimeout(String),

    // Tracker errors
    #[error("Node {0} is not the tracker")]
    NotTracker(String),

    #[error("No tracker available")]
    NoTracker,

    // File errors
    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("Invalid file name: {0:?}")]
    InvalidFileName(String),

    // I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Shutdown in progress")]
    ShuttingDown,
}

impl Error {
    /// Check if this error means the remote call did not complete.
    ///
    /// A heartbeat probe failing this way means the tracker is gone.
    pub fn is_transport_failure(&self) -> bool {
        matches!(
            self,
            Error::Network(_)
                | Error::ConnectionFailed { .. }
                | Error::ConnectionTimeout(_)
                | Error::Io(_)
                | Error::Serialization(_)
                | Error::UnexpectedResponse { .. }
                | Error::Remote { .. }
                | Error::NotTracker(_)
        )
    }

    /// Check if this error reports a missing file
    pub fn is_not_found(&self) -> bool {
        match self {
            Error::FileNotFound(_) => true,
            Error::Io(e) => e.kind() == std::io::ErrorKind::NotFound,
            _ => false,
        }
    }

    /// Map this error onto a wire error code
    pub fn code(&self) -> ErrorCode {
        match self {
            Error::NotTracker(_) | Error::NoTracker => ErrorCode::NotTracker,
            Error::FileNotFound(_) => ErrorCode::NotFound,
            Error::InvalidFileName(_) | Error::UnexpectedResponse { .. } => ErrorCode::BadRequest,
            e if e.is_not_found() => ErrorCode::NotFound,
            _ => ErrorCode::Internal,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_failures() {
        assert!(Error::ConnectionTimeout("127.0.0.1:1".into()).is_transport_failure());
        assert!(Error::NotTracker("127.0.0.1:1".into()).is_transport_failure());
        assert!(!Error::FileNotFound("a.txt".into()).is_transport_failure());
        assert!(!Error::NoTracker.is_transport_failure());
        assert!(!Error::ShuttingDown.is_transport_failure());
    }

    #[test]
    fn test_not_found() {
        assert!(Error::FileNotFound("a.txt".into()).is_not_found());
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        assert!(Error::Io(io).is_not_found());
        assert_eq!(Error::FileNotFound("a".into()).code(), ErrorCode::NotFound);
        assert_eq!(Error::NotTracker("x".into()).code(), ErrorCode::NotTracker);
    }
}
