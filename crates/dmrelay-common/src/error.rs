//! Error types for dmrelay

use thiserror::Error;

/// Main error type for dmrelay
#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Authentication error: {0}")]
    Authentication(String),

    #[error("Rate limit exceeded")]
    RateLimitExceeded,

    #[error("Send error: {0}")]
    Send(String),

    #[error("Resource error: {0}")]
    Resource(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Run cancelled")]
    Cancelled,

    #[error("Internal error: {0}")]
    Internal(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Result type alias for dmrelay
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Returns the process exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::Validation(_) => 2,
            Error::Config(_) => 3,
            _ => 1,
        }
    }

    /// Returns the error code string
    pub fn code(&self) -> &'static str {
        match self {
            Error::Config(_) => "CONFIG_ERROR",
            Error::Validation(_) => "VALIDATION_ERROR",
            Error::Authentication(_) => "AUTHENTICATION_ERROR",
            Error::RateLimitExceeded => "RATE_LIMITED",
            Error::Send(_) => "SEND_ERROR",
            Error::Resource(_) => "RESOURCE_ERROR",
            Error::Io(_) => "IO_ERROR",
            Error::Serialization(_) => "SERIALIZATION_ERROR",
            Error::Cancelled => "CANCELLED",
            Error::Internal(_) => "INTERNAL_ERROR",
            Error::Other(_) => "INTERNAL_ERROR",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes() {
        assert_eq!(Error::Validation("bad".into()).exit_code(), 2);
        assert_eq!(Error::Config("missing".into()).exit_code(), 3);
        assert_eq!(Error::Authentication("rejected".into()).exit_code(), 1);
        assert_eq!(Error::Cancelled.exit_code(), 1);
    }

    #[test]
    fn test_codes() {
        assert_eq!(Error::RateLimitExceeded.code(), "RATE_LIMITED");
        assert_eq!(Error::Resource("no browser".into()).code(), "RESOURCE_ERROR");
        assert_eq!(
            Error::Validation("x".into()).to_string(),
            "Validation error: x"
        );
    }
}
