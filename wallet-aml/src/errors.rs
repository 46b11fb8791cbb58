use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AmlError {
    // Input errors
    InvalidAddress(String),
    ValidationError(String),

    // Provider errors
    ScreeningFailed { message: String, retryable: bool },

    // Backing store errors
    CacheUnavailable(String),
}

impl AmlError {
    /// Provider failure that the caller may retry.
    pub fn retryable(message: impl Into<String>) -> Self {
        AmlError::ScreeningFailed {
            message: message.into(),
            retryable: true,
        }
    }

    /// Provider failure that will not succeed on retry.
    pub fn fatal(message: impl Into<String>) -> Self {
        AmlError::ScreeningFailed {
            message: message.into(),
            retryable: false,
        }
    }

    /// Stable machine-readable error code for frontends.
    pub fn code(&self) -> &'static str {
        match self {
            AmlError::InvalidAddress(_) => "INVALID_ADDRESS",
            AmlError::ValidationError(_) => "VALIDATION_ERROR",
            AmlError::ScreeningFailed { .. } => "SCREENING_FAILED",
            AmlError::CacheUnavailable(_) => "CACHE_UNAVAILABLE",
        }
    }

    pub fn is_retryable(&self) -> bool {
        match self {
            AmlError::ScreeningFailed { retryable, .. } => *retryable,
            AmlError::CacheUnavailable(_) => true,
            AmlError::InvalidAddress(_) | AmlError::ValidationError(_) => false,
        }
    }
}

impl fmt::Display for AmlError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            AmlError::InvalidAddress(msg) => write!(f, "Invalid address: {}", msg),
            AmlError::ValidationError(msg) => write!(f, "Validation error: {}", msg),

            AmlError::ScreeningFailed { message, retryable } => {
                if *retryable {
                    write!(f, "Screening failed (retryable): {}", message)
                } else {
                    write!(f, "Screening failed: {}", message)
                }
            }

            AmlError::CacheUnavailable(msg) => write!(f, "Cache unavailable: {}", msg),
        }
    }
}

impl std::error::Error for AmlError {}

pub type AmlResult<T> = Result<T, AmlError>;

// Helper macro for easy error creation
#[macro_export]
macro_rules! aml_error {
    ($variant:ident, $msg:expr) => {
        $crate::errors::AmlError::$variant($msg.to_string())
    };
}

impl From<serde_json::Error> for AmlError {
    fn from(error: serde_json::Error) -> Self {
        AmlError::ValidationError(format!("JSON error: {}", error))
    }
}

impl From<reqwest::Error> for AmlError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_timeout() || error.is_connect() || error.is_request() {
            return AmlError::retryable(format!("Provider request failed: {}", error));
        }

        match error.status() {
            Some(status) if status.is_server_error() || status.as_u16() == 429 => {
                AmlError::retryable(format!("Provider returned {}", status))
            }
            Some(status) => AmlError::fatal(format!("Provider returned {}", status)),
            None if error.is_decode() => {
                AmlError::fatal(format!("Malformed provider response: {}", error))
            }
            None => AmlError::retryable(format!("Provider error: {}", error)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_and_retry_flags() {
        assert_eq!(aml_error!(InvalidAddress, "0x1").code(), "INVALID_ADDRESS");
        assert!(!aml_error!(InvalidAddress, "0x1").is_retryable());
        assert!(AmlError::retryable("timeout").is_retryable());
        assert!(!AmlError::fatal("bad key").is_retryable());
        assert_eq!(AmlError::fatal("bad key").code(), "SCREENING_FAILED");
        assert!(aml_error!(CacheUnavailable, "down").is_retryable());
    }

    #[test]
    fn display_marks_retryable_failures() {
        let err = AmlError::retryable("provider timed out");
        assert_eq!(
            err.to_string(),
            "Screening failed (retryable): provider timed out"
        );
    }
}
