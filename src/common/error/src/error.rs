//! Core error types for Sieve.

use thiserror::Error;

/// Result type alias using `SieveError`.
pub type SieveResult<T> = std::result::Result<T, SieveError>;

/// Core error type for Sieve operations.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SieveError {
    /// Invalid value provided.
    #[error("ValueError: {0}")]
    ValueError(String),

    /// Invalid parameter provided at an API boundary.
    #[error("InvalidParameter: {0}")]
    InvalidParameter(String),

    /// A filter tree (typically read from an external representation)
    /// violates the structural invariants of the closed variant set.
    #[error("UnsupportedFilter: {0}")]
    UnsupportedFilter(String),

    /// Internal error (bug in Sieve).
    #[error("InternalError: {0}")]
    InternalError(String),

    /// JSON serialization error.
    #[error("SerdeJsonError: {0}")]
    SerdeJsonError(#[from] serde_json::Error),
}

impl SieveError {
    /// Create a new `ValueError`.
    pub fn value_error<S: Into<String>>(msg: S) -> Self {
        Self::ValueError(msg.into())
    }

    /// Create a new `InvalidParameter` error.
    pub fn invalid_parameter<S: Into<String>>(msg: S) -> Self {
        Self::InvalidParameter(msg.into())
    }

    /// Create a new `UnsupportedFilter` error.
    pub fn unsupported_filter<S: Into<String>>(msg: S) -> Self {
        Self::UnsupportedFilter(msg.into())
    }

    /// Create a new `InternalError`.
    pub fn internal<S: Into<String>>(msg: S) -> Self {
        Self::InternalError(msg.into())
    }
}

/// Ensure a condition holds, returning an error if not.
#[macro_export]
macro_rules! ensure {
    ($cond:expr, $msg:expr) => {
        if !$cond {
            return Err($crate::SieveError::InvalidParameter($msg.to_string()));
        }
    };
    ($cond:expr, $variant:ident: $($msg:tt)*) => {
        if !$cond {
            return Err($crate::SieveError::$variant(format!($($msg)*)));
        }
    };
}

/// Return early with a `ValueError`.
#[macro_export]
macro_rules! value_err {
    ($($arg:tt)*) => {
        return Err($crate::SieveError::ValueError(format!($($arg)*)))
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = SieveError::invalid_parameter("limit must be positive");
        assert_eq!(err.to_string(), "InvalidParameter: limit must be positive");
    }

    #[test]
    fn test_error_constructors() {
        let _ = SieveError::value_error("invalid value");
        let _ = SieveError::unsupported_filter("empty AND operand set");
        let _ = SieveError::internal("unexpected state");
    }
}
