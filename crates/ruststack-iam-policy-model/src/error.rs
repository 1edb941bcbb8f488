//! Policy rejection errors.
//!
//! A rejected policy write is always caused by the caller's input. The error
//! carries a code that the HTTP layer maps to a wire error and a reason string
//! that is returned verbatim for diagnostics.

use std::fmt;

/// Well-known policy error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum PolicyErrorCode {
    /// The policy document is syntactically or semantically invalid.
    MalformedPolicy,
    /// The policy document exceeds a size quota.
    LimitExceeded,
}

impl PolicyErrorCode {
    /// Returns the short error code string.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MalformedPolicy => "MalformedPolicy",
            Self::LimitExceeded => "LimitExceeded",
        }
    }

    /// Returns the default HTTP status code for this error.
    #[must_use]
    pub fn default_status_code(&self) -> http::StatusCode {
        match self {
            Self::MalformedPolicy => http::StatusCode::BAD_REQUEST,
            Self::LimitExceeded => http::StatusCode::CONFLICT,
        }
    }
}

impl fmt::Display for PolicyErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A policy validation rejection.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{code}: {message}")]
pub struct PolicyError {
    /// The error code.
    pub code: PolicyErrorCode,
    /// The reason, returned to the caller as-is.
    pub message: String,
}

impl PolicyError {
    /// Create a new `PolicyError` with a custom message.
    #[must_use]
    pub fn with_message(code: PolicyErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    /// `MalformedPolicy` with the given reason.
    #[must_use]
    pub fn malformed_policy(message: impl Into<String>) -> Self {
        Self::with_message(PolicyErrorCode::MalformedPolicy, message)
    }

    /// `LimitExceeded` with the given reason.
    #[must_use]
    pub fn limit_exceeded(message: impl Into<String>) -> Self {
        Self::with_message(PolicyErrorCode::LimitExceeded, message)
    }

    /// HTTP status code for this rejection.
    #[must_use]
    pub fn status_code(&self) -> http::StatusCode {
        self.code.default_status_code()
    }
}
