//! Error types for REST operations.
//!
//! Errors are categorized so that callers can decide whether a failure
//! should abort a provisioning run or only the resource being applied.

use std::fmt;

use crate::transport::Method;

/// Result type alias for REST operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Categories of REST errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Connection, DNS or timeout failures (no HTTP status).
    Network,
    /// The remote service answered with a status >= 400.
    Remote,
    /// Token acquisition failed.
    Auth,
    /// A response body could not be interpreted.
    Format,
    /// A deleted resource did not disappear in time.
    Settle,
    /// Other/unknown errors.
    Other,
}

impl ErrorCategory {
    /// Whether this error category is typically transient and worth retrying.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Network | Self::Settle)
    }

    /// Get a user-friendly description of this error category.
    #[must_use]
    pub fn description(&self) -> &'static str {
        match self {
            Self::Network => "Network connectivity issue",
            Self::Remote => "Remote API rejected the request",
            Self::Auth => "Could not acquire an access token",
            Self::Format => "Unexpected response format",
            Self::Settle => "Resource deletion did not complete",
            Self::Other => "Unexpected error",
        }
    }

    /// Get actionable advice for resolving this error category.
    #[must_use]
    pub fn advice(&self) -> &'static str {
        match self {
            Self::Network => "Check connectivity to the service endpoint and try again",
            Self::Remote => "Inspect the response body logged above for the reason",
            Self::Auth => "Run `az login` or provide a valid access token",
            Self::Format => "The API version may not match the service; check the configured version",
            Self::Settle => "Increase the settle attempts or delay and re-run",
            Self::Other => "Check the error details for more information",
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.description())
    }
}

/// Errors that can occur while talking to a REST endpoint.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The request never produced an HTTP response.
    #[error("HTTP request failed: {message}")]
    Http {
        /// Error message.
        message: String,
    },

    /// The service answered with a failure status.
    #[error("{method} {url} -> {status}: {body}")]
    Remote {
        /// Method of the failed call.
        method: Method,
        /// Target URL (without query string).
        url: String,
        /// HTTP status code.
        status: u16,
        /// Response body as returned by the service.
        body: String,
    },

    /// Invalid response from the API.
    #[error("invalid API response from {url}: {message}")]
    InvalidResponse {
        /// URL that produced the response.
        url: String,
        /// What was wrong with it.
        message: String,
    },

    /// Access token could not be obtained.
    #[error("failed to acquire token for {scope}: {message}")]
    Token {
        /// Requested scope.
        scope: String,
        /// Error message.
        message: String,
    },

    /// The resource was still present after all settle attempts.
    #[error("{url} still present after {attempts} settle attempts")]
    Settle {
        /// Resource URL.
        url: String,
        /// Number of polls performed.
        attempts: u32,
    },

    /// Generic error.
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create a token error.
    pub fn token(scope: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Token {
            scope: scope.into(),
            message: message.into(),
        }
    }

    /// HTTP status of a remote failure, if any.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Remote { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Get the error category.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Http { .. } => ErrorCategory::Network,
            Self::Remote { status, .. } if *status == 408 || *status == 429 || *status >= 500 => {
                ErrorCategory::Network
            }
            Self::Remote { .. } => ErrorCategory::Remote,
            Self::InvalidResponse { .. } => ErrorCategory::Format,
            Self::Token { .. } => ErrorCategory::Auth,
            Self::Settle { .. } => ErrorCategory::Settle,
            Self::Other(_) => ErrorCategory::Other,
        }
    }

    /// Whether this error is typically transient and worth retrying.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        self.category().is_retryable()
    }
}

impl From<ureq::Error> for Error {
    fn from(err: ureq::Error) -> Self {
        Self::Http {
            message: err.to_string(),
        }
    }
}
