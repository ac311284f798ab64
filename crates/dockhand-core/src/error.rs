//! Error types for daemon operations.
//!
//! This module provides the error taxonomy shared by every dockhand client,
//! including the mapping from daemon HTTP status codes to typed errors.
//! "Not found" is deliberately absent: absence is a result, not a failure.

use crate::version::ApiVersion;
use serde::Deserialize;
use thiserror::Error;

/// Main error type for daemon operations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// The daemon socket or host could not be reached, or the stream failed
    #[error("Connection failed: {0}")]
    Connection(String),

    /// TLS handshake failed or TLS material could not be loaded
    #[error("TLS error: {0}")]
    Tls(String),

    /// No response arrived before the configured deadline
    #[error("Request timed out: {0}")]
    Timeout(String),

    /// The daemon (or a requested feature) needs a different API version
    #[error("Unsupported API version {actual}: {feature} requires {required} or newer")]
    UnsupportedVersion {
        /// What needed the newer version
        feature: String,
        /// Minimum version required
        required: ApiVersion,
        /// Version actually available
        actual: ApiVersion,
    },

    /// The daemon rejected our credentials (401/403)
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// The daemon answered with an error status
    #[error("Daemon returned {status}: {message}")]
    Server {
        /// HTTP status code
        status: u16,
        /// Message taken from the daemon's error body, if any
        message: String,
    },

    /// A success response did not have the expected shape
    #[error("Failed to decode daemon response: {0}")]
    Decode(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// The request was rejected before anything was sent
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

/// Specialized result type for daemon operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error body the daemon sends alongside non-2xx statuses.
#[derive(Debug, Deserialize)]
struct DaemonErrorBody {
    message: String,
}

impl Error {
    /// Returns the error code for this error type.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Connection(_) => "CONNECTION_ERROR",
            Self::Tls(_) => "TLS_ERROR",
            Self::Timeout(_) => "TIMEOUT",
            Self::UnsupportedVersion { .. } => "UNSUPPORTED_VERSION",
            Self::Auth(_) => "AUTH_ERROR",
            Self::Server { .. } => "SERVER_ERROR",
            Self::Decode(_) => "DECODE_ERROR",
            Self::Config(_) => "CONFIG_ERROR",
            Self::InvalidRequest(_) => "INVALID_REQUEST",
        }
    }

    /// Returns true if retrying the same request could succeed.
    ///
    /// Only connection failures and timeouts qualify. The client never
    /// retries on its own; this is a hint for callers that want to.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Connection(_) | Self::Timeout(_))
    }

    /// Returns true if this error should be logged as a serious error.
    #[must_use]
    pub const fn should_log(&self) -> bool {
        matches!(
            self,
            Self::Server { .. } | Self::Decode(_) | Self::Config(_) | Self::Tls(_)
        )
    }

    /// Maps a non-success daemon response to an error.
    ///
    /// 401 and 403 become [`Error::Auth`]; everything else becomes
    /// [`Error::Server`]. Callers handle 404 themselves before getting here.
    #[must_use]
    pub fn from_status(status: u16, body: &[u8]) -> Self {
        let message = daemon_message(body).unwrap_or_else(|| {
            reqwest::StatusCode::from_u16(status)
                .ok()
                .and_then(|code| code.canonical_reason())
                .unwrap_or("unexpected status")
                .to_string()
        });

        match status {
            401 | 403 => Self::Auth(message),
            _ => Self::Server { status, message },
        }
    }
}

/// Extracts a human-readable message from a daemon error body.
fn daemon_message(body: &[u8]) -> Option<String> {
    if let Ok(parsed) = serde_json::from_slice::<DaemonErrorBody>(body) {
        let message = parsed.message.trim();
        if !message.is_empty() {
            return Some(message.to_string());
        }
    }

    let text = String::from_utf8_lossy(body);
    let text = text.trim();
    (!text.is_empty()).then(|| text.to_string())
}

/// Walks an error's source chain looking for signs of a TLS failure.
fn mentions_tls(err: &(dyn std::error::Error + 'static)) -> bool {
    let mut current = Some(err);
    while let Some(inner) = current {
        let text = inner.to_string().to_ascii_lowercase();
        if text.contains("certificate") || text.contains("tls") || text.contains("handshake") {
            return true;
        }
        current = inner.source();
    }
    false
}

// Conversions from external error types
impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout(err.to_string())
        } else if err.is_connect() && mentions_tls(&err) {
            Self::Tls(err.to_string())
        } else if err.is_builder() {
            Self::Config(err.to_string())
        } else {
            Self::Connection(err.to_string())
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        if err.kind() == std::io::ErrorKind::TimedOut {
            Self::Timeout(err.to_string())
        } else {
            Self::Connection(err.to_string())
        }
    }
}

impl From<url::ParseError> for Error {
    fn from(err: url::ParseError) -> Self {
        Self::Config(err.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::Decode(err.to_string())
    }
}

impl From<validator::ValidationErrors> for Error {
    fn from(err: validator::ValidationErrors) -> Self {
        Self::Config(err.to_string())
    }
}
