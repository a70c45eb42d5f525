//! Error taxonomy shared by every client in this crate.
//!
//! Clients never deal with transport status codes of their own callers; the
//! HTTP layer maps an [`ErrorKind`] to a response status.

/// Errors produced by the weather and image clients.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A required credential or setting is missing.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Malformed input, rejected before any network call.
    #[error("invalid request: {0}")]
    Validation(String),

    /// Non-success response, timeout or unreadable payload from a provider.
    #[error("{provider} request failed: {message}")]
    RemoteService {
        provider: &'static str,
        status: Option<u16>,
        message: String,
    },

    /// I/O error (e.g., writing a downloaded image).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Coarse classification of [`Error`] used at the transport boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Configuration,
    Validation,
    RemoteService,
    Unexpected,
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Configuration(_) => ErrorKind::Configuration,
            Self::Validation(_) => ErrorKind::Validation,
            Self::RemoteService { .. } => ErrorKind::RemoteService,
            Self::Io(_) => ErrorKind::Unexpected,
        }
    }

    /// Wraps a transport-level failure (connect error, timeout, broken body).
    pub(crate) fn transport(provider: &'static str, err: reqwest::Error) -> Self {
        let message = if err.is_timeout() {
            "request timed out".to_string()
        } else {
            err.to_string()
        };

        Self::RemoteService {
            provider,
            status: err.status().map(|s| s.as_u16()),
            message,
        }
    }
}

/// Result type alias for client operations.
pub type Result<T> = std::result::Result<T, Error>;
