use std::fmt;

use thiserror::Error;

use crate::api::{ApiError, ErrorDetail};

/// Shown when the server is unreachable
pub const CONNECT_FAILED: &str = "Unable to connect to server. Check your internet connection.";

/// Shown when a request exceeds the client timeout
pub const TIMED_OUT: &str = "Connection timed out. Please try again.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The server rejected the submitted data
    Validation,
    /// Bad credentials at login
    Authentication,
    /// 401 on an authenticated call: the credential is no longer honored
    SessionInvalidated,
    /// Network, timeout, throttling or server fault
    Transient,
    Other,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::Validation => write!(f, "validation"),
            ErrorKind::Authentication => write!(f, "authentication"),
            ErrorKind::SessionInvalidated => write!(f, "session invalidated"),
            ErrorKind::Transient => write!(f, "transient"),
            ErrorKind::Other => write!(f, "other"),
        }
    }
}

/// User-facing failure of a session or admin operation.
///
/// `message` is ready to show; `detail` keeps the raw server payload for
/// callers that render field errors themselves.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{message}")]
pub struct SessionError {
    pub kind: ErrorKind,
    pub message: String,
    pub detail: Option<ErrorDetail>,
}

impl SessionError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            detail: None,
        }
    }

    /// Normalize any API failure into one message.
    ///
    /// Server `detail` wins (string, or first field error of a list); then
    /// connection and timeout wording; then `fallback`.
    pub fn from_api(err: &ApiError, fallback: &str) -> Self {
        let kind = match err {
            ApiError::Unauthorized { .. } => ErrorKind::SessionInvalidated,
            ApiError::Rejected { .. } | ApiError::AccessDenied { .. } | ApiError::NotFound { .. } => {
                ErrorKind::Validation
            }
            _ if err.is_transient() => ErrorKind::Transient,
            _ => ErrorKind::Other,
        };

        let message = match err.detail().and_then(ErrorDetail::message) {
            Some(message) => message.to_string(),
            None => match err {
                ApiError::NetworkError(e) if e.is_timeout() => TIMED_OUT.to_string(),
                ApiError::NetworkError(e) if e.is_connect() => CONNECT_FAILED.to_string(),
                _ => fallback.to_string(),
            },
        };

        Self {
            kind,
            message,
            detail: err.detail().cloned(),
        }
    }

    /// A 401 from the login endpoint means bad credentials, not a dead session
    pub fn into_login_failure(mut self) -> Self {
        if self.kind == ErrorKind::SessionInvalidated {
            self.kind = ErrorKind::Authentication;
        }
        self
    }
}
