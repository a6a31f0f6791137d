use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Unauthorized - credential rejected{}", describe(.detail))]
    Unauthorized { detail: Option<ErrorDetail> },

    #[error("Access denied{}", describe(.detail))]
    AccessDenied { detail: Option<ErrorDetail> },

    #[error("Resource not found{}", describe(.detail))]
    NotFound { detail: Option<ErrorDetail> },

    #[error("Request rejected ({status}){}", describe(.detail))]
    Rejected {
        status: StatusCode,
        detail: Option<ErrorDetail>,
    },

    #[error("Rate limited - please wait before retrying")]
    RateLimited,

    #[error("Server error ({status}): {body}")]
    ServerError { status: StatusCode, body: String },

    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

/// Maximum length for error response bodies in error messages
const MAX_ERROR_BODY_LENGTH: usize = 500;

fn describe(detail: &Option<ErrorDetail>) -> String {
    match detail.as_ref().and_then(ErrorDetail::message) {
        Some(message) => format!(": {}", message),
        None => String::new(),
    }
}

impl ApiError {
    /// Truncate a response body to avoid logging excessive data
    fn truncate_body(body: &str) -> String {
        if body.len() <= MAX_ERROR_BODY_LENGTH {
            body.to_string()
        } else {
            let cut = (0..=MAX_ERROR_BODY_LENGTH)
                .rev()
                .find(|&i| body.is_char_boundary(i))
                .unwrap_or(0);
            format!("{}... (truncated, {} total bytes)", &body[..cut], body.len())
        }
    }

    pub fn from_status(status: StatusCode, body: &str) -> Self {
        let detail = ErrorDetail::from_body(body);
        match status.as_u16() {
            401 => ApiError::Unauthorized { detail },
            403 => ApiError::AccessDenied { detail },
            404 => ApiError::NotFound { detail },
            429 => ApiError::RateLimited,
            500..=599 => ApiError::ServerError {
                status,
                body: Self::truncate_body(body),
            },
            _ => ApiError::Rejected { status, detail },
        }
    }

    /// Server-supplied `detail`, when the response carried one
    pub fn detail(&self) -> Option<&ErrorDetail> {
        match self {
            ApiError::Unauthorized { detail }
            | ApiError::AccessDenied { detail }
            | ApiError::NotFound { detail }
            | ApiError::Rejected { detail, .. } => detail.as_ref(),
            _ => None,
        }
    }

    pub fn status(&self) -> Option<StatusCode> {
        match self {
            ApiError::Unauthorized { .. } => Some(StatusCode::UNAUTHORIZED),
            ApiError::AccessDenied { .. } => Some(StatusCode::FORBIDDEN),
            ApiError::NotFound { .. } => Some(StatusCode::NOT_FOUND),
            ApiError::RateLimited => Some(StatusCode::TOO_MANY_REQUESTS),
            ApiError::Rejected { status, .. } | ApiError::ServerError { status, .. } => {
                Some(*status)
            }
            ApiError::NetworkError(e) => e.status(),
            ApiError::InvalidResponse(_) => None,
        }
    }

    pub fn is_unauthorized(&self) -> bool {
        matches!(self, ApiError::Unauthorized { .. })
    }

    /// Network trouble, throttling or a server fault: worth retrying later
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ApiError::NetworkError(_) | ApiError::RateLimited | ApiError::ServerError { .. }
        )
    }
}

/// The `detail` member of an error body.
///
/// The API sends either a plain message or a list of field errors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ErrorDetail {
    Message(String),
    Fields(Vec<FieldError>),
    Other(serde_json::Value),
}

/// One entry of a list-shaped `detail`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldError {
    #[serde(default)]
    pub msg: Option<String>,
    #[serde(default)]
    pub loc: Vec<serde_json::Value>,
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
}

#[derive(Deserialize)]
struct ErrorBody {
    detail: Option<ErrorDetail>,
}

impl ErrorDetail {
    /// Parse `{"detail": ...}`; anything else yields `None`
    pub fn from_body(body: &str) -> Option<Self> {
        serde_json::from_str::<ErrorBody>(body).ok()?.detail
    }

    /// The one message worth showing: the string itself, or the first
    /// field error's `msg`.
    pub fn message(&self) -> Option<&str> {
        let message = match self {
            ErrorDetail::Message(msg) => Some(msg.as_str()),
            ErrorDetail::Fields(fields) => fields.first().and_then(|f| f.msg.as_deref()),
            ErrorDetail::Other(_) => None,
        };
        message.filter(|m| !m.trim().is_empty())
    }
}
