//! Error types for the pickup client.
//!
//! Two layers of errors exist:
//! - [`BackendError`] is produced by the HTTP client abstraction and describes
//!   what happened on the wire.
//! - [`SessionError`] is what session operations return to the UI layer.
//!
//! Only [`SessionError::SessionExpired`] and [`SessionError::SessionInvalid`]
//! are allowed to clear a session. Everything else is surfaced for retry.

use thiserror::Error;

/// User-facing category derived from an HTTP status code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    BadRequest,
    Unauthorized,
    NotFound,
    ServerError,
    Other,
}

impl ErrorCategory {
    /// Short lower-case label.
    pub fn describe(self) -> &'static str {
        match self {
            Self::BadRequest => "bad request",
            Self::Unauthorized => "unauthorized",
            Self::NotFound => "not found",
            Self::ServerError => "server error",
            Self::Other => "request refused",
        }
    }

    pub fn from_status(status: u16) -> Self {
        match status {
            400 => Self::BadRequest,
            401 => Self::Unauthorized,
            404 => Self::NotFound,
            s if s >= 500 => Self::ServerError,
            _ => Self::Other,
        }
    }
}

/// Failure reported by a [`PickupBackend`](crate::backend::PickupBackend).
///
/// Classification happens once, at the HTTP client boundary, so callers never
/// inspect message text to decide whether a failure is transient.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BackendError {
    /// The request did not complete within its deadline and was aborted.
    #[error("Request timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    /// Connection refused, DNS failure or any other transport failure.
    #[error("Cannot reach server: {0}")]
    Unreachable(String),

    /// The request was aborted by the host before completing.
    #[error("Request cancelled")]
    Cancelled,

    /// Non-2xx status, or a body whose `status` is not `"success"`.
    #[error("Server rejected request (HTTP {status}): {}", .message.as_deref().unwrap_or("no message"))]
    Rejected { status: u16, message: Option<String> },

    /// Empty body or a body that is not valid JSON.
    #[error("Malformed response: {0}")]
    Malformed(String),
}

impl BackendError {
    /// Creates a Rejected error
    pub fn rejected(status: u16, message: Option<String>) -> Self {
        Self::Rejected { status, message }
    }

    /// Creates a Malformed error
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::Malformed(message.into())
    }

    /// Whether the failure says nothing authoritative about the session.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Timeout { .. } | Self::Unreachable(_) | Self::Cancelled | Self::Malformed(_) => {
                true
            }
            Self::Rejected { .. } => false,
        }
    }

    /// Check if this is a Rejected error
    pub fn is_rejected(&self) -> bool {
        matches!(self, Self::Rejected { .. })
    }

    /// HTTP status category, for rejections only.
    pub fn category(&self) -> Option<ErrorCategory> {
        match self {
            Self::Rejected { status, .. } => Some(ErrorCategory::from_status(*status)),
            _ => None,
        }
    }
}

/// Error returned by session, token and progression operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error("Connection timeout after {timeout_secs} seconds. The server is not responding.")]
    NetworkTimeout { timeout_secs: u64 },

    #[error("Cannot connect to server: {0}")]
    NetworkUnreachable(String),

    /// Server answered but refused; `message` is already user-facing.
    #[error("{message}")]
    ServerRejected {
        status: u16,
        category: ErrorCategory,
        message: String,
    },

    #[error("Invalid response from server: {0}")]
    MalformedResponse(String),

    /// Local expiry check (with grace period) failed.
    #[error("Session is invalid or expired")]
    SessionExpired,

    /// The backend explicitly refused the session.
    #[error("Session rejected by server: {0}")]
    SessionInvalid(String),

    #[error("Validation failed: {0}")]
    ValidationFailed(String),

    #[error("No token to refresh")]
    NoToken,

    #[error("No next pending pickup found")]
    NoNextStop,

    #[error("No current pickup to complete")]
    NoCurrentStop,

    #[error("No assignment data found")]
    NoAssignment,

    #[error("Storage error: {0}")]
    Storage(String),
}

impl SessionError {
    /// Creates a ValidationFailed error
    pub fn validation(message: impl Into<String>) -> Self {
        Self::ValidationFailed(message.into())
    }

    /// Creates a Storage error
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage(message.into())
    }

    /// Creates a SessionInvalid error from an authoritative backend refusal.
    ///
    /// The server's own message is kept when it sent one.
    pub fn session_invalid(err: &BackendError) -> Self {
        if let BackendError::Rejected {
            message: Some(message),
            ..
        } = err
        {
            return Self::SessionInvalid(message.clone());
        }
        let reason = match (err.category(), err) {
            (Some(category), BackendError::Rejected { status, .. }) => {
                format!("{} (HTTP {})", category.describe(), status)
            }
            _ => err.to_string(),
        };
        Self::SessionInvalid(reason)
    }

    /// Converts a backend failure, using `describe` to build the user-facing
    /// text for rejections.
    pub fn from_backend(err: BackendError, describe: impl FnOnce(u16, Option<&str>) -> String) -> Self {
        match err {
            BackendError::Timeout { timeout_secs } => Self::NetworkTimeout { timeout_secs },
            BackendError::Unreachable(reason) => Self::NetworkUnreachable(reason),
            BackendError::Cancelled => Self::NetworkUnreachable("request cancelled".to_string()),
            BackendError::Malformed(reason) => Self::MalformedResponse(reason),
            BackendError::Rejected { status, message } => Self::ServerRejected {
                status,
                category: ErrorCategory::from_status(status),
                message: describe(status, message.as_deref()),
            },
        }
    }

    /// Timeout, unreachable or malformed: must never force a logout.
    pub fn is_ambiguous(&self) -> bool {
        matches!(
            self,
            Self::NetworkTimeout { .. } | Self::NetworkUnreachable(_) | Self::MalformedResponse(_)
        )
    }

    /// The only failures allowed to clear the session.
    pub fn forces_logout(&self) -> bool {
        matches!(self, Self::SessionExpired | Self::SessionInvalid(_))
    }

    /// Check if this is a ServerRejected error
    pub fn is_rejected(&self) -> bool {
        matches!(self, Self::ServerRejected { .. })
    }
}

impl From<BackendError> for SessionError {
    fn from(err: BackendError) -> Self {
        Self::from_backend(err, |status, message| {
            message
                .map(str::to_string)
                .unwrap_or_else(|| format!("Request failed (HTTP {})", status))
        })
    }
}

impl From<serde_json::Error> for SessionError {
    fn from(err: serde_json::Error) -> Self {
        Self::MalformedResponse(err.to_string())
    }
}

/// A type alias for `Result<T, SessionError>`.
pub type Result<T> = std::result::Result<T, SessionError>;
