//! Domain errors for the nudge and wager core.

use thiserror::Error;

/// Failures talking to the NudgeEngine / MicroBet backends.
///
/// Logical outcomes such as "already resolved" or "no ready nudges" are
/// never represented here; they travel as normal values.
#[derive(Error, Debug)]
pub enum ApiError {
    /// Connection, DNS, TLS or timeout failure before a response arrived
    #[error("Network error: {0}")]
    Network(String),

    /// Credential rejected by the backend (401/403)
    #[error("Authentication failed: {0}")]
    Unauthorized(String),

    /// Requested entity does not exist (404 or a backend "not found" message)
    #[error("Not found: {0}")]
    NotFound(String),

    /// Any other non-success HTTP status
    #[error("{message}")]
    Http { status: u16, message: String },

    /// Successful status whose body carried an `error` field
    #[error("Backend error: {0}")]
    Backend(String),

    /// Response body could not be decoded
    #[error("JSON serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Push stream delivered malformed data or an `error` event
    #[error("Stream error: {0}")]
    Stream(String),
}

impl ApiError {
    /// Build an error from a non-success status and the raw response body.
    ///
    /// The backend reports failures as `{"error": "..."}`; when that shape is
    /// present its message wins, otherwise the status line is used.
    ///
    /// # Examples
    ///
    /// ```
    /// use nudgebet::domain::errors::ApiError;
    ///
    /// let err = ApiError::from_status(404, r#"{"error":"Bet not found"}"#);
    /// assert!(err.is_not_found());
    /// assert_eq!(err.to_string(), "Not found: Bet not found");
    /// ```
    ///
    /// A 404 only counts as "not found" when the backend itself answered
    /// with an `error` body; a bare 404 (wrong base URL, unknown route) is
    /// an HTTP failure.
    ///
    /// ```
    /// use nudgebet::domain::errors::ApiError;
    ///
    /// let err = ApiError::from_status(404, "Cannot POST /api/MicroBet/resolveBet");
    /// assert!(!err.is_not_found());
    /// assert_eq!(err.status(), Some(404));
    /// ```
    pub fn from_status(status: u16, body: &str) -> Self {
        let Some(message) = backend_message(body) else {
            let message = format!("HTTP {status}");
            return match status {
                401 | 403 => Self::Unauthorized(message),
                _ => Self::Http { status, message },
            };
        };

        match status {
            401 | 403 => Self::Unauthorized(message),
            404 => Self::NotFound(message),
            _ if is_not_found_message(&message) => Self::NotFound(message),
            _ => Self::Http { status, message },
        }
    }

    /// Build an error for a 2xx body that still carried an `error` field.
    pub fn from_backend_message(message: impl Into<String>) -> Self {
        let message = message.into();
        if is_not_found_message(&message) {
            Self::NotFound(message)
        } else {
            Self::Backend(message)
        }
    }

    /// HTTP status code when one is known.
    pub const fn status(&self) -> Option<u16> {
        match self {
            Self::Http { status, .. } => Some(*status),
            Self::Unauthorized(_) => Some(401),
            Self::NotFound(_) => Some(404),
            _ => None,
        }
    }

    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    pub const fn is_auth(&self) -> bool {
        matches!(self, Self::Unauthorized(_))
    }

    /// Returns true if a later attempt could plausibly succeed
    pub const fn is_transient(&self) -> bool {
        match self {
            Self::Network(_) | Self::Stream(_) => true,
            Self::Http { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if let Some(status) = err.status() {
            return Self::from_status(status.as_u16(), "");
        }
        if err.is_decode() {
            return Self::Stream(err.to_string());
        }
        Self::Network(err.without_url().to_string())
    }
}

/// The backend has no error codes; "not found" / "no bet found" phrasing is
/// the only signal that an entity is missing.
fn is_not_found_message(message: &str) -> bool {
    let lower = message.to_lowercase();
    lower.contains("not found") || lower.contains("no bet found")
}

fn backend_message(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    value
        .get("error")
        .and_then(|e| e.as_str())
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Errors surfaced to callers of user-invoked actions (place/cancel bet,
/// task lifecycle hooks).
#[derive(Error, Debug)]
pub enum DomainError {
    #[error("User not authenticated")]
    NotAuthenticated,

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error(transparent)]
    Api(#[from] ApiError),
}

pub type DomainResult<T> = Result<T, DomainError>;
