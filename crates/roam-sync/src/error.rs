/// Failure talking to the remote connection store.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RemoteError {
    #[error("not authenticated")]
    Unauthorized,

    #[error("HTTP {code}: {message}")]
    Status { code: u16, message: String },

    #[error("transport error: {0}")]
    Transport(String),

    #[error("malformed response: {0}")]
    Decode(String),
}

impl RemoteError {
    pub fn status(code: u16, message: impl Into<String>) -> Self {
        Self::Status {
            code,
            message: message.into(),
        }
    }

    pub fn kind(&self) -> FailureKind {
        FailureKind::classify(self)
    }
}

/// How a failed mutation is surfaced to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// The record already exists. Benign: re-fetch and adopt server state.
    Conflict,
    /// Plan limit reached. Surfaced as an upgrade prompt.
    QuotaExceeded,
    /// Session expired or revoked. Surfaced as a login prompt.
    Unauthenticated,
    /// Anything else. Rolled back, reported with a generic toast.
    Transient,
}

impl FailureKind {
    pub fn classify(err: &RemoteError) -> Self {
        match err {
            RemoteError::Status { code, message } => {
                let message = message.to_ascii_lowercase();
                if *code == 409 || message.contains("already exists") {
                    Self::Conflict
                } else if *code == 403 || message.contains("limit") {
                    Self::QuotaExceeded
                } else {
                    Self::Transient
                }
            }
            RemoteError::Unauthorized => Self::Unauthenticated,
            _ => Self::Transient,
        }
    }
}

/// Errors from read-only helpers that have no optimistic state to manage.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("login required")]
    LoginRequired,

    #[error(transparent)]
    Remote(#[from] RemoteError),
}

/// Local cache storage failure. Only ever logged.
#[derive(Debug, thiserror::Error)]
#[error("cache storage error: {0}")]
pub struct CacheError(pub String);
