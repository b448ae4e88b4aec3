//! Application error types for core storage and domain logic.
use serde::Serialize;
use thiserror::Error;

/// Top-level application error type.
///
/// Storage faults (`Database`, `Io`, `Serialization`, `StorageMessage`) abort
/// the in-flight request. Every other variant is an expected, recoverable
/// rejection that callers surface as a failed [`Outcome`].
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Storage error: {0}")]
    StorageMessage(String),

    #[error("{0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Locked: {0}")]
    Locked(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Encryption error: {0}")]
    Encryption(String),

    #[error("Connection failed: {0}")]
    FederationUnreachable(String),

    #[error("{0}")]
    Remote(String),
}

impl AppError {
    /// Whether this error is a storage-level fault rather than a rejection.
    pub fn is_fault(&self) -> bool {
        matches!(
            self,
            Self::Database(_) | Self::Io(_) | Self::Serialization(_) | Self::StorageMessage(_)
        )
    }

    /// Whether a storage fault is a unique-constraint violation.
    pub fn is_unique_violation(&self) -> bool {
        match self {
            Self::Database(sqlx::Error::Database(db)) => db.is_unique_violation(),
            _ => false,
        }
    }

    /// Turn a unique-constraint violation into [`AppError::Conflict`].
    pub fn conflict_on_unique(self, message: impl FnOnce() -> String) -> Self {
        if self.is_unique_violation() {
            Self::Conflict(message())
        } else {
            self
        }
    }

    /// Short user-facing message without the variant prefix.
    pub fn message(&self) -> String {
        match self {
            Self::Validation(msg)
            | Self::NotFound(msg)
            | Self::Unauthorized(msg)
            | Self::Locked(msg)
            | Self::Conflict(msg)
            | Self::Encryption(msg)
            | Self::Remote(msg) => msg.clone(),
            Self::FederationUnreachable(_) => "connection failed".to_string(),
            other => other.to_string(),
        }
    }
}

/// Result tuple returned by mutating store operations.
#[derive(Debug, Clone, Serialize)]
pub struct Outcome<T> {
    pub success: bool,
    pub message: String,
    pub payload: Option<T>,
}

impl<T> Outcome<T> {
    /// Successful outcome carrying `payload`.
    pub fn ok(message: impl Into<String>, payload: T) -> Self {
        Self {
            success: true,
            message: message.into(),
            payload: Some(payload),
        }
    }

    /// Failed outcome without payload.
    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            payload: None,
        }
    }

    /// Fold a store result into an outcome.
    ///
    /// # Errors
    /// Storage faults are passed through unchanged; only rejections are folded.
    pub fn capture(result: Result<T, AppError>, message: &str) -> Result<Self, AppError> {
        match result {
            Ok(payload) => Ok(Self::ok(message, payload)),
            Err(err) if err.is_fault() => Err(err),
            Err(err) => Ok(Self::failed(err.message())),
        }
    }
}
