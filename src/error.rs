//! Error types for sqlsession.

use thiserror::Error;

use crate::codec::CodecError;

/// Main error type for session store operations.
#[derive(Error, Debug)]
pub enum SessionError {
    /// Table creation or statement preparation failed while opening a store.
    #[error("store initialization failed during {stage}: {source}")]
    Initialization {
        stage: &'static str,
        #[source]
        source: sqlx::Error,
    },

    /// The configured signing or encryption keys are unusable.
    #[error("invalid session keys: {0}")]
    Keys(#[source] CodecError),

    /// The session lifetime cannot be represented as a row expiry time.
    #[error("max age of {0} seconds is outside the supported range")]
    InvalidMaxAge(i64),

    /// No row exists for the given session ID.
    #[error("session not found: {0}")]
    NotFound(String),

    /// The row exists but its expiry time has passed.
    #[error("session expired: {0}")]
    Expired(String),

    /// Session values or the session ID could not be encoded.
    #[error("failed to encode session: {0}")]
    Encode(#[source] CodecError),

    /// A cookie or a stored session blob failed to decode.
    #[error("failed to decode session: {0}")]
    Decode(#[source] CodecError),

    /// Database error from insert, update, delete or select.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// An encoded cookie could not be turned into a header value.
    #[error("invalid header value: {0}")]
    Header(#[from] axum::http::header::InvalidHeaderValue),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl SessionError {
    /// Whether the error only means "this request has no live session".
    pub fn is_unauthenticated(&self) -> bool {
        matches!(self, Self::NotFound(_) | Self::Expired(_) | Self::Decode(_))
    }
}

/// Convenience Result type for session store operations.
pub type Result<T> = std::result::Result<T, SessionError>;
