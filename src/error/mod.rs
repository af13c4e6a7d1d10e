//! Error types for storefront sessions.

use thiserror::Error;

use crate::auth::AuthError;
use crate::storage::StorageError;

/// Primary error type for session operations.
#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Authentication error: {0}")]
    Auth(#[from] AuthError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Invalid state: {0}")]
    InvalidState(String),
}

impl SessionError {
    /// Whether retrying the same call could succeed.
    ///
    /// Credential and configuration problems never go away on their own;
    /// transport hiccups and rate limits might.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Auth(err) => err.is_transient(),
            Self::Storage(StorageError::Io(_)) => true,
            _ => false,
        }
    }

    /// True when the backend rejected the supplied credentials.
    pub fn is_invalid_credentials(&self) -> bool {
        matches!(self, Self::Auth(AuthError::InvalidCredentials))
    }
}

/// Convenience alias.
pub type Result<T> = std::result::Result<T, SessionError>;
