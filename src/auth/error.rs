use thiserror::Error;

/// Normalized failures from the commerce backend's auth endpoints.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Invalid customer credentials")]
    InvalidCredentials,
    #[error("Expired or invalid grant")]
    ExpiredOrInvalidGrant,
    #[error("Session has no refresh token")]
    MissingRefreshToken,
    #[error("Rate limited")]
    RateLimited { retry_after_ms: Option<u64> },
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
    #[error("Network error: {0}")]
    Network(String),
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl AuthError {
    /// Whether the failure might clear up on its own.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Network(_) | Self::RateLimited { .. })
    }
}

impl From<reqwest::Error> for AuthError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_decode() {
            Self::Serialization(error.to_string())
        } else {
            Self::Network(error.to_string())
        }
    }
}

impl From<serde_json::Error> for AuthError {
    fn from(error: serde_json::Error) -> Self {
        Self::Serialization(error.to_string())
    }
}
