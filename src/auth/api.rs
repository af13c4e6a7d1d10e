//! Token-issuing backend seam.

use async_trait::async_trait;

use super::error::AuthError;
use crate::types::{Credentials, CustomerWithToken, Token};

/// The three token operations the session store depends on.
///
/// Implementations return fully populated values; every `Err` is treated by
/// the store as "operation failed" with no retry.
#[async_trait]
pub trait AuthApi: Send + Sync {
    /// Issue a guest token (and no customer).
    async fn anonymous_session(&self) -> Result<CustomerWithToken, AuthError>;

    /// Exchange customer credentials for a token plus the customer record.
    async fn customer_session(
        &self,
        credentials: &Credentials,
    ) -> Result<CustomerWithToken, AuthError>;

    /// Exchange a refresh token for a new token.
    ///
    /// The response may omit `refresh_token`.
    async fn refresh_token(&self, refresh_token: &str) -> Result<Token, AuthError>;
}
