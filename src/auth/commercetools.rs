//! HTTP [`AuthApi`] against a commercetools-style OAuth and `/me` API.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::{Response, StatusCode};
use serde::Deserialize;
use tracing::debug;

use super::api::AuthApi;
use super::error::AuthError;
use crate::clock::{Clock, SystemClock};
use crate::config::CommercetoolsConfig;
use crate::types::{Cart, Credentials, Customer, CustomerWithToken, Token};

/// Auth adapter for a commercetools project.
///
/// Every token it returns carries an absolute `expires_at` computed from the
/// injected clock at receipt.
///
/// # Example
/// ```no_run
/// use storefront_session::auth::CommercetoolsAuth;
/// use storefront_session::config::CommercetoolsConfig;
///
/// let config = CommercetoolsConfig::builder()
///     .auth_url("https://auth.europe-west1.gcp.commercetools.com")
///     .api_url("https://api.europe-west1.gcp.commercetools.com")
///     .project_key("my-shop")
///     .client_id("client")
///     .client_secret("secret")
///     .build();
/// let auth = CommercetoolsAuth::new(config);
/// ```
pub struct CommercetoolsAuth {
    client: reqwest::Client,
    config: CommercetoolsConfig,
    clock: Arc<dyn Clock>,
}

impl CommercetoolsAuth {
    pub fn new(config: CommercetoolsConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    fn auth_endpoint(&self, path: &str) -> String {
        format!("{}/{path}", self.config.auth_url.trim_end_matches('/'))
    }

    fn api_endpoint(&self, path: &str) -> String {
        format!(
            "{}/{}/{path}",
            self.config.api_url.trim_end_matches('/'),
            self.config.project_key
        )
    }

    fn scope(&self) -> Option<String> {
        (!self.config.scopes.is_empty()).then(|| self.config.scopes.join(" "))
    }

    async fn request_token(
        &self,
        url: String,
        mut form: Vec<(&str, String)>,
        what: &str,
    ) -> Result<Token, AuthError> {
        if let Some(scope) = self.scope() {
            form.push(("scope", scope));
        }
        let resp = self
            .client
            .post(&url)
            .header("Accept", "application/json")
            .basic_auth(&self.config.client_id, Some(&self.config.client_secret))
            .form(&form)
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(error_from_response(resp, what).await);
        }
        let token: Token = resp.json().await?;
        debug!(expires_in = token.expires_in, "{what} issued token");
        Ok(token.stamped(self.clock.now_ms()))
    }

    async fn fetch_me(&self, token: &Token) -> Result<Customer, AuthError> {
        let resp = self
            .client
            .get(self.api_endpoint("me"))
            .header("Accept", "application/json")
            .header("Authorization", token.bearer())
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(error_from_response(resp, "Customer lookup").await);
        }
        Ok(resp.json().await?)
    }

    async fn fetch_active_cart(&self, token: &Token) -> Result<Option<Cart>, AuthError> {
        let resp = self
            .client
            .get(self.api_endpoint("me/active-cart"))
            .header("Accept", "application/json")
            .header("Authorization", token.bearer())
            .send()
            .await?;
        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !resp.status().is_success() {
            return Err(error_from_response(resp, "Active cart lookup").await);
        }
        Ok(Some(resp.json().await?))
    }
}

#[async_trait]
impl AuthApi for CommercetoolsAuth {
    async fn anonymous_session(&self) -> Result<CustomerWithToken, AuthError> {
        let url = self.auth_endpoint(&format!(
            "oauth/{}/anonymous/token",
            self.config.project_key
        ));
        let form = vec![("grant_type", "client_credentials".to_string())];
        let token = self.request_token(url, form, "Anonymous token request").await?;
        Ok(CustomerWithToken::anonymous(token))
    }

    async fn customer_session(
        &self,
        credentials: &Credentials,
    ) -> Result<CustomerWithToken, AuthError> {
        let url = self.auth_endpoint(&format!(
            "oauth/{}/customers/token",
            self.config.project_key
        ));
        let form = vec![
            ("grant_type", "password".to_string()),
            ("username", credentials.email.clone()),
            ("password", credentials.password.clone()),
        ];
        let token = self.request_token(url, form, "Customer token request").await?;
        let user = self.fetch_me(&token).await?;
        let cart = self.fetch_active_cart(&token).await?;
        Ok(CustomerWithToken {
            user: Some(user),
            cart,
            token,
        })
    }

    async fn refresh_token(&self, refresh_token: &str) -> Result<Token, AuthError> {
        let url = self.auth_endpoint("oauth/token");
        let form = vec![
            ("grant_type", "refresh_token".to_string()),
            ("refresh_token", refresh_token.to_string()),
        ];
        self.request_token(url, form, "Token refresh").await
    }
}

#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    error: Option<String>,
    message: Option<String>,
    #[serde(default)]
    errors: Vec<ErrorEntry>,
}

#[derive(Debug, Deserialize)]
struct ErrorEntry {
    code: String,
}

async fn error_from_response(resp: Response, what: &str) -> AuthError {
    let status = resp.status();
    if status == StatusCode::TOO_MANY_REQUESTS {
        let retry_after_ms = resp
            .headers()
            .get("retry-after")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u64>().ok())
            .map(|secs| secs * 1000);
        return AuthError::RateLimited { retry_after_ms };
    }
    let text = resp.text().await.unwrap_or_default();
    let body: ErrorBody = serde_json::from_str(&text).unwrap_or_default();
    classify_error(status, &body, what)
}

fn classify_error(status: StatusCode, body: &ErrorBody, what: &str) -> AuthError {
    let codes = body
        .error
        .iter()
        .map(String::as_str)
        .chain(body.errors.iter().map(|e| e.code.as_str()));
    for code in codes {
        match code {
            "invalid_customer_account_credentials" => return AuthError::InvalidCredentials,
            "invalid_grant" | "invalid_token" => return AuthError::ExpiredOrInvalidGrant,
            _ => {}
        }
    }
    let detail = body.message.as_deref().unwrap_or("no details");
    AuthError::InvalidResponse(format!("{what} failed with status {status}: {detail}"))
}
