//! Configuration (code or environment).

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use bon::Builder;

use crate::error::SessionError;
use crate::storage::StateStorageConfig;

/// Refresh this long before a token's absolute expiry.
pub const DEFAULT_REFRESH_MARGIN: Duration = Duration::from_secs(10);

/// Connection settings for a commercetools project.
#[derive(Clone, Builder)]
pub struct CommercetoolsConfig {
    #[builder(into)]
    pub auth_url: String,
    #[builder(into)]
    pub api_url: String,
    #[builder(into)]
    pub project_key: String,
    #[builder(into)]
    pub client_id: String,
    #[builder(into)]
    pub client_secret: String,
    #[builder(default)]
    pub scopes: Vec<String>,
}

impl fmt::Debug for CommercetoolsConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommercetoolsConfig")
            .field("auth_url", &self.auth_url)
            .field("api_url", &self.api_url)
            .field("project_key", &self.project_key)
            .field("client_id", &self.client_id)
            .field("client_secret", &"..")
            .field("scopes", &self.scopes)
            .finish()
    }
}

/// Everything needed to stand up a session store against a live backend.
#[derive(Debug, Clone, Builder)]
pub struct StorefrontConfig {
    pub commercetools: CommercetoolsConfig,
    #[builder(default = StateStorageConfig::default_path())]
    pub state_path: PathBuf,
    #[builder(default = DEFAULT_REFRESH_MARGIN)]
    pub refresh_margin: Duration,
}

impl StorefrontConfig {
    /// Load from environment variables (`CTP_*`, `STOREFRONT_*`), reading a
    /// `.env` file first if present.
    pub fn from_env() -> Result<Self, SessionError> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// State file location from `STOREFRONT_STATE_PATH`, or the default.
    ///
    /// Needs none of the backend settings, so read-only tooling can locate
    /// the persisted session without a full configuration.
    pub fn state_path_from_env() -> PathBuf {
        let _ = dotenvy::dotenv();
        state_path_from(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, SessionError> {
        let required = |key: &str| {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .ok_or_else(|| SessionError::Configuration(format!("{key} is not set")))
        };

        let scopes = lookup("CTP_SCOPES")
            .map(|raw| {
                raw.split([' ', ','])
                    .filter(|s| !s.is_empty())
                    .map(String::from)
                    .collect()
            })
            .unwrap_or_default();

        let commercetools = CommercetoolsConfig::builder()
            .auth_url(required("CTP_AUTH_URL")?)
            .api_url(required("CTP_API_URL")?)
            .project_key(required("CTP_PROJECT_KEY")?)
            .client_id(required("CTP_CLIENT_ID")?)
            .client_secret(required("CTP_CLIENT_SECRET")?)
            .scopes(scopes)
            .build();

        let state_path = state_path_from(&lookup);

        let refresh_margin = match lookup("STOREFRONT_REFRESH_MARGIN_SECS") {
            Some(raw) => Duration::from_secs(raw.trim().parse().map_err(|_| {
                SessionError::Configuration(format!(
                    "STOREFRONT_REFRESH_MARGIN_SECS must be whole seconds, got {raw:?}"
                ))
            })?),
            None => DEFAULT_REFRESH_MARGIN,
        };

        Ok(Self {
            commercetools,
            state_path,
            refresh_margin,
        })
    }
}

fn state_path_from(lookup: impl Fn(&str) -> Option<String>) -> PathBuf {
    lookup("STOREFRONT_STATE_PATH")
        .filter(|v| !v.trim().is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(StateStorageConfig::default_path)
}
