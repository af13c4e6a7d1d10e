use std::fmt;
use std::str::FromStr;

use serde::{de, Deserialize, Deserializer, Serialize};

/// OAuth token pair as issued by the commerce backend.
///
/// `expires_at` is absolute epoch milliseconds. The backend itself only sends
/// `expires_in`; [`Token::stamped`] fills the absolute value on receipt.
///
/// # Example
/// ```
/// use storefront_session::types::Token;
///
/// let token = Token::new("access", Some("refresh".to_string()), 3600).stamped(1_000);
/// assert_eq!(token.expires_at, Some(3_601_000));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    pub access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(default, deserialize_with = "seconds_from_number_or_string")]
    pub expires_in: u64,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "millis_from_number_or_string"
    )]
    pub expires_at: Option<i64>,
    #[serde(default)]
    pub scope: String,
    #[serde(default = "default_token_type")]
    pub token_type: String,
}

/// Typed view of a token's absolute expiry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expiry {
    /// Expires at the given epoch milliseconds.
    At(i64),
    /// No absolute expiry recorded. Treated as already due.
    Missing,
}

impl Expiry {
    /// Milliseconds from `now_ms` until expiry; `Missing` counts as zero.
    pub fn remaining_ms(self, now_ms: i64) -> i64 {
        match self {
            Self::At(at) => at.saturating_sub(now_ms),
            Self::Missing => 0,
        }
    }
}

impl Token {
    pub fn new(access_token: impl Into<String>, refresh_token: Option<String>, expires_in: u64) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token,
            expires_in,
            expires_at: None,
            scope: String::new(),
            token_type: default_token_type(),
        }
    }

    pub fn expiry(&self) -> Expiry {
        self.expires_at.map_or(Expiry::Missing, Expiry::At)
    }

    /// Fill `expires_at` from `expires_in` relative to `now_ms`.
    ///
    /// An existing `expires_at` is kept.
    pub fn stamped(mut self, now_ms: i64) -> Self {
        if self.expires_at.is_none() {
            let lifetime_ms = i64::try_from(self.expires_in.saturating_mul(1000)).unwrap_or(i64::MAX);
            self.expires_at = Some(now_ms.saturating_add(lifetime_ms));
        }
        self
    }

    /// Replace `previous` with `refreshed`, keeping the old refresh token when
    /// the refresh response carries none.
    pub fn carry_forward(previous: &Token, refreshed: Token) -> Token {
        let refresh_token = refreshed
            .refresh_token
            .clone()
            .or_else(|| previous.refresh_token.clone());
        Token {
            refresh_token,
            ..refreshed
        }
    }

    /// The `Authorization` header value for this token.
    pub fn bearer(&self) -> String {
        format!("Bearer {}", self.access_token)
    }
}

fn default_token_type() -> String {
    "Bearer".to_string()
}

/// Backends and older persisted blobs send numeric fields either way.
#[derive(Deserialize)]
#[serde(untagged)]
enum NumberOrString<T> {
    Number(T),
    Text(String),
}

impl<T> NumberOrString<T>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    fn parse<E: de::Error>(self) -> Result<T, E> {
        match self {
            Self::Number(n) => Ok(n),
            Self::Text(s) => s.trim().parse().map_err(E::custom),
        }
    }
}

fn seconds_from_number_or_string<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    NumberOrString::<u64>::deserialize(deserializer)?.parse()
}

fn millis_from_number_or_string<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<NumberOrString<i64>>::deserialize(deserializer)?
        .map(NumberOrString::parse)
        .transpose()
}
