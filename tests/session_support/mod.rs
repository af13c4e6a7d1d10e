#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::json;
use tokio::sync::Notify;

use storefront_session::auth::{AuthApi, AuthError};
use storefront_session::clock::{Clock, ManualClock};
use storefront_session::router::RecordingNavigator;
use storefront_session::session::SessionStore;
use storefront_session::storage::InMemoryStateStorage;
use storefront_session::types::{Credentials, Customer, CustomerWithToken, Token};

pub const NOW_MS: i64 = 1_700_000_000_000;
pub const LIFETIME_SECS: u64 = 3_600;

/// Scripted backend: anonymous tokens are `anon-N`, customer tokens
/// `customer-N`, refreshed tokens `refreshed-N` (issued without a refresh
/// token unless `rotate_refresh_tokens` is set).
pub struct MockAuthApi {
    clock: Arc<ManualClock>,
    lifetime_secs: AtomicU64,
    customers: Mutex<HashMap<String, (String, Customer)>>,
    fail_anonymous: AtomicBool,
    fail_refresh: AtomicBool,
    rotate_refresh_tokens: AtomicBool,
    refresh_gate: Mutex<Option<Arc<Notify>>>,
    anonymous_gate: Mutex<Option<Arc<Notify>>>,
    issued: AtomicUsize,
    pub anonymous_calls: AtomicUsize,
    pub customer_calls: AtomicUsize,
    pub refresh_calls: AtomicUsize,
    refresh_args: Mutex<Vec<String>>,
}

impl MockAuthApi {
    pub fn new(clock: Arc<ManualClock>) -> Self {
        Self {
            clock,
            lifetime_secs: AtomicU64::new(LIFETIME_SECS),
            customers: Mutex::new(HashMap::new()),
            fail_anonymous: AtomicBool::new(false),
            fail_refresh: AtomicBool::new(false),
            rotate_refresh_tokens: AtomicBool::new(false),
            refresh_gate: Mutex::new(None),
            anonymous_gate: Mutex::new(None),
            issued: AtomicUsize::new(0),
            anonymous_calls: AtomicUsize::new(0),
            customer_calls: AtomicUsize::new(0),
            refresh_calls: AtomicUsize::new(0),
            refresh_args: Mutex::new(Vec::new()),
        }
    }

    pub fn register(&self, email: &str, password: &str) -> Customer {
        let customer = customer(email);
        self.customers
            .lock()
            .unwrap()
            .insert(email.to_string(), (password.to_string(), customer.clone()));
        customer
    }

    pub fn set_lifetime_secs(&self, secs: u64) {
        self.lifetime_secs.store(secs, Ordering::SeqCst);
    }

    pub fn fail_anonymous(&self, fail: bool) {
        self.fail_anonymous.store(fail, Ordering::SeqCst);
    }

    pub fn fail_refresh(&self, fail: bool) {
        self.fail_refresh.store(fail, Ordering::SeqCst);
    }

    pub fn rotate_refresh_tokens(&self, rotate: bool) {
        self.rotate_refresh_tokens.store(rotate, Ordering::SeqCst);
    }

    /// Make every refresh wait until the returned `Notify` is signalled.
    pub fn hold_refreshes(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.refresh_gate.lock().unwrap() = Some(gate.clone());
        gate
    }

    /// Make every anonymous-session fetch wait until the returned `Notify`
    /// is signalled.
    pub fn hold_anonymous_sessions(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.anonymous_gate.lock().unwrap() = Some(gate.clone());
        gate
    }

    pub fn refresh_args(&self) -> Vec<String> {
        self.refresh_args.lock().unwrap().clone()
    }

    pub fn anonymous_calls(&self) -> usize {
        self.anonymous_calls.load(Ordering::SeqCst)
    }

    pub fn customer_calls(&self) -> usize {
        self.customer_calls.load(Ordering::SeqCst)
    }

    pub fn refresh_calls(&self) -> usize {
        self.refresh_calls.load(Ordering::SeqCst)
    }

    fn issue(&self, prefix: &str, with_refresh: bool) -> Token {
        let n = self.issued.fetch_add(1, Ordering::SeqCst) + 1;
        let refresh = with_refresh.then(|| format!("{prefix}-refresh-{n}"));
        Token::new(
            format!("{prefix}-{n}"),
            refresh,
            self.lifetime_secs.load(Ordering::SeqCst),
        )
        .stamped(self.clock.now_ms())
    }
}

#[async_trait]
impl AuthApi for MockAuthApi {
    async fn anonymous_session(&self) -> Result<CustomerWithToken, AuthError> {
        self.anonymous_calls.fetch_add(1, Ordering::SeqCst);
        let gate = self.anonymous_gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        if self.fail_anonymous.load(Ordering::SeqCst) {
            return Err(AuthError::Network("anonymous endpoint down".to_string()));
        }
        Ok(CustomerWithToken::anonymous(self.issue("anon", true)))
    }

    async fn customer_session(
        &self,
        credentials: &Credentials,
    ) -> Result<CustomerWithToken, AuthError> {
        self.customer_calls.fetch_add(1, Ordering::SeqCst);
        let customer = {
            let customers = self.customers.lock().unwrap();
            match customers.get(&credentials.email) {
                Some((password, customer)) if *password == credentials.password => {
                    customer.clone()
                }
                _ => return Err(AuthError::InvalidCredentials),
            }
        };
        Ok(CustomerWithToken {
            user: Some(customer),
            cart: None,
            token: self.issue("customer", true),
        })
    }

    async fn refresh_token(&self, refresh_token: &str) -> Result<Token, AuthError> {
        self.refresh_calls.fetch_add(1, Ordering::SeqCst);
        self.refresh_args
            .lock()
            .unwrap()
            .push(refresh_token.to_string());
        let gate = self.refresh_gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        if self.fail_refresh.load(Ordering::SeqCst) {
            return Err(AuthError::ExpiredOrInvalidGrant);
        }
        let rotate = self.rotate_refresh_tokens.load(Ordering::SeqCst);
        Ok(self.issue("refreshed", rotate))
    }
}

pub fn customer(email: &str) -> Customer {
    serde_json::from_value(json!({
        "id": format!("id-{email}"),
        "version": 1,
        "email": email,
        "firstName": "Ann",
        "lastName": "Lee",
        "addresses": []
    }))
    .unwrap()
}

pub struct Harness {
    pub clock: Arc<ManualClock>,
    pub api: Arc<MockAuthApi>,
    pub storage: Arc<InMemoryStateStorage>,
    pub navigator: Arc<RecordingNavigator>,
    pub store: SessionStore,
}

pub fn harness() -> Harness {
    harness_with_storage(InMemoryStateStorage::new())
}

pub fn harness_with_storage(storage: InMemoryStateStorage) -> Harness {
    let clock = Arc::new(ManualClock::new(NOW_MS));
    let api = Arc::new(MockAuthApi::new(clock.clone()));
    let storage = Arc::new(storage);
    let navigator = Arc::new(RecordingNavigator::new());
    let store = SessionStore::builder(api.clone(), storage.clone())
        .navigator(navigator.clone())
        .clock(clock.clone())
        .build();
    Harness {
        clock,
        api,
        storage,
        navigator,
        store,
    }
}

/// A persisted session for `email` (or anonymous) whose token expires at
/// `expires_at`.
pub fn persisted_session(email: Option<&str>, expires_at: i64) -> CustomerWithToken {
    let mut token = Token::new("stored-access", Some("stored-refresh".to_string()), LIFETIME_SECS);
    token.expires_at = Some(expires_at);
    CustomerWithToken {
        user: email.map(customer),
        cart: None,
        token,
    }
}
