use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use tokio::sync::watch;
use tracing::{debug, warn};

use super::scheduler::{refresh_delay, PendingRefresh, RefreshTimer};
use super::state::{Identity, SessionSnapshot};
use crate::auth::{AuthApi, AuthError, CommercetoolsAuth};
use crate::clock::{Clock, SystemClock};
use crate::config::{StorefrontConfig, DEFAULT_REFRESH_MARGIN};
use crate::error::{Result, SessionError};
use crate::router::{Navigator, NoopNavigator, Route};
use crate::storage::{
    clear_session, load_session, store_session, FileStateStorage, StateStorage, StateStorageConfig,
};
use crate::types::{Credentials, CustomerWithToken, Token};

/// Result of a [`SessionStore::refresh`] attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// New token merged and persisted.
    Refreshed,
    /// Refresh failed; the session was replaced by a fresh anonymous one.
    Demoted,
    /// Nothing was done.
    Skipped(SkipReason),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Another refresh is already running.
    InFlight,
    /// Nothing persisted to refresh.
    NoSession,
    /// The session changed (login, logout) while the refresh was in flight.
    Superseded,
}

/// Single source of truth for the current actor and their token.
///
/// Cheap to clone; clones share state. Timers run as Tokio tasks, so the
/// store must be used inside a Tokio runtime.
///
/// # Example
/// ```no_run
/// use storefront_session::config::StorefrontConfig;
/// use storefront_session::session::SessionStore;
///
/// # async fn example() -> storefront_session::error::Result<()> {
/// let store = SessionStore::from_config(&StorefrontConfig::from_env()?)?;
/// store.initialize().await?;
/// println!("authorized: {}", store.is_authorized());
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct SessionStore {
    inner: Arc<SessionInner>,
}

struct SessionInner {
    api: Arc<dyn AuthApi>,
    storage: Arc<dyn StateStorage>,
    navigator: Arc<dyn Navigator>,
    clock: Arc<dyn Clock>,
    refresh_margin: Duration,
    state: watch::Sender<SessionSnapshot>,
    timer: RefreshTimer,
    refreshing: AtomicBool,
    /// Bumped on every session replacement.
    generation: AtomicU64,
}

/// Builder for [`SessionStore`].
pub struct SessionStoreBuilder {
    api: Arc<dyn AuthApi>,
    storage: Arc<dyn StateStorage>,
    navigator: Arc<dyn Navigator>,
    clock: Arc<dyn Clock>,
    refresh_margin: Duration,
}

impl SessionStoreBuilder {
    pub fn navigator(mut self, navigator: Arc<dyn Navigator>) -> Self {
        self.navigator = navigator;
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn refresh_margin(mut self, margin: Duration) -> Self {
        self.refresh_margin = margin;
        self
    }

    pub fn build(self) -> SessionStore {
        let (state, _) = watch::channel(SessionSnapshot::default());
        SessionStore {
            inner: Arc::new(SessionInner {
                api: self.api,
                storage: self.storage,
                navigator: self.navigator,
                clock: self.clock,
                refresh_margin: self.refresh_margin,
                state,
                timer: RefreshTimer::default(),
                refreshing: AtomicBool::new(false),
                generation: AtomicU64::new(0),
            }),
        }
    }
}

struct InFlight<'a>(&'a AtomicBool);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl SessionStore {
    pub fn builder(api: Arc<dyn AuthApi>, storage: Arc<dyn StateStorage>) -> SessionStoreBuilder {
        SessionStoreBuilder {
            api,
            storage,
            navigator: Arc::new(NoopNavigator),
            clock: Arc::new(SystemClock),
            refresh_margin: DEFAULT_REFRESH_MARGIN,
        }
    }

    pub fn new(api: Arc<dyn AuthApi>, storage: Arc<dyn StateStorage>) -> Self {
        Self::builder(api, storage).build()
    }

    /// Store backed by the HTTP adapter and a state file.
    pub fn from_config(config: &StorefrontConfig) -> Result<Self> {
        let api = CommercetoolsAuth::new(config.commercetools.clone());
        let storage = FileStateStorage::open(StateStorageConfig::new(config.state_path.clone()))?;
        Ok(Self::builder(Arc::new(api), Arc::new(storage))
            .refresh_margin(config.refresh_margin)
            .build())
    }

    // ----------------------------------------------------------------------
    // Observation
    // ----------------------------------------------------------------------

    pub fn snapshot(&self) -> SessionSnapshot {
        self.inner.state.borrow().clone()
    }

    /// Receiver that sees every session replacement.
    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.inner.state.subscribe()
    }

    pub fn is_authorized(&self) -> bool {
        self.inner.state.borrow().is_authorized
    }

    pub fn session(&self) -> Option<CustomerWithToken> {
        self.inner.state.borrow().session.clone()
    }

    pub fn identity(&self) -> Identity {
        self.inner.state.borrow().identity()
    }

    /// Current access token, for authorizing API calls.
    pub fn access_token(&self) -> Option<String> {
        self.inner.state.borrow().access_token().map(String::from)
    }

    /// The refresh currently scheduled, if any.
    pub fn pending_refresh(&self) -> Option<PendingRefresh> {
        self.inner.timer.pending()
    }

    // ----------------------------------------------------------------------
    // Lifecycle
    // ----------------------------------------------------------------------

    /// Restore the persisted session, or start an anonymous one.
    ///
    /// An unreadable persisted entry is logged and treated as absent. Fails
    /// only when a fresh anonymous session cannot be fetched or saved.
    pub async fn initialize(&self) -> Result<Identity> {
        let persisted = match load_session(self.inner.storage.as_ref()) {
            Ok(session) => session,
            Err(e) => {
                warn!(error = %e, "discarding unreadable persisted session");
                None
            }
        };

        match persisted {
            Some(session) => {
                debug!(authorized = session.user.is_some(), "restored persisted session");
                self.replace(Some(session.clone()));
                self.schedule_refresh(&session.token);
            }
            None => {
                let session = self.inner.api.anonymous_session().await?;
                debug!("started anonymous session");
                self.adopt(session)?;
            }
        }
        Ok(self.identity())
    }

    /// Cancel the pending refresh. State is left as is.
    pub fn shutdown(&self) {
        if self.inner.timer.cancel() {
            debug!("cancelled pending token refresh");
        }
    }

    // ----------------------------------------------------------------------
    // Refresh
    // ----------------------------------------------------------------------

    /// Schedule a single refresh shortly before `token` expires, replacing any
    /// pending one. Returns the delay.
    pub fn schedule_refresh(&self, token: &Token) -> Duration {
        let now_ms = self.inner.clock.now_ms();
        let delay = refresh_delay(token.expiry(), now_ms, self.inner.refresh_margin);
        let delay_ms = i64::try_from(delay.as_millis()).unwrap_or(i64::MAX);
        let pending = PendingRefresh {
            delay,
            due_at_ms: now_ms.saturating_add(delay_ms),
        };
        let weak = Arc::downgrade(&self.inner);
        self.inner
            .timer
            .replace_with(pending, |generation| tokio::spawn(run_timer(weak, generation, delay)));
        debug!(delay_ms, "scheduled token refresh");
        delay
    }

    /// Exchange the persisted refresh token for a new access token.
    ///
    /// On failure the session is demoted to a fresh anonymous one. Returns
    /// `Err` only if that demotion itself fails, in which case the session is
    /// cleared so the next [`initialize`](Self::initialize) starts over.
    ///
    /// Works on an uninitialized store. If the session is replaced (login,
    /// logout, profile update) while a backend call is pending, the result
    /// is dropped.
    pub async fn refresh(&self) -> Result<RefreshOutcome> {
        if self.inner.refreshing.swap(true, Ordering::SeqCst) {
            debug!("token refresh already in flight");
            return Ok(RefreshOutcome::Skipped(SkipReason::InFlight));
        }
        let guard = InFlight(&self.inner.refreshing);
        let generation = self.generation();

        let persisted = match load_session(self.inner.storage.as_ref()) {
            Ok(Some(session)) => session,
            Ok(None) => return Ok(RefreshOutcome::Skipped(SkipReason::NoSession)),
            Err(e) => {
                warn!(error = %e, "persisted session unreadable; nothing to refresh");
                return Ok(RefreshOutcome::Skipped(SkipReason::NoSession));
            }
        };

        let result = match persisted.token.refresh_token.as_deref() {
            Some(refresh_token) => self.inner.api.refresh_token(refresh_token).await,
            None => Err(AuthError::MissingRefreshToken),
        };

        if self.superseded_since(generation) {
            return Ok(RefreshOutcome::Skipped(SkipReason::Superseded));
        }

        let token = match result {
            Ok(token) => token,
            Err(e) => {
                warn!(error = %e, "token refresh failed; falling back to anonymous session");
                let anonymous = self.inner.api.anonymous_session().await;
                if self.superseded_since(generation) {
                    return Ok(RefreshOutcome::Skipped(SkipReason::Superseded));
                }
                drop(guard);
                return match anonymous {
                    Ok(session) => {
                        self.adopt(session)?;
                        Ok(RefreshOutcome::Demoted)
                    }
                    Err(demote_err) => {
                        self.inner.timer.cancel();
                        self.replace(None);
                        if let Err(clear_err) = clear_session(self.inner.storage.as_ref()) {
                            warn!(error = %clear_err, "failed to clear persisted session");
                        }
                        Err(demote_err.into())
                    }
                };
            }
        };

        // The next timer may fire as soon as adopt schedules it.
        drop(guard);
        self.adopt(persisted.with_refreshed_token(token))?;
        debug!("token refreshed");
        Ok(RefreshOutcome::Refreshed)
    }

    // ----------------------------------------------------------------------
    // Identity changes
    // ----------------------------------------------------------------------

    /// Replace the session and persist it.
    ///
    /// `None` fetches a fresh anonymous session instead of leaving the store
    /// empty.
    pub async fn set_user(&self, value: Option<CustomerWithToken>) -> Result<()> {
        let session = match value {
            Some(session) => session,
            None => self.inner.api.anonymous_session().await?,
        };
        self.adopt(session)
    }

    /// Log a customer in and navigate home.
    ///
    /// On failure the error is logged and returned for display; the current
    /// session is left untouched.
    pub async fn log_in(&self, credentials: &Credentials) -> Result<()> {
        let session = match self.inner.api.customer_session(credentials).await {
            Ok(session) if session.user.is_some() => session,
            Ok(_) => {
                let err = SessionError::InvalidState(
                    "login response did not include a customer".to_string(),
                );
                warn!(error = %err, "login failed");
                return Err(err);
            }
            Err(e) => {
                warn!(error = %e, email = %credentials.email, "login failed");
                return Err(e.into());
            }
        };

        self.adopt(session)?;
        debug!(email = %credentials.email, "customer logged in");
        self.inner.navigator.navigate(Route::Home);
        Ok(())
    }

    /// Forget the session entirely and navigate home. Does not contact the
    /// backend.
    pub fn log_out(&self) -> Result<()> {
        self.inner.timer.cancel();
        self.replace(None);
        let cleared = clear_session(self.inner.storage.as_ref());
        self.inner.navigator.navigate(Route::Home);
        cleared?;
        debug!("logged out");
        Ok(())
    }

    /// Whether `credentials` log in as the customer they name. Never changes
    /// the session; any failure reads as `false`.
    pub async fn is_valid_credentials(&self, credentials: &Credentials) -> bool {
        match self.inner.api.customer_session(credentials).await {
            Ok(session) => session
                .user
                .is_some_and(|customer| customer.email == credentials.email),
            Err(e) => {
                debug!(error = %e, "credential check failed");
                false
            }
        }
    }

    /// Replace the session after a profile or cart edit and persist it.
    ///
    /// The refresh timer is only rescheduled when the token itself changed.
    pub async fn update_user_data(&self, session: CustomerWithToken) -> Result<()> {
        let token_changed = self
            .inner
            .state
            .borrow()
            .session
            .as_ref()
            .map_or(true, |current| current.token != session.token);
        self.replace(Some(session.clone()));
        let saved = store_session(self.inner.storage.as_ref(), &session);
        if token_changed {
            self.schedule_refresh(&session.token);
        }
        Ok(saved?)
    }

    // ----------------------------------------------------------------------
    // Internals
    // ----------------------------------------------------------------------

    /// Make `session` current: publish, persist, then schedule its refresh.
    ///
    /// Persisting before scheduling means a timer that fires at once reads
    /// the new entry. The timer is scheduled even if saving fails.
    fn adopt(&self, session: CustomerWithToken) -> Result<()> {
        self.replace(Some(session.clone()));
        let saved = store_session(self.inner.storage.as_ref(), &session);
        self.schedule_refresh(&session.token);
        Ok(saved?)
    }

    fn replace(&self, session: Option<CustomerWithToken>) {
        self.inner.generation.fetch_add(1, Ordering::SeqCst);
        self.inner
            .state
            .send_replace(SessionSnapshot::from_session(session));
    }

    fn generation(&self) -> u64 {
        self.inner.generation.load(Ordering::SeqCst)
    }

    fn superseded_since(&self, generation: u64) -> bool {
        let superseded = self.generation() != generation;
        if superseded {
            debug!("session changed during refresh; dropping result");
        }
        superseded
    }
}

async fn run_timer(inner: Weak<SessionInner>, generation: u64, delay: Duration) {
    tokio::time::sleep(delay).await;
    let Some(inner) = inner.upgrade() else {
        return;
    };
    inner.timer.detach(generation);
    let store = SessionStore { inner };
    if let Err(e) = store.refresh().await {
        warn!(error = %e, "scheduled token refresh could not recover a session");
    }
}
