//! The session store: current actor, their token, and its refresh timer.

pub mod scheduler;
pub mod state;
pub mod store;

pub use scheduler::{refresh_delay, PendingRefresh};
pub use state::{Identity, SessionSnapshot};
pub use store::{RefreshOutcome, SessionStore, SessionStoreBuilder, SkipReason};
