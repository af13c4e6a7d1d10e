//! storefront-session: customer and guest sessions for a commerce storefront
//!
//! Keeps track of who the current actor is (a guest with an anonymous token,
//! or a logged-in customer), persists that across restarts, and refreshes the
//! access token shortly before it expires.
//!
//! # Quick Start
//!
//! ```no_run
//! use storefront_session::prelude::*;
//!
//! # async fn example() -> storefront_session::error::Result<()> {
//! let config = StorefrontConfig::from_env()?;
//! let store = SessionStore::from_config(&config)?;
//! store.initialize().await?;
//!
//! store
//!     .log_in(&Credentials::new("ann@example.com", "s3cret"))
//!     .await?;
//! assert!(store.is_authorized());
//! # Ok(())
//! # }
//! ```

pub mod auth;
pub mod clock;
pub mod config;
pub mod error;
pub mod prelude;
pub mod router;
pub mod session;
pub mod storage;
pub mod types;

#[cfg(feature = "cli")]
pub mod cli;
