//! Convenience re-exports for common use.

pub use crate::auth::{AuthApi, AuthError, CommercetoolsAuth};
pub use crate::config::{CommercetoolsConfig, StorefrontConfig};
pub use crate::error::{Result, SessionError};
pub use crate::router::{Navigator, Route};
pub use crate::session::{Identity, RefreshOutcome, SessionSnapshot, SessionStore};
pub use crate::storage::{FileStateStorage, InMemoryStateStorage, StateStorage};
pub use crate::types::{Credentials, Customer, CustomerWithToken, Token};
