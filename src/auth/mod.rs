//! Token issuance: the backend seam and its HTTP implementation.

pub mod api;
pub mod commercetools;
pub mod error;

pub use api::AuthApi;
pub use commercetools::CommercetoolsAuth;
pub use error::AuthError;
