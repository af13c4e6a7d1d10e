//! Session data shapes shared by the store, storage, and API adapter.

pub mod customer;
pub mod token;

pub use customer::{Address, Cart, Credentials, Customer, Money};
pub use token::{Expiry, Token};

use serde::{Deserialize, Serialize};

/// The persisted session unit: who the actor is, their cart, and the token
/// authorizing their requests. `user` is `None` for an anonymous session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomerWithToken {
    pub user: Option<Customer>,
    pub cart: Option<Cart>,
    pub token: Token,
}

impl CustomerWithToken {
    pub fn anonymous(token: Token) -> Self {
        Self {
            user: None,
            cart: None,
            token,
        }
    }

    pub fn is_anonymous(&self) -> bool {
        self.user.is_none()
    }

    /// Copy of this session carrying `refreshed` in place of the current token.
    pub fn with_refreshed_token(&self, refreshed: Token) -> Self {
        Self {
            user: self.user.clone(),
            cart: self.cart.clone(),
            token: Token::carry_forward(&self.token, refreshed),
        }
    }
}
