use strum::Display;

use crate::types::CustomerWithToken;

/// Who the current actor is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "lowercase")]
pub enum Identity {
    /// No session at all (after logout, before initialize).
    None,
    /// Guest session with its own token.
    Anonymous,
    /// Registered customer.
    Authenticated,
}

/// Observable session state.
///
/// `is_authorized` is derived from the session on construction and is true
/// exactly when the session carries a customer.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionSnapshot {
    pub is_authorized: bool,
    pub session: Option<CustomerWithToken>,
}

impl SessionSnapshot {
    pub fn from_session(session: Option<CustomerWithToken>) -> Self {
        let is_authorized = session.as_ref().is_some_and(|s| s.user.is_some());
        Self {
            is_authorized,
            session,
        }
    }

    pub fn identity(&self) -> Identity {
        match &self.session {
            None => Identity::None,
            Some(s) if s.user.is_some() => Identity::Authenticated,
            Some(_) => Identity::Anonymous,
        }
    }

    pub fn access_token(&self) -> Option<&str> {
        self.session.as_ref().map(|s| s.token.access_token.as_str())
    }
}
