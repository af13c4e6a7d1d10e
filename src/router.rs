//! Navigation seam for the hosting UI.

use std::sync::Mutex;

/// Where the session sends the user after an identity change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    /// Storefront landing page.
    Home,
}

/// Receives navigation requests (e.g. "go home" after login or logout).
pub trait Navigator: Send + Sync {
    fn navigate(&self, route: Route);
}

/// Ignores navigation; for headless hosts.
#[derive(Debug, Default)]
pub struct NoopNavigator;

impl Navigator for NoopNavigator {
    fn navigate(&self, _route: Route) {}
}

/// Keeps every requested route in order.
#[derive(Debug, Default)]
pub struct RecordingNavigator {
    visited: Mutex<Vec<Route>>,
}

impl RecordingNavigator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn visited(&self) -> Vec<Route> {
        self.visited
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn last(&self) -> Option<Route> {
        self.visited().last().copied()
    }
}

impl Navigator for RecordingNavigator {
    fn navigate(&self, route: Route) {
        self.visited
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(route);
    }
}
