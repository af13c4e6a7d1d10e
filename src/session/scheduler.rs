//! Refresh delay math and the single cancellable refresh timer.

use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use tokio::task::JoinHandle;

use crate::types::Expiry;

/// Delay before refreshing a token: `max(0, expires_at - now - margin)`.
///
/// A missing expiry counts as already due.
pub fn refresh_delay(expiry: Expiry, now_ms: i64, margin: Duration) -> Duration {
    let margin_ms = i64::try_from(margin.as_millis()).unwrap_or(i64::MAX);
    let remaining = expiry.remaining_ms(now_ms).saturating_sub(margin_ms);
    Duration::from_millis(u64::try_from(remaining).unwrap_or(0))
}

/// A scheduled refresh that has not fired yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingRefresh {
    pub delay: Duration,
    /// Wall-clock epoch milliseconds at which the refresh is due.
    pub due_at_ms: i64,
}

struct Slot {
    generation: u64,
    pending: PendingRefresh,
    handle: JoinHandle<()>,
}

/// Holds at most one timer task. Installing a new one aborts the old.
#[derive(Default)]
pub(crate) struct RefreshTimer {
    inner: Mutex<TimerState>,
}

#[derive(Default)]
struct TimerState {
    next_generation: u64,
    slot: Option<Slot>,
}

impl RefreshTimer {
    /// Spawn a timer task via `spawn` and install it, aborting any previous
    /// one. `spawn` receives the generation the task must pass to
    /// [`RefreshTimer::detach`] when it fires.
    ///
    /// The lock is held while spawning so a task that fires immediately
    /// cannot detach before it is installed.
    pub(crate) fn replace_with(
        &self,
        pending: PendingRefresh,
        spawn: impl FnOnce(u64) -> JoinHandle<()>,
    ) {
        let mut state = self.lock();
        state.next_generation += 1;
        let generation = state.next_generation;
        let handle = spawn(generation);
        let previous = state.slot.replace(Slot {
            generation,
            pending,
            handle,
        });
        if let Some(old) = previous {
            old.handle.abort();
        }
    }

    /// Called by a firing task: forget it without aborting, so the refresh it
    /// runs can install the next timer.
    pub(crate) fn detach(&self, generation: u64) {
        let mut state = self.lock();
        if state.slot.as_ref().is_some_and(|s| s.generation == generation) {
            state.slot = None;
        }
    }

    /// Abort the pending timer. Returns whether one was pending.
    pub(crate) fn cancel(&self) -> bool {
        match self.lock().slot.take() {
            Some(slot) => {
                slot.handle.abort();
                true
            }
            None => false,
        }
    }

    pub(crate) fn pending(&self) -> Option<PendingRefresh> {
        self.lock()
            .slot
            .as_ref()
            .filter(|s| !s.handle.is_finished())
            .map(|s| s.pending)
    }

    fn lock(&self) -> MutexGuard<'_, TimerState> {
        self.inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Drop for RefreshTimer {
    fn drop(&mut self) {
        self.cancel();
    }
}
