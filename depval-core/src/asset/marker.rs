//! Async Marker
//!
//! An `AsyncMarker` tracks the construction of one artifact on a background
//! thread. The producer calls [`set_state`](AsyncMarker::set_state) exactly
//! once when it is done; everybody else reads the state or waits for it.
//!
//! # Waiting Without Locks
//!
//! The blocking wait is a poll loop. It sleeps between polls according to a
//! [`StallPolicy`] and never holds a lock while doing so. The producer may be
//! sitting in a thread pool that takes its own locks, and a condition
//! variable shared with it would give lock-ordering bugs a place to hide.
//! Polling costs some CPU on the waiting side in exchange.

use std::sync::atomic::{AtomicU8, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use tracing::warn;

use super::policy::StallPolicy;
use super::state::AssetState;

/// Tracks the availability of one artifact under construction.
#[derive(Debug)]
pub struct AsyncMarker {
    state: AtomicU8,

    /// Debug label naming what is being built. Diagnostics only.
    initializer: Option<String>,
}

impl AsyncMarker {
    /// Create a pending marker.
    pub fn new() -> Self {
        Self::with_state(AssetState::Pending)
    }

    /// Create a marker already in `state`. Useful for results that were
    /// available synchronously.
    pub fn with_state(state: AssetState) -> Self {
        Self {
            state: AtomicU8::new(state as u8),
            initializer: None,
        }
    }

    /// Attach a debug label.
    pub fn with_initializer(mut self, initializer: impl Into<String>) -> Self {
        self.initializer = Some(initializer.into());
        self
    }

    /// The debug label, if any.
    pub fn initializer(&self) -> Option<&str> {
        self.initializer.as_deref()
    }

    /// Current state.
    pub fn state(&self) -> AssetState {
        AssetState::from_raw(self.state.load(Ordering::Acquire))
    }

    /// Move a pending marker to its terminal state.
    ///
    /// Returns `false`, and leaves the marker alone, if it has already
    /// settled or if `new_state` is `Pending`.
    pub fn set_state(&self, new_state: AssetState) -> bool {
        if new_state.is_pending() {
            warn!(initializer = ?self.initializer, "refusing to move marker back to pending");
            return false;
        }

        match self.state.compare_exchange(
            AssetState::Pending as u8,
            new_state as u8,
            Ordering::AcqRel,
            Ordering::Acquire,
        ) {
            Ok(_) => true,
            Err(current) => {
                warn!(
                    initializer = ?self.initializer,
                    current = %AssetState::from_raw(current),
                    requested = %new_state,
                    "marker already settled"
                );
                false
            }
        }
    }

    /// Block until the marker leaves `Pending`, using the default policy.
    pub fn stall_while_pending(&self) -> AssetState {
        self.stall_while_pending_with(&StallPolicy::default())
    }

    /// Block until the marker leaves `Pending`.
    pub fn stall_while_pending_with(&self, policy: &StallPolicy) -> AssetState {
        self.poll(policy, None)
    }

    /// Like [`stall_while_pending`](Self::stall_while_pending) but gives up
    /// after `timeout`, returning `None` if the marker is still pending.
    ///
    /// A timeout too large to represent as a deadline waits without bound.
    pub fn stall_while_pending_for(&self, timeout: Duration) -> Option<AssetState> {
        let deadline = Instant::now().checked_add(timeout);
        let state = self.poll(&StallPolicy::default(), deadline);
        state.is_terminal().then_some(state)
    }

    /// Poll until the marker settles or `deadline` passes, and return the
    /// last state seen.
    fn poll(&self, policy: &StallPolicy, deadline: Option<Instant>) -> AssetState {
        let mut wait_count = 0u32;
        loop {
            let state = self.state();
            if state.is_terminal() {
                return state;
            }
            let mut delay = policy.pause_for(wait_count);
            if let Some(deadline) = deadline {
                let now = Instant::now();
                if now >= deadline {
                    return state;
                }
                delay = delay.min(deadline - now);
            }
            pause(delay);
            wait_count = wait_count.saturating_add(1);
        }
    }

    /// Wait for the marker to leave `Pending` from inside a tokio runtime.
    ///
    /// Same backoff as the blocking wait, but yields to the runtime instead
    /// of parking the thread.
    pub async fn wait(&self) -> AssetState {
        self.wait_with(&StallPolicy::default()).await
    }

    /// [`wait`](Self::wait) with an explicit policy.
    pub async fn wait_with(&self, policy: &StallPolicy) -> AssetState {
        let mut wait_count = 0u32;
        loop {
            let state = self.state();
            if state.is_terminal() {
                return state;
            }
            let delay = policy.pause_for(wait_count);
            if delay.is_zero() {
                tokio::task::yield_now().await;
            } else {
                tokio::time::sleep(delay).await;
            }
            wait_count = wait_count.saturating_add(1);
        }
    }
}

impl Default for AsyncMarker {
    fn default() -> Self {
        Self::new()
    }
}

fn pause(duration: Duration) {
    if duration.is_zero() {
        thread::yield_now();
    } else {
        thread::sleep(duration);
    }
}
