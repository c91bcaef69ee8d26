//! Token-based flow control.
//!
//! A [`TokenManager`] bounds the number of frames in flight between the
//! stream unit (which acquires one token per frame) and the receive unit
//! (which releases one token per response). The window is closed end to
//! end: a frame only leaves the client when a previous response has come
//! back, so pacing follows round-trip latency.
//!
//! The counter follows the classic Gabriel layout: it starts at
//! `capacity - 1`, `acquire` waits while it is negative, and `release`
//! increments it while it is below `capacity`.

use std::sync::{Mutex, MutexGuard, PoisonError};

use tokio::sync::Notify;
use tracing::{trace, warn};

use crate::error::ClientError;

/// Default number of frames allowed in flight.
pub const DEFAULT_TOKEN_CAPACITY: usize = 2;

struct TokenState {
    /// Tokens available minus one; `-1` means exhausted.
    value: i64,
    /// Set by [`TokenManager::close`]; waiters bail out instead of blocking.
    closed: bool,
}

/// Bounded counting primitive shared by the stream and receive units.
///
/// All mutation goes through [`acquire`](Self::acquire) and
/// [`release`](Self::release). Every `acquire` that returns `Ok` must be
/// matched by exactly one later `release`; the pool does not guard against
/// a spurious extra release pushing the counter one past the window.
pub struct TokenManager {
    capacity: usize,
    state: Mutex<TokenState>,
    has_token: Notify,
}

impl TokenManager {
    /// Create a pool with `capacity` tokens. A capacity of zero would
    /// deadlock the first `acquire`, so it is raised to one.
    pub fn new(capacity: usize) -> Self {
        let capacity = if capacity == 0 {
            warn!("token capacity 0 would never admit a frame; using 1");
            1
        } else {
            capacity
        };
        Self {
            capacity,
            state: Mutex::new(TokenState {
                value: capacity as i64 - 1,
                closed: false,
            }),
            has_token: Notify::new(),
        }
    }

    /// Wait until a token is available and consume it.
    ///
    /// Returns [`ClientError::Cancelled`] if the pool is closed before or
    /// while waiting.
    pub async fn acquire(&self) -> Result<(), ClientError> {
        loop {
            // Register interest before checking, so a release between the
            // check and the await is not lost.
            let notified = self.has_token.notified();
            {
                let mut state = self.lock();
                if state.closed {
                    return Err(ClientError::Cancelled);
                }
                if state.value >= 0 {
                    state.value -= 1;
                    trace!(value = state.value, "token acquired");
                    return Ok(());
                }
            }
            notified.await;
        }
    }

    /// Consume a token if one is available right now.
    pub fn try_acquire(&self) -> bool {
        let mut state = self.lock();
        if state.closed || state.value < 0 {
            return false;
        }
        state.value -= 1;
        true
    }

    /// Return one token to the pool and wake all waiters. Only one of
    /// them will win the token; the rest go back to sleep.
    pub fn release(&self) {
        let mut state = self.lock();
        if state.value < self.capacity as i64 {
            state.value += 1;
        }
        trace!(value = state.value, "token released");
        if state.value >= 0 {
            self.has_token.notify_waiters();
        }
    }

    /// Whether the pool is exhausted. Advisory only: the answer may be
    /// stale by the time the caller acts on it.
    pub fn is_empty(&self) -> bool {
        self.lock().value < 0
    }

    /// Number of tokens currently available.
    pub fn available(&self) -> usize {
        (self.lock().value + 1).max(0) as usize
    }

    /// Configured window size.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Close the pool and wake every waiter. Subsequent and pending
    /// `acquire` calls return [`ClientError::Cancelled`].
    pub fn close(&self) {
        self.lock().closed = true;
        self.has_token.notify_waiters();
    }

    /// Whether [`close`](Self::close) has been called.
    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    fn lock(&self) -> MutexGuard<'_, TokenState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for TokenManager {
    fn default() -> Self {
        Self::new(DEFAULT_TOKEN_CAPACITY)
    }
}

impl std::fmt::Debug for TokenManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.lock();
        f.debug_struct("TokenManager")
            .field("capacity", &self.capacity)
            .field("value", &state.value)
            .field("closed", &state.closed)
            .finish()
    }
}

// ── Tests ────────────────────────────────────────────────────────
