//! Dual sliding-window request throttle.
//!
//! Two constraints are enforced together:
//! - a global window (at most N requests per long interval), and
//! - a per-target window (at most M requests for the same instrument per
//!   short interval).
//!
//! Recorded timestamps are append-only and pruned only by age. A request is
//! granted only when both windows have room; otherwise the caller is told how
//! long to wait for the oldest blocking timestamp to leave its window.

use super::clock::{Clock, SystemClock};
use crate::cancel::CancelToken;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};

/// Longest single sleep inside [`RateLimiter::acquire`] before cancellation
/// is re-checked.
const WAIT_SLICE: Duration = Duration::from_millis(250);

/// At most `limit` requests within any `interval`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    pub limit: usize,
    pub interval: Duration,
}

impl Window {
    /// # Panics
    /// If `limit` is zero.
    pub fn new(limit: usize, interval: Duration) -> Self {
        assert!(limit > 0, "rate window limit must be >= 1");
        Self { limit, interval }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitPolicy {
    pub global: Window,
    pub per_target: Option<Window>,
}

impl RateLimitPolicy {
    /// Historical-data pacing of a broker gateway: 60 requests per 10 minutes,
    /// and no more than 6 requests for the same contract within 2 seconds.
    pub fn broker_historical() -> Self {
        Self {
            global: Window::new(60, Duration::from_secs(600)),
            per_target: Some(Window::new(6, Duration::from_secs(2))),
        }
    }
}

impl Default for RateLimitPolicy {
    fn default() -> Self {
        Self::broker_historical()
    }
}

/// A reservation was refused; retry after the given duration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("rate limit exceeded, retry after {retry_after:?}")]
pub struct RateLimitExceeded {
    pub retry_after: Duration,
}

#[derive(Debug, Default)]
struct Ledger {
    global: VecDeque<Duration>,
    per_target: HashMap<String, VecDeque<Duration>>,
}

/// Drop timestamps whose age has reached the window length.
fn prune(stamps: &mut VecDeque<Duration>, now: Duration, interval: Duration) {
    while let Some(&oldest) = stamps.front() {
        if now.saturating_sub(oldest) >= interval {
            stamps.pop_front();
        } else {
            break;
        }
    }
}

/// Wait until a full window regains a slot, or `None` if it has room.
fn wait_for(stamps: &VecDeque<Duration>, window: Window, now: Duration) -> Option<Duration> {
    if stamps.len() < window.limit {
        return None;
    }
    // The window is full: the slot frees when the entry `len - limit` ages out.
    let blocking = stamps[stamps.len() - window.limit];
    let wait = window.interval.saturating_sub(now.saturating_sub(blocking));
    if wait.is_zero() {
        None
    } else {
        Some(wait)
    }
}

pub struct RateLimiter {
    policy: RateLimitPolicy,
    clock: Arc<dyn Clock>,
    ledger: Mutex<Ledger>,
}

impl std::fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimiter")
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

impl RateLimiter {
    pub fn new(policy: RateLimitPolicy) -> Self {
        Self::with_clock(policy, Arc::new(SystemClock::new()))
    }

    pub fn with_clock(policy: RateLimitPolicy, clock: Arc<dyn Clock>) -> Self {
        Self {
            policy,
            clock,
            ledger: Mutex::new(Ledger::default()),
        }
    }

    pub fn policy(&self) -> &RateLimitPolicy {
        &self.policy
    }

    /// Prune, check both windows, and record the request if both have room.
    ///
    /// The whole check-and-record step runs under one lock, so concurrent
    /// callers can never jointly overshoot a window. `now` is read inside the
    /// lock so each window's timestamps stay in ascending order.
    pub fn try_reserve(&self, target: &str) -> Result<(), RateLimitExceeded> {
        let mut ledger = self.ledger.lock().unwrap_or_else(PoisonError::into_inner);
        let now = self.clock.now();
        let Ledger { global, per_target } = &mut *ledger;

        prune(global, now, self.policy.global.interval);
        let mut wait = wait_for(global, self.policy.global, now);

        if let Some(window) = self.policy.per_target {
            per_target.retain(|_, stamps| {
                prune(stamps, now, window.interval);
                !stamps.is_empty()
            });
            if let Some(stamps) = per_target.get(target) {
                if let Some(target_wait) = wait_for(stamps, window, now) {
                    wait = Some(wait.map_or(target_wait, |w| w.max(target_wait)));
                }
            }
        }

        if let Some(retry_after) = wait {
            return Err(RateLimitExceeded { retry_after });
        }

        global.push_back(now);
        if self.policy.per_target.is_some() {
            per_target
                .entry(target.to_string())
                .or_default()
                .push_back(now);
        }
        Ok(())
    }

    /// Single reservation attempt. `Duration::ZERO` means the request was
    /// granted and recorded; anything else is the wait before retrying.
    pub fn reserve(&self, target: &str) -> Duration {
        match self.try_reserve(target) {
            Ok(()) => Duration::ZERO,
            Err(e) => e.retry_after,
        }
    }

    /// Block until a reservation for `target` succeeds.
    ///
    /// Sleeps are sliced so a cancelled token is noticed promptly; after
    /// every sleep the limiter is re-checked, since other workers may have
    /// consumed the freed slot. Returns the total time spent waiting, or
    /// `None` if cancelled first.
    pub fn acquire(&self, target: &str, cancel: &CancelToken) -> Option<Duration> {
        let started = self.clock.now();
        let mut announced = false;
        loop {
            if cancel.is_cancelled() {
                return None;
            }
            match self.try_reserve(target) {
                Ok(()) => {
                    let waited = self.clock.now().saturating_sub(started);
                    if !waited.is_zero() {
                        debug!(
                            symbol = target,
                            waited_ms = waited.as_millis() as u64,
                            "rate limit cleared"
                        );
                    }
                    return Some(waited);
                }
                Err(RateLimitExceeded { retry_after }) => {
                    if !announced {
                        info!(
                            symbol = target,
                            wait_ms = retry_after.as_millis() as u64,
                            "rate limit reached, waiting"
                        );
                        announced = true;
                    }
                    self.clock.sleep(retry_after.min(WAIT_SLICE));
                }
            }
        }
    }

    /// Requests currently counted against the global window.
    pub fn in_flight(&self) -> usize {
        let mut ledger = self.ledger.lock().unwrap_or_else(PoisonError::into_inner);
        let now = self.clock.now();
        prune(&mut ledger.global, now, self.policy.global.interval);
        ledger.global.len()
    }
}
