//! Provider circuit breaker.
//!
//! Sits underneath the rate limiter. The limiter spaces requests out; the
//! breaker stops sending them once the provider has banned us (HTTP 403) or
//! failed `threshold` requests in a row. After the cooldown a single trial
//! request is let through: success closes the breaker, failure reopens it for
//! another full cooldown.

use crate::rate_limit::{Clock, SystemClock};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakerState {
    Closed { failures: u32 },
    /// Refusing requests. `since` is a clock offset.
    Open { since: Duration },
    /// Cooldown over; one trial request is in flight.
    HalfOpen,
}

pub struct CircuitBreaker {
    state: Mutex<BreakerState>,
    cooldown: Duration,
    threshold: u32,
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for CircuitBreaker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CircuitBreaker")
            .field("state", &self.state())
            .field("cooldown", &self.cooldown)
            .field("threshold", &self.threshold)
            .finish()
    }
}

impl CircuitBreaker {
    pub fn new(cooldown: Duration, threshold: u32) -> Self {
        Self::with_clock(cooldown, threshold, Arc::new(SystemClock::new()))
    }

    pub fn with_clock(cooldown: Duration, threshold: u32, clock: Arc<dyn Clock>) -> Self {
        Self {
            state: Mutex::new(BreakerState::Closed { failures: 0 }),
            cooldown,
            threshold: threshold.max(1),
            clock,
        }
    }

    /// Yahoo defaults: 30-minute cooldown after 3 consecutive failures.
    pub fn default_provider() -> Self {
        Self::new(Duration::from_secs(30 * 60), 3)
    }

    pub fn state(&self) -> BreakerState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Whether a request may go out now. An expired cooldown moves the
    /// breaker to `HalfOpen` and admits exactly this caller as the trial.
    pub fn is_allowed(&self) -> bool {
        let now = self.clock.now();
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        match *state {
            BreakerState::Closed { .. } => true,
            BreakerState::Open { since } if now.saturating_sub(since) >= self.cooldown => {
                info!("circuit breaker cooldown over, sending a trial request");
                *state = BreakerState::HalfOpen;
                true
            }
            BreakerState::Open { .. } | BreakerState::HalfOpen => false,
        }
    }

    pub fn record_success(&self) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if *state == BreakerState::HalfOpen {
            info!("circuit breaker closed");
        }
        *state = BreakerState::Closed { failures: 0 };
    }

    pub fn record_failure(&self) {
        let now = self.clock.now();
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        match *state {
            BreakerState::Closed { failures } if failures + 1 >= self.threshold => {
                warn!(
                    failures = failures + 1,
                    cooldown_secs = self.cooldown.as_secs(),
                    "circuit breaker tripped"
                );
                *state = BreakerState::Open { since: now };
            }
            BreakerState::Closed { failures } => {
                *state = BreakerState::Closed {
                    failures: failures + 1,
                };
            }
            BreakerState::HalfOpen => {
                warn!("trial request failed, circuit breaker reopened");
                *state = BreakerState::Open { since: now };
            }
            BreakerState::Open { .. } => {}
        }
    }

    /// Open immediately, e.g. on HTTP 403.
    pub fn trip(&self) {
        warn!(cooldown_secs = self.cooldown.as_secs(), "circuit breaker tripped by provider ban");
        *self.state.lock().unwrap_or_else(PoisonError::into_inner) = BreakerState::Open {
            since: self.clock.now(),
        };
    }

    /// Time left before a trial request is allowed; zero unless open.
    pub fn remaining_cooldown(&self) -> Duration {
        match self.state() {
            BreakerState::Open { since } => self
                .cooldown
                .saturating_sub(self.clock.now().saturating_sub(since)),
            _ => Duration::ZERO,
        }
    }
}
