//! Adaptive inter-request delay
//!
//! One instance per run, shared by every worker. Rate-limit responses push
//! the delay up, long runs of clean successes let it drift back down.

use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// Growth factor on a rate-limit response
const INCREASE_FACTOR: f64 = 1.5;
/// Decay factor after a clean window
const DECREASE_FACTOR: f64 = 0.9;
/// Successes needed before the delay may decay
const DECAY_AFTER_SUCCESSES: u32 = 10;
/// More rate limits than this in a window block decay
const DECAY_MAX_RATE_LIMITS: u32 = 2;
/// Observations after which the window counters reset
const WINDOW_SIZE: u32 = 100;

pub const DEFAULT_MIN_DELAY: Duration = Duration::from_millis(1);
pub const DEFAULT_MAX_DELAY: Duration = Duration::from_millis(100);

#[derive(Debug)]
struct DelayState {
    current: Duration,
    success_count: u32,
    rate_limit_count: u32,
}

/// Shared throttle scalar
#[derive(Debug)]
pub struct AdaptiveDelay {
    enabled: bool,
    min: Duration,
    max: Duration,
    state: Mutex<DelayState>,
}

impl AdaptiveDelay {
    /// `initial` is used unchanged when `enabled` is false
    pub fn new(initial: Duration, enabled: bool) -> Self {
        Self::with_bounds(initial, enabled, DEFAULT_MIN_DELAY, DEFAULT_MAX_DELAY)
    }

    pub fn with_bounds(initial: Duration, enabled: bool, min: Duration, max: Duration) -> Self {
        Self {
            enabled,
            min,
            max: max.max(min),
            state: Mutex::new(DelayState {
                current: initial,
                success_count: 0,
                rate_limit_count: 0,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, DelayState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Delay to sleep before the next attempt
    pub fn current(&self) -> Duration {
        self.lock().current
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Record a rate-limit response and back off
    pub fn on_rate_limited(&self) -> Duration {
        let mut state = self.lock();
        state.rate_limit_count += 1;
        if self.enabled {
            let grown = state.current.max(self.min).mul_f64(INCREASE_FACTOR);
            state.current = grown.min(self.max);
            tracing::debug!(
                delay_ms = state.current.as_secs_f64() * 1000.0,
                "Rate limited, increased request delay"
            );
        }
        Self::roll_window(&mut state);
        state.current
    }

    /// Record a successful call
    pub fn on_success(&self) -> Duration {
        let mut state = self.lock();
        state.success_count += 1;
        if self.enabled
            && state.success_count > DECAY_AFTER_SUCCESSES
            && state.rate_limit_count < DECAY_MAX_RATE_LIMITS
        {
            state.current = state.current.mul_f64(DECREASE_FACTOR).max(self.min);
        }
        Self::roll_window(&mut state);
        state.current
    }

    fn roll_window(state: &mut DelayState) {
        if state.success_count + state.rate_limit_count > WINDOW_SIZE {
            state.success_count = 0;
            state.rate_limit_count = 0;
        }
    }
}
