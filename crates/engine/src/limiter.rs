// SPDX-License-Identifier: MIT

//! Adaptive rate limiting and the circuit breaker.
//!
//! The limiter is a token bucket per quota (requests/minute, tokens/minute,
//! requests/day); a request is gated on the scarcest bucket. A 429 shrinks
//! the effective refill rate by a configurable factor and honors the
//! advertised retry-after; each success recovers linearly toward the
//! configured ceiling.

use carrel_core::Clock;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
pub struct RateLimiterConfig {
    pub requests_per_minute: u32,
    pub tokens_per_minute: u32,
    pub requests_per_day: u32,
    /// Multiplier applied to the effective rate on a 429
    pub backoff_factor: f64,
    /// Linear recovery per successful request
    pub recovery_step: f64,
}

impl Default for RateLimiterConfig {
    fn default() -> Self {
        Self {
            requests_per_minute: 60,
            tokens_per_minute: 1_000_000,
            requests_per_day: 10_000,
            backoff_factor: 0.5,
            recovery_step: 0.05,
        }
    }
}

/// One quota bucket.
struct Bucket {
    capacity: f64,
    available: f64,
    refill_per_sec: f64,
    last_refill: Instant,
}

impl Bucket {
    fn new(capacity: u32, per: Duration, now: Instant) -> Self {
        Self {
            capacity: capacity as f64,
            available: capacity as f64,
            refill_per_sec: capacity as f64 / per.as_secs_f64(),
            last_refill: now,
        }
    }

    fn refill(&mut self, now: Instant, factor: f64) {
        let elapsed = now.saturating_duration_since(self.last_refill).as_secs_f64();
        self.available =
            (self.available + elapsed * self.refill_per_sec * factor).min(self.capacity);
        self.last_refill = now;
    }

    /// Time until `amount` tokens are available at the current rate.
    fn wait_for(&self, amount: f64, factor: f64) -> Duration {
        if self.available >= amount {
            return Duration::ZERO;
        }
        let deficit = amount - self.available;
        Duration::from_secs_f64(deficit / (self.refill_per_sec * factor).max(1e-9))
    }

    fn take(&mut self, amount: f64) {
        self.available -= amount;
    }
}

struct LimiterState {
    per_minute: Bucket,
    tokens: Bucket,
    per_day: Bucket,
    /// Effective-rate multiplier in (0, 1]; shrunk by 429s
    factor: f64,
    penalty_until: Option<Instant>,
}

/// Token-bucket limiter shaped to the remote service's quotas.
pub struct RateLimiter<C: Clock> {
    config: RateLimiterConfig,
    clock: C,
    state: Mutex<LimiterState>,
}

impl<C: Clock> RateLimiter<C> {
    pub fn new(config: RateLimiterConfig, clock: C) -> Self {
        let now = clock.now();
        let state = LimiterState {
            per_minute: Bucket::new(config.requests_per_minute, Duration::from_secs(60), now),
            tokens: Bucket::new(config.tokens_per_minute, Duration::from_secs(60), now),
            per_day: Bucket::new(config.requests_per_day, Duration::from_secs(86_400), now),
            factor: 1.0,
            penalty_until: None,
        };
        Self {
            config,
            clock,
            state: Mutex::new(state),
        }
    }

    /// Take one request worth `tokens` from every bucket, or report how long
    /// until that becomes possible.
    pub fn try_acquire(&self, tokens: u32) -> Result<(), Duration> {
        let now = self.clock.now();
        let mut state = self.state.lock();

        if let Some(until) = state.penalty_until {
            if until > now {
                return Err(until - now);
            }
            state.penalty_until = None;
        }

        let factor = state.factor;
        state.per_minute.refill(now, factor);
        state.tokens.refill(now, factor);
        state.per_day.refill(now, factor);

        // A single request larger than the whole token budget would never
        // clear; cap it at bucket capacity instead of waiting forever.
        let tokens = (tokens as f64).min(state.tokens.capacity);
        let wait = state
            .per_minute
            .wait_for(1.0, factor)
            .max(state.tokens.wait_for(tokens, factor))
            .max(state.per_day.wait_for(1.0, factor));
        if wait > Duration::ZERO {
            return Err(wait);
        }

        state.per_minute.take(1.0);
        state.tokens.take(tokens);
        state.per_day.take(1.0);
        Ok(())
    }

    /// Wait until a slot is available.
    pub async fn acquire(&self, tokens: u32) {
        loop {
            match self.try_acquire(tokens) {
                Ok(()) => return,
                Err(wait) => {
                    tracing::trace!(wait_ms = wait.as_millis() as u64, "rate limiter waiting");
                    tokio::time::sleep(wait).await;
                }
            }
        }
    }

    /// The service said 429: honor retry-after and shrink the rate.
    pub fn on_rate_limited(&self, retry_after: Option<Duration>) {
        let mut state = self.state.lock();
        state.factor = (state.factor * self.config.backoff_factor).max(0.1);
        let penalty = retry_after.unwrap_or(Duration::from_secs(1));
        state.penalty_until = Some(self.clock.now() + penalty);
        tracing::info!(
            factor = state.factor,
            penalty_ms = penalty.as_millis() as u64,
            "rate limited; backing off"
        );
    }

    /// Linear recovery toward full rate.
    pub fn on_success(&self) {
        let mut state = self.state.lock();
        state.factor = (state.factor + self.config.recovery_step).min(1.0);
    }

    pub fn current_factor(&self) -> f64 {
        self.state.lock().factor
    }
}

#[derive(Debug, Clone)]
pub struct BreakerConfig {
    /// Rolling-window error rate that trips the breaker
    pub error_threshold: f64,
    pub window: Duration,
    /// Minimum outcomes in the window before the rate is meaningful
    pub min_samples: usize,
    pub cool_down: Duration,
    /// A second trip within this span halts the pool
    pub trip_window: Duration,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            error_threshold: 0.05,
            window: Duration::from_secs(60),
            min_samples: 10,
            cool_down: Duration::from_secs(30),
            trip_window: Duration::from_secs(300),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakerVerdict {
    Proceed,
    Pause(Duration),
    Halt,
}

struct BreakerState {
    outcomes: VecDeque<(Instant, bool)>,
    paused_until: Option<Instant>,
    last_trip: Option<Instant>,
    halted: bool,
}

/// Rolling-window circuit breaker over request outcomes.
pub struct CircuitBreaker<C: Clock> {
    config: BreakerConfig,
    clock: C,
    state: Mutex<BreakerState>,
}

impl<C: Clock> CircuitBreaker<C> {
    pub fn new(config: BreakerConfig, clock: C) -> Self {
        Self {
            config,
            clock,
            state: Mutex::new(BreakerState {
                outcomes: VecDeque::new(),
                paused_until: None,
                last_trip: None,
                halted: false,
            }),
        }
    }

    pub fn record(&self, success: bool) {
        let now = self.clock.now();
        let mut state = self.state.lock();
        state.outcomes.push_back((now, success));
        if let Some(horizon) = now.checked_sub(self.config.window) {
            while state.outcomes.front().is_some_and(|(at, _)| *at < horizon) {
                state.outcomes.pop_front();
            }
        }
    }

    /// Should the pool keep claiming work?
    pub fn check(&self) -> BreakerVerdict {
        let now = self.clock.now();
        let mut state = self.state.lock();

        if state.halted {
            return BreakerVerdict::Halt;
        }
        if let Some(until) = state.paused_until {
            if until > now {
                return BreakerVerdict::Pause(until - now);
            }
            state.paused_until = None;
        }

        let total = state.outcomes.len();
        if total < self.config.min_samples {
            return BreakerVerdict::Proceed;
        }
        let errors = state.outcomes.iter().filter(|(_, ok)| !ok).count();
        let rate = errors as f64 / total as f64;
        if rate <= self.config.error_threshold {
            return BreakerVerdict::Proceed;
        }

        // Tripped. A repeat within the trip window is a hard halt.
        if state
            .last_trip
            .is_some_and(|at| now.saturating_duration_since(at) < self.config.trip_window)
        {
            state.halted = true;
            tracing::error!(rate, "error rate tripped breaker twice; halting pool");
            return BreakerVerdict::Halt;
        }
        state.last_trip = Some(now);
        state.paused_until = Some(now + self.config.cool_down);
        state.outcomes.clear();
        tracing::warn!(rate, cool_down_ms = self.config.cool_down.as_millis() as u64, "error rate tripped breaker; pausing");
        BreakerVerdict::Pause(self.config.cool_down)
    }

    pub fn is_halted(&self) -> bool {
        self.state.lock().halted
    }
}

#[cfg(test)]
#[path = "limiter_tests.rs"]
mod tests;
