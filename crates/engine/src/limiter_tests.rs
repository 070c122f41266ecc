// SPDX-License-Identifier: MIT

use super::*;
use carrel_core::FakeClock;

fn limiter(rpm: u32, tpm: u32, rpd: u32) -> (FakeClock, RateLimiter<FakeClock>) {
    let clock = FakeClock::new();
    let config = RateLimiterConfig {
        requests_per_minute: rpm,
        tokens_per_minute: tpm,
        requests_per_day: rpd,
        ..RateLimiterConfig::default()
    };
    (clock.clone(), RateLimiter::new(config, clock))
}

// ── Rate limiter ─────────────────────────────────────────────────────────────

#[test]
fn full_buckets_admit_immediately() {
    let (_clock, limiter) = limiter(60, 10_000, 1_000);
    assert!(limiter.try_acquire(100).is_ok());
}

#[test]
fn exhausted_rpm_bucket_forces_wait() {
    let (_clock, limiter) = limiter(2, 1_000_000, 1_000_000);
    assert!(limiter.try_acquire(1).is_ok());
    assert!(limiter.try_acquire(1).is_ok());
    let wait = limiter.try_acquire(1).unwrap_err();
    assert!(wait > Duration::ZERO);
}

#[test]
fn refill_restores_capacity() {
    let (clock, limiter) = limiter(2, 1_000_000, 1_000_000);
    limiter.try_acquire(1).unwrap();
    limiter.try_acquire(1).unwrap();
    assert!(limiter.try_acquire(1).is_err());

    // 2 rpm → one slot back after 30s.
    clock.advance(Duration::from_secs(31));
    assert!(limiter.try_acquire(1).is_ok());
}

#[test]
fn scarcest_quota_gates_the_request() {
    // Generous rpm, tiny token budget.
    let (_clock, limiter) = limiter(10_000, 100, 1_000_000);
    assert!(limiter.try_acquire(100).is_ok());
    // Token bucket is drained even though request buckets are not.
    assert!(limiter.try_acquire(100).is_err());
}

#[test]
fn rate_limited_shrinks_factor_and_sets_penalty() {
    let (clock, limiter) = limiter(60, 10_000, 1_000);
    limiter.on_rate_limited(Some(Duration::from_secs(5)));
    assert!((limiter.current_factor() - 0.5).abs() < 1e-9);

    // Penalty window rejects outright.
    let wait = limiter.try_acquire(1).unwrap_err();
    assert!(wait <= Duration::from_secs(5));

    clock.advance(Duration::from_secs(6));
    assert!(limiter.try_acquire(1).is_ok());
}

#[test]
fn success_recovers_linearly_to_ceiling() {
    let (_clock, limiter) = limiter(60, 10_000, 1_000);
    limiter.on_rate_limited(None);
    limiter.on_rate_limited(None);
    assert!((limiter.current_factor() - 0.25).abs() < 1e-9);

    for _ in 0..100 {
        limiter.on_success();
    }
    assert!((limiter.current_factor() - 1.0).abs() < 1e-9);
}

#[test]
fn repeated_429s_floor_at_a_tenth() {
    let (_clock, limiter) = limiter(60, 10_000, 1_000);
    for _ in 0..10 {
        limiter.on_rate_limited(None);
    }
    assert!(limiter.current_factor() >= 0.1);
}

// ── Circuit breaker ──────────────────────────────────────────────────────────

fn breaker(clock: &FakeClock) -> CircuitBreaker<FakeClock> {
    CircuitBreaker::new(BreakerConfig::default(), clock.clone())
}

#[test]
fn healthy_stream_proceeds() {
    let clock = FakeClock::new();
    let breaker = breaker(&clock);
    for _ in 0..20 {
        breaker.record(true);
    }
    assert_eq!(breaker.check(), BreakerVerdict::Proceed);
}

#[test]
fn below_min_samples_never_trips() {
    let clock = FakeClock::new();
    let breaker = breaker(&clock);
    for _ in 0..5 {
        breaker.record(false);
    }
    assert_eq!(breaker.check(), BreakerVerdict::Proceed);
}

#[test]
fn high_error_rate_pauses_then_halts_on_repeat() {
    let clock = FakeClock::new();
    let breaker = breaker(&clock);

    for i in 0..20 {
        breaker.record(i % 2 == 0);
    }
    let verdict = breaker.check();
    assert!(matches!(verdict, BreakerVerdict::Pause(_)));

    // Cool-down elapses; errors continue within the trip window.
    clock.advance(Duration::from_secs(31));
    for i in 0..20 {
        breaker.record(i % 2 == 0);
    }
    assert_eq!(breaker.check(), BreakerVerdict::Halt);
    assert!(breaker.is_halted());
}

#[test]
fn trip_well_after_window_pauses_again_instead_of_halting() {
    let clock = FakeClock::new();
    let breaker = breaker(&clock);

    for i in 0..20 {
        breaker.record(i % 2 == 0);
    }
    assert!(matches!(breaker.check(), BreakerVerdict::Pause(_)));

    // Past the trip window: treated as a fresh incident.
    clock.advance(Duration::from_secs(400));
    for i in 0..20 {
        breaker.record(i % 2 == 0);
    }
    assert!(matches!(breaker.check(), BreakerVerdict::Pause(_)));
    assert!(!breaker.is_halted());
}

#[test]
fn old_outcomes_age_out_of_the_window() {
    let clock = FakeClock::new();
    let breaker = breaker(&clock);

    for _ in 0..20 {
        breaker.record(false);
    }
    clock.advance(Duration::from_secs(120));
    // Recording prunes everything older than the window.
    breaker.record(true);
    assert_eq!(breaker.check(), BreakerVerdict::Proceed);
}
