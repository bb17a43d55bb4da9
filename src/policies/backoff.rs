//! # Backoff schedule for component recovery and system restarts.
//!
//! The delay after the `n`-th consecutive failure (1-based) is
//! `base × factor^(n-1)`, clamped to `max`, then jittered. The base value is derived
//! from `n` alone, so a jittered delay never feeds back into the next one.
//!
//! # Example
//! ```rust
//! use std::time::Duration;
//! use healthvisor::BackoffPolicy;
//!
//! let backoff = BackoffPolicy::exponential(Duration::from_secs(1), Duration::from_secs(30));
//!
//! assert_eq!(backoff.delay_for(1), Duration::from_secs(1));
//! assert_eq!(backoff.delay_for(2), Duration::from_secs(2));
//! assert_eq!(backoff.delay_for(3), Duration::from_secs(4));
//! assert_eq!(backoff.delay_for(10), Duration::from_secs(30));
//! ```

use std::time::Duration;

use crate::policies::jitter::JitterPolicy;

/// Retry backoff policy.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BackoffPolicy {
    /// Delay after the first failure; also the value restored after a success.
    pub base: Duration,
    /// Ceiling for any delay.
    pub max: Duration,
    /// Multiplicative growth per consecutive failure (`>= 1.0` keeps delays non-decreasing).
    pub factor: f64,
    /// Randomization applied to the clamped delay.
    pub jitter: JitterPolicy,
}

impl Default for BackoffPolicy {
    /// Doubling from 1s up to 60s, no jitter.
    fn default() -> Self {
        Self::exponential(Duration::from_secs(1), Duration::from_secs(60))
    }
}

impl BackoffPolicy {
    /// Doubling delays from `base` up to `max`, no jitter.
    pub fn exponential(base: Duration, max: Duration) -> Self {
        Self {
            base,
            max,
            factor: 2.0,
            jitter: JitterPolicy::None,
        }
    }

    /// The same delay every time.
    pub fn constant(delay: Duration) -> Self {
        Self {
            base: delay,
            max: delay,
            factor: 1.0,
            jitter: JitterPolicy::None,
        }
    }

    /// Delay to wait after `failures` consecutive failures (`0` is treated as `1`).
    pub fn delay_for(&self, failures: u32) -> Duration {
        let exp = failures.saturating_sub(1).min(i32::MAX as u32) as i32;
        let secs = self.base.as_secs_f64() * self.factor.powi(exp);

        let clamped = if !secs.is_finite() || secs < 0.0 || secs > self.max.as_secs_f64() {
            self.max
        } else {
            Duration::from_secs_f64(secs)
        };
        self.jitter.apply(clamped)
    }

    /// `true` when successive delays can never shrink.
    pub fn is_monotonic(&self) -> bool {
        self.factor >= 1.0 && self.jitter == JitterPolicy::None
    }
}
