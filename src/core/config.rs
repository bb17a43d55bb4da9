//! # Supervisor configuration.
//!
//! [`Config`] centralizes every timing knob of the supervisor. All fields are
//! public; accessors clamp sentinel values so callers never see a zero interval
//! or an unbounded call.
//!
//! ## Sentinel values
//! - `health_interval = 0s` → clamped to 1ms (a zero period is invalid for a ticker)
//! - any `*_timeout = 0s` → clamped to 1ms (calls are always bounded)
//! - `bus_capacity = 0` → clamped to 1

use std::time::Duration;

use serde::Serialize;

use crate::policies::{BackoffPolicy, RecoveryPolicy, RestartPolicy};

const MIN_PERIOD: Duration = Duration::from_millis(1);

/// Global configuration for the supervisor.
///
/// ## Field semantics
/// - `health_interval`: period of the health monitor loop
/// - `check_timeout`: bound for each `check_health()` call
/// - `start_timeout` / `stop_timeout`: bounds for `start()` / `stop()`
/// - `ready_timeout` / `ready_poll`: readiness gate after each `start()`
/// - `recovery`: per-component retry and escalation policy
/// - `restart` / `restart_backoff`: automatic restart of a Failed system
/// - `bus_capacity`: event bus ring buffer size
#[derive(Clone, Debug)]
pub struct Config {
    /// How often every component is probed once the system is running.
    pub health_interval: Duration,

    /// Maximum duration of a single `check_health()`; overruns count as `Failed("timeout")`.
    pub check_timeout: Duration,

    /// Maximum duration of a single `start()`.
    pub start_timeout: Duration,

    /// Maximum duration of a single `stop()`; shutdown moves on after it.
    pub stop_timeout: Duration,

    /// How long a freshly started component may take to report Healthy before
    /// startup is aborted.
    pub ready_timeout: Duration,

    /// Delay between readiness probes.
    pub ready_poll: Duration,

    /// Retry/backoff/escalation rule for failing components.
    pub recovery: RecoveryPolicy,

    /// Whether a Failed system restarts itself.
    pub restart: RestartPolicy,

    /// Delay before each automatic restart (indexed by restart number).
    pub restart_backoff: BackoffPolicy,

    /// Capacity of the event bus broadcast channel.
    pub bus_capacity: usize,
}

impl Config {
    #[inline]
    pub fn health_interval(&self) -> Duration {
        self.health_interval.max(MIN_PERIOD)
    }

    #[inline]
    pub fn check_timeout(&self) -> Duration {
        self.check_timeout.max(MIN_PERIOD)
    }

    #[inline]
    pub fn start_timeout(&self) -> Duration {
        self.start_timeout.max(MIN_PERIOD)
    }

    #[inline]
    pub fn stop_timeout(&self) -> Duration {
        self.stop_timeout.max(MIN_PERIOD)
    }

    #[inline]
    pub fn ready_poll(&self) -> Duration {
        self.ready_poll.max(MIN_PERIOD)
    }

    #[inline]
    pub fn bus_capacity_clamped(&self) -> usize {
        self.bus_capacity.max(1)
    }

    /// The subset of settings embedded in every snapshot.
    pub fn summary(&self) -> ConfigSummary {
        ConfigSummary {
            health_interval: self.health_interval(),
            check_timeout: self.check_timeout(),
            max_failures: self.recovery.max_failures,
            restart_policy: self.restart.as_label(),
        }
    }
}

impl Default for Config {
    /// Default configuration:
    ///
    /// - `health_interval = 30s`, `check_timeout = 5s`
    /// - `start_timeout = 30s`, `stop_timeout = 10s`
    /// - `ready_timeout = 30s`, `ready_poll = 250ms`
    /// - `recovery = RecoveryPolicy::default()` (1s doubling to 60s, escalate at 5)
    /// - `restart = RestartPolicy::Never`, `restart_backoff = 5s doubling to 5m`
    /// - `bus_capacity = 1024`
    fn default() -> Self {
        Self {
            health_interval: Duration::from_secs(30),
            check_timeout: Duration::from_secs(5),
            start_timeout: Duration::from_secs(30),
            stop_timeout: Duration::from_secs(10),
            ready_timeout: Duration::from_secs(30),
            ready_poll: Duration::from_millis(250),
            recovery: RecoveryPolicy::default(),
            restart: RestartPolicy::default(),
            restart_backoff: BackoffPolicy::exponential(
                Duration::from_secs(5),
                Duration::from_secs(300),
            ),
            bus_capacity: 1024,
        }
    }
}

/// Configuration excerpt published with every [`Snapshot`](crate::Snapshot).
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ConfigSummary {
    pub health_interval: Duration,
    pub check_timeout: Duration,
    pub max_failures: u32,
    pub restart_policy: &'static str,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_values_are_clamped() {
        let cfg = Config {
            health_interval: Duration::ZERO,
            check_timeout: Duration::ZERO,
            bus_capacity: 0,
            ..Config::default()
        };
        assert_eq!(cfg.health_interval(), Duration::from_millis(1));
        assert_eq!(cfg.check_timeout(), Duration::from_millis(1));
        assert_eq!(cfg.bus_capacity_clamped(), 1);
    }

    #[test]
    fn summary_reflects_policies() {
        let cfg = Config {
            restart: RestartPolicy::Limited(3),
            ..Config::default()
        };
        let s = cfg.summary();
        assert_eq!(s.health_interval, Duration::from_secs(30));
        assert_eq!(s.max_failures, 5);
        assert_eq!(s.restart_policy, "limited");
    }
}
