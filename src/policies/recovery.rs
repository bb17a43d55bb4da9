//! # Recovery policy: retry, backoff and escalation for failing components.
//!
//! [`RecoveryPolicy`] is a plain value (backoff schedule + escalation threshold).
//! [`Recovery`] applies it to a ledger of [`RecoveryRecord`]s, one per component
//! that has failed since its last success.
//!
//! ```text
//! on_failure(name)                     failures = 1 ─► Retry(base)
//!   └─ failures += 1                   failures = 2 ─► Retry(base × factor)
//!      ├─ failures < max_failures ─►   ...
//!      │    Retry(backoff.delay_for(failures)), next_retry_at = now + delay
//!      └─ failures == max_failures ─►  Escalate, escalated = true
//!
//! on_success(name) ─► record dropped (next failure starts again from base)
//! ```
//!
//! ## Rules
//! - Escalation happens **exactly** at `max_failures`, never before.
//! - With a non-jittered backoff and `factor >= 1.0`, delays are non-decreasing.
//! - An escalated record is never due for retry.

use std::collections::HashMap;
use std::time::Duration;

use tokio::time::Instant;

use crate::policies::BackoffPolicy;

/// Backoff and escalation threshold applied to failing components.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RecoveryPolicy {
    /// Delay schedule between restarts of the same component.
    pub backoff: BackoffPolicy,
    /// Consecutive failures at which the component escalates (min 1).
    pub max_failures: u32,
}

impl Default for RecoveryPolicy {
    /// Doubling from 1s up to 60s, escalate on the 5th consecutive failure.
    fn default() -> Self {
        Self {
            backoff: BackoffPolicy::default(),
            max_failures: 5,
        }
    }
}

impl RecoveryPolicy {
    /// Decides what to do after the `failures`-th consecutive failure.
    pub fn decide(&self, failures: u32) -> RecoveryAction {
        if failures >= self.max_failures.max(1) {
            RecoveryAction::Escalate
        } else {
            RecoveryAction::Retry {
                after: self.backoff.delay_for(failures),
            }
        }
    }
}

/// What the supervisor should do about a failing component.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RecoveryAction {
    /// Re-invoke the component's `start()` once `after` has elapsed.
    Retry { after: Duration },
    /// Give up on the component.
    Escalate,
}

/// Per-component recovery bookkeeping.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RecoveryRecord {
    /// Consecutive failures since the last success.
    pub failures: u32,
    /// Earliest moment a restart may be attempted (`None` once escalated).
    pub next_retry_at: Option<Instant>,
    /// Set once the policy returned [`RecoveryAction::Escalate`].
    pub escalated: bool,
}

/// Ledger of [`RecoveryRecord`]s driven by a [`RecoveryPolicy`].
#[derive(Debug, Default)]
pub struct Recovery {
    policy: RecoveryPolicy,
    records: HashMap<String, RecoveryRecord>,
}

impl Recovery {
    pub fn new(policy: RecoveryPolicy) -> Self {
        Self {
            policy,
            records: HashMap::new(),
        }
    }

    /// Records a failure of `name` observed at `now` and returns the action to take.
    pub fn on_failure(&mut self, name: &str, now: Instant) -> RecoveryAction {
        let record = self
            .records
            .entry(name.to_string())
            .or_insert(RecoveryRecord {
                failures: 0,
                next_retry_at: None,
                escalated: false,
            });

        if record.escalated {
            return RecoveryAction::Escalate;
        }
        record.failures = record.failures.saturating_add(1);

        let action = self.policy.decide(record.failures);
        match action {
            RecoveryAction::Retry { after } => record.next_retry_at = Some(now + after),
            RecoveryAction::Escalate => {
                record.next_retry_at = None;
                record.escalated = true;
            }
        }
        action
    }

    /// Resets `name` after a successful check. Returns `true` if a record existed.
    pub fn on_success(&mut self, name: &str) -> bool {
        self.records.remove(name).is_some()
    }

    /// Discards the record of a deregistered component.
    pub fn forget(&mut self, name: &str) {
        self.records.remove(name);
    }

    /// Drops every record (system restart).
    pub fn clear(&mut self) {
        self.records.clear();
    }

    pub fn record(&self, name: &str) -> Option<&RecoveryRecord> {
        self.records.get(name)
    }

    /// Consecutive failures recorded for `name`.
    pub fn failures(&self, name: &str) -> u32 {
        self.records.get(name).map_or(0, |r| r.failures)
    }

    /// Components whose retry window has elapsed at `now`.
    pub fn due(&self, now: Instant) -> Vec<String> {
        let mut due: Vec<String> = self
            .records
            .iter()
            .filter(|(_, r)| r.next_retry_at.is_some_and(|at| at <= now))
            .map(|(name, _)| name.clone())
            .collect();
        due.sort_unstable();
        due
    }

    /// Marks `name` as being retried so it is not returned by [`due`](Self::due) again
    /// until the next failure.
    pub fn begin_retry(&mut self, name: &str) {
        if let Some(r) = self.records.get_mut(name) {
            r.next_retry_at = None;
        }
    }

    /// Earliest pending retry, if any.
    pub fn next_due(&self) -> Option<Instant> {
        self.records.values().filter_map(|r| r.next_retry_at).min()
    }
}
