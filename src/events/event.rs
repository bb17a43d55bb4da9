//! # Runtime events emitted by the supervisor, the health monitor and the runner.
//!
//! The [`EventKind`] enum classifies event types across four categories:
//! - **System events**: aggregate state changes and shutdown
//! - **Component lifecycle events**: register, start, stop
//! - **Health/recovery events**: probe changes, timeouts, retries, escalation, restarts
//! - **Subscriber events**: overflow and panics inside subscriber workers
//!
//! The [`Event`] struct carries optional metadata (component name, reason, states,
//! delays) set depending on the kind.
//!
//! ## Ordering
//! `seq` comes from one process-wide counter, so sorting by it recovers publish order.
//!
//! ## Example
//! ```rust
//! use std::time::Duration;
//! use healthvisor::{Event, EventKind};
//!
//! let ev = Event::new(EventKind::RecoveryScheduled)
//!     .with_component("database")
//!     .with_attempt(2)
//!     .with_delay(Duration::from_secs(2));
//!
//! assert_eq!(ev.kind, EventKind::RecoveryScheduled);
//! assert_eq!(ev.component.as_deref(), Some("database"));
//! assert_eq!(ev.delay_ms, Some(2_000));
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::time::{Duration, SystemTime};

use crate::components::Health;
use crate::core::SystemState;

/// Process-wide source of `Event::seq`.
static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// What happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    // subscribers
    /// A subscriber panicked inside `on_event`.
    ///
    /// Sets: `component` (subscriber name), `reason` (panic message).
    SubscriberPanicked,

    /// An event could not be queued for a subscriber.
    ///
    /// Sets: `component` (subscriber name), `reason` ("full" / "closed").
    SubscriberOverflow,

    // system
    /// `stop()` was called or an OS signal was observed.
    ShutdownRequested,

    /// The aggregate state moved.
    ///
    /// Sets: `prev_state`, `state`, optional `reason`.
    SystemStateChanged,

    // component lifecycle
    /// Component added to the supervisor.
    ComponentRegistered,

    /// Component removed before start.
    ComponentDeregistered,

    /// `start()` is about to be invoked.
    ///
    /// Sets: `component`, `attempt` (1 for initial start, recovery attempt otherwise).
    ComponentStarting,

    /// `start()` returned and the component reported Healthy.
    ComponentStarted,

    /// `start()` failed, timed out, or the component never became Healthy.
    ///
    /// Sets: `component`, `reason`.
    ComponentStartFailed,

    /// `stop()` completed.
    ComponentStopped,

    /// `stop()` failed; shutdown continues with the next component.
    ///
    /// Sets: `component`, `reason`.
    ComponentStopFailed,

    // health and recovery
    /// Probe classification differs from the previous pass.
    ///
    /// Sets: `component`, `prev_health`, `health`, optional `reason`.
    HealthChanged,

    /// A bounded call overran.
    ///
    /// Sets: `component`, `timeout_ms`, `reason` (operation name).
    TimeoutHit,

    /// Recovery policy scheduled a restart of the component.
    ///
    /// Sets: `component`, `attempt` (consecutive failures), `delay_ms`, `reason`.
    RecoveryScheduled,

    /// Recovery policy gave up on the component.
    ///
    /// Sets: `component`, `attempt`, `reason`.
    RecoveryEscalated,

    /// Auto-restart of the whole system is pending.
    ///
    /// Sets: `attempt` (restart number), `delay_ms`.
    RestartScheduled,

    /// Auto-restart policy is exhausted; the system stays Failed.
    ///
    /// Sets: `attempt` (restarts performed).
    RestartsExhausted,
}

/// One lifecycle record published on the [`Bus`](crate::Bus).
#[derive(Clone, Debug)]
pub struct Event {
    /// Publish order across the process.
    pub seq: u64,
    /// When the event was built.
    pub at: SystemTime,
    /// Category; decides which optional fields are set.
    pub kind: EventKind,

    /// Component (or subscriber) the event is about.
    pub component: Option<Arc<str>>,
    /// Human-readable reason (errors, probe reasons, overflow details).
    pub reason: Option<Arc<str>>,
    /// Attempt / failure / restart counter, depending on kind.
    pub attempt: Option<u32>,
    /// Delay before the next action in milliseconds.
    pub delay_ms: Option<u32>,
    /// Bound that was exceeded in milliseconds.
    pub timeout_ms: Option<u32>,
    /// Previous aggregate state.
    pub prev_state: Option<SystemState>,
    /// New aggregate state.
    pub state: Option<SystemState>,
    /// Previous probe classification (`None` on the first probe).
    pub prev_health: Option<Health>,
    /// New probe classification.
    pub health: Option<Health>,
}

impl Event {
    /// Stamps a bare event of `kind`; attach metadata with the `with_*` methods.
    pub fn new(kind: EventKind) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
            kind,
            component: None,
            reason: None,
            attempt: None,
            delay_ms: None,
            timeout_ms: None,
            prev_state: None,
            state: None,
            prev_health: None,
            health: None,
        }
    }

    #[inline]
    pub fn with_component(mut self, name: impl Into<Arc<str>>) -> Self {
        self.component = Some(name.into());
        self
    }

    #[inline]
    pub fn with_reason(mut self, reason: impl Into<Arc<str>>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    #[inline]
    pub fn with_attempt(mut self, n: u32) -> Self {
        self.attempt = Some(n);
        self
    }

    /// Attaches a delay (stored as milliseconds, saturating).
    #[inline]
    pub fn with_delay(mut self, d: Duration) -> Self {
        self.delay_ms = Some(clamp_ms(d));
        self
    }

    /// Attaches a timeout (stored as milliseconds, saturating).
    #[inline]
    pub fn with_timeout(mut self, d: Duration) -> Self {
        self.timeout_ms = Some(clamp_ms(d));
        self
    }

    #[inline]
    pub fn with_states(mut self, prev: SystemState, next: SystemState) -> Self {
        self.prev_state = Some(prev);
        self.state = Some(next);
        self
    }

    #[inline]
    pub fn with_health(mut self, prev: Option<Health>, next: Health) -> Self {
        self.prev_health = prev;
        self.health = Some(next);
        self
    }

    /// `reason` is "full" or "closed".
    #[inline]
    pub fn subscriber_overflow(subscriber: &'static str, reason: &'static str) -> Self {
        Event::new(EventKind::SubscriberOverflow)
            .with_component(subscriber)
            .with_reason(reason)
    }

    /// `info` is the rendered panic payload.
    #[inline]
    pub fn subscriber_panicked(subscriber: &'static str, info: String) -> Self {
        Event::new(EventKind::SubscriberPanicked)
            .with_component(subscriber)
            .with_reason(info)
    }
}

fn clamp_ms(d: Duration) -> u32 {
    d.as_millis().min(u128::from(u32::MAX)) as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sequence_is_monotonic() {
        let a = Event::new(EventKind::ShutdownRequested);
        let b = Event::new(EventKind::ShutdownRequested);
        assert!(b.seq > a.seq);
    }

    #[test]
    fn durations_saturate() {
        let ev = Event::new(EventKind::TimeoutHit).with_timeout(Duration::from_secs(u64::MAX));
        assert_eq!(ev.timeout_ms, Some(u32::MAX));
    }

    #[test]
    fn state_change_carries_both_ends() {
        let ev = Event::new(EventKind::SystemStateChanged)
            .with_states(SystemState::Healthy, SystemState::Degraded);
        assert_eq!(ev.prev_state, Some(SystemState::Healthy));
        assert_eq!(ev.state, Some(SystemState::Degraded));
    }
}
