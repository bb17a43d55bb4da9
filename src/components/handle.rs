//! # Component handle: one managed component plus its observed status.
//!
//! The supervisor owns one [`ComponentHandle`] per registered component and is the
//! only writer of its status. The handle enforces start/stop idempotence and routes
//! every call through the bounded runner.
//!
//! ```text
//!            start() ok + Healthy probe
//! Pending ─► Starting ─────────────────► Healthy ◄──────┐
//!               │ start() err               │ probe      │ probe Healthy
//!               ▼                           ▼            │
//!             Failed ◄──── probe ──────  Degraded ───────┘
//!
//! any started state ── stop() ──► Stopping ──► Stopped
//! ```

use std::time::{Duration, SystemTime};

use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::components::{ComponentRef, Health, HealthResult};
use crate::core::runner::{self, Op};
use crate::error::ComponentError;
use crate::events::Bus;

/// Observed state of a single component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ComponentState {
    /// Registered, never started (or reset for a restart).
    Pending,
    /// `start()` in flight or awaiting its first Healthy probe.
    Starting,
    Healthy,
    Degraded,
    /// Last start or probe failed.
    Failed,
    /// `stop()` in flight.
    Stopping,
    Stopped,
}

impl ComponentState {
    /// `true` for states the health monitor probes.
    pub fn is_observable(self) -> bool {
        matches!(
            self,
            ComponentState::Healthy | ComponentState::Degraded | ComponentState::Failed
        )
    }

    /// `true` when `stop()` has nothing to do.
    pub fn is_down(self) -> bool {
        matches!(self, ComponentState::Pending | ComponentState::Stopped)
    }
}

impl From<Health> for ComponentState {
    fn from(h: Health) -> Self {
        match h {
            Health::Healthy => ComponentState::Healthy,
            Health::Degraded => ComponentState::Degraded,
            Health::Failed => ComponentState::Failed,
        }
    }
}

/// A probe result that changed the component's classification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct HealthChange {
    pub prev: Option<Health>,
    pub next: Health,
}

/// Owned wrapper around one registered component.
pub(crate) struct ComponentHandle {
    component: ComponentRef,
    state: ComponentState,
    health: Option<Health>,
    last_check: Option<SystemTime>,
    last_error: Option<String>,
    consecutive_failures: u32,
    epoch: u64,
}

impl ComponentHandle {
    pub fn new(component: ComponentRef) -> Self {
        Self {
            component,
            state: ComponentState::Pending,
            health: None,
            last_check: None,
            last_error: None,
            consecutive_failures: 0,
            epoch: 0,
        }
    }

    pub fn name(&self) -> &str {
        self.component.name()
    }

    pub fn component(&self) -> ComponentRef {
        self.component.clone()
    }

    pub fn state(&self) -> ComponentState {
        self.state
    }

    pub fn health(&self) -> Option<Health> {
        self.health
    }

    pub fn last_check(&self) -> Option<SystemTime> {
        self.last_check
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    /// Bumped on every real `start()` and `stop()`; results from an older epoch are stale.
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn critical(&self) -> bool {
        self.component.critical()
    }

    /// Invokes `start()` unless the component is already Healthy.
    ///
    /// On success the component stays `Starting` until a probe classifies it.
    pub async fn start(
        &mut self,
        ctx: &CancellationToken,
        timeout: Duration,
        bus: &Bus,
    ) -> Result<(), ComponentError> {
        if self.state == ComponentState::Healthy {
            return Ok(());
        }
        self.begin_start();

        let res = runner::run_bounded(self.component.as_ref(), Op::Start, ctx, timeout, bus).await;
        if let Err(e) = &res {
            self.fail_start(e);
        }
        res
    }

    /// Marks a start as in flight and returns its epoch.
    ///
    /// For a `start()` issued outside the handle (recovery retries).
    pub fn begin_start(&mut self) -> u64 {
        self.state = ComponentState::Starting;
        self.epoch += 1;
        self.epoch
    }

    /// Records a failed `start()`.
    pub fn fail_start(&mut self, error: &ComponentError) {
        self.state = ComponentState::Failed;
        self.health = Some(Health::Failed);
        self.last_error = Some(error.to_string());
    }

    /// Invokes `stop()` unless the component is already down.
    ///
    /// Returns `None` when there was nothing to stop. The component ends `Stopped`
    /// whatever the outcome; an error is kept as `last_error`.
    pub async fn stop(
        &mut self,
        ctx: &CancellationToken,
        timeout: Duration,
        bus: &Bus,
    ) -> Option<Result<(), ComponentError>> {
        if self.state.is_down() {
            return None;
        }
        self.state = ComponentState::Stopping;
        self.epoch += 1;

        let res = runner::run_bounded(self.component.as_ref(), Op::Stop, ctx, timeout, bus).await;
        if let Err(e) = &res {
            self.last_error = Some(e.to_string());
        }
        self.state = ComponentState::Stopped;
        self.health = None;
        Some(res)
    }

    /// Probes the component with a bound.
    pub async fn probe(&self, timeout: Duration, bus: &Bus) -> HealthResult {
        runner::probe(self.component.as_ref(), timeout, bus).await
    }

    /// Applies a probe result. Returns the change if the classification moved.
    pub fn observe(&mut self, result: &HealthResult) -> Option<HealthChange> {
        let next = result.class();
        let prev = self.health;

        self.last_check = Some(SystemTime::now());
        self.health = Some(next);
        self.state = next.into();
        match result.reason() {
            Some(reason) => {
                self.consecutive_failures = self.consecutive_failures.saturating_add(1);
                self.last_error = Some(reason.to_string());
            }
            None => self.consecutive_failures = 0,
        }

        (prev != Some(next)).then_some(HealthChange { prev, next })
    }

    /// Back to `Pending` for a fresh startup cycle.
    pub fn reset(&mut self) {
        self.state = ComponentState::Pending;
        self.health = None;
        self.last_error = None;
        self.consecutive_failures = 0;
    }
}
