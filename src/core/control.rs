//! # Supervisor-owned mutable state.
//!
//! [`Control`] is everything the state machine mutates: the aggregate state, the
//! component handles, the dependency graph and the recovery ledger. It lives behind
//! the supervisor's control mutex; nothing outside the supervisor can reach it, and
//! readers only ever see it through [`Snapshot`]s built here.

use std::collections::HashMap;
use std::time::SystemTime;

use tokio_util::sync::CancellationToken;

use crate::components::handle::ComponentHandle;
use crate::components::{ComponentState, DependencyGraph};
use crate::core::{Config, ComponentStatus, Snapshot, SystemState};
use crate::events::{Bus, Event, EventKind};
use crate::policies::Recovery;

pub(crate) struct Control {
    pub state: SystemState,
    pub graph: DependencyGraph,
    pub handles: HashMap<String, ComponentHandle>,
    /// Topological start order; refreshed on every (de)registration.
    pub order: Vec<String>,
    pub recovery: Recovery,
    pub started_at: Option<SystemTime>,
    pub restarts: u32,
    pub last_failure: Option<String>,
    /// Cancels the running health monitor, if any.
    pub monitor: Option<CancellationToken>,
    version: u64,
}

impl Control {
    pub fn new(cfg: &Config) -> Self {
        Self {
            state: SystemState::Initializing,
            graph: DependencyGraph::new(),
            handles: HashMap::new(),
            order: Vec::new(),
            recovery: Recovery::new(cfg.recovery),
            started_at: None,
            restarts: 0,
            last_failure: None,
            monitor: None,
            version: 0,
        }
    }

    /// Moves to `next` if the state machine allows it and announces the change.
    ///
    /// Returns `false` (and changes nothing) for an illegal or no-op move.
    pub fn transition(&mut self, next: SystemState, reason: Option<&str>, bus: &Bus) -> bool {
        let prev = self.state;
        if prev == next || !prev.can_transition_to(next) {
            tracing::debug!(from = %prev, to = %next, "transition rejected");
            return false;
        }
        self.state = next;

        let mut ev = Event::new(EventKind::SystemStateChanged).with_states(prev, next);
        if let Some(reason) = reason {
            ev = ev.with_reason(reason);
        }
        bus.publish(ev);
        true
    }

    /// Recomputes Healthy/Degraded from the component states while serving.
    pub fn settle(&mut self, bus: &Bus) {
        if !self.state.is_serving() {
            return;
        }
        let all_healthy = self
            .handles
            .values()
            .all(|h| h.state() == ComponentState::Healthy);
        let target = if all_healthy {
            SystemState::Healthy
        } else {
            SystemState::Degraded
        };
        self.transition(target, None, bus);
    }

    pub fn refresh_order(&mut self) {
        if let Ok(order) = self.graph.topological_order() {
            self.order = order;
        }
    }

    pub fn stop_monitor(&mut self) {
        if let Some(token) = self.monitor.take() {
            token.cancel();
        }
    }

    /// Builds the next snapshot; every call yields a strictly greater version.
    pub fn snapshot(&mut self, cfg: &Config) -> Snapshot {
        self.version += 1;

        let components = self
            .order
            .iter()
            .filter_map(|name| self.handles.get(name).map(|h| (name, h)))
            .map(|(name, h)| {
                let record = self.recovery.record(name);
                ComponentStatus {
                    name: name.clone(),
                    state: h.state(),
                    health: h.health(),
                    last_check: h.last_check(),
                    last_error: h.last_error().map(str::to_string),
                    consecutive_failures: h.consecutive_failures(),
                    recovery_failures: record.map_or(0, |r| r.failures),
                    escalated: record.is_some_and(|r| r.escalated),
                    critical: h.critical(),
                    dependencies: self.graph.dependencies(name).to_vec(),
                }
            })
            .collect();

        Snapshot {
            version: self.version,
            state: self.state,
            components,
            started_at: self.started_at,
            taken_at: SystemTime::now(),
            restarts: self.restarts,
            last_failure: self.last_failure.clone(),
            config: cfg.summary(),
        }
    }
}
