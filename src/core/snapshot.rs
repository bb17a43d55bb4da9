//! # Immutable point-in-time view of the supervisor.
//!
//! A [`Snapshot`] is built by the supervisor while it holds its control lock and is
//! then published as a whole through a `tokio::sync::watch` channel. Readers get an
//! `Arc<Snapshot>` and never touch live state, so a snapshot can never mix the
//! component states of two different transitions.
//!
//! `Snapshot` implements `serde::Serialize`; hosts typically expose `state` and the
//! per-component `state` fields in a JSON health endpoint.

use std::time::{Duration, SystemTime};

use serde::Serialize;

use crate::components::{ComponentState, Health};
use crate::core::{ConfigSummary, SystemState};

/// Status of one component inside a [`Snapshot`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ComponentStatus {
    pub name: String,
    pub state: ComponentState,
    /// Classification from the last probe (`None` before the first one).
    pub health: Option<Health>,
    pub last_check: Option<SystemTime>,
    pub last_error: Option<String>,
    /// Consecutive non-healthy probes.
    pub consecutive_failures: u32,
    /// Consecutive failures counted by the recovery policy.
    pub recovery_failures: u32,
    /// Set once the recovery policy gave up on this component.
    pub escalated: bool,
    pub critical: bool,
    pub dependencies: Vec<String>,
}

/// Immutable point-in-time copy of the supervisor state.
#[derive(Clone, Debug, Serialize)]
pub struct Snapshot {
    /// Publication counter; strictly increases with every published snapshot.
    pub version: u64,
    pub state: SystemState,
    /// Components in start order.
    pub components: Vec<ComponentStatus>,
    /// When the current run began (`None` before the first `start()`).
    pub started_at: Option<SystemTime>,
    /// When this snapshot was taken.
    pub taken_at: SystemTime,
    /// Automatic restarts performed so far.
    pub restarts: u32,
    /// Cause of the last transition to `Failed`, if any.
    pub last_failure: Option<String>,
    pub config: ConfigSummary,
}

impl Snapshot {
    /// Looks a component up by name.
    pub fn component(&self, name: &str) -> Option<&ComponentStatus> {
        self.components.iter().find(|c| c.name == name)
    }

    /// State of `name`, if registered.
    pub fn component_state(&self, name: &str) -> Option<ComponentState> {
        self.component(name).map(|c| c.state)
    }

    /// Time since `started_at` measured at `taken_at`.
    pub fn uptime(&self) -> Option<Duration> {
        self.started_at
            .and_then(|s| self.taken_at.duration_since(s).ok())
    }
}
