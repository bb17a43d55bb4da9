//! # Aggregate lifecycle state machine.
//!
//! ```text
//!                 start()            all started           first pass
//! Initializing ──────────► Starting ────────────► Running ───────────► Healthy ◄──┐
//!      ▲                      │                      │                   │        │ all recover
//!      │                      │ start fails          └──────────────►  Degraded ──┘
//!      │                      ▼                        any degraded      │
//!      │  reset() / restart  Failed ◄────────────────────────────────────┘ escalation
//!      └──────────────────── Restarting ◄── auto-restart permits ──┘
//!
//! stop() from any non-terminal state ──► Stopping ──► Stopped (terminal)
//! ```
//!
//! Only the [`Supervisor`](crate::Supervisor) moves between states; every move is
//! validated against [`SystemState::can_transition_to`].

use std::fmt;

use serde::Serialize;

/// The supervisor's aggregate lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SystemState {
    /// Components are being registered; nothing runs yet.
    Initializing,
    /// Components are being started in dependency order.
    Starting,
    /// Every component started; waiting for the first health pass.
    Running,
    /// Every component reported Healthy on the last pass.
    Healthy,
    /// At least one component is Degraded or Failed and under recovery.
    Degraded,
    /// Components are being stopped in reverse dependency order.
    Stopping,
    /// Terminal: everything was stopped.
    Stopped,
    /// Startup failed or a component escalated.
    Failed,
    /// The auto-restart policy is cycling the system back to `Initializing`.
    Restarting,
}

impl SystemState {
    /// Returns `true` when `next` is a legal successor of `self`.
    pub fn can_transition_to(self, next: SystemState) -> bool {
        use SystemState::*;

        match (self, next) {
            (Stopped, _) => false,
            (Stopping, Stopped) => true,
            (Stopping, _) => false,
            (_, Stopping) => true,

            (Initializing, Starting) => true,
            (Starting, Running | Failed) => true,
            (Running, Healthy | Degraded) => true,
            (Healthy, Degraded) => true,
            (Degraded, Healthy | Failed) => true,
            (Failed, Restarting | Initializing) => true,
            (Restarting, Initializing | Failed) => true,
            _ => false,
        }
    }

    /// `Running`, `Healthy` or `Degraded`: the health monitor is active.
    pub fn is_serving(self) -> bool {
        matches!(
            self,
            SystemState::Running | SystemState::Healthy | SystemState::Degraded
        )
    }

    /// Returns `true` for states nothing will leave without an external call.
    pub fn is_terminal(self) -> bool {
        matches!(self, SystemState::Stopped | SystemState::Failed)
    }

    /// Returns a short stable label (snake_case).
    pub fn as_label(self) -> &'static str {
        match self {
            SystemState::Initializing => "initializing",
            SystemState::Starting => "starting",
            SystemState::Running => "running",
            SystemState::Healthy => "healthy",
            SystemState::Degraded => "degraded",
            SystemState::Stopping => "stopping",
            SystemState::Stopped => "stopped",
            SystemState::Failed => "failed",
            SystemState::Restarting => "restarting",
        }
    }
}

impl fmt::Display for SystemState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_label())
    }
}
