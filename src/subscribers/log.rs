//! # LogWriter: renders events through `tracing`
//!
//! Install any `tracing` subscriber (e.g. `tracing_subscriber::fmt`) in the host
//! and attach [`LogWriter`] to the supervisor to get one line per event:
//!
//! ```text
//! INFO  healthvisor: system state changed from=starting to=running
//! INFO  healthvisor: component started component="db"
//! WARN  healthvisor: health changed component="cache" from=Some(Healthy) to=degraded reason="evictions"
//! WARN  healthvisor: recovery scheduled component="cache" failures=1 delay_ms=1000
//! ERROR healthvisor: recovery escalated component="cache" failures=5
//! ```

use async_trait::async_trait;
use tracing::{debug, error, info, warn};

use crate::components::Health;
use crate::core::SystemState;
use crate::events::{Event, EventKind};
use crate::subscribers::Subscribe;

/// Event writer subscriber.
#[derive(Default)]
pub struct LogWriter;

impl LogWriter {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Subscribe for LogWriter {
    async fn on_event(&self, e: &Event) {
        let component = e.component.as_deref().unwrap_or("-");
        let reason = e.reason.as_deref().unwrap_or("");

        match e.kind {
            EventKind::SystemStateChanged => match e.state {
                Some(SystemState::Failed) => {
                    error!(target: "healthvisor", from = ?e.prev_state, to = ?e.state, reason, "system state changed")
                }
                Some(SystemState::Degraded) => {
                    warn!(target: "healthvisor", from = ?e.prev_state, to = ?e.state, reason, "system state changed")
                }
                _ => {
                    info!(target: "healthvisor", from = ?e.prev_state, to = ?e.state, "system state changed")
                }
            },
            EventKind::ShutdownRequested => {
                info!(target: "healthvisor", "shutdown requested")
            }
            EventKind::ComponentRegistered => {
                debug!(target: "healthvisor", component, deps = reason, "component registered")
            }
            EventKind::ComponentDeregistered => {
                debug!(target: "healthvisor", component, "component deregistered")
            }
            EventKind::ComponentStarting => {
                debug!(target: "healthvisor", component, attempt = ?e.attempt, "component starting")
            }
            EventKind::ComponentStarted => {
                info!(target: "healthvisor", component, "component started")
            }
            EventKind::ComponentStartFailed => {
                error!(target: "healthvisor", component, reason, "component failed to start")
            }
            EventKind::ComponentStopped => {
                info!(target: "healthvisor", component, "component stopped")
            }
            EventKind::ComponentStopFailed => {
                warn!(target: "healthvisor", component, reason, "component stop failed")
            }
            EventKind::HealthChanged => match e.health {
                Some(Health::Healthy) => {
                    info!(target: "healthvisor", component, from = ?e.prev_health, "component healthy")
                }
                _ => {
                    warn!(target: "healthvisor", component, from = ?e.prev_health, to = ?e.health, reason, "health changed")
                }
            },
            EventKind::TimeoutHit => {
                warn!(target: "healthvisor", component, op = reason, timeout_ms = ?e.timeout_ms, "timeout hit")
            }
            EventKind::RecoveryScheduled => {
                warn!(target: "healthvisor", component, failures = ?e.attempt, delay_ms = ?e.delay_ms, reason, "recovery scheduled")
            }
            EventKind::RecoveryEscalated => {
                error!(target: "healthvisor", component, failures = ?e.attempt, reason, "recovery escalated")
            }
            EventKind::RestartScheduled => {
                warn!(target: "healthvisor", restart = ?e.attempt, delay_ms = ?e.delay_ms, "system restart scheduled")
            }
            EventKind::RestartsExhausted => {
                error!(target: "healthvisor", restarts = ?e.attempt, "system restarts exhausted")
            }
            EventKind::SubscriberOverflow => {
                warn!(target: "healthvisor", subscriber = component, reason, "subscriber overflow")
            }
            EventKind::SubscriberPanicked => {
                error!(target: "healthvisor", subscriber = component, reason, "subscriber panicked")
            }
        }
    }

    fn name(&self) -> &'static str {
        "LogWriter"
    }
}
