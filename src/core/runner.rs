//! # Bounded component calls.
//!
//! Every call into a component goes through this module so that no `start`,
//! `stop` or `check_health` can stall the supervisor or the health monitor.
//!
//! ```text
//! start/stop:   timeout(dur, op(child)) ─┬─ Ok(r)      → r
//!                                         └─ elapsed   → child.cancel(), publish TimeoutHit
//!                                                        → Err(ComponentError::Timeout)
//!
//! check_health: timeout(dur, probe())  ──┬─ Ok(r)      → r
//!                                         └─ elapsed   → publish TimeoutHit
//!                                                        → HealthResult::Failed("timeout")
//! ```
//!
//! ## Rules
//! - A **child token** is derived per call; cancelling it on timeout never touches the parent.
//! - `Duration::ZERO` is clamped to 1ms: calls are always bounded.

use std::time::Duration;

use tokio::time;
use tokio_util::sync::CancellationToken;

use crate::{
    components::{Component, HealthResult},
    error::ComponentError,
    events::{Bus, Event, EventKind},
};

const MIN_BOUND: Duration = Duration::from_millis(1);

/// Which lifecycle operation to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Op {
    Start,
    Stop,
}

impl Op {
    fn as_label(self) -> &'static str {
        match self {
            Op::Start => "start",
            Op::Stop => "stop",
        }
    }
}

/// Runs `start` or `stop` on `component`, bounded by `timeout`.
pub(crate) async fn run_bounded<C: Component + ?Sized>(
    component: &C,
    op: Op,
    parent: &CancellationToken,
    timeout: Duration,
    bus: &Bus,
) -> Result<(), ComponentError> {
    let child = parent.child_token();
    let dur = timeout.max(MIN_BOUND);

    let call = async {
        match op {
            Op::Start => component.start(child.clone()).await,
            Op::Stop => component.stop(child.clone()).await,
        }
    };

    match time::timeout(dur, call).await {
        Ok(res) => res,
        Err(_elapsed) => {
            child.cancel();
            publish_timeout(bus, component.name(), op.as_label(), dur);
            Err(ComponentError::Timeout { timeout: dur })
        }
    }
}

/// Probes `component`, mapping an overrun to `Failed("timeout")`.
pub(crate) async fn probe<C: Component + ?Sized>(
    component: &C,
    timeout: Duration,
    bus: &Bus,
) -> HealthResult {
    let dur = timeout.max(MIN_BOUND);
    match time::timeout(dur, component.check_health()).await {
        Ok(res) => res,
        Err(_elapsed) => {
            publish_timeout(bus, component.name(), "check_health", dur);
            HealthResult::timeout()
        }
    }
}

fn publish_timeout(bus: &Bus, name: &str, op: &str, dur: Duration) {
    bus.publish(
        Event::new(EventKind::TimeoutHit)
            .with_component(name)
            .with_timeout(dur)
            .with_reason(op),
    );
}
