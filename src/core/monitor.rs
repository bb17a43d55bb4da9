//! # Health monitor: periodic probing and retry scheduling.
//!
//! One monitor task runs per serving period (spawned on `Running`, cancelled on
//! `Stopping` or `Failed`). It never mutates state itself: results are handed back
//! to the [`Supervisor`], which applies them under its control lock.
//!
//! ```text
//! loop {
//!   select! {
//!     cancelled                    ─► exit
//!     tick (health_interval)       ─► collect targets ─► probe all concurrently (bounded)
//!                                     ─► Supervisor::apply_pass(results)
//!     sleep_until(next retry due)  ─► spawn Supervisor::run_due_recoveries()
//!     retry task finished          ─► look for the next due retry
//!   }
//!   exit once the system is no longer serving
//! }
//! ```
//!
//! The first tick fires immediately, so the first pass runs right after `Running`.
//! Retries run on their own task; passes keep their cadence while a `start()` hangs,
//! and at most one retry task exists at a time.
//! The monitor holds only a `Weak` reference and exits if the supervisor is dropped.

use std::sync::Weak;
use std::time::Duration;

use futures::future::join_all;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::core::Supervisor;
use crate::core::runner;
use crate::events::Bus;

enum Step {
    Pass,
    Recover,
    Recovered,
}

pub(crate) struct HealthMonitor {
    sup: Weak<Supervisor>,
    interval: Duration,
    check_timeout: Duration,
    bus: Bus,
}

impl HealthMonitor {
    pub fn new(sup: Weak<Supervisor>, interval: Duration, check_timeout: Duration, bus: Bus) -> Self {
        Self {
            sup,
            interval,
            check_timeout,
            bus,
        }
    }

    pub async fn run(self, token: CancellationToken) {
        let mut ticker = time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut retries: Option<JoinHandle<()>> = None;

        loop {
            let due = match self.sup.upgrade() {
                Some(_) if retries.is_some() => None,
                Some(sup) => sup.next_recovery_due().await,
                None => break,
            };
            let retrying = retries.is_some();

            let step = tokio::select! {
                _ = token.cancelled() => break,
                _ = ticker.tick() => Step::Pass,
                _ = time::sleep_until(due.unwrap_or_else(Instant::now)), if due.is_some() => Step::Recover,
                _ = async {
                    if let Some(task) = retries.as_mut() {
                        let _ = task.await;
                    }
                }, if retrying => Step::Recovered,
            };

            let Some(sup) = self.sup.upgrade() else {
                break;
            };
            match step {
                Step::Pass => {
                    let Some(targets) = sup.probe_targets().await else {
                        break;
                    };
                    let bus = &self.bus;
                    let timeout = self.check_timeout;
                    let results = join_all(targets.into_iter().map(|(name, epoch, component)| {
                        async move {
                            let result = runner::probe(component.as_ref(), timeout, bus).await;
                            (name, epoch, result)
                        }
                    }))
                    .await;
                    if !sup.apply_pass(results).await {
                        break;
                    }
                }
                Step::Recover => retries = Some(tokio::spawn(sup.run_due_recoveries())),
                Step::Recovered => retries = None,
            }
        }
        tracing::debug!("health monitor stopped");
    }
}
