//! # Supervisor: owns the component set, drives the state machine, publishes snapshots.
//!
//! The [`Supervisor`] is the single writer of every piece of lifecycle state. All
//! transitions happen while holding one control lock; after each one a fresh
//! [`Snapshot`] is built and published through a `watch` channel, so readers never
//! contend with writers and never observe a half-applied transition.
//!
//! ## Architecture
//! ```text
//! register / register_all / deregister        (Initializing only)
//!         │
//!         ▼
//!   DependencyGraph ──► topological order
//!         │
//! start() ─► Starting
//!         │   for each component in order:
//!         │     ComponentStarting ─► start(ctx) (bounded) ─► readiness gate (probe until Healthy)
//!         │       ├─ ok   ─► ComponentStarted, next
//!         │       └─ err  ─► stop started ones (reverse), Failed, StartupError
//!         ▼
//!      Running ─► spawn HealthMonitor
//!                    │ every health_interval: probe all (concurrently, bounded)
//!                    │   └─► apply: HealthChanged / RecoveryScheduled / RecoveryEscalated
//!                    │        └─► Healthy | Degraded | Failed (critical escalation)
//!                    └ when a retry is due: retry task ─► start(ctx) again + one probe
//!                                             (outside the control lock, one at a time)
//!
//! Failed ─► RestartPolicy permits? ─► Restarting ─► (backoff) ─► Initializing ─► start again
//!                                   └► exhausted ─► Failed
//!
//! stop() ─► cancel runtime token ─► Stopping ─► stop every started component in
//!           reverse order (bounded, errors collected) ─► Stopped
//! ```
//!
//! ## Rules
//! - Registration is closed once the system leaves `Initializing`.
//! - Each component is started at most once per startup cycle and stopped at most
//!   once per shutdown.
//! - A probe or retry result whose component was restarted or stopped meanwhile is
//!   discarded.
//! - A retry never holds the control lock across the component call, so snapshots,
//!   monitor passes and `stop()` are never stuck behind it.
//! - `stop()` never fails; per-component errors are returned in the [`StopReport`].

use std::sync::Arc;
use std::time::{Duration, SystemTime};

use tokio::sync::{Mutex, broadcast, watch};
use tokio::task::JoinHandle;
use tokio::time::{self, Instant};
use tokio_util::sync::CancellationToken;

use crate::components::handle::{ComponentHandle, HealthChange};
use crate::components::{ComponentRef, Health, HealthResult};
use crate::core::control::Control;
use crate::core::monitor::HealthMonitor;
use crate::core::runner::{self, Op};
use crate::core::{Config, Snapshot, SupervisorBuilder, SystemState, shutdown};
use crate::error::{ComponentError, RegistrationError, StartupError, SupervisorError};
use crate::events::{Bus, Event, EventKind};
use crate::policies::RecoveryAction;
use crate::subscribers::SubscriberSet;

/// Outcome of [`Supervisor::stop`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StopReport {
    /// Components whose `stop()` was invoked, in invocation order.
    pub attempted: Vec<String>,
    /// Components whose `stop()` failed or timed out.
    pub failures: Vec<(String, ComponentError)>,
}

impl StopReport {
    /// `true` when every stop succeeded.
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Forwards bus events to the [`SubscriberSet`] until closed.
pub(crate) struct Listener {
    drain: CancellationToken,
    task: JoinHandle<()>,
}

impl Listener {
    /// Subscribes to `bus` right away and spawns the forwarding task.
    pub(crate) fn spawn(bus: &Bus, set: SubscriberSet) -> Self {
        let mut rx = bus.subscribe();
        let drain = CancellationToken::new();
        let closing = drain.clone();

        let task = tokio::spawn(async move {
            loop {
                tokio::select! {
                    biased;
                    res = rx.recv() => match res {
                        Ok(ev) => set.emit(&ev),
                        Err(broadcast::error::RecvError::Lagged(skipped)) => {
                            tracing::warn!(skipped, "subscriber listener lagged behind the bus");
                        }
                        Err(broadcast::error::RecvError::Closed) => break,
                    },
                    _ = closing.cancelled() => {
                        // hand over whatever is still buffered
                        loop {
                            match rx.try_recv() {
                                Ok(ev) => set.emit(&ev),
                                Err(broadcast::error::TryRecvError::Lagged(_)) => continue,
                                Err(_) => break,
                            }
                        }
                        break;
                    }
                }
            }
            set.shutdown().await;
        });

        Self { drain, task }
    }

    async fn close(self) {
        self.drain.cancel();
        if let Err(e) = self.task.await {
            tracing::warn!(error = %e, "subscriber listener ended abnormally");
        }
    }
}

/// One claimed recovery attempt; runs without the control lock.
struct Retry {
    name: String,
    epoch: u64,
    attempt: u32,
    component: ComponentRef,
    ctx: CancellationToken,
}

/// Process lifecycle and health orchestrator.
pub struct Supervisor {
    cfg: Config,
    bus: Bus,
    listener: Mutex<Option<Listener>>,
    control: Mutex<Control>,
    /// Held for the whole of a retry; taken before `control` by anything that must
    /// not overlap one (stop, reset, restart).
    retry_gate: Mutex<()>,
    snapshots: watch::Sender<Arc<Snapshot>>,
    /// Cancelled by `stop()`; parent of every component context and of the monitor.
    shutdown: CancellationToken,
}

impl Supervisor {
    /// Creates a builder for a supervisor with the given configuration.
    pub fn builder(cfg: Config) -> SupervisorBuilder {
        SupervisorBuilder::new(cfg)
    }

    pub(crate) fn new_internal(cfg: Config, bus: Bus, listener: Listener) -> Self {
        let mut control = Control::new(&cfg);
        let (snapshots, _) = watch::channel(Arc::new(control.snapshot(&cfg)));

        Self {
            cfg,
            bus,
            listener: Mutex::new(Some(listener)),
            control: Mutex::new(control),
            retry_gate: Mutex::new(()),
            snapshots,
            shutdown: CancellationToken::new(),
        }
    }

    /// Configuration the supervisor was built with.
    pub fn config(&self) -> &Config {
        &self.cfg
    }

    /// Registers a component with the names of the components it depends on.
    pub async fn register(
        &self,
        component: ComponentRef,
        deps: &[&str],
    ) -> Result<(), RegistrationError> {
        let deps = deps.iter().map(|d| d.to_string()).collect();
        self.register_all(vec![(component, deps)]).await
    }

    /// Registers a batch atomically: either every component is added or none is.
    ///
    /// Dependencies may point at components registered earlier or anywhere in the batch.
    pub async fn register_all(
        &self,
        batch: Vec<(ComponentRef, Vec<String>)>,
    ) -> Result<(), RegistrationError> {
        let mut ctl = self.control.lock().await;
        if ctl.state != SystemState::Initializing {
            return Err(RegistrationError::Sealed { state: ctl.state });
        }

        let entries: Vec<(String, Vec<String>)> = batch
            .iter()
            .map(|(c, deps)| (c.name().to_string(), deps.clone()))
            .collect();
        ctl.graph.insert_all(&entries)?;

        for (component, deps) in batch {
            let name = component.name().to_string();
            let mut ev = Event::new(EventKind::ComponentRegistered).with_component(name.as_str());
            if !deps.is_empty() {
                ev = ev.with_reason(format!("depends on {}", deps.join(", ")));
            }
            self.bus.publish(ev);
            ctl.handles.insert(name, ComponentHandle::new(component));
        }
        ctl.refresh_order();
        self.publish(&mut ctl);
        Ok(())
    }

    /// Removes a component nothing depends on. Only valid before `start()`.
    pub async fn deregister(&self, name: &str) -> Result<(), RegistrationError> {
        let mut ctl = self.control.lock().await;
        if ctl.state != SystemState::Initializing {
            return Err(RegistrationError::Sealed { state: ctl.state });
        }

        ctl.graph.remove(name)?;
        ctl.handles.remove(name);
        ctl.recovery.forget(name);
        ctl.refresh_order();

        self.bus
            .publish(Event::new(EventKind::ComponentDeregistered).with_component(name));
        self.publish(&mut ctl);
        Ok(())
    }

    /// Starts every component in dependency order, gating each on a Healthy probe.
    ///
    /// Returns once the system is `Running`. Calling it again while the system is
    /// starting or serving is a no-op. On failure every component that was already
    /// started is stopped in reverse order and the system ends `Failed`.
    pub async fn start(self: &Arc<Self>) -> Result<(), SupervisorError> {
        let mut ctl = self.control.lock().await;
        match ctl.state {
            SystemState::Initializing => {}
            s if s == SystemState::Starting || s.is_serving() => return Ok(()),
            state => return Err(SupervisorError::InvalidState { op: "start", state }),
        }

        let res = self.boot(&mut ctl).await;
        if res.is_err() {
            self.publish(&mut ctl);
        }
        res
    }

    /// Stops every started component in reverse dependency order.
    ///
    /// Valid from any state; the first call cancels the runtime token so that an
    /// in-flight startup or restart backs off. Later calls return an empty report.
    pub async fn stop(&self) -> StopReport {
        if !self.shutdown.is_cancelled() {
            self.bus.publish(Event::new(EventKind::ShutdownRequested));
            self.shutdown.cancel();
        }

        // an in-flight retry sees the cancellation and returns within start_timeout
        let _gate = self.retry_gate.lock().await;
        let mut ctl = self.control.lock().await;
        if ctl.state == SystemState::Stopped {
            return StopReport::default();
        }

        ctl.stop_monitor();
        ctl.transition(SystemState::Stopping, None, &self.bus);
        self.publish(&mut ctl);

        let report = self.stop_components(&mut ctl).await;
        ctl.transition(SystemState::Stopped, None, &self.bus);
        self.publish(&mut ctl);
        report
    }

    /// Returns a `Failed` system to `Initializing` so it can be started again.
    ///
    /// Components still running are stopped first; recovery records and restart
    /// counters are cleared and registration reopens.
    pub async fn reset(&self) -> Result<(), SupervisorError> {
        let _gate = self.retry_gate.lock().await;
        let mut ctl = self.control.lock().await;
        if ctl.state != SystemState::Failed {
            return Err(SupervisorError::InvalidState {
                op: "reset",
                state: ctl.state,
            });
        }

        self.stop_components(&mut ctl).await;
        self.rewind(&mut ctl);
        ctl.restarts = 0;
        ctl.last_failure = None;
        ctl.transition(SystemState::Initializing, Some("reset"), &self.bus);
        self.publish(&mut ctl);
        Ok(())
    }

    /// Latest published snapshot. Never blocks on an in-progress transition.
    pub fn snapshot(&self) -> Arc<Snapshot> {
        self.snapshots.borrow().clone()
    }

    /// Receiver that is notified on every published snapshot.
    pub fn watch(&self) -> watch::Receiver<Arc<Snapshot>> {
        self.snapshots.subscribe()
    }

    /// Current aggregate state (from the latest snapshot).
    pub fn state(&self) -> SystemState {
        self.snapshots.borrow().state
    }

    /// Raw event stream.
    pub fn events(&self) -> broadcast::Receiver<Event> {
        self.bus.subscribe()
    }

    /// Delivers every event published so far to the subscribers, then stops their
    /// workers. Later events still reach [`events`](Self::events) receivers.
    ///
    /// Call after [`stop`](Self::stop) so the final log lines are not lost on exit.
    pub async fn close_subscribers(&self) {
        let listener = self.listener.lock().await.take();
        if let Some(listener) = listener {
            listener.close().await;
        }
    }

    /// Starts the system, then blocks until a termination signal arrives or the
    /// system settles in a terminal state, stops it and drains the subscribers.
    pub async fn run_until_signal(self: &Arc<Self>) -> Result<StopReport, SupervisorError> {
        self.start().await?;

        let mut rx = self.watch();
        let terminal = async move {
            let _ = rx.wait_for(|s| s.state.is_terminal()).await;
        };
        tokio::pin!(terminal);

        tokio::select! {
            res = shutdown::wait_for_shutdown_signal() => match res {
                Ok(signal) => tracing::info!(signal, "shutdown signal received"),
                Err(e) => {
                    tracing::warn!(error = %e, "signal handlers unavailable");
                    (&mut terminal).await;
                }
            },
            _ = &mut terminal => {}
        }

        let report = self.stop().await;
        self.close_subscribers().await;
        Ok(report)
    }

    // ---- health monitor entry points ----

    /// `(name, epoch, component)` for every observable component, or `None` once the
    /// system is no longer serving.
    pub(crate) async fn probe_targets(&self) -> Option<Vec<(String, u64, ComponentRef)>> {
        let ctl = self.control.lock().await;
        if !ctl.state.is_serving() {
            return None;
        }
        let targets = ctl
            .order
            .iter()
            .filter_map(|name| ctl.handles.get(name))
            .filter(|h| h.state().is_observable())
            .map(|h| (h.name().to_string(), h.epoch(), h.component()))
            .collect();
        Some(targets)
    }

    pub(crate) async fn next_recovery_due(&self) -> Option<Instant> {
        self.control.lock().await.recovery.next_due()
    }

    /// Applies one pass of probe results. Returns `false` once the system stopped serving.
    pub(crate) async fn apply_pass(
        self: &Arc<Self>,
        results: Vec<(String, u64, HealthResult)>,
    ) -> bool {
        let mut ctl = self.control.lock().await;
        if !ctl.state.is_serving() {
            return false;
        }

        let now = Instant::now();
        let mut escalation = None;
        for (name, epoch, result) in results {
            let Some(handle) = ctl.handles.get_mut(&name) else {
                continue;
            };
            // restarted or stopped since the probe was issued
            if handle.epoch() != epoch || !handle.state().is_observable() {
                continue;
            }
            let critical = handle.critical();
            let Some(change) = handle.observe(&result) else {
                continue;
            };
            self.publish_health_change(&name, &change, result.reason());

            if change.next == Health::Healthy {
                if ctl.recovery.on_success(&name) {
                    tracing::info!(component = %name, "component recovered");
                }
            } else {
                let reason = result.reason().unwrap_or_default();
                if let Some(cause) = self.on_component_failure(&mut ctl, &name, critical, reason, now) {
                    escalation.get_or_insert(cause);
                }
            }
        }

        self.conclude(&mut ctl, escalation).await
    }

    /// Retries every component whose window elapsed, in start order, one at a time.
    ///
    /// Runs on its own task so that a slow `start()` never delays a monitor pass.
    pub(crate) async fn run_due_recoveries(self: Arc<Self>) {
        loop {
            let _gate = self.retry_gate.lock().await;
            let Some(retry) = self.claim_retry().await else {
                break;
            };
            let outcome = self.attempt_retry(&retry).await;
            if !self.finish_retry(retry, outcome).await {
                break;
            }
        }
    }

    /// Picks the first due component and marks its restart in flight.
    async fn claim_retry(&self) -> Option<Retry> {
        let mut ctl = self.control.lock().await;
        if !ctl.state.is_serving() || self.shutdown.is_cancelled() {
            return None;
        }

        let due = ctl.recovery.due(Instant::now());
        let name = ctl.order.iter().find(|n| due.contains(n))?.clone();
        ctl.recovery.begin_retry(&name);
        let attempt = ctl.recovery.failures(&name).saturating_add(1);
        // escalation cancels the monitor and with it the retry
        let ctx = match &ctl.monitor {
            Some(monitor) => monitor.child_token(),
            None => self.shutdown.child_token(),
        };

        let handle = ctl.handles.get_mut(&name)?;
        let epoch = handle.begin_start();
        let component = handle.component();

        tracing::info!(component = %name, attempt, "retrying component");
        self.bus.publish(
            Event::new(EventKind::ComponentStarting)
                .with_component(name.as_str())
                .with_attempt(attempt),
        );
        self.publish(&mut ctl);

        Some(Retry {
            name,
            epoch,
            attempt,
            component,
            ctx,
        })
    }

    /// `start()` plus a single readiness probe, with no lock held.
    async fn attempt_retry(&self, retry: &Retry) -> Result<HealthResult, ComponentError> {
        runner::run_bounded(
            retry.component.as_ref(),
            Op::Start,
            &retry.ctx,
            self.cfg.start_timeout(),
            &self.bus,
        )
        .await?;
        Ok(self
            .await_ready(&retry.component, &retry.ctx, Duration::ZERO)
            .await)
    }

    /// Applies a retry outcome. Returns `false` once the system stopped serving.
    async fn finish_retry(
        self: &Arc<Self>,
        retry: Retry,
        outcome: Result<HealthResult, ComponentError>,
    ) -> bool {
        let mut ctl = self.control.lock().await;
        // a start cut short by stop() is not a component failure
        if !ctl.state.is_serving() || self.shutdown.is_cancelled() {
            return false;
        }
        let Some(handle) = ctl.handles.get_mut(&retry.name) else {
            return true;
        };
        if handle.epoch() != retry.epoch {
            tracing::debug!(component = %retry.name, attempt = retry.attempt, "stale retry result dropped");
            return true;
        }

        let critical = handle.critical();
        let res = match outcome {
            Ok(result) => self.apply_readiness(handle, &retry.name, &result),
            Err(error) => {
                handle.fail_start(&error);
                Err(self.start_failed(&retry.name, error))
            }
        };

        let escalation = match res {
            Ok(()) => {
                ctl.recovery.on_success(&retry.name);
                None
            }
            Err(e) => {
                let reason = e.to_string();
                self.on_component_failure(&mut ctl, &retry.name, critical, &reason, Instant::now())
            }
        };
        self.conclude(&mut ctl, escalation).await
    }

    // ---- internals ----

    /// Builds and publishes a snapshot of `ctl`.
    fn publish(&self, ctl: &mut Control) {
        let snap = ctl.snapshot(&self.cfg);
        self.snapshots.send_replace(Arc::new(snap));
    }

    /// One startup cycle from `Initializing`.
    ///
    /// Leaves the system `Running` on success and `Failed` on a component error;
    /// on cancellation the state is left for `stop()` to take over. Does not publish
    /// the final failure snapshot so the caller can fold a restart decision into it.
    async fn boot(self: &Arc<Self>, ctl: &mut Control) -> Result<(), SupervisorError> {
        let order = ctl.graph.topological_order().map_err(RegistrationError::from)?;
        ctl.order = order.clone();
        ctl.started_at = Some(SystemTime::now());
        ctl.transition(SystemState::Starting, None, &self.bus);
        self.publish(ctl);

        for name in &order {
            let res = if self.shutdown.is_cancelled() {
                Err(StartupError::Cancelled)
            } else {
                self.start_one(ctl, name, self.cfg.ready_timeout).await
            };
            match res {
                Ok(()) => self.publish(ctl),
                Err(e) => return Err(self.abort_startup(ctl, e).await.into()),
            }
        }

        ctl.transition(SystemState::Running, None, &self.bus);
        self.spawn_monitor(ctl);
        self.publish(ctl);
        Ok(())
    }

    async fn abort_startup(&self, ctl: &mut Control, err: StartupError) -> StartupError {
        if self.shutdown.is_cancelled() {
            // stop() is waiting on the lock and takes over from here
            return StartupError::Cancelled;
        }
        tracing::error!(error = %err, "startup failed");

        self.stop_components(ctl).await;
        let cause = err.to_string();
        ctl.transition(SystemState::Failed, Some(cause.as_str()), &self.bus);
        ctl.last_failure = Some(cause);
        err
    }

    /// Starts `name` and waits up to `ready_window` for a Healthy probe.
    async fn start_one(
        &self,
        ctl: &mut Control,
        name: &str,
        ready_window: Duration,
    ) -> Result<(), StartupError> {
        let Some(handle) = ctl.handles.get_mut(name) else {
            return Ok(());
        };
        self.bus.publish(
            Event::new(EventKind::ComponentStarting)
                .with_component(name)
                .with_attempt(1),
        );

        if let Err(error) = handle
            .start(&self.shutdown, self.cfg.start_timeout(), &self.bus)
            .await
        {
            return Err(self.start_failed(name, error));
        }

        let component = handle.component();
        let result = self.await_ready(&component, &self.shutdown, ready_window).await;
        self.apply_readiness(handle, name, &result)
    }

    /// Probes until Healthy, the window lapses, or `ctx` is cancelled, and returns
    /// the last result. `Duration::ZERO` means a single probe.
    async fn await_ready(
        &self,
        component: &ComponentRef,
        ctx: &CancellationToken,
        window: Duration,
    ) -> HealthResult {
        let deadline = Instant::now() + window;
        let poll = self.cfg.ready_poll();

        loop {
            let result = runner::probe(component.as_ref(), self.cfg.check_timeout(), &self.bus).await;
            if result.is_healthy() || Instant::now() + poll > deadline {
                return result;
            }
            tokio::select! {
                _ = ctx.cancelled() => return result,
                _ = time::sleep(poll) => {}
            }
        }
    }

    /// Records the readiness probe as the component's classification.
    ///
    /// A Degraded probe leaves the component Degraded; only the start attempt fails.
    fn apply_readiness(
        &self,
        handle: &mut ComponentHandle,
        name: &str,
        result: &HealthResult,
    ) -> Result<(), StartupError> {
        if let Some(change) = handle.observe(result).filter(|c| c.prev.is_some()) {
            self.publish_health_change(name, &change, result.reason());
        }
        if result.is_healthy() {
            self.bus
                .publish(Event::new(EventKind::ComponentStarted).with_component(name));
            return Ok(());
        }

        let reason = result.reason().unwrap_or("not healthy").to_string();
        self.bus.publish(
            Event::new(EventKind::ComponentStartFailed)
                .with_component(name)
                .with_reason(reason.as_str()),
        );
        Err(StartupError::NotReady {
            name: name.to_string(),
            reason,
        })
    }

    fn start_failed(&self, name: &str, error: ComponentError) -> StartupError {
        self.bus.publish(
            Event::new(EventKind::ComponentStartFailed)
                .with_component(name)
                .with_reason(error.to_string()),
        );
        StartupError::Component {
            name: name.to_string(),
            error,
        }
    }

    /// Stops every started component in reverse start order.
    ///
    /// Publishes nothing: callers publish once the surrounding transition is complete.
    async fn stop_components(&self, ctl: &mut Control) -> StopReport {
        // the runtime token may already be cancelled; stop gets a fresh context
        let ctx = CancellationToken::new();
        let mut report = StopReport::default();
        let order: Vec<String> = ctl.order.iter().rev().cloned().collect();

        for name in order {
            let Some(handle) = ctl.handles.get_mut(&name) else {
                continue;
            };
            let Some(res) = handle.stop(&ctx, self.cfg.stop_timeout(), &self.bus).await else {
                continue;
            };
            report.attempted.push(name.clone());

            match res {
                Ok(()) => self
                    .bus
                    .publish(Event::new(EventKind::ComponentStopped).with_component(name.as_str())),
                Err(error) => {
                    tracing::warn!(component = %name, error = %error, "component stop failed");
                    self.bus.publish(
                        Event::new(EventKind::ComponentStopFailed)
                            .with_component(name.as_str())
                            .with_reason(error.to_string()),
                    );
                    report.failures.push((name, error));
                }
            }
        }
        report
    }

    /// Feeds one failure into the recovery ledger.
    ///
    /// Returns the failure cause when a critical component just escalated.
    fn on_component_failure(
        &self,
        ctl: &mut Control,
        name: &str,
        critical: bool,
        reason: &str,
        now: Instant,
    ) -> Option<String> {
        if ctl.recovery.record(name).is_some_and(|r| r.escalated) {
            return None;
        }

        match ctl.recovery.on_failure(name, now) {
            RecoveryAction::Retry { after } => {
                self.bus.publish(
                    Event::new(EventKind::RecoveryScheduled)
                        .with_component(name)
                        .with_attempt(ctl.recovery.failures(name))
                        .with_delay(after)
                        .with_reason(reason),
                );
                None
            }
            RecoveryAction::Escalate => {
                let failures = ctl.recovery.failures(name);
                tracing::error!(component = %name, failures, critical, "component escalated");
                self.bus.publish(
                    Event::new(EventKind::RecoveryEscalated)
                        .with_component(name)
                        .with_attempt(failures)
                        .with_reason(reason),
                );
                critical.then(|| format!("component {name:?} escalated after {failures} failures"))
            }
        }
    }

    /// Settles the aggregate state after a monitor step and publishes it.
    async fn conclude(self: &Arc<Self>, ctl: &mut Control, escalation: Option<String>) -> bool {
        ctl.settle(&self.bus);
        if let Some(cause) = escalation {
            self.fail_system(ctl, cause).await;
        }
        self.publish(ctl);
        ctl.state.is_serving()
    }

    /// Escalates the whole system to `Failed`, stops every component and hands over
    /// to the restart policy.
    async fn fail_system(self: &Arc<Self>, ctl: &mut Control, cause: String) {
        if matches!(ctl.state, SystemState::Running | SystemState::Healthy) {
            ctl.transition(SystemState::Degraded, None, &self.bus);
        }
        ctl.transition(SystemState::Failed, Some(cause.as_str()), &self.bus);
        ctl.last_failure = Some(cause);
        ctl.stop_monitor();
        self.stop_components(ctl).await;
        self.schedule_restart(ctl);
    }

    /// Moves a `Failed` system to `Restarting` and arms the delayed restart, or
    /// back to `Failed` once the policy is exhausted.
    fn schedule_restart(self: &Arc<Self>, ctl: &mut Control) {
        let policy = self.cfg.restart;
        if !policy.is_enabled() || self.shutdown.is_cancelled() {
            return;
        }
        if !ctl.transition(SystemState::Restarting, None, &self.bus) {
            return;
        }

        if !policy.permits(ctl.restarts) {
            tracing::error!(restarts = ctl.restarts, "restart policy exhausted");
            self.bus
                .publish(Event::new(EventKind::RestartsExhausted).with_attempt(ctl.restarts));
            ctl.transition(SystemState::Failed, Some("restarts exhausted"), &self.bus);
            return;
        }

        let attempt = ctl.restarts.saturating_add(1);
        let delay = self.cfg.restart_backoff.delay_for(attempt);
        self.bus.publish(
            Event::new(EventKind::RestartScheduled)
                .with_attempt(attempt)
                .with_delay(delay),
        );

        let sup = Arc::downgrade(self);
        let token = self.shutdown.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = token.cancelled() => return,
                _ = time::sleep(delay) => {}
            }
            if let Some(sup) = sup.upgrade() {
                sup.restart_cycle().await;
            }
        });
    }

    async fn restart_cycle(self: &Arc<Self>) {
        let _gate = self.retry_gate.lock().await;
        let mut ctl = self.control.lock().await;
        if ctl.state != SystemState::Restarting || self.shutdown.is_cancelled() {
            return;
        }

        self.stop_components(&mut ctl).await;
        ctl.restarts = ctl.restarts.saturating_add(1);
        self.rewind(&mut ctl);
        ctl.transition(SystemState::Initializing, Some("restart"), &self.bus);
        self.publish(&mut ctl);

        if self.boot(&mut ctl).await.is_err() {
            self.schedule_restart(&mut ctl);
            self.publish(&mut ctl);
        }
    }

    /// Clears per-cycle bookkeeping before a fresh startup.
    fn rewind(&self, ctl: &mut Control) {
        ctl.recovery.clear();
        ctl.started_at = None;
        for handle in ctl.handles.values_mut() {
            handle.reset();
        }
    }

    fn spawn_monitor(self: &Arc<Self>, ctl: &mut Control) {
        ctl.stop_monitor();
        let token = self.shutdown.child_token();
        ctl.monitor = Some(token.clone());

        let monitor = HealthMonitor::new(
            Arc::downgrade(self),
            self.cfg.health_interval(),
            self.cfg.check_timeout(),
            self.bus.clone(),
        );
        tokio::spawn(monitor.run(token));
    }

    fn publish_health_change(&self, name: &str, change: &HealthChange, reason: Option<&str>) {
        let mut ev = Event::new(EventKind::HealthChanged)
            .with_component(name)
            .with_health(change.prev, change.next);
        if let Some(reason) = reason {
            ev = ev.with_reason(reason);
        }
        self.bus.publish(ev);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex as StdMutex;
    use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

    use async_trait::async_trait;

    use crate::components::{ComponentFn, ComponentState};
    use crate::policies::{BackoffPolicy, RecoveryPolicy, RestartPolicy};
    use crate::subscribers::Subscribe;

    type Journal = Arc<StdMutex<Vec<String>>>;

    fn journal() -> Journal {
        Arc::new(StdMutex::new(Vec::new()))
    }

    fn entries(j: &Journal) -> Vec<String> {
        j.lock().unwrap().clone()
    }

    fn count(j: &Journal, entry: &str) -> usize {
        j.lock().unwrap().iter().filter(|e| *e == entry).count()
    }

    /// Health a fake component reports on its next check.
    #[derive(Clone)]
    struct Gauge(Arc<StdMutex<HealthResult>>);

    impl Gauge {
        fn healthy() -> Self {
            Self(Arc::new(StdMutex::new(HealthResult::Healthy)))
        }

        fn set(&self, r: HealthResult) {
            *self.0.lock().unwrap() = r;
        }

        fn get(&self) -> HealthResult {
            self.0.lock().unwrap().clone()
        }
    }

    /// Component that journals `start:<name>` / `stop:<name>` and reports `gauge`.
    fn fake(name: &'static str, journal: &Journal, gauge: &Gauge) -> ComponentFn {
        let (on_start, on_stop, gauge) = (journal.clone(), journal.clone(), gauge.clone());
        ComponentFn::builder(name)
            .on_start(move |_ctx| {
                let j = on_start.clone();
                async move {
                    j.lock().unwrap().push(format!("start:{name}"));
                    Ok::<_, ComponentError>(())
                }
            })
            .on_stop(move |_ctx| {
                let j = on_stop.clone();
                async move {
                    j.lock().unwrap().push(format!("stop:{name}"));
                    Ok::<_, ComponentError>(())
                }
            })
            .on_check(move || {
                let r = gauge.get();
                async move { r }
            })
    }

    fn test_config() -> Config {
        Config {
            health_interval: Duration::from_secs(10),
            check_timeout: Duration::from_secs(1),
            start_timeout: Duration::from_secs(5),
            stop_timeout: Duration::from_secs(5),
            ready_timeout: Duration::from_secs(2),
            ready_poll: Duration::from_millis(100),
            recovery: RecoveryPolicy {
                backoff: BackoffPolicy::exponential(Duration::from_secs(1), Duration::from_secs(8)),
                max_failures: 3,
            },
            ..Config::default()
        }
    }

    fn deps(names: &[&str]) -> Vec<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    async fn wait_until<F>(sup: &Supervisor, within: Duration, pred: F) -> Arc<Snapshot>
    where
        F: FnMut(&Arc<Snapshot>) -> bool,
    {
        let mut rx = sup.watch();
        let seen = time::timeout(within, rx.wait_for(pred))
            .await
            .unwrap_or_else(|_| panic!("condition not reached within {within:?}: {:?}", sup.snapshot()))
            .unwrap();
        Arc::clone(&seen)
    }

    async fn wait_for_state(sup: &Supervisor, want: SystemState, within: Duration) -> Arc<Snapshot> {
        wait_until(sup, within, |s| s.state == want).await
    }

    #[tokio::test]
    async fn starts_in_dependency_order_and_stops_in_reverse() {
        let j = journal();
        let ok = Gauge::healthy();
        let sup = Supervisor::builder(test_config()).build();
        let mut events = sup.events();

        let c: ComponentRef = fake("c", &j, &ok).arc();
        let b: ComponentRef = fake("b", &j, &ok).arc();
        let a: ComponentRef = fake("a", &j, &ok).arc();
        sup.register_all(vec![(c, deps(&["b"])), (b, deps(&["a"])), (a, vec![])])
            .await
            .unwrap();

        sup.start().await.unwrap();
        assert_eq!(entries(&j), vec!["start:a", "start:b", "start:c"]);
        assert!(sup.state().is_serving());

        let mut started = Vec::new();
        while let Ok(ev) = events.try_recv() {
            if ev.kind == EventKind::ComponentStarted {
                started.push(ev.component.as_deref().unwrap_or_default().to_string());
            }
        }
        assert_eq!(started, vec!["a", "b", "c"]);

        let report = sup.stop().await;
        assert!(report.is_clean());
        assert_eq!(report.attempted, vec!["c", "b", "a"]);
        assert_eq!(
            entries(&j)[3..],
            ["stop:c".to_string(), "stop:b".to_string(), "stop:a".to_string()]
        );
        assert_eq!(sup.state(), SystemState::Stopped);
    }

    #[tokio::test]
    async fn failed_start_aborts_remaining_and_cleans_up() {
        let j = journal();
        let ok = Gauge::healthy();
        let sup = Supervisor::builder(test_config()).build();

        let b = fake("b", &j, &ok)
            .on_start(|_ctx| async { Err(ComponentError::fail("port in use")) })
            .arc();
        sup.register(fake("a", &j, &ok).arc(), &[]).await.unwrap();
        sup.register(b, &["a"]).await.unwrap();
        sup.register(fake("c", &j, &ok).arc(), &["b"]).await.unwrap();

        let err = sup.start().await.unwrap_err();
        match &err {
            SupervisorError::Startup(StartupError::Component { name, error }) => {
                assert_eq!(name, "b");
                assert_eq!(error, &ComponentError::fail("port in use"));
            }
            other => panic!("unexpected error: {other:?}"),
        }

        assert!(!entries(&j).contains(&"start:c".to_string()));
        assert_eq!(entries(&j), vec!["start:a", "stop:b", "stop:a"]);

        let snap = sup.snapshot();
        assert_eq!(snap.state, SystemState::Failed);
        assert_eq!(snap.component_state("c"), Some(ComponentState::Pending));
        assert_eq!(snap.component_state("a"), Some(ComponentState::Stopped));
        assert!(snap.last_failure.as_deref().is_some_and(|f| f.contains("port in use")));
    }

    #[tokio::test(start_paused = true)]
    async fn readiness_gate_rejects_component_that_never_turns_healthy() {
        let j = journal();
        let warming = Gauge::healthy();
        warming.set(HealthResult::failed("warming up"));
        let sup = Supervisor::builder(test_config()).build();
        sup.register(fake("a", &j, &warming).arc(), &[]).await.unwrap();

        let err = sup.start().await.unwrap_err();
        assert_eq!(
            err,
            SupervisorError::Startup(StartupError::NotReady {
                name: "a".into(),
                reason: "warming up".into(),
            })
        );
        assert_eq!(sup.state(), SystemState::Failed);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_probe_counts_as_timeout() {
        let sup = Supervisor::builder(test_config()).build();
        let slow = ComponentFn::builder("slow")
            .on_check(|| async {
                time::sleep(Duration::from_secs(60)).await;
                HealthResult::Healthy
            })
            .arc();
        sup.register(slow, &[]).await.unwrap();

        match sup.start().await {
            Err(SupervisorError::Startup(StartupError::NotReady { reason, .. })) => {
                assert_eq!(reason, "timeout")
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn degradation_and_recovery_show_within_one_interval() {
        let j = journal();
        let ok = Gauge::healthy();
        let flaky = Gauge::healthy();
        let cfg = Config {
            recovery: RecoveryPolicy {
                backoff: BackoffPolicy::constant(Duration::from_secs(4)),
                max_failures: 50,
            },
            ..test_config()
        };
        let interval = cfg.health_interval;
        let sup = Supervisor::builder(cfg).build();
        sup.register(fake("db", &j, &ok).arc(), &[]).await.unwrap();
        sup.register(fake("cache", &j, &flaky).arc(), &["db"]).await.unwrap();

        sup.start().await.unwrap();
        wait_for_state(&sup, SystemState::Healthy, Duration::from_secs(1)).await;

        flaky.set(HealthResult::degraded("evictions"));
        let snap = wait_for_state(&sup, SystemState::Degraded, interval + Duration::from_secs(1)).await;
        assert_eq!(snap.component_state("cache"), Some(ComponentState::Degraded));
        assert_eq!(snap.component_state("db"), Some(ComponentState::Healthy));

        flaky.set(HealthResult::Healthy);
        let snap = wait_for_state(&sup, SystemState::Healthy, interval + Duration::from_secs(1)).await;
        let cache = snap.component("cache").unwrap();
        assert_eq!(cache.recovery_failures, 0);
        assert_eq!(cache.consecutive_failures, 0);

        sup.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn escalation_fails_system_and_stops_components() {
        let j = journal();
        let ok = Gauge::healthy();
        let disk = Gauge::healthy();
        let sup = Supervisor::builder(test_config()).build();
        let mut events = sup.events();
        sup.register(fake("a", &j, &ok).arc(), &[]).await.unwrap();
        sup.register(fake("b", &j, &disk).arc(), &["a"]).await.unwrap();

        sup.start().await.unwrap();
        disk.set(HealthResult::failed("disk full"));

        let snap = wait_for_state(&sup, SystemState::Failed, Duration::from_secs(60)).await;
        assert!(snap.last_failure.as_deref().is_some_and(|f| f.contains("\"b\"")));
        assert!(snap.component("b").unwrap().escalated);
        assert_eq!(snap.component("b").unwrap().recovery_failures, 3);

        // two retries between the first failure and escalation
        assert_eq!(count(&j, "start:b"), 3);
        assert_eq!(count(&j, "stop:b"), 1);
        assert_eq!(count(&j, "stop:a"), 1);

        let mut escalated = 0;
        let mut scheduled = Vec::new();
        while let Ok(ev) = events.try_recv() {
            match ev.kind {
                EventKind::RecoveryEscalated => escalated += 1,
                EventKind::RecoveryScheduled => scheduled.push(ev.delay_ms),
                _ => {}
            }
        }
        assert_eq!(escalated, 1);
        assert_eq!(scheduled, vec![Some(1000), Some(2000)]);
    }

    #[tokio::test(start_paused = true)]
    async fn persistently_degraded_component_escalates_exactly_at_threshold() {
        let j = journal();
        let ok = Gauge::healthy();
        let slow = Gauge::healthy();
        let cfg = Config {
            recovery: RecoveryPolicy {
                backoff: BackoffPolicy::exponential(Duration::from_secs(1), Duration::from_secs(8)),
                max_failures: 5,
            },
            ..test_config()
        };
        let sup = Supervisor::builder(cfg).build();
        let mut events = sup.events();
        sup.register(fake("a", &j, &ok).arc(), &[]).await.unwrap();
        sup.register(fake("b", &j, &slow).arc(), &["a"]).await.unwrap();

        sup.start().await.unwrap();
        slow.set(HealthResult::degraded("slow queries"));

        let snap = wait_until(&sup, Duration::from_secs(120), |s| {
            s.component("b").is_some_and(|c| c.escalated)
        })
        .await;
        assert_eq!(snap.component("b").unwrap().recovery_failures, 5);
        // initial start plus one retry per failure below the threshold
        assert_eq!(count(&j, "start:b"), 5);

        let mut changes = Vec::new();
        let mut scheduled = 0;
        while let Ok(ev) = events.try_recv() {
            if ev.component.as_deref() != Some("b") {
                continue;
            }
            match ev.kind {
                EventKind::HealthChanged => changes.push((ev.prev_health, ev.health)),
                EventKind::RecoveryScheduled => scheduled += 1,
                _ => {}
            }
        }
        assert_eq!(changes, vec![(Some(Health::Healthy), Some(Health::Degraded))]);
        assert_eq!(scheduled, 4);
    }

    #[tokio::test(start_paused = true)]
    async fn retry_readiness_keeps_the_reported_class() {
        let j = journal();
        let slow = Gauge::healthy();
        let cfg = Config {
            recovery: RecoveryPolicy {
                backoff: BackoffPolicy::constant(Duration::from_secs(1)),
                max_failures: 10,
            },
            ..test_config()
        };
        let sup = Supervisor::builder(cfg).build();
        sup.register(fake("b", &j, &slow).arc(), &[]).await.unwrap();

        sup.start().await.unwrap();
        slow.set(HealthResult::degraded("slow queries"));

        let snap = wait_until(&sup, Duration::from_secs(30), |s| {
            s.component("b").is_some_and(|c| c.recovery_failures == 2)
        })
        .await;
        let b = snap.component("b").unwrap();
        assert_eq!(b.state, ComponentState::Degraded);
        assert_eq!(b.health, Some(Health::Degraded));
        assert_eq!(b.last_error.as_deref(), Some("slow queries"));

        sup.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn hanging_retry_does_not_hold_up_other_checks() {
        let j = journal();
        let db_health = Gauge::healthy();
        let queue_health = Gauge::healthy();
        let cfg = Config {
            start_timeout: Duration::from_secs(60),
            ..test_config()
        };
        let interval = cfg.health_interval;
        let sup = Supervisor::builder(cfg).build();

        let starts = Arc::new(AtomicU32::new(0));
        let counter = starts.clone();
        let queue = fake("queue", &j, &queue_health)
            .on_start(move |ctx: CancellationToken| {
                let n = counter.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n == 0 {
                        return Ok(());
                    }
                    tokio::select! {
                        _ = ctx.cancelled() => Err(ComponentError::Canceled),
                        _ = time::sleep(Duration::from_secs(55)) => Ok(()),
                    }
                }
            })
            .arc();
        sup.register(fake("db", &j, &db_health).arc(), &[]).await.unwrap();
        sup.register(queue, &[]).await.unwrap();

        sup.start().await.unwrap();
        queue_health.set(HealthResult::failed("connection reset"));
        wait_until(&sup, interval + Duration::from_secs(2), |s| {
            s.component_state("queue") == Some(ComponentState::Starting)
        })
        .await;

        db_health.set(HealthResult::degraded("slow"));
        let snap = wait_until(&sup, interval + Duration::from_secs(1), |s| {
            s.component_state("db") == Some(ComponentState::Degraded)
        })
        .await;
        assert_eq!(snap.component_state("queue"), Some(ComponentState::Starting));
        assert_eq!(snap.state, SystemState::Degraded);

        let report = sup.stop().await;
        assert_eq!(report.attempted, vec!["queue", "db"]);
        assert_eq!(starts.load(Ordering::SeqCst), 2);
        assert_eq!(sup.state(), SystemState::Stopped);
    }

    #[tokio::test(start_paused = true)]
    async fn hanging_check_does_not_delay_other_classifications() {
        let j = journal();
        let cache_health = Gauge::healthy();
        let cfg = Config {
            recovery: RecoveryPolicy {
                backoff: BackoffPolicy::constant(Duration::from_secs(600)),
                max_failures: 50,
            },
            ..test_config()
        };
        let within = cfg.health_interval + cfg.check_timeout + Duration::from_secs(1);
        let sup = Supervisor::builder(cfg).build();

        let hang = Arc::new(AtomicBool::new(false));
        let flag = hang.clone();
        let stuck = ComponentFn::builder("stuck")
            .on_check(move || {
                let hang = flag.load(Ordering::SeqCst);
                async move {
                    if hang {
                        time::sleep(Duration::from_secs(3600)).await;
                    }
                    HealthResult::Healthy
                }
            })
            .arc();
        sup.register(stuck, &[]).await.unwrap();
        sup.register(fake("cache", &j, &cache_health).arc(), &[]).await.unwrap();

        sup.start().await.unwrap();
        wait_for_state(&sup, SystemState::Healthy, Duration::from_secs(1)).await;

        hang.store(true, Ordering::SeqCst);
        cache_health.set(HealthResult::degraded("evictions"));
        let snap = wait_until(&sup, within, |s| {
            s.component_state("cache") == Some(ComponentState::Degraded)
        })
        .await;

        let stuck = snap.component("stuck").unwrap();
        assert_eq!(stuck.state, ComponentState::Failed);
        assert_eq!(stuck.last_error.as_deref(), Some("timeout"));
        assert_eq!(snap.state, SystemState::Degraded);

        sup.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn optional_component_exhaustion_keeps_system_degraded() {
        let j = journal();
        let ok = Gauge::healthy();
        let metrics = Gauge::healthy();
        let sup = Supervisor::builder(test_config()).build();
        sup.register(fake("api", &j, &ok).arc(), &[]).await.unwrap();
        sup.register(fake("metrics", &j, &metrics).optional().arc(), &[])
            .await
            .unwrap();

        sup.start().await.unwrap();
        metrics.set(HealthResult::failed("exporter down"));

        let snap = wait_until(&sup, Duration::from_secs(60), |s| {
            s.component("metrics").is_some_and(|c| c.escalated)
        })
        .await;
        assert_eq!(snap.state, SystemState::Degraded);
        let starts = count(&j, "start:metrics");

        time::sleep(Duration::from_secs(120)).await;
        assert_eq!(sup.state(), SystemState::Degraded);
        assert_eq!(count(&j, "start:metrics"), starts, "escalated component was retried");
        assert_eq!(count(&j, "stop:api"), 0);

        sup.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn stop_while_degraded_stops_each_component_once_despite_errors() {
        let j = journal();
        let ok = Gauge::healthy();
        let slow = Gauge::healthy();
        let cfg = Config {
            recovery: RecoveryPolicy {
                backoff: BackoffPolicy::constant(Duration::from_secs(600)),
                max_failures: 5,
            },
            ..test_config()
        };
        let sup = Supervisor::builder(cfg).build();

        let j2 = j.clone();
        let b = fake("b", &j, &slow)
            .on_stop(move |_ctx| {
                let j = j2.clone();
                async move {
                    j.lock().unwrap().push("stop:b".to_string());
                    Err(ComponentError::fail("flush failed"))
                }
            })
            .arc();
        sup.register(fake("a", &j, &ok).arc(), &[]).await.unwrap();
        sup.register(b, &["a"]).await.unwrap();
        sup.register(fake("c", &j, &ok).arc(), &["b"]).await.unwrap();

        sup.start().await.unwrap();
        slow.set(HealthResult::degraded("slow queries"));
        wait_for_state(&sup, SystemState::Degraded, Duration::from_secs(30)).await;

        let report = sup.stop().await;
        assert_eq!(report.attempted, vec!["c", "b", "a"]);
        assert_eq!(
            report.failures,
            vec![("b".to_string(), ComponentError::fail("flush failed"))]
        );
        for name in ["stop:a", "stop:b", "stop:c"] {
            assert_eq!(count(&j, name), 1, "{name}");
        }

        let snap = sup.snapshot();
        assert_eq!(snap.state, SystemState::Stopped);
        assert!(
            snap.components
                .iter()
                .all(|c| c.state == ComponentState::Stopped)
        );
        assert_eq!(
            snap.component("b").unwrap().last_error.as_deref(),
            Some("operation failed: flush failed")
        );

        assert_eq!(sup.stop().await, StopReport::default());
    }

    #[tokio::test]
    async fn stop_during_startup_cancels_and_stops_started_components() {
        let j = journal();
        let sup = Supervisor::builder(test_config()).build();
        let j2 = j.clone();
        let blocking = ComponentFn::builder("blocking")
            .on_start(move |ctx: CancellationToken| {
                let j = j2.clone();
                async move {
                    j.lock().unwrap().push("start:blocking".to_string());
                    ctx.cancelled().await;
                    Err(ComponentError::Canceled)
                }
            })
            .arc();
        sup.register(blocking, &[]).await.unwrap();

        let starter = Arc::clone(&sup);
        let pending = tokio::spawn(async move { starter.start().await });
        while entries(&j).is_empty() {
            tokio::task::yield_now().await;
        }

        let report = sup.stop().await;
        assert_eq!(report.attempted, vec!["blocking"]);
        assert_eq!(
            pending.await.unwrap(),
            Err(SupervisorError::Startup(StartupError::Cancelled))
        );
        assert_eq!(sup.state(), SystemState::Stopped);
    }

    struct Tape(Arc<StdMutex<Vec<EventKind>>>);

    #[async_trait]
    impl Subscribe for Tape {
        async fn on_event(&self, event: &Event) {
            self.0.lock().unwrap().push(event.kind);
        }
    }

    #[tokio::test]
    async fn closing_subscribers_delivers_the_shutdown_tail() {
        let j = journal();
        let ok = Gauge::healthy();
        let tape = Arc::new(StdMutex::new(Vec::new()));
        let sup = Supervisor::builder(test_config())
            .with_subscriber(Arc::new(Tape(tape.clone())))
            .build();
        sup.register(fake("db", &j, &ok).arc(), &[]).await.unwrap();

        sup.start().await.unwrap();
        sup.stop().await;
        sup.close_subscribers().await;

        let seen = tape.lock().unwrap().clone();
        assert_eq!(
            seen.iter()
                .filter(|k| **k == EventKind::ShutdownRequested)
                .count(),
            1
        );
        assert!(seen.contains(&EventKind::ComponentStopped));
        assert_eq!(seen.last(), Some(&EventKind::SystemStateChanged));

        sup.close_subscribers().await;
    }

    #[tokio::test]
    async fn registration_is_validated_and_sealed_after_start() {
        let j = journal();
        let ok = Gauge::healthy();
        let sup = Supervisor::builder(test_config()).build();

        sup.register(fake("db", &j, &ok).arc(), &[]).await.unwrap();
        assert_eq!(
            sup.register(fake("db", &j, &ok).arc(), &[]).await,
            Err(RegistrationError::DuplicateName { name: "db".into() })
        );
        assert_eq!(
            sup.register(fake("api", &j, &ok).arc(), &["queue"]).await,
            Err(RegistrationError::UnknownDependency {
                component: "api".into(),
                dependency: "queue".into(),
            })
        );
        assert!(matches!(
            sup.register(fake("loop", &j, &ok).arc(), &["loop"]).await,
            Err(RegistrationError::Cycle(_))
        ));

        let x: ComponentRef = fake("x", &j, &ok).arc();
        let y: ComponentRef = fake("y", &j, &ok).arc();
        assert!(matches!(
            sup.register_all(vec![(x, deps(&["y"])), (y, deps(&["x"]))]).await,
            Err(RegistrationError::Cycle(_))
        ));
        // rejected batches leave nothing behind
        assert_eq!(sup.snapshot().components.len(), 1);

        sup.register(fake("api", &j, &ok).arc(), &["db"]).await.unwrap();
        assert!(matches!(
            sup.deregister("db").await,
            Err(RegistrationError::HasDependents { .. })
        ));
        sup.deregister("api").await.unwrap();
        assert_eq!(
            sup.deregister("api").await,
            Err(RegistrationError::UnknownComponent { name: "api".into() })
        );

        sup.start().await.unwrap();
        assert!(matches!(
            sup.register(fake("late", &j, &ok).arc(), &[]).await,
            Err(RegistrationError::Sealed { .. })
        ));
        sup.stop().await;
    }

    #[tokio::test]
    async fn start_is_idempotent_and_rejected_after_stop() {
        let j = journal();
        let ok = Gauge::healthy();
        let sup = Supervisor::builder(test_config()).build();
        sup.register(fake("db", &j, &ok).arc(), &[]).await.unwrap();

        sup.start().await.unwrap();
        sup.start().await.unwrap();
        assert_eq!(count(&j, "start:db"), 1);

        sup.stop().await;
        assert_eq!(
            sup.start().await,
            Err(SupervisorError::InvalidState {
                op: "start",
                state: SystemState::Stopped,
            })
        );
    }

    #[tokio::test]
    async fn reset_reopens_a_failed_system() {
        let j = journal();
        let ok = Gauge::healthy();
        let broken = Arc::new(AtomicBool::new(true));
        let sup = Supervisor::builder(test_config()).build();

        let flag = broken.clone();
        let db = fake("db", &j, &ok)
            .on_start(move |_ctx| {
                let broken = flag.load(Ordering::SeqCst);
                async move {
                    if broken {
                        Err(ComponentError::fail("no route to host"))
                    } else {
                        Ok(())
                    }
                }
            })
            .arc();
        sup.register(db, &[]).await.unwrap();

        assert!(sup.start().await.is_err());
        assert_eq!(sup.state(), SystemState::Failed);

        broken.store(false, Ordering::SeqCst);
        sup.reset().await.unwrap();
        let snap = sup.snapshot();
        assert_eq!(snap.state, SystemState::Initializing);
        assert_eq!(snap.last_failure, None);
        assert_eq!(snap.component_state("db"), Some(ComponentState::Pending));

        sup.start().await.unwrap();
        assert_eq!(
            sup.reset().await,
            Err(SupervisorError::InvalidState {
                op: "reset",
                state: sup.state(),
            })
        );
        sup.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn auto_restart_brings_a_failed_system_back() {
        let j = journal();
        let ok = Gauge::healthy();
        let disk = Gauge::healthy();
        let cfg = Config {
            restart: RestartPolicy::Limited(1),
            restart_backoff: BackoffPolicy::constant(Duration::from_secs(1)),
            ..test_config()
        };
        let sup = Supervisor::builder(cfg).build();
        sup.register(fake("a", &j, &ok).arc(), &[]).await.unwrap();
        sup.register(fake("b", &j, &disk).arc(), &["a"]).await.unwrap();

        sup.start().await.unwrap();
        disk.set(HealthResult::failed("disk full"));

        wait_for_state(&sup, SystemState::Restarting, Duration::from_secs(60)).await;
        disk.set(HealthResult::Healthy);

        let snap = wait_for_state(&sup, SystemState::Healthy, Duration::from_secs(30)).await;
        assert_eq!(snap.restarts, 1);
        assert_eq!(count(&j, "start:a"), 2);
        assert!(snap.components.iter().all(|c| !c.escalated));

        sup.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn exhausted_restarts_leave_the_system_failed() {
        let j = journal();
        let ok = Gauge::healthy();
        let disk = Gauge::healthy();
        let cfg = Config {
            restart: RestartPolicy::Limited(1),
            restart_backoff: BackoffPolicy::constant(Duration::from_secs(1)),
            ..test_config()
        };
        let sup = Supervisor::builder(cfg).build();
        let mut events = sup.events();
        sup.register(fake("a", &j, &ok).arc(), &[]).await.unwrap();
        sup.register(fake("b", &j, &disk).arc(), &["a"]).await.unwrap();

        sup.start().await.unwrap();
        disk.set(HealthResult::failed("disk full"));

        let snap = wait_until(&sup, Duration::from_secs(120), |s| {
            s.state == SystemState::Failed && s.restarts == 1
        })
        .await;
        assert!(snap.last_failure.is_some());

        let mut exhausted = false;
        while let Ok(ev) = events.try_recv() {
            exhausted |= ev.kind == EventKind::RestartsExhausted;
        }
        assert!(exhausted);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn concurrent_snapshots_are_never_torn() {
        let j = journal();
        let ok = Gauge::healthy();
        let sup = Supervisor::builder(Config {
            health_interval: Duration::from_millis(5),
            ..test_config()
        })
        .build();
        for name in ["a", "b", "c", "d"] {
            sup.register(fake(name, &j, &ok).arc(), &[]).await.unwrap();
        }

        let reader = {
            let sup = Arc::clone(&sup);
            tokio::spawn(async move {
                let mut last_version = 0;
                loop {
                    let snap = sup.snapshot();
                    assert!(snap.version >= last_version);
                    last_version = snap.version;
                    match snap.state {
                        SystemState::Healthy => assert!(
                            snap.components
                                .iter()
                                .all(|c| c.state == ComponentState::Healthy)
                        ),
                        SystemState::Stopped => {
                            assert!(snap.components.iter().all(|c| c.state.is_down()));
                            break;
                        }
                        _ => {}
                    }
                    tokio::task::yield_now().await;
                }
            })
        };

        sup.start().await.unwrap();
        wait_for_state(&sup, SystemState::Healthy, Duration::from_secs(5)).await;
        time::sleep(Duration::from_millis(30)).await;
        sup.stop().await;
        reader.await.unwrap();
    }

    #[tokio::test]
    async fn snapshot_serializes_for_a_host() {
        let j = journal();
        let ok = Gauge::healthy();
        let sup = Supervisor::builder(test_config()).build();
        sup.register(fake("db", &j, &ok).arc(), &[]).await.unwrap();
        sup.register(fake("api", &j, &ok).arc(), &["db"]).await.unwrap();
        sup.start().await.unwrap();

        let snap = wait_for_state(&sup, SystemState::Healthy, Duration::from_secs(5)).await;
        let json = serde_json::to_value(&*snap).unwrap();
        assert_eq!(json["state"], "healthy");
        assert_eq!(json["components"][1]["name"], "api");
        assert_eq!(json["components"][1]["state"], "healthy");
        assert_eq!(json["components"][1]["dependencies"][0], "db");
        assert_eq!(json["config"]["max_failures"], 3);
        assert!(snap.uptime().is_some());

        sup.stop().await;
    }
}
