//! # healthvisor
//!
//! **Healthvisor** is a process lifecycle and health-orchestration supervisor.
//!
//! It brings up a set of interdependent components in dependency order, polls
//! their health, restarts the ones that fail with exponential backoff, escalates
//! unrecoverable failures to the whole system, and publishes a consistent status
//! snapshot for hosts (health endpoints, dashboards, alerting).
//!
//! ## Architecture
//! ```text
//!     ┌──────────────┐   ┌──────────────┐   ┌──────────────┐
//!     │  Component   │   │  Component   │   │  Component   │
//!     │  "database"  │◄──│   "cache"    │◄──│    "api"     │   (depends on)
//!     └──────┬───────┘   └──────┬───────┘   └──────┬───────┘
//!            ▼                  ▼                  ▼
//! ┌───────────────────────────────────────────────────────────────────┐
//! │  Supervisor (single writer, control lock)                         │
//! │  - DependencyGraph (topological start order, reverse stop order)  │
//! │  - ComponentHandles (observed state, epoch, last error)           │
//! │  - Recovery ledger (RecoveryPolicy: backoff + escalation)         │
//! │  - SystemState machine                                            │
//! └──────┬──────────────────────────┬──────────────────────┬──────────┘
//!        │ spawns while serving     │ publishes            │ publishes
//!        ▼                          ▼                      ▼
//! ┌──────────────┐        ┌───────────────────┐   ┌──────────────────┐
//! │HealthMonitor │        │ watch<Snapshot>   │   │ Bus (broadcast)  │
//! │ probe / tick │        │ snapshot(), watch │   │ Event stream     │
//! │ retry timers │        └───────────────────┘   └────────┬─────────┘
//! └──────────────┘                                         ▼
//!                                                      Listener
//!                                                          ▼
//!                                                    SubscriberSet
//!                                                 ┌────────┼────────┐
//!                                                 ▼        ▼        ▼
//!                                             LogWriter  worker2  workerN
//! ```
//!
//! ### Lifecycle
//! ```text
//! Initializing ─start()─► Starting ─► Running ─first pass─► Healthy ◄──► Degraded
//!                            │                                  │            │
//!                            └─ component error ─► Failed ◄─ escalation ─────┘
//!                                                    │  ▲
//!                                   RestartPolicy ─► Restarting ─► Initializing
//!
//! any state ─stop()─► Stopping ─► Stopped
//! ```
//!
//! ## Features
//! | Area              | Description                                                     | Key types / traits                          |
//! |-------------------|-----------------------------------------------------------------|---------------------------------------------|
//! | **Components**    | Managed subsystems with start/stop/check operations.            | [`Component`], [`ComponentFn`]              |
//! | **Ordering**      | Dependency graph with deterministic topological order.          | [`DependencyGraph`]                         |
//! | **Supervision**   | State machine, ordered startup/shutdown, health monitoring.     | [`Supervisor`], [`SystemState`]             |
//! | **Policies**      | Per-component recovery and whole-system restart.                | [`RecoveryPolicy`], [`RestartPolicy`]       |
//! | **Status**        | Immutable, serializable point-in-time view.                     | [`Snapshot`], [`ComponentStatus`]           |
//! | **Subscriber API**| Hook into lifecycle events (logging, alerting).                 | [`Subscribe`], [`LogWriter`]                |
//! | **Errors**        | Typed errors for setup and startup.                             | [`RegistrationError`], [`SupervisorError`]  |
//!
//! ## Example
//! ```no_run
//! use std::sync::Arc;
//! use tokio_util::sync::CancellationToken;
//! use healthvisor::{ComponentError, ComponentFn, Config, HealthResult, LogWriter, Supervisor};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let sup = Supervisor::builder(Config::default())
//!         .with_subscriber(Arc::new(LogWriter::new()))
//!         .build();
//!
//!     let db = ComponentFn::builder("database")
//!         .on_start(|_ctx: CancellationToken| async { Ok::<_, ComponentError>(()) })
//!         .on_check(|| async { HealthResult::Healthy })
//!         .arc();
//!     let api = ComponentFn::builder("api").arc();
//!
//!     sup.register(db, &[]).await?;
//!     sup.register(api, &["database"]).await?;
//!
//!     let report = sup.run_until_signal().await?;
//!     println!("stopped {} components", report.attempted.len());
//!     Ok(())
//! }
//! ```

pub mod components;
mod core;
mod error;
pub mod events;
pub mod policies;
pub mod subscribers;

// ---- Public re-exports ----

pub use components::{
    Component, ComponentFn, ComponentRef, ComponentState, DependencyGraph, Health, HealthResult,
};
pub use core::{
    ComponentStatus, Config, ConfigSummary, Snapshot, StopReport, Supervisor, SupervisorBuilder,
    SystemState,
};
pub use error::{ComponentError, CycleError, RegistrationError, StartupError, SupervisorError};
pub use events::{Bus, Event, EventKind};
pub use policies::{BackoffPolicy, JitterPolicy, RecoveryAction, RecoveryPolicy, RestartPolicy};
pub use subscribers::{LogWriter, Subscribe, SubscriberSet};
