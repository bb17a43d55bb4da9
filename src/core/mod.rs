//! Runtime core: state machine, supervision and health monitoring.
//!
//! The public surface is [`Supervisor`] (built through [`SupervisorBuilder`]), its
//! [`Config`], and the read-only [`Snapshot`] it publishes.
//!
//! Internal modules:
//! - [`runner`]: bounded start/stop/check calls with timeout events;
//! - `control`: the mutable state guarded by the supervisor's lock;
//! - `monitor`: periodic probing and retry scheduling;
//! - `shutdown`: termination signal handling.

mod builder;
mod config;
mod control;
mod monitor;
pub(crate) mod runner;
mod shutdown;
mod snapshot;
mod state;
mod supervisor;

pub use builder::SupervisorBuilder;
pub use config::{Config, ConfigSummary};
pub use snapshot::{ComponentStatus, Snapshot};
pub use state::SystemState;
pub use supervisor::{StopReport, Supervisor};
