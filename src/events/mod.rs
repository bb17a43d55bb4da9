//! Runtime events: types and broadcast bus.
//!
//! ## Contents
//! - [`EventKind`], [`Event`] event classification and payload metadata
//! - [`Bus`] thin wrapper over `tokio::sync::broadcast`
//!
//! ## Quick reference
//! - **Publishers**: `Supervisor`, `HealthMonitor`, `runner`, `SubscriberSet` workers.
//! - **Consumers**: the subscriber `Listener` spawned by `SupervisorBuilder::build`,
//!   plus any receiver obtained through [`Supervisor::events`](crate::Supervisor::events).

mod bus;
mod event;

pub use bus::Bus;
pub use event::{Event, EventKind};
