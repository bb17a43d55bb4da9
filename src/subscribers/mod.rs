//! # Event subscribers.
//!
//! ```text
//! Supervisor / HealthMonitor ── publish(Event) ──► Bus ──► listener ──► SubscriberSet
//!                                                                          │
//!                                                              ┌───────────┼───────────┐
//!                                                              ▼           ▼           ▼
//!                                                          LogWriter    Alerts      Custom
//! ```
//!
//! ## Implementing custom subscribers
//! ```no_run
//! use healthvisor::{Event, EventKind, Subscribe};
//! use async_trait::async_trait;
//!
//! struct Pager;
//!
//! #[async_trait]
//! impl Subscribe for Pager {
//!     async fn on_event(&self, event: &Event) {
//!         let _who = event.component.as_deref().unwrap_or("system");
//!         // page the on-call
//!     }
//!     fn name(&self) -> &'static str { "pager" }
//!     fn wants(&self, kind: EventKind) -> bool {
//!         matches!(kind, EventKind::RecoveryEscalated | EventKind::RestartsExhausted)
//!     }
//! }
//! ```

mod log;
mod subscribe;
mod subscriber_set;

pub use log::LogWriter;
pub use subscribe::Subscribe;
pub use subscriber_set::SubscriberSet;
