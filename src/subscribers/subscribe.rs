//! # Subscriber trait
//!
//! Implement [`Subscribe`] to react to supervisor events: page someone on
//! `RecoveryEscalated`, export state changes as metrics, keep an audit trail.
//!
//! Every subscriber is fed by its own bounded queue and worker inside
//! [`SubscriberSet`](crate::SubscriberSet); a slow or panicking subscriber never
//! delays the supervisor, the health monitor or its siblings. When its queue is
//! full the event is dropped for that subscriber only.

use async_trait::async_trait;

use crate::events::{Event, EventKind};

/// Event handler attached to a supervisor.
#[async_trait]
pub trait Subscribe: Send + Sync + 'static {
    async fn on_event(&self, event: &Event);

    /// Name used in overflow/panic events.
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }

    /// Queue size for this subscriber's worker.
    fn queue_capacity(&self) -> usize {
        1024
    }

    /// Filters events before they are queued; skipped events never take queue space.
    fn wants(&self, _kind: EventKind) -> bool {
        true
    }
}
