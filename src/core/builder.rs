use std::sync::Arc;

use crate::core::supervisor::Listener;
use crate::core::{Config, Supervisor};
use crate::events::Bus;
use crate::subscribers::{Subscribe, SubscriberSet};

/// Builder for a [`Supervisor`].
pub struct SupervisorBuilder {
    cfg: Config,
    subscribers: Vec<Arc<dyn Subscribe>>,
}

impl SupervisorBuilder {
    pub fn new(cfg: Config) -> Self {
        Self {
            cfg,
            subscribers: Vec::new(),
        }
    }

    /// Sets event subscribers (logging, alerting, ...).
    ///
    /// Each subscriber gets a dedicated worker with a bounded queue.
    pub fn with_subscribers(mut self, subscribers: Vec<Arc<dyn Subscribe>>) -> Self {
        self.subscribers = subscribers;
        self
    }

    /// Adds one event subscriber.
    pub fn with_subscriber(mut self, subscriber: Arc<dyn Subscribe>) -> Self {
        self.subscribers.push(subscriber);
        self
    }

    /// Builds the supervisor in `Initializing` and wires the bus to the subscribers.
    ///
    /// Must be called inside a Tokio runtime.
    pub fn build(self) -> Arc<Supervisor> {
        let bus = Bus::new(self.cfg.bus_capacity_clamped());
        let listener = Listener::spawn(&bus, SubscriberSet::new(self.subscribers, bus.clone()));
        Arc::new(Supervisor::new_internal(self.cfg, bus, listener))
    }
}
