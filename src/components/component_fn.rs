//! # Closure-backed component (`ComponentFn`)
//!
//! [`ComponentFn`] assembles a [`Component`] from closures, one per operation.
//! Each closure *creates* a fresh future per call, so no state is shared between
//! calls unless the caller captures an `Arc<...>` explicitly.
//!
//! Operations left unset behave as no-ops: `start`/`stop` succeed and
//! `check_health` reports Healthy.
//!
//! ## Example
//! ```rust
//! use healthvisor::{ComponentError, ComponentFn, ComponentRef, HealthResult};
//!
//! let db: ComponentRef = ComponentFn::builder("database")
//!     .on_start(|_ctx| async { Ok::<_, ComponentError>(()) })
//!     .on_check(|| async { HealthResult::Healthy })
//!     .arc();
//!
//! assert_eq!(db.name(), "database");
//! ```

use std::borrow::Cow;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use futures::FutureExt;
use futures::future::BoxFuture;
use tokio_util::sync::CancellationToken;

use crate::components::component::{Component, HealthResult};
use crate::error::ComponentError;

type LifecycleFn =
    Box<dyn Fn(CancellationToken) -> BoxFuture<'static, Result<(), ComponentError>> + Send + Sync>;
type CheckFn = Box<dyn Fn() -> BoxFuture<'static, HealthResult> + Send + Sync>;

/// Function-backed component implementation.
pub struct ComponentFn {
    name: Cow<'static, str>,
    critical: bool,
    start: Option<LifecycleFn>,
    stop: Option<LifecycleFn>,
    check: Option<CheckFn>,
}

impl ComponentFn {
    /// Starts building a component; every operation defaults to a no-op.
    pub fn builder(name: impl Into<Cow<'static, str>>) -> Self {
        Self {
            name: name.into(),
            critical: true,
            start: None,
            stop: None,
            check: None,
        }
    }

    /// Sets the `start` operation.
    pub fn on_start<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(CancellationToken) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), ComponentError>> + Send + 'static,
    {
        self.start = Some(Box::new(move |ctx: CancellationToken| f(ctx).boxed()));
        self
    }

    /// Sets the `stop` operation.
    pub fn on_stop<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(CancellationToken) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), ComponentError>> + Send + 'static,
    {
        self.stop = Some(Box::new(move |ctx: CancellationToken| f(ctx).boxed()));
        self
    }

    /// Sets the `check_health` probe.
    pub fn on_check<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HealthResult> + Send + 'static,
    {
        self.check = Some(Box::new(move || f().boxed()));
        self
    }

    /// Marks the component optional: exhausting its recovery keeps the system Degraded
    /// instead of failing it.
    pub fn optional(mut self) -> Self {
        self.critical = false;
        self
    }

    /// Finishes the component as a shared handle.
    pub fn arc(self) -> Arc<Self> {
        Arc::new(self)
    }
}

#[async_trait]
impl Component for ComponentFn {
    fn name(&self) -> &str {
        &self.name
    }

    async fn start(&self, ctx: CancellationToken) -> Result<(), ComponentError> {
        match &self.start {
            Some(f) => f(ctx).await,
            None => Ok(()),
        }
    }

    async fn stop(&self, ctx: CancellationToken) -> Result<(), ComponentError> {
        match &self.stop {
            Some(f) => f(ctx).await,
            None => Ok(()),
        }
    }

    async fn check_health(&self) -> HealthResult {
        match &self.check {
            Some(f) => f().await,
            None => HealthResult::Healthy,
        }
    }

    fn critical(&self) -> bool {
        self.critical
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn unset_operations_are_noops() {
        let c = ComponentFn::builder("noop").arc();
        let ctx = CancellationToken::new();
        assert_eq!(c.start(ctx.clone()).await, Ok(()));
        assert_eq!(c.stop(ctx).await, Ok(()));
        assert_eq!(c.check_health().await, HealthResult::Healthy);
        assert!(c.critical());
    }

    #[tokio::test]
    async fn closures_run_per_call() {
        let starts = Arc::new(AtomicU32::new(0));
        let counter = starts.clone();
        let c = ComponentFn::builder("counted")
            .on_start(move |_ctx| {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Ok::<_, ComponentError>(())
                }
            })
            .on_check(|| async { HealthResult::degraded("warming up") })
            .optional()
            .arc();

        c.start(CancellationToken::new()).await.unwrap();
        c.start(CancellationToken::new()).await.unwrap();
        assert_eq!(starts.load(Ordering::SeqCst), 2);
        assert_eq!(c.check_health().await, HealthResult::degraded("warming up"));
        assert!(!c.critical());
    }
}
