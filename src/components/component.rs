//! # Component abstraction.
//!
//! A [`Component`] is one managed subsystem (a database pool, a device bridge, a
//! network listener...). The supervisor treats it as three opaque async operations:
//! `start`, `stop` and `check_health`. The common handle type is [`ComponentRef`],
//! an `Arc<dyn Component>` that can be shared with the health monitor.
//!
//! ## Contract
//! - Side effects happen in `start` only; `check_health` is a read-only probe.
//! - All three may block on I/O. The supervisor bounds every call with a timeout
//!   and passes a [`CancellationToken`] to `start`/`stop` that fires on shutdown.
//! - Idempotence is enforced by the supervisor, not by implementations: `start` is
//!   never re-invoked on a Healthy component and `stop` never on a stopped one.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::error::ComponentError;

/// Outcome of a single health probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthResult {
    /// Fully operational.
    Healthy,
    /// Serving, but impaired.
    Degraded(String),
    /// Not serving.
    Failed(String),
}

impl HealthResult {
    /// Shorthand for [`HealthResult::Degraded`].
    pub fn degraded(reason: impl Into<String>) -> Self {
        HealthResult::Degraded(reason.into())
    }

    /// Shorthand for [`HealthResult::Failed`].
    pub fn failed(reason: impl Into<String>) -> Self {
        HealthResult::Failed(reason.into())
    }

    /// Probe outcome used when `check_health` exceeds its bound.
    pub fn timeout() -> Self {
        HealthResult::Failed("timeout".to_string())
    }

    pub fn is_healthy(&self) -> bool {
        matches!(self, HealthResult::Healthy)
    }

    /// Reason attached to a non-healthy result.
    pub fn reason(&self) -> Option<&str> {
        match self {
            HealthResult::Healthy => None,
            HealthResult::Degraded(r) | HealthResult::Failed(r) => Some(r),
        }
    }

    /// Drops the reason, keeping only the classification.
    pub fn class(&self) -> Health {
        match self {
            HealthResult::Healthy => Health::Healthy,
            HealthResult::Degraded(_) => Health::Degraded,
            HealthResult::Failed(_) => Health::Failed,
        }
    }
}

/// Classification of a [`HealthResult`], compared across passes to detect changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Health {
    Healthy,
    Degraded,
    Failed,
}

impl fmt::Display for Health {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Health::Healthy => "healthy",
            Health::Degraded => "degraded",
            Health::Failed => "failed",
        })
    }
}

/// # One managed subsystem.
///
/// # Example
/// ```
/// use async_trait::async_trait;
/// use tokio_util::sync::CancellationToken;
/// use healthvisor::{Component, ComponentError, HealthResult};
///
/// struct Cache;
///
/// #[async_trait]
/// impl Component for Cache {
///     fn name(&self) -> &str { "cache" }
///
///     async fn start(&self, _ctx: CancellationToken) -> Result<(), ComponentError> {
///         Ok(())
///     }
///
///     async fn stop(&self, _ctx: CancellationToken) -> Result<(), ComponentError> {
///         Ok(())
///     }
///
///     async fn check_health(&self) -> HealthResult {
///         HealthResult::Healthy
///     }
/// }
/// ```
#[async_trait]
pub trait Component: Send + Sync + 'static {
    /// Returns a stable, unique component name.
    fn name(&self) -> &str;

    /// Brings the component up. Called again by recovery after a failure.
    async fn start(&self, ctx: CancellationToken) -> Result<(), ComponentError>;

    /// Tears the component down. Errors are recorded, never propagated.
    async fn stop(&self, ctx: CancellationToken) -> Result<(), ComponentError>;

    /// Probes the component without side effects.
    async fn check_health(&self) -> HealthResult;

    /// Whether exhausting recovery on this component fails the whole system.
    ///
    /// Non-critical components are left Failed while the system stays Degraded.
    fn critical(&self) -> bool {
        true
    }
}

/// Shared handle to a component.
pub type ComponentRef = Arc<dyn Component>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeout_is_a_failure() {
        let r = HealthResult::timeout();
        assert_eq!(r.class(), Health::Failed);
        assert_eq!(r.reason(), Some("timeout"));
        assert!(!r.is_healthy());
    }

    #[test]
    fn classification_ignores_reason() {
        assert_eq!(
            HealthResult::degraded("slow").class(),
            HealthResult::degraded("slower").class()
        );
        assert_eq!(HealthResult::Healthy.reason(), None);
    }
}
