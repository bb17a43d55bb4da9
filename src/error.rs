//! Error types used by the healthvisor runtime and by managed components.
//!
//! - [`ComponentError`]: returned by a component's `start`/`stop` implementation.
//! - [`CycleError`]: the dependency graph contains a cycle.
//! - [`RegistrationError`]: setup-time failures (`register`, `register_all`, `deregister`).
//! - [`StartupError`]: a startup attempt could not bring every component up.
//! - [`SupervisorError`]: the only error type returned by [`Supervisor`](crate::Supervisor) operations.
//!
//! Health-check failures are deliberately absent: they are values
//! ([`HealthResult::Failed`](crate::HealthResult::Failed)), absorbed by the health
//! monitor and only observable through [`Snapshot`](crate::Snapshot).
//!
//! All types provide `as_label` (stable snake_case, for logs/metrics).

use std::time::Duration;
use thiserror::Error;

use crate::core::SystemState;

/// # Errors produced by component start/stop operations.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ComponentError {
    /// The operation did not complete within its bound.
    #[error("timed out after {timeout:?}")]
    Timeout {
        /// The bound that was exceeded.
        timeout: Duration,
    },

    /// The operation failed.
    #[error("operation failed: {error}")]
    Fail {
        /// The underlying error message.
        error: String,
    },

    /// The operation observed supervisor shutdown and gave up.
    #[error("context cancelled")]
    Canceled,
}

impl ComponentError {
    /// Shorthand for [`ComponentError::Fail`].
    pub fn fail(error: impl Into<String>) -> Self {
        ComponentError::Fail {
            error: error.into(),
        }
    }

    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use healthvisor::ComponentError;
    /// use std::time::Duration;
    ///
    /// let err = ComponentError::Timeout { timeout: Duration::from_secs(1) };
    /// assert_eq!(err.as_label(), "component_timeout");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            ComponentError::Timeout { .. } => "component_timeout",
            ComponentError::Fail { .. } => "component_failed",
            ComponentError::Canceled => "component_canceled",
        }
    }

    /// Returns a human-readable message with details about the error.
    pub fn as_message(&self) -> String {
        match self {
            ComponentError::Timeout { timeout } => format!("timeout: {timeout:?}"),
            ComponentError::Fail { error } => format!("error: {error}"),
            ComponentError::Canceled => "context cancelled".to_string(),
        }
    }
}

/// The dependency graph contains at least one cycle.
///
/// `members` lists every component that could not be ordered, in registration order.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("dependency cycle among {members:?}")]
pub struct CycleError {
    /// Components caught in (or behind) the cycle.
    pub members: Vec<String>,
}

/// # Setup-time errors.
///
/// Raised only while the supervisor is still `Initializing`; never after `start()`.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistrationError {
    /// A component with this name is already registered.
    #[error("component {name:?} is already registered")]
    DuplicateName { name: String },

    /// A dependency names a component that is not registered.
    #[error("component {component:?} depends on unknown component {dependency:?}")]
    UnknownDependency {
        component: String,
        dependency: String,
    },

    /// Registration would introduce a dependency cycle.
    #[error(transparent)]
    Cycle(#[from] CycleError),

    /// The component cannot be removed while others depend on it.
    #[error("component {name:?} is required by {dependents:?}")]
    HasDependents {
        name: String,
        dependents: Vec<String>,
    },

    /// No component with this name is registered.
    #[error("component {name:?} is not registered")]
    UnknownComponent { name: String },

    /// The component set is frozen once startup has begun.
    #[error("registration is closed in state {state}")]
    Sealed { state: SystemState },
}

impl RegistrationError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            RegistrationError::DuplicateName { .. } => "registration_duplicate_name",
            RegistrationError::UnknownDependency { .. } => "registration_unknown_dependency",
            RegistrationError::Cycle(_) => "registration_cycle",
            RegistrationError::HasDependents { .. } => "registration_has_dependents",
            RegistrationError::UnknownComponent { .. } => "registration_unknown_component",
            RegistrationError::Sealed { .. } => "registration_sealed",
        }
    }
}

/// # Errors that abort a startup attempt.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StartupError {
    /// A component's `start()` failed or timed out.
    #[error("component {name:?} failed to start: {error}")]
    Component { name: String, error: ComponentError },

    /// A component started but never reported Healthy within the readiness window.
    #[error("component {name:?} did not become healthy: {reason}")]
    NotReady { name: String, reason: String },

    /// Shutdown was requested while components were still being started.
    #[error("startup cancelled by shutdown")]
    Cancelled,
}

impl StartupError {
    /// Name of the component that aborted startup, if any.
    pub fn component(&self) -> Option<&str> {
        match self {
            StartupError::Component { name, .. } | StartupError::NotReady { name, .. } => {
                Some(name)
            }
            StartupError::Cancelled => None,
        }
    }

    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            StartupError::Component { .. } => "startup_component_failed",
            StartupError::NotReady { .. } => "startup_not_ready",
            StartupError::Cancelled => "startup_cancelled",
        }
    }
}

/// # Errors returned by supervisor operations.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SupervisorError {
    #[error(transparent)]
    Registration(#[from] RegistrationError),

    #[error(transparent)]
    Startup(#[from] StartupError),

    /// The operation is not valid in the current system state.
    #[error("cannot {op} while {state}")]
    InvalidState { op: &'static str, state: SystemState },
}

impl SupervisorError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use healthvisor::{StartupError, SupervisorError};
    ///
    /// let err = SupervisorError::from(StartupError::Cancelled);
    /// assert_eq!(err.as_label(), "startup_cancelled");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            SupervisorError::Registration(e) => e.as_label(),
            SupervisorError::Startup(e) => e.as_label(),
            SupervisorError::InvalidState { .. } => "supervisor_invalid_state",
        }
    }
}
