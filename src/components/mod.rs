//! Managed components and their dependency graph.
//!
//! - [`Component`] / [`ComponentRef`]: the contract a subsystem implements
//! - [`ComponentFn`]: closure-backed implementation
//! - [`ComponentState`]: what the supervisor last observed
//! - [`DependencyGraph`]: start order and reverse stop order

mod component;
mod component_fn;
mod graph;
pub(crate) mod handle;

pub use component::{Component, ComponentRef, Health, HealthResult};
pub use component_fn::ComponentFn;
pub use graph::DependencyGraph;
pub use handle::ComponentState;
