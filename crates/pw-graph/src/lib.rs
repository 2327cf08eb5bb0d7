//! # pw-graph
//!
//! Dependency graph and resolver for Planwise.
//!
//! A [`Dependency`] blocks a goal until another goal is achieved
//! (prerequisite / recommended), a life event clears, or a measured resource
//! reaches its threshold. The [`DependencyGraph`] stores these edges, keeps
//! goal-to-goal edges acyclic, and answers readiness. The
//! [`DependencyResolver`] applies changes to a [`Plan`] and propagates the
//! consequences (auto `considered ⇄ ready`) in topological order.
//!
//! ## Key invariants
//!
//! - **Acyclic**: a goal edge that would close a loop is rejected before any
//!   mutation.
//! - **Fail safe**: a resource without a measurement is pending.
//! - **Committed means clear**: a committed goal never gains an unsatisfied
//!   dependency, and committing re-checks readiness at call time.

pub mod dependency;
pub mod error;
pub mod graph;
pub mod metric;
pub mod plan;
pub mod resolver;

pub use dependency::{Dependency, DependencyKind, DependencyStatus};
pub use error::GraphError;
pub use graph::DependencyGraph;
pub use metric::{MetricSource, StaticMetricSource};
pub use plan::Plan;
pub use resolver::{DependencyResolver, ExternalSignal, Readiness, Resolution};
