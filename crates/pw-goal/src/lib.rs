//! # pw-goal
//!
//! Goal lifecycle management and domain events for Planwise.
//!
//! A [`Goal`] moves through nine states (dream → considered → ready →
//! committed → achieved, plus paused, failed, abandoned, invalidated). The
//! [`GoalStateMachine`] is the only writer of a goal's state and enforces the
//! transition table, the commitment gate, and the call-time readiness check.
//!
//! ## Key components
//!
//! - [`Goal`], [`GoalState`] - the goal record and its lifecycle states
//! - [`GoalStateMachine`] - validated transitions with append-only history
//! - [`ReadinessCheck`] - seam through which the dependency graph answers readiness
//! - [`PlanEvent`], [`EventDispatcher`], [`NotificationSink`] - domain events
//! - [`ClockSource`] - injectable "now"

pub mod clock;
pub mod error;
pub mod events;
pub mod goal;
pub mod machine;

pub use clock::{ClockSource, FixedClock, SystemClock};
pub use error::GoalError;
pub use events::{append_jsonl, EventDispatcher, LogSink, NotificationSink, PlanEvent};
pub use goal::{Goal, GoalState, ReviewFlag, StateChange, Trigger};
pub use machine::{GoalStateMachine, KnownReadiness, ReadinessCheck, Transition};
