//! # pw-service
//!
//! The household-level facade over the Planwise core.
//!
//! A [`Planner`] owns one plan per household, serializes writers per
//! household, persists changed records through a [`ConfigStore`], and hands
//! domain events and ceremony requests to the outside world only after a
//! change has been committed.
//!
//! ## Key components
//!
//! - [`Planner`]: every goal, dependency, life-event and audit operation.
//! - [`ConfigStore`], [`JsonFileStore`], [`MemoryStore`]: record persistence,
//!   one [`ChangeSet`] per committed mutation.
//! - [`PlannerConfig`], [`PlannerSettings`]: the `.planwise/` layout and its
//!   settings file.

pub mod config;
pub mod error;
pub mod planner;
pub mod store;

pub use config::{AuditSettings, PlannerConfig, PlannerSettings};
pub use error::{PlannerError, StoreError};
pub use planner::{Commitment, Household, Planner};
pub use store::{validate_household, ChangeSet, ConfigStore, HouseholdRecords, JsonFileStore, MemoryStore};
