//! # pw-audit
//!
//! Read-only season audit of a household plan: what is ready, what is
//! stuck and why, which anticipated events are overdue, and a digest of the
//! snapshot the findings were computed from.
//!
//! Circular goal edges are the one hard failure ([`AuditError`]); all other
//! findings are informational.

pub mod error;
pub mod hasher;
pub mod report;

pub use error::AuditError;
pub use report::{AuditReport, AuditService, Bottleneck, StaleEvent, UnreachableDependency};
