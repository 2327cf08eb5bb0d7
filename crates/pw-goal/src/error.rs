// error.rs - Error types for the goal lifecycle subsystem.

use thiserror::Error;
use uuid::Uuid;

use crate::goal::GoalState;

/// Errors that can occur during goal lifecycle operations.
#[derive(Debug, Error)]
pub enum GoalError {
    /// A file I/O operation failed.
    #[error("I/O error at {path}: {source}")]
    IoError {
        path: String,
        source: std::io::Error,
    },

    /// Failed to serialize/deserialize goal data.
    #[error("serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// The requested goal was not found.
    #[error("goal not found: {0}")]
    NotFound(Uuid),

    /// The target state is not reachable from the current state.
    #[error("invalid transition from {from} to {to} for goal {goal_id}")]
    InvalidTransition {
        goal_id: Uuid,
        from: GoalState,
        to: GoalState,
    },

    /// Committing requires why, sacrifice, deadline and at least one metric.
    #[error("goal {goal_id} cannot be committed, missing: {}", missing.join(", "))]
    CommitmentGate { goal_id: Uuid, missing: Vec<String> },

    /// Readiness no longer holds at commit time. The caller must re-fetch.
    #[error("goal {goal_id} has unsatisfied dependencies and cannot be committed")]
    StaleReadiness { goal_id: Uuid },

    /// The goal is achieved, abandoned or invalidated.
    #[error("goal {goal_id} is in terminal state {state}")]
    TerminalState { goal_id: Uuid, state: GoalState },

    /// Retrospectives are only written for finished (terminal or failed) goals.
    #[error("cannot record a retrospective for goal {goal_id} in state {state}")]
    RetrospectiveNotAllowed { goal_id: Uuid, state: GoalState },

    /// A notification dispatch failed (non-fatal).
    #[error("notification error: {0}")]
    NotificationError(String),
}
