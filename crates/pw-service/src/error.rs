// error.rs - Error types for the planner facade and its store.

use pw_audit::AuditError;
use pw_goal::GoalError;
use pw_graph::GraphError;
use pw_life_events::LifeEventError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error at {path}: {source}")]
    IoError {
        path: String,
        source: std::io::Error,
    },

    #[error("serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("invalid household id {0:?}: use letters, digits, '-' or '_'")]
    InvalidHousehold(String),
}

#[derive(Debug, Error)]
pub enum PlannerError {
    #[error(transparent)]
    Goal(#[from] GoalError),

    #[error(transparent)]
    Graph(#[from] GraphError),

    #[error(transparent)]
    LifeEvent(#[from] LifeEventError),

    #[error(transparent)]
    Audit(#[from] AuditError),

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("invalid settings file {path}: {reason}")]
    Settings { path: String, reason: String },
}
