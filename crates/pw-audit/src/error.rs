// error.rs - Error types for the season audit.

use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum AuditError {
    /// Goal edges form a loop. Insertion rejects cycles, so a loaded plan
    /// that has one is corrupt.
    #[error("circular dependencies found in plan: {} cycle(s)", cycles.len())]
    CircularDependencies { cycles: Vec<Vec<Uuid>> },

    #[error("failed to serialize plan snapshot: {0}")]
    SerializationError(#[from] serde_json::Error),
}
