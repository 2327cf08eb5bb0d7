// error.rs - Error types for life-event ingestion and processing.

use pw_graph::GraphError;
use thiserror::Error;
use uuid::Uuid;

use crate::event::{DurationType, LifeEventStatus};

#[derive(Debug, Error)]
pub enum LifeEventError {
    /// The payload's `impact.impact_type` is missing or not one we know.
    #[error("unknown life event impact type '{0}'")]
    UnknownImpactType(String),

    /// Temporary events must say what ends them.
    #[error("temporary life event {0} has no resolution condition")]
    MissingResolution(Uuid),

    #[error("life event {event_id} cannot move from {from} to {to}")]
    InvalidStatusTransition {
        event_id: Uuid,
        from: LifeEventStatus,
        to: LifeEventStatus,
    },

    /// Only occurred, non-permanent events can be resolved.
    #[error("life event {event_id} ({status}, {duration}) cannot be resolved")]
    NotResolvable {
        event_id: Uuid,
        status: LifeEventStatus,
        duration: DurationType,
    },

    #[error("life event not found: {0}")]
    EventNotFound(Uuid),

    #[error("I/O error at {path}: {source}")]
    IoError {
        path: String,
        source: std::io::Error,
    },

    #[error("serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error(transparent)]
    Graph(#[from] GraphError),
}
