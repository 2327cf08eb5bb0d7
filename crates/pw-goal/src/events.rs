// events.rs - Domain events and notification dispatch.
//
// Every committed mutation produces domain events. They are handed to
// external collaborators (ceremony scheduling, notifications) only after the
// mutation has been committed, never from inside the recomputation path.

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::GoalError;
use crate::goal::{GoalState, Trigger};

/// Events emitted at key plan lifecycle points.
///
/// The `event_type` tag values are part of the wire contract with
/// ceremony/API collaborators.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "event_type")]
pub enum PlanEvent {
    #[serde(rename = "goal.created")]
    GoalCreated {
        goal_id: Uuid,
        name: String,
        timestamp: DateTime<Utc>,
    },

    #[serde(rename = "goal.transitioned")]
    GoalTransitioned {
        goal_id: Uuid,
        from: GoalState,
        to: GoalState,
        reason: String,
        trigger: Trigger,
        timestamp: DateTime<Utc>,
    },

    /// A `transforms` life event asked for the goal to be reviewed.
    #[serde(rename = "goal.review_flagged")]
    ReviewFlagged {
        goal_id: Uuid,
        event_id: Uuid,
        timestamp: DateTime<Utc>,
    },

    #[serde(rename = "dependency.added")]
    DependencyAdded {
        dependency_id: Uuid,
        blocked_goal: Uuid,
        timestamp: DateTime<Utc>,
    },

    #[serde(rename = "dependency.removed")]
    DependencyRemoved {
        dependency_id: Uuid,
        blocked_goal: Uuid,
        timestamp: DateTime<Utc>,
    },

    #[serde(rename = "dependency.satisfied")]
    DependencySatisfied {
        dependency_id: Uuid,
        blocked_goal: Uuid,
        timestamp: DateTime<Utc>,
    },

    #[serde(rename = "life_event.applied")]
    LifeEventApplied {
        event_id: Uuid,
        impact_type: String,
        goals_affected: Vec<Uuid>,
        timestamp: DateTime<Utc>,
    },

    /// A cascading life event forced a full plan review.
    #[serde(rename = "life_event.cascaded")]
    CascadeTriggered {
        event_id: Uuid,
        goals_affected: Vec<Uuid>,
        timestamp: DateTime<Utc>,
    },
}

impl PlanEvent {
    /// Get the event type name as a string.
    pub fn event_type(&self) -> &str {
        match self {
            PlanEvent::GoalCreated { .. } => "goal.created",
            PlanEvent::GoalTransitioned { .. } => "goal.transitioned",
            PlanEvent::ReviewFlagged { .. } => "goal.review_flagged",
            PlanEvent::DependencyAdded { .. } => "dependency.added",
            PlanEvent::DependencyRemoved { .. } => "dependency.removed",
            PlanEvent::DependencySatisfied { .. } => "dependency.satisfied",
            PlanEvent::LifeEventApplied { .. } => "life_event.applied",
            PlanEvent::CascadeTriggered { .. } => "life_event.cascaded",
        }
    }
}

/// Trait for receiving plan events.
///
/// Implementations decide what to do with each event: append to a log,
/// forward to a notification channel, etc.
pub trait NotificationSink: Send + Sync {
    /// Handle an event. Errors are logged but don't stop the system.
    fn send(&self, event: &PlanEvent) -> Result<(), GoalError>;
}

/// Appends events as JSONL to a file.
pub struct LogSink {
    path: PathBuf,
}

impl LogSink {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }
}

impl NotificationSink for LogSink {
    fn send(&self, event: &PlanEvent) -> Result<(), GoalError> {
        append_jsonl(&self.path, event).map_err(|source| GoalError::IoError {
            path: self.path.display().to_string(),
            source,
        })
    }
}

/// Append `record` as one JSON line, creating the file and its parent
/// directories on first use.
pub fn append_jsonl<T: Serialize + ?Sized>(path: &Path, record: &T) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let line = serde_json::to_string(record)?;
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    writeln!(file, "{}", line)
}

/// Dispatches events to multiple sinks.
///
/// A failing sink is logged and skipped; the remaining sinks still receive
/// the event.
#[derive(Default)]
pub struct EventDispatcher {
    sinks: Vec<Box<dyn NotificationSink>>,
}

impl EventDispatcher {
    pub fn new() -> Self {
        Self { sinks: Vec::new() }
    }

    pub fn add_sink(&mut self, sink: Box<dyn NotificationSink>) {
        self.sinks.push(sink);
    }

    pub fn dispatch(&self, event: &PlanEvent) {
        for sink in &self.sinks {
            if let Err(e) = sink.send(event) {
                tracing::warn!(event_type = event.event_type(), "notification sink error: {}", e);
            }
        }
    }

    pub fn dispatch_all(&self, events: &[PlanEvent]) {
        for event in events {
            self.dispatch(event);
        }
    }
}
