// dependency.rs - Dependency: a directed constraint on a goal.
//
// The kind is a tagged union, so a prerequisite physically cannot carry an
// `overridden` flag and a resource dependency cannot name a goal. On the wire
// the tag is the `type` field, flattened next to the common fields:
//
//   {"id": "...", "blocked_goal": "...", "type": "recommended",
//    "requires_goal": "...", "overridden": false, "status": "pending", ...}

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DependencyStatus {
    Pending,
    Satisfied,
}

impl fmt::Display for DependencyStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DependencyStatus::Pending => write!(f, "pending"),
            DependencyStatus::Satisfied => write!(f, "satisfied"),
        }
    }
}

/// What a dependency waits for.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DependencyKind {
    /// Another goal must be achieved first. Never overridable.
    Prerequisite { requires_goal: Uuid },

    /// Another goal should be achieved first; the user may override.
    Recommended {
        requires_goal: Uuid,
        #[serde(default)]
        overridden: bool,
    },

    /// Waits for a life event to clear. Never overridable.
    LifeEvent { awaits_event: Uuid },

    /// A measured quantity must reach a threshold. `current` is `None` when
    /// no measurement is available, which counts as pending.
    Resource {
        resource: String,
        threshold: f64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        current: Option<f64>,
    },
}

impl DependencyKind {
    pub fn type_name(&self) -> &'static str {
        match self {
            DependencyKind::Prerequisite { .. } => "prerequisite",
            DependencyKind::Recommended { .. } => "recommended",
            DependencyKind::LifeEvent { .. } => "life_event",
            DependencyKind::Resource { .. } => "resource",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Dependency {
    pub id: Uuid,

    /// The goal that cannot commit until this dependency clears.
    pub blocked_goal: Uuid,

    #[serde(flatten)]
    pub kind: DependencyKind,

    pub status: DependencyStatus,

    pub created_at: DateTime<Utc>,
}

impl Dependency {
    fn with_kind(blocked_goal: Uuid, kind: DependencyKind, created_at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            blocked_goal,
            kind,
            status: DependencyStatus::Pending,
            created_at,
        }
    }

    pub fn prerequisite(blocked_goal: Uuid, requires_goal: Uuid, created_at: DateTime<Utc>) -> Self {
        Self::with_kind(
            blocked_goal,
            DependencyKind::Prerequisite { requires_goal },
            created_at,
        )
    }

    pub fn recommended(blocked_goal: Uuid, requires_goal: Uuid, created_at: DateTime<Utc>) -> Self {
        Self::with_kind(
            blocked_goal,
            DependencyKind::Recommended {
                requires_goal,
                overridden: false,
            },
            created_at,
        )
    }

    pub fn life_event(blocked_goal: Uuid, awaits_event: Uuid, created_at: DateTime<Utc>) -> Self {
        Self::with_kind(
            blocked_goal,
            DependencyKind::LifeEvent { awaits_event },
            created_at,
        )
    }

    pub fn resource(
        blocked_goal: Uuid,
        resource: impl Into<String>,
        threshold: f64,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self::with_kind(
            blocked_goal,
            DependencyKind::Resource {
                resource: resource.into(),
                threshold,
                current: None,
            },
            created_at,
        )
    }

    /// The goal this dependency points at, for goal-to-goal edges.
    pub fn required_goal(&self) -> Option<Uuid> {
        match self.kind {
            DependencyKind::Prerequisite { requires_goal }
            | DependencyKind::Recommended { requires_goal, .. } => Some(requires_goal),
            DependencyKind::LifeEvent { .. } | DependencyKind::Resource { .. } => None,
        }
    }

    pub fn awaited_event(&self) -> Option<Uuid> {
        match self.kind {
            DependencyKind::LifeEvent { awaits_event } => Some(awaits_event),
            _ => None,
        }
    }

    /// Overridden recommendations no longer block.
    pub fn is_blocking(&self) -> bool {
        !matches!(
            self.kind,
            DependencyKind::Recommended {
                overridden: true,
                ..
            }
        )
    }

    pub fn is_satisfied(&self) -> bool {
        match &self.kind {
            DependencyKind::Resource {
                threshold, current, ..
            } => current.is_some_and(|c| c >= *threshold),
            _ => self.status == DependencyStatus::Satisfied,
        }
    }

    /// Blocking and not yet satisfied.
    pub fn holds_back(&self) -> bool {
        self.is_blocking() && !self.is_satisfied()
    }
}
