// goal.rs - Goal: a measurable, time-bound commitment with a lifecycle.
//
// The lifecycle is a fixed directed graph:
//   dream → considered → ready → committed → achieved
//   committed ⇄ paused, committed → failed → considered
//   (abandoned / invalidated reachable from every non-terminal state)
//
// `state` and `state_history` are only written by the GoalStateMachine,
// which is why they are crate-private with read-only accessors.

use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The nine lifecycle states of a goal.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum GoalState {
    /// An idea, not yet evaluated.
    Dream,
    /// Being evaluated; dependencies may still be open.
    Considered,
    /// Every blocking dependency is satisfied.
    Ready,
    /// Actively pursued.
    Committed,
    /// Temporarily on hold, usually because a life event intervened.
    Paused,
    Achieved,
    /// Missed; may be reconsidered.
    Failed,
    Abandoned,
    /// Made impossible by circumstances.
    Invalidated,
}

impl GoalState {
    pub const ALL: [GoalState; 9] = [
        GoalState::Dream,
        GoalState::Considered,
        GoalState::Ready,
        GoalState::Committed,
        GoalState::Paused,
        GoalState::Achieved,
        GoalState::Failed,
        GoalState::Abandoned,
        GoalState::Invalidated,
    ];

    /// Terminal states have no outgoing transitions.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            GoalState::Achieved | GoalState::Abandoned | GoalState::Invalidated
        )
    }

    /// The transition table: every state reachable from `self` in one step.
    pub fn allowed_targets(self) -> &'static [GoalState] {
        use GoalState::*;
        match self {
            Dream => &[Considered, Abandoned, Invalidated],
            Considered => &[Ready, Dream, Abandoned, Invalidated],
            Ready => &[Committed, Considered, Abandoned, Invalidated],
            Committed => &[Achieved, Failed, Paused, Abandoned, Invalidated],
            Paused => &[Committed, Abandoned, Invalidated],
            Failed => &[Considered, Invalidated],
            Achieved | Abandoned | Invalidated => &[],
        }
    }

    pub fn can_transition_to(self, next: GoalState) -> bool {
        self.allowed_targets().contains(&next)
    }
}

impl fmt::Display for GoalState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            GoalState::Dream => "dream",
            GoalState::Considered => "considered",
            GoalState::Ready => "ready",
            GoalState::Committed => "committed",
            GoalState::Paused => "paused",
            GoalState::Achieved => "achieved",
            GoalState::Failed => "failed",
            GoalState::Abandoned => "abandoned",
            GoalState::Invalidated => "invalidated",
        };
        f.write_str(name)
    }
}

impl std::str::FromStr for GoalState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        GoalState::ALL
            .into_iter()
            .find(|state| state.to_string() == s)
            .ok_or_else(|| format!("unknown goal state '{}'", s))
    }
}

/// Who asked for a transition.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Trigger {
    /// An explicit user action.
    User,
    /// Derived by the resolver or forced by a life event.
    Auto,
}

/// One entry in a goal's append-only state history.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StateChange {
    pub state: GoalState,
    pub timestamp: DateTime<Utc>,
    pub reason: String,
    pub trigger: Trigger,
}

/// Advisory marker left by a `transforms` life event. Does not block transitions.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReviewFlag {
    pub event_id: Uuid,
    pub flagged_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

/// A long-lived personal goal.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Goal {
    pub id: Uuid,

    pub name: String,

    pub(crate) state: GoalState,

    /// Reference to the quality/value this goal serves.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quality: Option<String>,

    // Commitment fields. Optional while dreaming, required to commit.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub why: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sacrifice: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deadline: Option<NaiveDate>,
    #[serde(default)]
    pub metrics: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audacity: Option<String>,

    pub created_at: DateTime<Utc>,

    pub(crate) state_history: Vec<StateChange>,

    /// Written after the goal has finished (terminal or failed).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retrospective: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub review_flag: Option<ReviewFlag>,

    /// Life events already applied to this goal. Re-applying one is a no-op.
    #[serde(default)]
    pub processed_events: BTreeSet<Uuid>,
}

impl Goal {
    /// Create a new goal in the `dream` state.
    pub fn new(name: impl Into<String>, created_at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            state: GoalState::Dream,
            quality: None,
            why: None,
            sacrifice: None,
            deadline: None,
            metrics: Vec::new(),
            audacity: None,
            created_at,
            state_history: vec![StateChange {
                state: GoalState::Dream,
                timestamp: created_at,
                reason: "created".to_string(),
                trigger: Trigger::User,
            }],
            retrospective: None,
            review_flag: None,
            processed_events: BTreeSet::new(),
        }
    }

    pub fn state(&self) -> GoalState {
        self.state
    }

    pub fn state_history(&self) -> &[StateChange] {
        &self.state_history
    }

    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }

    /// Names of the commitment fields that are still missing.
    pub fn missing_commitment_fields(&self) -> Vec<String> {
        let mut missing = Vec::new();
        if self.why.as_deref().map_or(true, |s| s.trim().is_empty()) {
            missing.push("why".to_string());
        }
        if self
            .sacrifice
            .as_deref()
            .map_or(true, |s| s.trim().is_empty())
        {
            missing.push("sacrifice".to_string());
        }
        if self.deadline.is_none() {
            missing.push("deadline".to_string());
        }
        if self.metrics.iter().all(|m| m.trim().is_empty()) {
            missing.push("metrics".to_string());
        }
        missing
    }
}
