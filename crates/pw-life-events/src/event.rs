// event.rs - LifeEvent: an external occurrence that can force goal changes.
//
// The impact payload varies by impact type, so it is a tagged union rather
// than a bag of optional fields. Raw JSON is validated at the ingestion
// boundary (`LifeEvent::from_json`) before anything downstream sees it.
//
// Wire shape:
//
//   {
//     "id": "...", "type": "relocation", "status": "occurred",
//     "duration_type": "permanent",
//     "impact": { "impact_type": "derails", "goals": ["..."] },
//     ...
//   }

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::LifeEventError;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LifeEventStatus {
    /// Expected but not yet happened. Exerts no effect.
    Anticipated,
    Occurred,
    /// Never applies, even if it was anticipated.
    Cancelled,
}

impl fmt::Display for LifeEventStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LifeEventStatus::Anticipated => write!(f, "anticipated"),
            LifeEventStatus::Occurred => write!(f, "occurred"),
            LifeEventStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DurationType {
    /// Ends when its resolution condition is met.
    Temporary,
    Indefinite,
    Permanent,
}

impl fmt::Display for DurationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DurationType::Temporary => write!(f, "temporary"),
            DurationType::Indefinite => write!(f, "indefinite"),
            DurationType::Permanent => write!(f, "permanent"),
        }
    }
}

/// What a cascading event does to one goal.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum GoalEffect {
    /// Pick by state: derail committed goals, flag the rest for review.
    #[default]
    Auto,
    Block,
    Derail,
    Invalidate,
    FlagForReview,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CascadeEffect {
    pub goal_id: Uuid,
    #[serde(default)]
    pub effect: GoalEffect,
}

/// The impact block, tagged by `impact_type`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "impact_type", rename_all = "snake_case")]
pub enum EventImpact {
    /// Adds a life-event dependency on each listed goal.
    Blocks { goals: Vec<Uuid> },
    /// Pauses listed goals that are committed.
    Derails { goals: Vec<Uuid> },
    /// Moves listed non-terminal goals to invalidated.
    Invalidates { goals: Vec<Uuid> },
    /// Flags listed goals for review without changing state.
    Transforms {
        goals: Vec<Uuid>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        note: Option<String>,
    },
    /// Per-goal effects plus a one-time emergency retrospective.
    Cascades { effects: Vec<CascadeEffect> },
}

impl EventImpact {
    pub const TYPES: [&'static str; 5] = ["blocks", "derails", "invalidates", "transforms", "cascades"];

    pub fn impact_type(&self) -> &'static str {
        match self {
            EventImpact::Blocks { .. } => "blocks",
            EventImpact::Derails { .. } => "derails",
            EventImpact::Invalidates { .. } => "invalidates",
            EventImpact::Transforms { .. } => "transforms",
            EventImpact::Cascades { .. } => "cascades",
        }
    }

    /// Each affected goal with the effect to apply to it.
    pub fn goal_effects(&self) -> Vec<(Uuid, GoalEffect)> {
        let uniform = |goals: &[Uuid], effect: GoalEffect| {
            goals.iter().map(|id| (*id, effect)).collect::<Vec<_>>()
        };
        match self {
            EventImpact::Blocks { goals } => uniform(goals, GoalEffect::Block),
            EventImpact::Derails { goals } => uniform(goals, GoalEffect::Derail),
            EventImpact::Invalidates { goals } => uniform(goals, GoalEffect::Invalidate),
            EventImpact::Transforms { goals, .. } => uniform(goals, GoalEffect::FlagForReview),
            EventImpact::Cascades { effects } => {
                effects.iter().map(|e| (e.goal_id, e.effect)).collect()
            }
        }
    }

    pub fn goal_ids(&self) -> Vec<Uuid> {
        self.goal_effects().into_iter().map(|(id, _)| id).collect()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ResolutionCondition {
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_by: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LifeEvent {
    pub id: Uuid,

    /// Free-form category, e.g. "relocation", "new_baby", "injury".
    #[serde(rename = "type")]
    pub event_type: String,

    pub status: LifeEventStatus,

    pub duration_type: DurationType,

    pub impact: EventImpact,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolution: Option<ResolutionCondition>,

    /// When an anticipated event is expected to happen.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_date: Option<DateTime<Utc>>,

    pub declared_at: DateTime<Utc>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub occurred_at: Option<DateTime<Utc>>,

    /// Set the first time the event's effects were applied.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub applied_at: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolved_at: Option<DateTime<Utc>>,

    /// Idempotency marker: the cascade retro was already requested.
    #[serde(default)]
    pub emergency_retro_requested: bool,
}

impl LifeEvent {
    /// An anticipated event. Use `occur` to make it take effect.
    pub fn anticipated(
        event_type: impl Into<String>,
        duration_type: DurationType,
        impact: EventImpact,
        declared_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            event_type: event_type.into(),
            status: LifeEventStatus::Anticipated,
            duration_type,
            impact,
            resolution: None,
            expected_date: None,
            declared_at,
            occurred_at: None,
            applied_at: None,
            resolved_at: None,
            emergency_retro_requested: false,
        }
    }

    /// An event that has already happened.
    pub fn occurred(
        event_type: impl Into<String>,
        duration_type: DurationType,
        impact: EventImpact,
        at: DateTime<Utc>,
    ) -> Self {
        let mut event = Self::anticipated(event_type, duration_type, impact, at);
        event.status = LifeEventStatus::Occurred;
        event.occurred_at = Some(at);
        event
    }

    pub fn with_resolution(mut self, description: impl Into<String>) -> Self {
        self.resolution = Some(ResolutionCondition {
            description: description.into(),
            expected_by: None,
        });
        self
    }

    pub fn with_expected_date(mut self, expected: DateTime<Utc>) -> Self {
        self.expected_date = Some(expected);
        self
    }

    /// Parse and validate a raw payload.
    pub fn from_json(value: serde_json::Value) -> Result<Self, LifeEventError> {
        let impact_type = value
            .get("impact")
            .and_then(|impact| impact.get("impact_type"))
            .and_then(|t| t.as_str());
        match impact_type {
            Some(t) if EventImpact::TYPES.contains(&t) => {}
            Some(t) => return Err(LifeEventError::UnknownImpactType(t.to_string())),
            None => return Err(LifeEventError::UnknownImpactType("<missing>".to_string())),
        }

        let event: LifeEvent = serde_json::from_value(value)?;
        event.validate()?;
        Ok(event)
    }

    pub fn validate(&self) -> Result<(), LifeEventError> {
        if self.duration_type == DurationType::Temporary && self.resolution.is_none() {
            return Err(LifeEventError::MissingResolution(self.id));
        }
        Ok(())
    }

    pub fn exerts_effect(&self) -> bool {
        self.status == LifeEventStatus::Occurred
    }

    /// anticipated → occurred
    pub fn occur(&mut self, at: DateTime<Utc>) -> Result<(), LifeEventError> {
        self.move_to(LifeEventStatus::Occurred)?;
        self.occurred_at = Some(at);
        Ok(())
    }

    /// anticipated → cancelled
    pub fn cancel(&mut self) -> Result<(), LifeEventError> {
        self.move_to(LifeEventStatus::Cancelled)
    }

    fn move_to(&mut self, to: LifeEventStatus) -> Result<(), LifeEventError> {
        if self.status != LifeEventStatus::Anticipated {
            return Err(LifeEventError::InvalidStatusTransition {
                event_id: self.id,
                from: self.status,
                to,
            });
        }
        self.status = to;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn raw(impact: serde_json::Value) -> serde_json::Value {
        json!({
            "id": Uuid::new_v4(),
            "type": "relocation",
            "status": "occurred",
            "duration_type": "permanent",
            "impact": impact,
            "declared_at": Utc::now(),
        })
    }

    #[test]
    fn ingests_tagged_impact() {
        let goal = Uuid::new_v4();
        let event =
            LifeEvent::from_json(raw(json!({"impact_type": "derails", "goals": [goal]}))).unwrap();
        assert_eq!(event.impact, EventImpact::Derails { goals: vec![goal] });
        assert!(event.exerts_effect());
    }

    #[test]
    fn unknown_impact_type_is_rejected() {
        let result = LifeEvent::from_json(raw(json!({"impact_type": "explodes", "goals": []})));
        assert!(matches!(result, Err(LifeEventError::UnknownImpactType(t)) if t == "explodes"));

        let result = LifeEvent::from_json(raw(json!({"goals": []})));
        assert!(matches!(result, Err(LifeEventError::UnknownImpactType(_))));
    }

    #[test]
    fn temporary_event_needs_resolution() {
        let mut payload = raw(json!({"impact_type": "blocks", "goals": []}));
        payload["duration_type"] = json!("temporary");
        assert!(matches!(
            LifeEvent::from_json(payload.clone()),
            Err(LifeEventError::MissingResolution(_))
        ));

        payload["resolution"] = json!({"description": "cast comes off"});
        assert!(LifeEvent::from_json(payload).is_ok());
    }

    #[test]
    fn cascade_effects_default_to_auto() {
        let goal = Uuid::new_v4();
        let event = LifeEvent::from_json(raw(
            json!({"impact_type": "cascades", "effects": [{"goal_id": goal}]}),
        ))
        .unwrap();
        assert_eq!(event.impact.goal_effects(), vec![(goal, GoalEffect::Auto)]);
    }

    #[test]
    fn status_moves_only_out_of_anticipated() {
        let impact = EventImpact::Blocks { goals: vec![] };
        let mut event = LifeEvent::anticipated("exam", DurationType::Indefinite, impact, Utc::now());
        event.cancel().unwrap();
        assert_eq!(event.status, LifeEventStatus::Cancelled);
        assert!(matches!(
            event.occur(Utc::now()),
            Err(LifeEventError::InvalidStatusTransition { .. })
        ));
        assert!(!event.exerts_effect());
    }
}
