// processor.rs - LifeEventProcessor: applies occurred events to goals.
//
// Each listed goal is handled in its own draft (`Plan::commit`), so one
// failing goal is logged and skipped without undoing the others. A goal
// remembers the events already applied to it, which makes re-application
// a no-op per goal.
//
// The emergency retrospective of a cascading event is returned to the
// caller, not scheduled here: scheduling is external I/O and must only see
// committed results.

use chrono::{DateTime, Utc};
use pw_goal::{GoalState, PlanEvent, ReviewFlag, Trigger};
use pw_graph::{Dependency, DependencyResolver, ExternalSignal, Plan, Resolution};
use serde::Serialize;
use uuid::Uuid;

use crate::error::LifeEventError;
use crate::event::{DurationType, EventImpact, GoalEffect, LifeEvent, LifeEventStatus};

/// Summary of one `apply` call.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ImpactReport {
    pub event_id: Uuid,
    /// Goals whose state, dependencies or review flag changed.
    pub goals_affected: Vec<Uuid>,
    pub transitions_applied: usize,
    /// True only on the call that requested the emergency retrospective.
    pub ceremony_triggered: bool,
    /// Goals that were unknown or whose update failed.
    pub skipped: Vec<Uuid>,
}

/// Request for an out-of-cycle retrospective after a cascading event.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EmergencyRetro {
    pub event_id: Uuid,
    pub event_type: String,
    pub goals_affected: Vec<Uuid>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AppliedImpact {
    pub report: ImpactReport,
    pub resolution: Resolution,
    pub emergency_retro: Option<EmergencyRetro>,
}

#[derive(Clone)]
pub struct LifeEventProcessor {
    resolver: DependencyResolver,
}

impl LifeEventProcessor {
    pub fn new(resolver: DependencyResolver) -> Self {
        Self { resolver }
    }

    pub fn resolver(&self) -> &DependencyResolver {
        &self.resolver
    }

    fn now(&self) -> DateTime<Utc> {
        self.resolver.machine().clock().now()
    }

    /// Apply an event's effects to every goal it names.
    ///
    /// Events that have not occurred are inert. Goals that already saw this
    /// event are left alone.
    pub fn apply(
        &self,
        plan: &mut Plan,
        event: &mut LifeEvent,
    ) -> Result<AppliedImpact, LifeEventError> {
        let mut outcome = AppliedImpact {
            report: ImpactReport {
                event_id: event.id,
                ..ImpactReport::default()
            },
            ..AppliedImpact::default()
        };

        if !event.exerts_effect() {
            tracing::debug!(event_id = %event.id, status = %event.status, "life event has no effect yet");
            return Ok(outcome);
        }

        let now = self.now();
        let event_id = event.id;
        let note = match &event.impact {
            EventImpact::Transforms { note, .. } => note.clone(),
            _ => None,
        };

        for (goal_id, effect) in event.impact.goal_effects() {
            let seen = match plan.goals.get(&goal_id) {
                Some(goal) => goal.processed_events.contains(&event_id),
                None => {
                    tracing::warn!(event_id = %event_id, goal_id = %goal_id, "life event names unknown goal; skipping");
                    outcome.report.skipped.push(goal_id);
                    continue;
                }
            };
            if seen {
                continue;
            }

            let result = plan.commit(|draft| {
                let changed = self.apply_effect(draft, event_id, goal_id, effect, note.as_deref(), now)?;
                draft.goal_mut(goal_id)?.processed_events.insert(event_id);
                Ok::<_, LifeEventError>(changed)
            });

            match result {
                Ok(Some(resolution)) => {
                    outcome.report.goals_affected.push(goal_id);
                    outcome.report.transitions_applied += resolution.transitions;
                    outcome.resolution.merge(resolution);
                }
                Ok(None) => {}
                Err(e) => {
                    // Left unmarked so a later re-application retries it.
                    tracing::warn!(
                        event_id = %event_id,
                        goal_id = %goal_id,
                        error = %e,
                        "failed to apply life event to goal; continuing"
                    );
                    outcome.report.skipped.push(goal_id);
                }
            }
        }

        if matches!(event.impact, EventImpact::Cascades { .. }) && !event.emergency_retro_requested {
            event.emergency_retro_requested = true;
            let goals = event.impact.goal_ids();
            tracing::warn!(
                event_id = %event_id,
                event_type = %event.event_type,
                goals = goals.len(),
                "cascading life event; emergency retrospective required"
            );
            outcome.report.ceremony_triggered = true;
            outcome.resolution.events.push(PlanEvent::CascadeTriggered {
                event_id,
                goals_affected: goals.clone(),
                timestamp: now,
            });
            outcome.emergency_retro = Some(EmergencyRetro {
                event_id,
                event_type: event.event_type.clone(),
                goals_affected: goals,
            });
        }

        if !outcome.report.goals_affected.is_empty() {
            outcome.resolution.events.push(PlanEvent::LifeEventApplied {
                event_id,
                impact_type: event.impact.impact_type().to_string(),
                goals_affected: outcome.report.goals_affected.clone(),
                timestamp: now,
            });
        }
        if event.applied_at.is_none() {
            event.applied_at = Some(now);
        }

        tracing::info!(
            event_id = %event_id,
            impact_type = event.impact.impact_type(),
            affected = outcome.report.goals_affected.len(),
            transitions = outcome.report.transitions_applied,
            "life event applied"
        );
        Ok(outcome)
    }

    /// anticipated → occurred, then apply.
    pub fn mark_occurred(
        &self,
        plan: &mut Plan,
        event: &mut LifeEvent,
    ) -> Result<AppliedImpact, LifeEventError> {
        event.occur(self.now())?;
        self.apply(plan, event)
    }

    /// anticipated → cancelled. Anything waiting on the event stops waiting,
    /// since it will never happen.
    pub fn cancel(
        &self,
        plan: &mut Plan,
        event: &mut LifeEvent,
    ) -> Result<Resolution, LifeEventError> {
        event.cancel()?;
        let resolution = self
            .resolver
            .on_external_change(plan, &ExternalSignal::EventCleared(event.id))?;
        tracing::info!(event_id = %event.id, "life event cancelled");
        Ok(resolution)
    }

    /// The event's resolution condition was met: its life-event
    /// dependencies are satisfied and waiting goals re-evaluated.
    pub fn resolve(
        &self,
        plan: &mut Plan,
        event: &mut LifeEvent,
    ) -> Result<Resolution, LifeEventError> {
        if event.resolved_at.is_some() {
            return Ok(Resolution::default());
        }
        if event.status != LifeEventStatus::Occurred || event.duration_type == DurationType::Permanent {
            return Err(LifeEventError::NotResolvable {
                event_id: event.id,
                status: event.status,
                duration: event.duration_type,
            });
        }

        let resolution = self
            .resolver
            .on_external_change(plan, &ExternalSignal::EventCleared(event.id))?;
        event.resolved_at = Some(self.now());
        tracing::info!(event_id = %event.id, affected = resolution.affected.len(), "life event resolved");
        Ok(resolution)
    }

    /// Returns `None` when the goal's state makes the effect a no-op.
    fn apply_effect(
        &self,
        plan: &mut Plan,
        event_id: Uuid,
        goal_id: Uuid,
        effect: GoalEffect,
        note: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<Option<Resolution>, LifeEventError> {
        let state = plan.goal(goal_id)?.state();
        if state.is_terminal() {
            return Ok(None);
        }

        let effect = match effect {
            GoalEffect::Auto if state == GoalState::Committed => GoalEffect::Derail,
            GoalEffect::Auto => GoalEffect::FlagForReview,
            other => other,
        };
        let reason = event_id.to_string();

        let resolution = match effect {
            GoalEffect::Block => {
                // Committed goals keep going; the block only holds back goals
                // that have not committed yet.
                if state == GoalState::Committed {
                    return Ok(None);
                }
                let waiting = plan
                    .graph
                    .dependencies_of(goal_id)
                    .any(|dep| dep.awaited_event() == Some(event_id));
                if waiting {
                    return Ok(None);
                }
                self.resolver
                    .add_dependency(plan, Dependency::life_event(goal_id, event_id, now))?
            }
            GoalEffect::Derail => {
                if state != GoalState::Committed {
                    return Ok(None);
                }
                self.resolver
                    .transition_goal(plan, goal_id, GoalState::Paused, &reason, Trigger::Auto)?
            }
            GoalEffect::Invalidate => self.resolver.transition_goal(
                plan,
                goal_id,
                GoalState::Invalidated,
                &reason,
                Trigger::Auto,
            )?,
            GoalEffect::FlagForReview | GoalEffect::Auto => {
                plan.goal_mut(goal_id)?.review_flag = Some(ReviewFlag {
                    event_id,
                    flagged_at: now,
                    note: note.map(str::to_string),
                });
                let mut resolution = Resolution::default();
                resolution.affected.insert(goal_id);
                resolution.events.push(PlanEvent::ReviewFlagged {
                    goal_id,
                    event_id,
                    timestamp: now,
                });
                resolution
            }
        };
        Ok(Some(resolution))
    }
}
