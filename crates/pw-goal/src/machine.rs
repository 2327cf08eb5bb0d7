// machine.rs - GoalStateMachine: validated single-goal transitions.
//
// Every state change of every goal goes through `transition()`. Checks run
// in a fixed order:
//
// 1. Terminal current state → TerminalState
// 2. Auto trigger re-requesting the current state → no-op
// 3. Target not in the transition table → InvalidTransition
// 4. ready → committed with missing commitment fields → CommitmentGate
// 5. Entering committed while dependencies are open → StaleReadiness
//
// The readiness check is asked at call time. A goal sitting in `ready` is
// only a cached opinion; the graph may have changed since.

use std::sync::Arc;

use uuid::Uuid;

use crate::clock::ClockSource;
use crate::error::GoalError;
use crate::events::PlanEvent;
use crate::goal::{Goal, GoalState, StateChange, Trigger};

/// Answers "are all blocking dependencies of this goal satisfied right now?".
pub trait ReadinessCheck {
    fn is_satisfied(&self, goal_id: Uuid) -> bool;
}

/// A fixed answer, for callers that already know the readiness outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KnownReadiness(pub bool);

impl ReadinessCheck for KnownReadiness {
    fn is_satisfied(&self, _goal_id: Uuid) -> bool {
        self.0
    }
}

/// Outcome of a successful `transition()` call.
#[derive(Debug, Clone, PartialEq)]
pub enum Transition {
    /// The state changed and a history entry was appended.
    Applied(PlanEvent),
    /// An auto transition asked for the state the goal is already in.
    Unchanged,
}

impl Transition {
    pub fn is_applied(&self) -> bool {
        matches!(self, Transition::Applied(_))
    }

    pub fn into_event(self) -> Option<PlanEvent> {
        match self {
            Transition::Applied(event) => Some(event),
            Transition::Unchanged => None,
        }
    }
}

/// Validates and executes goal transitions against the fixed table.
#[derive(Clone)]
pub struct GoalStateMachine {
    clock: Arc<dyn ClockSource>,
}

impl GoalStateMachine {
    pub fn new(clock: Arc<dyn ClockSource>) -> Self {
        Self { clock }
    }

    pub fn clock(&self) -> &dyn ClockSource {
        self.clock.as_ref()
    }

    /// Move `goal` to `target`.
    pub fn transition(
        &self,
        goal: &mut Goal,
        target: GoalState,
        reason: &str,
        trigger: Trigger,
        readiness: &dyn ReadinessCheck,
    ) -> Result<Transition, GoalError> {
        let current = goal.state;

        if current.is_terminal() {
            return Err(GoalError::TerminalState {
                goal_id: goal.id,
                state: current,
            });
        }

        // Recomputation may derive the same target several times per batch.
        if trigger == Trigger::Auto && target == current {
            return Ok(Transition::Unchanged);
        }

        if !current.can_transition_to(target) {
            return Err(GoalError::InvalidTransition {
                goal_id: goal.id,
                from: current,
                to: target,
            });
        }

        if target == GoalState::Committed {
            if current == GoalState::Ready {
                let missing = goal.missing_commitment_fields();
                if !missing.is_empty() {
                    return Err(GoalError::CommitmentGate {
                        goal_id: goal.id,
                        missing,
                    });
                }
            }
            if !readiness.is_satisfied(goal.id) {
                return Err(GoalError::StaleReadiness { goal_id: goal.id });
            }
        }

        // History stays monotonic even if the clock steps backwards.
        let mut timestamp = self.clock.now();
        if let Some(last) = goal.state_history.last() {
            if timestamp < last.timestamp {
                timestamp = last.timestamp;
            }
        }

        goal.state = target;
        goal.state_history.push(StateChange {
            state: target,
            timestamp,
            reason: reason.to_string(),
            trigger,
        });

        tracing::debug!(goal_id = %goal.id, from = %current, to = %target, ?trigger, "goal transitioned");

        Ok(Transition::Applied(PlanEvent::GoalTransitioned {
            goal_id: goal.id,
            from: current,
            to: target,
            reason: reason.to_string(),
            trigger,
            timestamp,
        }))
    }

    /// Attach a retrospective to a finished goal (terminal or failed).
    pub fn record_retrospective(&self, goal: &mut Goal, text: &str) -> Result<(), GoalError> {
        if !goal.is_terminal() && goal.state != GoalState::Failed {
            return Err(GoalError::RetrospectiveNotAllowed {
                goal_id: goal.id,
                state: goal.state,
            });
        }
        goal.retrospective = Some(text.to_string());
        Ok(())
    }
}
