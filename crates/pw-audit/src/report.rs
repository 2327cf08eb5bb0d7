// report.rs - AuditService: read-only diagnostics over a plan snapshot.
//
// The audit never mutates. Everything it finds is informational except
// circular goal edges, which insertion makes impossible; finding one means
// the stored plan is corrupt, so it is an error rather than a finding.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use pw_goal::GoalState;
use pw_graph::{DependencyKind, DependencyStatus, Plan};
use pw_life_events::{DurationType, LifeEvent, LifeEventStatus};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AuditError;
use crate::hasher;

/// A goal that other goals are waiting on.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Bottleneck {
    pub goal_id: Uuid,
    /// `None` when the required goal is not in the plan.
    pub name: Option<String>,
    /// Distinct goals held back by it.
    pub dependents: usize,
}

/// An anticipated event whose expected date has passed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StaleEvent {
    pub event_id: Uuid,
    pub event_type: String,
    pub expected_date: DateTime<Utc>,
    pub overdue_days: i64,
}

/// A pending dependency that nothing can ever satisfy.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UnreachableDependency {
    pub dependency_id: Uuid,
    pub blocked_goal: Uuid,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AuditReport {
    pub generated_at: DateTime<Utc>,
    pub ready_goals: usize,
    pub blocked_goals: usize,
    pub bottlenecks: Vec<Bottleneck>,
    pub stale_events: Vec<StaleEvent>,
    /// Always empty in a report; cycles surface as `AuditError`.
    pub circular_dependencies: Vec<Vec<Uuid>>,
    pub orphaned_goals: Vec<Uuid>,
    pub unreachable_dependencies: Vec<UnreachableDependency>,
    pub flagged_for_review: Vec<Uuid>,
    pub snapshot_digest: String,
}

#[derive(Serialize)]
struct Snapshot<'a> {
    plan: &'a Plan,
    events: Vec<&'a LifeEvent>,
}

#[derive(Debug, Clone, Default)]
pub struct AuditService {
    bottleneck_limit: Option<usize>,
}

impl AuditService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keep only the top `limit` bottlenecks.
    pub fn with_bottleneck_limit(mut self, limit: usize) -> Self {
        self.bottleneck_limit = Some(limit);
        self
    }

    pub fn run<'a>(
        &self,
        plan: &'a Plan,
        events: impl IntoIterator<Item = &'a LifeEvent>,
        now: DateTime<Utc>,
    ) -> Result<AuditReport, AuditError> {
        let cycles = plan.graph.find_cycles();
        if !cycles.is_empty() {
            tracing::error!(cycles = cycles.len(), "plan contains circular dependencies");
            return Err(AuditError::CircularDependencies { cycles });
        }

        let mut events: Vec<&LifeEvent> = events.into_iter().collect();
        events.sort_by_key(|e| e.id);

        let live = plan.goals.values().filter(|g| !g.is_terminal());

        let mut ready_goals = 0;
        let mut blocked_goals = 0;
        let mut orphaned_goals = Vec::new();
        let mut flagged_for_review = Vec::new();
        for goal in live {
            if goal.state() == GoalState::Ready {
                ready_goals += 1;
            }
            if !plan.graph.is_satisfied(goal.id) {
                blocked_goals += 1;
            }
            if !plan.graph.has_edges(goal.id) {
                orphaned_goals.push(goal.id);
            }
            if goal.review_flag.is_some() {
                flagged_for_review.push(goal.id);
            }
        }

        let report = AuditReport {
            generated_at: now,
            ready_goals,
            blocked_goals,
            bottlenecks: self.bottlenecks(plan),
            stale_events: stale_events(&events, now),
            circular_dependencies: Vec::new(),
            orphaned_goals,
            unreachable_dependencies: unreachable_dependencies(plan, &events),
            flagged_for_review,
            snapshot_digest: hasher::hash_json(&Snapshot { plan, events })?,
        };

        tracing::info!(
            ready = report.ready_goals,
            blocked = report.blocked_goals,
            bottlenecks = report.bottlenecks.len(),
            stale_events = report.stale_events.len(),
            "season audit complete"
        );
        Ok(report)
    }

    /// Required goals of pending goal edges, most dependents first. Ties go
    /// to the goal created earliest; goals missing from the plan sort last.
    fn bottlenecks(&self, plan: &Plan) -> Vec<Bottleneck> {
        let mut dependents: BTreeMap<Uuid, BTreeSet<Uuid>> = BTreeMap::new();
        for dep in plan.graph.iter() {
            if dep.status != DependencyStatus::Pending || !dep.is_blocking() {
                continue;
            }
            if let Some(required) = dep.required_goal() {
                dependents.entry(required).or_default().insert(dep.blocked_goal);
            }
        }

        let mut ranked: Vec<(Uuid, usize, Option<DateTime<Utc>>)> = dependents
            .into_iter()
            .map(|(id, blocked)| (id, blocked.len(), plan.goals.get(&id).map(|g| g.created_at)))
            .collect();
        ranked.sort_by(|a, b| {
            b.1.cmp(&a.1)
                .then_with(|| match (a.2, b.2) {
                    (Some(x), Some(y)) => x.cmp(&y),
                    (Some(_), None) => std::cmp::Ordering::Less,
                    (None, Some(_)) => std::cmp::Ordering::Greater,
                    (None, None) => std::cmp::Ordering::Equal,
                })
                .then_with(|| a.0.cmp(&b.0))
        });
        if let Some(limit) = self.bottleneck_limit {
            ranked.truncate(limit);
        }

        ranked
            .into_iter()
            .map(|(goal_id, dependents, _)| Bottleneck {
                goal_id,
                name: plan.goals.get(&goal_id).map(|g| g.name.clone()),
                dependents,
            })
            .collect()
    }
}

fn stale_events(events: &[&LifeEvent], now: DateTime<Utc>) -> Vec<StaleEvent> {
    let mut stale: Vec<StaleEvent> = events
        .iter()
        .filter(|e| e.status == LifeEventStatus::Anticipated)
        .filter_map(|e| {
            let expected = e.expected_date?;
            (expected < now).then(|| StaleEvent {
                event_id: e.id,
                event_type: e.event_type.clone(),
                expected_date: expected,
                overdue_days: (now - expected).num_days(),
            })
        })
        .collect();
    // Earliest expectation is the most overdue.
    stale.sort_by(|a, b| a.expected_date.cmp(&b.expected_date).then_with(|| a.event_id.cmp(&b.event_id)));
    stale
}

fn unreachable_dependencies(plan: &Plan, events: &[&LifeEvent]) -> Vec<UnreachableDependency> {
    let by_id: BTreeMap<Uuid, &LifeEvent> = events.iter().map(|e| (e.id, *e)).collect();

    plan.graph
        .iter()
        .filter(|dep| dep.status == DependencyStatus::Pending && dep.is_blocking())
        .filter_map(|dep| {
            let reason = match &dep.kind {
                DependencyKind::Prerequisite { requires_goal }
                | DependencyKind::Recommended { requires_goal, .. } => {
                    match plan.goals.get(requires_goal).map(|g| g.state()) {
                        None => format!("required goal {requires_goal} does not exist"),
                        Some(state @ (GoalState::Failed | GoalState::Abandoned | GoalState::Invalidated)) => {
                            format!("required goal {requires_goal} is {state}")
                        }
                        Some(_) => return None,
                    }
                }
                DependencyKind::LifeEvent { awaits_event } => match by_id.get(awaits_event) {
                    None => format!("awaited event {awaits_event} is unknown"),
                    Some(e) if e.resolved_at.is_some() => return None,
                    Some(e) if e.duration_type == DurationType::Permanent => {
                        format!("awaited event {awaits_event} is permanent")
                    }
                    Some(_) => return None,
                },
                DependencyKind::Resource { .. } => return None,
            };
            Some(UnreachableDependency {
                dependency_id: dep.id,
                blocked_goal: dep.blocked_goal,
                reason,
            })
        })
        .collect()
}
