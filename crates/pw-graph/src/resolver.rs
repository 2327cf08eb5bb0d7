// resolver.rs - DependencyResolver: keeps readiness and states consistent.
//
// Every graph or external-condition change goes through here:
//
// 1. Validate and apply the change to the plan (never partially).
// 2. Collect the dependencies whose status flipped; their blocked goals are
//    the seeds.
// 3. Extend the seeds through dependents (visited set, so it terminates).
// 4. Evaluate the affected goals in topological order, so a goal is never
//    evaluated before its own prerequisites have settled:
//      considered + satisfied   → ready       (auto)
//      ready      + unsatisfied → considered  (auto)
//      committed  + unsatisfied → paused      (auto)
//
// All of this runs synchronously before the call returns. Callers pass a
// draft plan (see `Plan::commit`), so an error anywhere discards the batch.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use pw_goal::{GoalError, GoalState, GoalStateMachine, PlanEvent, Trigger};
use serde::Serialize;
use uuid::Uuid;

use crate::dependency::{Dependency, DependencyKind, DependencyStatus};
use crate::error::GraphError;
use crate::plan::Plan;

/// A change in the world outside the graph.
#[derive(Debug, Clone, PartialEq)]
pub enum ExternalSignal {
    /// Fresh measurements per resource name. `None` marks a resource whose
    /// measurement is unavailable.
    Measurements(BTreeMap<String, Option<f64>>),
    /// A life event that goals were waiting on has cleared.
    EventCleared(Uuid),
}

/// What a resolver call changed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Resolution {
    /// Goals whose readiness was recomputed or whose state changed.
    pub affected: BTreeSet<Uuid>,
    /// Number of goal state transitions applied.
    pub transitions: usize,
    /// Domain events to hand out once the draft is committed.
    pub events: Vec<PlanEvent>,
}

impl Resolution {
    pub fn merge(&mut self, other: Resolution) {
        self.affected.extend(other.affected);
        self.transitions += other.transitions;
        self.events.extend(other.events);
    }
}

/// Answer to "can this goal commit, and if not, why?".
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Readiness {
    pub goal_id: Uuid,
    pub satisfied: bool,
    pub unsatisfied: Vec<Dependency>,
}

#[derive(Clone)]
pub struct DependencyResolver {
    machine: GoalStateMachine,
}

impl DependencyResolver {
    pub fn new(machine: GoalStateMachine) -> Self {
        Self { machine }
    }

    pub fn machine(&self) -> &GoalStateMachine {
        &self.machine
    }

    fn now(&self) -> DateTime<Utc> {
        self.machine.clock().now()
    }

    pub fn readiness(&self, plan: &Plan, goal_id: Uuid) -> Result<Readiness, GraphError> {
        plan.goal(goal_id)?;
        let unsatisfied: Vec<Dependency> = plan
            .graph
            .unsatisfied(goal_id)
            .into_iter()
            .cloned()
            .collect();
        Ok(Readiness {
            goal_id,
            satisfied: unsatisfied.is_empty(),
            unsatisfied,
        })
    }

    /// Transition one goal and propagate the consequences.
    pub fn transition_goal(
        &self,
        plan: &mut Plan,
        goal_id: Uuid,
        target: GoalState,
        reason: &str,
        trigger: Trigger,
    ) -> Result<Resolution, GraphError> {
        let mut resolution = Resolution::default();

        let Plan { goals, graph } = &mut *plan;
        let goal = goals
            .get_mut(&goal_id)
            .ok_or(GraphError::GoalNotFound(goal_id))?;
        let from = goal.state();
        let outcome = self
            .machine
            .transition(goal, target, reason, trigger, &*graph)?;
        let Some(event) = outcome.into_event() else {
            return Ok(resolution);
        };
        resolution.events.push(event);
        resolution.transitions += 1;
        resolution.affected.insert(goal_id);

        let mut seeds = BTreeSet::new();
        if target == GoalState::Achieved {
            seeds.extend(self.satisfy_dependents(plan, goal_id, &mut resolution));
        }
        if target.is_terminal() {
            self.prune_blockers(plan, goal_id, &mut resolution);
        }
        // Fresh consideration: settle readiness right away. A user stepping
        // back from ready to considered is left where they put it.
        if target == GoalState::Considered && matches!(from, GoalState::Dream | GoalState::Failed) {
            seeds.insert(goal_id);
        }

        self.propagate(plan, seeds, &mut resolution)?;

        tracing::info!(
            goal_id = %goal_id,
            from = %from,
            to = %target,
            affected = resolution.affected.len(),
            "goal transition committed to draft"
        );
        Ok(resolution)
    }

    /// Add a dependency. Goal edges are cycle-checked; the status of the new
    /// edge is derived from the current plan rather than trusted from input,
    /// except for life-event edges whose status the caller decides.
    pub fn add_dependency(
        &self,
        plan: &mut Plan,
        mut dep: Dependency,
    ) -> Result<Resolution, GraphError> {
        let blocked = plan.goal(dep.blocked_goal)?;
        if blocked.is_terminal() {
            return Err(GoalError::TerminalState {
                goal_id: blocked.id,
                state: blocked.state(),
            }
            .into());
        }
        let blocked_state = blocked.state();

        match &dep.kind {
            DependencyKind::Prerequisite { requires_goal }
            | DependencyKind::Recommended { requires_goal, .. } => {
                let required = plan.goal(*requires_goal)?;
                dep.status = if required.state() == GoalState::Achieved {
                    DependencyStatus::Satisfied
                } else {
                    DependencyStatus::Pending
                };
            }
            DependencyKind::Resource { .. } => {
                dep.status = if dep.is_satisfied() {
                    DependencyStatus::Satisfied
                } else {
                    DependencyStatus::Pending
                };
            }
            DependencyKind::LifeEvent { .. } => {}
        }

        if blocked_state == GoalState::Committed && dep.holds_back() {
            return Err(GraphError::BlockedGoalCommitted {
                goal_id: dep.blocked_goal,
                dependency_id: dep.id,
            });
        }

        let dependency_id = dep.id;
        let blocked_goal = dep.blocked_goal;
        let kind = dep.kind.type_name();
        plan.graph.insert(dep)?;

        let mut resolution = Resolution::default();
        resolution.events.push(PlanEvent::DependencyAdded {
            dependency_id,
            blocked_goal,
            timestamp: self.now(),
        });
        self.propagate(plan, BTreeSet::from([blocked_goal]), &mut resolution)?;

        tracing::info!(
            dependency_id = %dependency_id,
            blocked_goal = %blocked_goal,
            kind,
            "dependency added"
        );
        Ok(resolution)
    }

    pub fn remove_dependency(
        &self,
        plan: &mut Plan,
        dependency_id: Uuid,
    ) -> Result<Resolution, GraphError> {
        let dep = plan
            .graph
            .remove(dependency_id)
            .ok_or(GraphError::DependencyNotFound(dependency_id))?;

        let mut resolution = Resolution::default();
        resolution.events.push(PlanEvent::DependencyRemoved {
            dependency_id,
            blocked_goal: dep.blocked_goal,
            timestamp: self.now(),
        });
        self.propagate(plan, BTreeSet::from([dep.blocked_goal]), &mut resolution)?;

        tracing::info!(dependency_id = %dependency_id, "dependency removed");
        Ok(resolution)
    }

    /// Explicit user override of a `recommended` dependency.
    pub fn override_dependency(
        &self,
        plan: &mut Plan,
        dependency_id: Uuid,
    ) -> Result<Resolution, GraphError> {
        let dep = plan
            .graph
            .get_mut(dependency_id)
            .ok_or(GraphError::DependencyNotFound(dependency_id))?;
        let blocked_goal = dep.blocked_goal;
        match &mut dep.kind {
            DependencyKind::Recommended { overridden, .. } => {
                if *overridden {
                    return Ok(Resolution::default());
                }
                *overridden = true;
            }
            other => {
                return Err(GraphError::OverrideNotAllowed {
                    dependency_id,
                    kind: other.type_name().to_string(),
                })
            }
        }

        let mut resolution = Resolution::default();
        self.propagate(plan, BTreeSet::from([blocked_goal]), &mut resolution)?;
        tracing::info!(dependency_id = %dependency_id, "recommended dependency overridden");
        Ok(resolution)
    }

    /// React to a change outside the graph.
    pub fn on_external_change(
        &self,
        plan: &mut Plan,
        signal: &ExternalSignal,
    ) -> Result<Resolution, GraphError> {
        let mut resolution = Resolution::default();
        let mut seeds = BTreeSet::new();
        let now = self.now();

        match signal {
            ExternalSignal::Measurements(values) => {
                let ids: Vec<Uuid> = plan
                    .graph
                    .iter()
                    .filter(|dep| {
                        matches!(&dep.kind, DependencyKind::Resource { resource, .. }
                            if values.contains_key(resource))
                    })
                    .map(|dep| dep.id)
                    .collect();

                for id in ids {
                    let Some(dep) = plan.graph.get_mut(id) else {
                        continue;
                    };
                    if let DependencyKind::Resource {
                        resource, current, ..
                    } = &mut dep.kind
                    {
                        *current = values.get(resource.as_str()).copied().flatten();
                    }
                    let status = if dep.is_satisfied() {
                        DependencyStatus::Satisfied
                    } else {
                        DependencyStatus::Pending
                    };
                    if status != dep.status {
                        dep.status = status;
                        seeds.insert(dep.blocked_goal);
                        if status == DependencyStatus::Satisfied {
                            resolution.events.push(PlanEvent::DependencySatisfied {
                                dependency_id: id,
                                blocked_goal: dep.blocked_goal,
                                timestamp: now,
                            });
                        }
                    }
                }
            }
            ExternalSignal::EventCleared(event_id) => {
                let ids: Vec<Uuid> = plan
                    .graph
                    .iter()
                    .filter(|dep| {
                        dep.awaited_event() == Some(*event_id)
                            && dep.status == DependencyStatus::Pending
                    })
                    .map(|dep| dep.id)
                    .collect();

                for id in ids {
                    if let Some(dep) = plan.graph.get_mut(id) {
                        dep.status = DependencyStatus::Satisfied;
                        seeds.insert(dep.blocked_goal);
                        resolution.events.push(PlanEvent::DependencySatisfied {
                            dependency_id: id,
                            blocked_goal: dep.blocked_goal,
                            timestamp: now,
                        });
                    }
                }
            }
        }

        self.propagate(plan, seeds, &mut resolution)?;
        tracing::debug!(
            affected = resolution.affected.len(),
            "external change processed"
        );
        Ok(resolution)
    }

    /// Mark goal edges pointing at a freshly achieved goal as satisfied.
    fn satisfy_dependents(
        &self,
        plan: &mut Plan,
        goal_id: Uuid,
        resolution: &mut Resolution,
    ) -> BTreeSet<Uuid> {
        let pending: Vec<Uuid> = plan
            .graph
            .dependents_of(goal_id)
            .filter(|dep| dep.status == DependencyStatus::Pending)
            .map(|dep| dep.id)
            .collect();

        let now = self.now();
        let mut blocked = BTreeSet::new();
        for id in pending {
            if let Some(dep) = plan.graph.get_mut(id) {
                dep.status = DependencyStatus::Satisfied;
                blocked.insert(dep.blocked_goal);
                resolution.events.push(PlanEvent::DependencySatisfied {
                    dependency_id: id,
                    blocked_goal: dep.blocked_goal,
                    timestamp: now,
                });
            }
        }
        blocked
    }

    /// A terminal goal no longer needs anything; drop what blocked it.
    fn prune_blockers(&self, plan: &mut Plan, goal_id: Uuid, resolution: &mut Resolution) {
        let ids: Vec<Uuid> = plan.graph.dependencies_of(goal_id).map(|d| d.id).collect();
        let now = self.now();
        for id in ids {
            if plan.graph.remove(id).is_some() {
                resolution.events.push(PlanEvent::DependencyRemoved {
                    dependency_id: id,
                    blocked_goal: goal_id,
                    timestamp: now,
                });
            }
        }
    }

    /// Re-derive goal-edge statuses for one goal from the states of the
    /// goals it requires.
    fn refresh_goal_edges(&self, plan: &mut Plan, goal_id: Uuid, resolution: &mut Resolution) {
        let updates: Vec<(Uuid, DependencyStatus)> = plan
            .graph
            .dependencies_of(goal_id)
            .filter_map(|dep| {
                let required = dep.required_goal()?;
                let achieved = plan
                    .goals
                    .get(&required)
                    .is_some_and(|g| g.state() == GoalState::Achieved);
                let status = if achieved {
                    DependencyStatus::Satisfied
                } else {
                    DependencyStatus::Pending
                };
                (status != dep.status).then_some((dep.id, status))
            })
            .collect();

        let now = self.now();
        for (id, status) in updates {
            if let Some(dep) = plan.graph.get_mut(id) {
                dep.status = status;
                if status == DependencyStatus::Satisfied {
                    resolution.events.push(PlanEvent::DependencySatisfied {
                        dependency_id: id,
                        blocked_goal: goal_id,
                        timestamp: now,
                    });
                }
            }
        }
    }

    fn propagate(
        &self,
        plan: &mut Plan,
        seeds: BTreeSet<Uuid>,
        resolution: &mut Resolution,
    ) -> Result<(), GraphError> {
        if seeds.is_empty() {
            return Ok(());
        }

        let affected = plan.graph.downstream_closure(&seeds);
        let order = plan.graph.topological_order(&affected);

        for goal_id in order {
            match plan.goals.get(&goal_id) {
                Some(goal) if !goal.is_terminal() => {}
                _ => continue,
            }

            self.refresh_goal_edges(plan, goal_id, resolution);

            let Plan { goals, graph } = &mut *plan;
            let Some(goal) = goals.get_mut(&goal_id) else {
                continue;
            };
            let satisfied = graph.is_satisfied(goal_id);
            let (target, reason) = match (goal.state(), satisfied) {
                (GoalState::Considered, true) => (GoalState::Ready, "dependencies satisfied".to_string()),
                (GoalState::Ready, false) => {
                    (GoalState::Considered, "dependencies no longer satisfied".to_string())
                }
                // A committed goal may not hold an unmet dependency; it waits
                // in paused until the user resumes it.
                (GoalState::Committed, false) => {
                    let lapsed: Vec<String> = graph
                        .unsatisfied(goal_id)
                        .iter()
                        .map(|dep| dep.id.to_string())
                        .collect();
                    (
                        GoalState::Paused,
                        format!("dependency no longer satisfied: {}", lapsed.join(", ")),
                    )
                }
                _ => continue,
            };

            let outcome = self
                .machine
                .transition(goal, target, &reason, Trigger::Auto, &*graph)?;
            if let Some(event) = outcome.into_event() {
                tracing::debug!(goal_id = %goal_id, to = %target, "readiness auto-transition");
                resolution.transitions += 1;
                resolution.events.push(event);
            }
        }

        resolution.affected.extend(affected);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pw_goal::{FixedClock, Goal};
    use std::sync::Arc;

    fn resolver() -> DependencyResolver {
        let clock = Arc::new(FixedClock::new(Utc::now()));
        DependencyResolver::new(GoalStateMachine::new(clock))
    }

    fn add_goal(resolver: &DependencyResolver, plan: &mut Plan, name: &str) -> Uuid {
        let goal = Goal::new(name, resolver.now());
        let id = goal.id;
        plan.insert_goal(goal);
        id
    }

    fn consider(resolver: &DependencyResolver, plan: &mut Plan, id: Uuid) {
        resolver
            .transition_goal(plan, id, GoalState::Considered, "evaluate", Trigger::User)
            .unwrap();
    }

    fn state(plan: &Plan, id: Uuid) -> GoalState {
        plan.goal(id).unwrap().state()
    }

    fn commit_ready(resolver: &DependencyResolver, plan: &mut Plan, id: Uuid) {
        let goal = plan.goal_mut(id).unwrap();
        goal.why = Some("why".into());
        goal.sacrifice = Some("time".into());
        goal.deadline = chrono::NaiveDate::from_ymd_opt(2030, 1, 1);
        goal.metrics = vec!["done".into()];
        resolver
            .transition_goal(plan, id, GoalState::Committed, "commit", Trigger::User)
            .unwrap();
    }

    #[test]
    fn considering_goal_without_dependencies_makes_it_ready() {
        let resolver = resolver();
        let mut plan = Plan::new();
        let a = add_goal(&resolver, &mut plan, "A");
        consider(&resolver, &mut plan, a);
        assert_eq!(state(&plan, a), GoalState::Ready);
    }

    #[test]
    fn achieving_prerequisite_unlocks_dependent() {
        let resolver = resolver();
        let mut plan = Plan::new();
        let a = add_goal(&resolver, &mut plan, "A");
        let b = add_goal(&resolver, &mut plan, "B");
        resolver
            .add_dependency(&mut plan, Dependency::prerequisite(a, b, resolver.now()))
            .unwrap();
        consider(&resolver, &mut plan, a);
        assert_eq!(state(&plan, a), GoalState::Considered);
        assert!(!resolver.readiness(&plan, a).unwrap().satisfied);

        consider(&resolver, &mut plan, b);
        commit_ready(&resolver, &mut plan, b);
        let resolution = resolver
            .transition_goal(&mut plan, b, GoalState::Achieved, "done", Trigger::User)
            .unwrap();

        assert_eq!(state(&plan, a), GoalState::Ready);
        assert!(resolution.affected.contains(&a));
        assert!(resolution
            .events
            .iter()
            .any(|e| e.event_type() == "dependency.satisfied"));
    }

    #[test]
    fn chain_settles_in_dependency_order() {
        // c requires b requires a. Achieving a readies b but not c.
        let resolver = resolver();
        let mut plan = Plan::new();
        let a = add_goal(&resolver, &mut plan, "A");
        let b = add_goal(&resolver, &mut plan, "B");
        let c = add_goal(&resolver, &mut plan, "C");
        resolver
            .add_dependency(&mut plan, Dependency::prerequisite(b, a, resolver.now()))
            .unwrap();
        resolver
            .add_dependency(&mut plan, Dependency::prerequisite(c, b, resolver.now()))
            .unwrap();
        for id in [a, b, c] {
            consider(&resolver, &mut plan, id);
        }
        commit_ready(&resolver, &mut plan, a);
        let resolution = resolver
            .transition_goal(&mut plan, a, GoalState::Achieved, "done", Trigger::User)
            .unwrap();

        assert_eq!(state(&plan, b), GoalState::Ready);
        assert_eq!(state(&plan, c), GoalState::Considered);
        assert!(resolution.affected.contains(&c));
    }

    #[test]
    fn new_pending_dependency_demotes_ready_goal() {
        let resolver = resolver();
        let mut plan = Plan::new();
        let a = add_goal(&resolver, &mut plan, "A");
        consider(&resolver, &mut plan, a);
        assert_eq!(state(&plan, a), GoalState::Ready);

        let dep = Dependency::resource(a, "savings", 1000.0, resolver.now());
        let dep_id = dep.id;
        resolver.add_dependency(&mut plan, dep).unwrap();
        assert_eq!(state(&plan, a), GoalState::Considered);

        resolver.remove_dependency(&mut plan, dep_id).unwrap();
        assert_eq!(state(&plan, a), GoalState::Ready);
    }

    #[test]
    fn cycle_rejected_without_mutation() {
        let resolver = resolver();
        let mut plan = Plan::new();
        let x = add_goal(&resolver, &mut plan, "X");
        let y = add_goal(&resolver, &mut plan, "Y");
        resolver
            .add_dependency(&mut plan, Dependency::prerequisite(y, x, resolver.now()))
            .unwrap();
        let before = plan.clone();
        let result =
            resolver.add_dependency(&mut plan, Dependency::prerequisite(x, y, resolver.now()));
        assert!(matches!(result, Err(GraphError::CycleDetected { .. })));
        assert_eq!(plan, before);
    }

    #[test]
    fn overridden_recommendation_no_longer_blocks() {
        let resolver = resolver();
        let mut plan = Plan::new();
        let d = add_goal(&resolver, &mut plan, "D");
        let other = add_goal(&resolver, &mut plan, "Other");
        let dep = Dependency::recommended(d, other, resolver.now());
        let dep_id = dep.id;
        resolver.add_dependency(&mut plan, dep).unwrap();
        consider(&resolver, &mut plan, d);
        assert_eq!(state(&plan, d), GoalState::Considered);

        resolver.override_dependency(&mut plan, dep_id).unwrap();
        assert!(plan.graph.is_satisfied(d));
        assert_eq!(state(&plan, d), GoalState::Ready);
    }

    #[test]
    fn prerequisite_cannot_be_overridden() {
        let resolver = resolver();
        let mut plan = Plan::new();
        let a = add_goal(&resolver, &mut plan, "A");
        let b = add_goal(&resolver, &mut plan, "B");
        let dep = Dependency::prerequisite(a, b, resolver.now());
        let dep_id = dep.id;
        resolver.add_dependency(&mut plan, dep).unwrap();
        assert!(matches!(
            resolver.override_dependency(&mut plan, dep_id),
            Err(GraphError::OverrideNotAllowed { .. })
        ));
    }

    #[test]
    fn committed_goal_rejects_unsatisfied_dependency() {
        let resolver = resolver();
        let mut plan = Plan::new();
        let a = add_goal(&resolver, &mut plan, "A");
        let b = add_goal(&resolver, &mut plan, "B");
        consider(&resolver, &mut plan, a);
        commit_ready(&resolver, &mut plan, a);
        let result =
            resolver.add_dependency(&mut plan, Dependency::prerequisite(a, b, resolver.now()));
        assert!(matches!(result, Err(GraphError::BlockedGoalCommitted { .. })));
        assert!(plan.graph.is_empty());
    }

    #[test]
    fn measurements_flip_resource_dependencies() {
        let resolver = resolver();
        let mut plan = Plan::new();
        let a = add_goal(&resolver, &mut plan, "A");
        resolver
            .add_dependency(&mut plan, Dependency::resource(a, "savings", 500.0, resolver.now()))
            .unwrap();
        consider(&resolver, &mut plan, a);

        let signal = ExternalSignal::Measurements(BTreeMap::from([("savings".into(), Some(750.0))]));
        resolver.on_external_change(&mut plan, &signal).unwrap();
        assert_eq!(state(&plan, a), GoalState::Ready);

        // Measurement lost: fail safe back to pending.
        let signal = ExternalSignal::Measurements(BTreeMap::from([("savings".into(), None)]));
        resolver.on_external_change(&mut plan, &signal).unwrap();
        assert_eq!(state(&plan, a), GoalState::Considered);
    }

    #[test]
    fn lapsed_resource_pauses_committed_goal() {
        let resolver = resolver();
        let mut plan = Plan::new();
        let a = add_goal(&resolver, &mut plan, "A");
        let mut dep = Dependency::resource(a, "fund", 5.0, resolver.now());
        if let DependencyKind::Resource { current, .. } = &mut dep.kind {
            *current = Some(8.0);
        }
        let dep_id = dep.id;
        resolver.add_dependency(&mut plan, dep).unwrap();
        consider(&resolver, &mut plan, a);
        commit_ready(&resolver, &mut plan, a);

        let signal = ExternalSignal::Measurements(BTreeMap::from([("fund".into(), Some(1.0))]));
        let resolution = resolver.on_external_change(&mut plan, &signal).unwrap();

        let goal = plan.goal(a).unwrap();
        assert_eq!(goal.state(), GoalState::Paused);
        let last = goal.state_history().last().unwrap();
        assert_eq!(last.trigger, Trigger::Auto);
        assert!(last.reason.contains(&dep_id.to_string()));
        assert_eq!(resolution.transitions, 1);

        // Recovery does not resume on its own; the user decides.
        let signal = ExternalSignal::Measurements(BTreeMap::from([("fund".into(), Some(9.0))]));
        resolver.on_external_change(&mut plan, &signal).unwrap();
        assert_eq!(state(&plan, a), GoalState::Paused);
        resolver
            .transition_goal(&mut plan, a, GoalState::Committed, "funds back", Trigger::User)
            .unwrap();
        assert_eq!(state(&plan, a), GoalState::Committed);
    }

    #[test]
    fn cleared_event_satisfies_awaiting_dependencies() {
        let resolver = resolver();
        let mut plan = Plan::new();
        let a = add_goal(&resolver, &mut plan, "A");
        let event_id = Uuid::new_v4();
        resolver
            .add_dependency(&mut plan, Dependency::life_event(a, event_id, resolver.now()))
            .unwrap();
        consider(&resolver, &mut plan, a);
        assert_eq!(state(&plan, a), GoalState::Considered);

        resolver
            .on_external_change(&mut plan, &ExternalSignal::EventCleared(event_id))
            .unwrap();
        assert_eq!(state(&plan, a), GoalState::Ready);
    }

    #[test]
    fn terminal_goal_drops_its_blockers() {
        let resolver = resolver();
        let mut plan = Plan::new();
        let a = add_goal(&resolver, &mut plan, "A");
        let b = add_goal(&resolver, &mut plan, "B");
        resolver
            .add_dependency(&mut plan, Dependency::prerequisite(a, b, resolver.now()))
            .unwrap();
        resolver
            .transition_goal(&mut plan, a, GoalState::Abandoned, "not for me", Trigger::User)
            .unwrap();
        assert!(plan.graph.is_empty());
        assert!(matches!(
            resolver.add_dependency(&mut plan, Dependency::prerequisite(a, b, resolver.now())),
            Err(GraphError::Goal(GoalError::TerminalState { .. }))
        ));
    }

    #[test]
    fn user_demotion_from_ready_is_respected() {
        let resolver = resolver();
        let mut plan = Plan::new();
        let a = add_goal(&resolver, &mut plan, "A");
        consider(&resolver, &mut plan, a);
        resolver
            .transition_goal(&mut plan, a, GoalState::Considered, "not yet", Trigger::User)
            .unwrap();
        assert_eq!(state(&plan, a), GoalState::Considered);
    }

    #[test]
    fn stale_ready_goal_cannot_commit() {
        let resolver = resolver();
        let mut plan = Plan::new();
        let a = add_goal(&resolver, &mut plan, "A");
        consider(&resolver, &mut plan, a);
        // Sneak a pending edge in behind the resolver's back.
        plan.graph
            .insert(Dependency::resource(a, "savings", 1.0, resolver.now()))
            .unwrap();
        let goal = plan.goal_mut(a).unwrap();
        goal.why = Some("why".into());
        goal.sacrifice = Some("time".into());
        goal.deadline = chrono::NaiveDate::from_ymd_opt(2030, 1, 1);
        goal.metrics = vec!["done".into()];
        let result = resolver.transition_goal(&mut plan, a, GoalState::Committed, "", Trigger::User);
        assert!(matches!(
            result,
            Err(GraphError::Goal(GoalError::StaleReadiness { .. }))
        ));
    }
}
