// planner.rs - Planner: the household-scoped entry point for every operation.
//
// Each household sits behind its own RwLock. A mutation takes the write
// lock, clones the household into a draft, runs the resolver or processor
// against the draft and, on success, commits the changed records to the
// store as one ChangeSet and swaps the draft in. If the store fails, the
// records it may have half-written are rolled back and the household in
// memory stays as it was. Readers take the read lock and therefore never
// see a half-propagated graph.
//
// External effects (metric lookups before, event dispatch and ceremony
// scheduling after) stay outside the draft: metrics are read before the
// write lock is taken, and dispatch runs once the lock is released.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{Arc, RwLock};

use chrono::NaiveDate;
use pw_audit::{AuditReport, AuditService};
use pw_goal::{
    ClockSource, EventDispatcher, Goal, GoalError, GoalState, GoalStateMachine, LogSink,
    NotificationSink, PlanEvent, SystemClock, Trigger,
};
use pw_graph::{
    Dependency, DependencyGraph, DependencyKind, DependencyResolver, ExternalSignal, GraphError,
    MetricSource, Plan, Readiness, Resolution, StaticMetricSource,
};
use pw_life_events::{
    AppliedImpact, CeremonyScheduler, EmergencyRetro, ImpactReport, LifeEvent, LifeEventError,
    LifeEventProcessor, LifeEventStatus, LogCeremonyScheduler,
};
use uuid::Uuid;

use crate::config::PlannerConfig;
use crate::error::PlannerError;
use crate::store::{validate_household, ChangeSet, ConfigStore, HouseholdRecords, JsonFileStore};

/// One household's plan and the life events declared against it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Household {
    pub id: String,
    pub plan: Plan,
    pub events: BTreeMap<Uuid, LifeEvent>,
}

impl Household {
    fn from_records(id: &str, records: HouseholdRecords) -> Self {
        let mut plan = Plan::new();
        for goal in records.goals {
            plan.insert_goal(goal);
        }
        // Stored edges are trusted here; the season audit reports any cycle.
        plan.graph = DependencyGraph::from(records.dependencies);
        Self {
            id: id.to_string(),
            plan,
            events: records.life_events.into_iter().map(|e| (e.id, e)).collect(),
        }
    }
}

/// Commitment fields to set on a goal. `None` leaves a field as it is.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Commitment {
    pub quality: Option<String>,
    pub why: Option<String>,
    pub sacrifice: Option<String>,
    pub deadline: Option<NaiveDate>,
    pub metrics: Option<Vec<String>>,
    pub audacity: Option<String>,
}

/// What a committed mutation hands to the outside world.
#[derive(Default)]
struct Effects {
    events: Vec<PlanEvent>,
    retro: Option<EmergencyRetro>,
}

impl Effects {
    fn events(events: Vec<PlanEvent>) -> Self {
        Self {
            events,
            retro: None,
        }
    }
}

fn split(applied: AppliedImpact) -> (ImpactReport, Effects) {
    let effects = Effects {
        events: applied.resolution.events,
        retro: applied.emergency_retro,
    };
    (applied.report, effects)
}

pub struct Planner {
    store: Box<dyn ConfigStore>,
    clock: Arc<dyn ClockSource>,
    resolver: DependencyResolver,
    processor: LifeEventProcessor,
    audit: AuditService,
    metrics: Box<dyn MetricSource>,
    scheduler: Option<Box<dyn CeremonyScheduler>>,
    dispatcher: EventDispatcher,
    households: RwLock<HashMap<String, Arc<RwLock<Household>>>>,
}

impl Planner {
    pub fn new(store: impl ConfigStore + 'static, clock: Arc<dyn ClockSource>) -> Self {
        let resolver = DependencyResolver::new(GoalStateMachine::new(clock.clone()));
        Self {
            store: Box::new(store),
            clock,
            processor: LifeEventProcessor::new(resolver.clone()),
            resolver,
            audit: AuditService::new(),
            metrics: Box::new(StaticMetricSource::new()),
            scheduler: None,
            dispatcher: EventDispatcher::new(),
            households: RwLock::new(HashMap::new()),
        }
    }

    /// A planner over the `.planwise/` layout: JSON store, JSONL event and
    /// ceremony logs, metrics from TOML, settings applied.
    pub fn from_config(config: &PlannerConfig) -> Result<Self, PlannerError> {
        let settings = config.settings()?;
        let mut audit = AuditService::new();
        if let Some(limit) = settings.audit.bottleneck_limit {
            audit = audit.with_bottleneck_limit(limit);
        }
        let metrics = StaticMetricSource::load_or_default(&config.metrics_file)?;

        Ok(Self::new(JsonFileStore::new(&config.store_dir)?, Arc::new(SystemClock))
            .with_metrics(metrics)
            .with_scheduler(LogCeremonyScheduler::new(&config.ceremonies_log))
            .with_sink(LogSink::new(&config.events_log))
            .with_audit(audit))
    }

    pub fn with_metrics(mut self, metrics: impl MetricSource + 'static) -> Self {
        self.metrics = Box::new(metrics);
        self
    }

    pub fn with_scheduler(mut self, scheduler: impl CeremonyScheduler + 'static) -> Self {
        self.scheduler = Some(Box::new(scheduler));
        self
    }

    pub fn with_sink(mut self, sink: impl NotificationSink + 'static) -> Self {
        self.dispatcher.add_sink(Box::new(sink));
        self
    }

    pub fn with_audit(mut self, audit: AuditService) -> Self {
        self.audit = audit;
        self
    }

    // -- goals --

    pub fn create_goal(&self, household: &str, name: &str) -> Result<Goal, PlannerError> {
        let now = self.clock.now();
        self.mutate(household, |draft| {
            let goal = Goal::new(name, now);
            draft.plan.insert_goal(goal.clone());
            tracing::info!(household = %draft.id, goal_id = %goal.id, goal_name = name, "goal created");
            let event = PlanEvent::GoalCreated {
                goal_id: goal.id,
                name: goal.name.clone(),
                timestamp: now,
            };
            Ok((goal, Effects::events(vec![event])))
        })
    }

    /// Fill in commitment fields. A committed or paused goal must keep all
    /// of them.
    pub fn set_commitment(
        &self,
        household: &str,
        goal_id: Uuid,
        commitment: Commitment,
    ) -> Result<Goal, PlannerError> {
        self.mutate(household, |draft| {
            let goal = draft.plan.goal_mut(goal_id)?;
            if goal.is_terminal() {
                return Err(GoalError::TerminalState {
                    goal_id,
                    state: goal.state(),
                }
                .into());
            }

            let Commitment {
                quality,
                why,
                sacrifice,
                deadline,
                metrics,
                audacity,
            } = commitment;
            if quality.is_some() {
                goal.quality = quality;
            }
            if why.is_some() {
                goal.why = why;
            }
            if sacrifice.is_some() {
                goal.sacrifice = sacrifice;
            }
            if deadline.is_some() {
                goal.deadline = deadline;
            }
            if let Some(metrics) = metrics {
                goal.metrics = metrics;
            }
            if audacity.is_some() {
                goal.audacity = audacity;
            }

            if matches!(goal.state(), GoalState::Committed | GoalState::Paused) {
                let missing = goal.missing_commitment_fields();
                if !missing.is_empty() {
                    return Err(GoalError::CommitmentGate { goal_id, missing }.into());
                }
            }
            Ok((goal.clone(), Effects::default()))
        })
    }

    /// User-initiated transition; dependents are re-evaluated in the same
    /// call.
    pub fn transition_goal(
        &self,
        household: &str,
        goal_id: Uuid,
        target: GoalState,
        reason: &str,
    ) -> Result<Goal, PlannerError> {
        self.mutate(household, |draft| {
            let resolution =
                self.resolver
                    .transition_goal(&mut draft.plan, goal_id, target, reason, Trigger::User)?;
            let goal = draft.plan.goal(goal_id)?.clone();
            Ok((goal, Effects::events(resolution.events)))
        })
    }

    pub fn record_retrospective(
        &self,
        household: &str,
        goal_id: Uuid,
        text: &str,
    ) -> Result<Goal, PlannerError> {
        self.mutate(household, |draft| {
            let goal = draft.plan.goal_mut(goal_id)?;
            self.resolver.machine().record_retrospective(goal, text)?;
            Ok((goal.clone(), Effects::default()))
        })
    }

    /// Clear the advisory review flag a life event left on a goal.
    pub fn acknowledge_review(&self, household: &str, goal_id: Uuid) -> Result<Goal, PlannerError> {
        self.mutate(household, |draft| {
            let goal = draft.plan.goal_mut(goal_id)?;
            if let Some(flag) = goal.review_flag.take() {
                tracing::info!(goal_id = %goal_id, event_id = %flag.event_id, "review acknowledged");
            }
            Ok((goal.clone(), Effects::default()))
        })
    }

    // -- dependencies --

    pub fn add_dependency(
        &self,
        household: &str,
        mut dep: Dependency,
    ) -> Result<Dependency, PlannerError> {
        if let DependencyKind::Resource {
            resource, current, ..
        } = &mut dep.kind
        {
            *current = self.metrics.current(resource);
        }

        self.mutate(household, |draft| {
            let dependency_id = dep.id;
            let resolution = self.resolver.add_dependency(&mut draft.plan, dep)?;
            let stored = draft
                .plan
                .graph
                .get(dependency_id)
                .cloned()
                .ok_or(GraphError::DependencyNotFound(dependency_id))?;
            Ok((stored, Effects::events(resolution.events)))
        })
    }

    pub fn remove_dependency(&self, household: &str, dependency_id: Uuid) -> Result<(), PlannerError> {
        self.mutate(household, |draft| {
            let resolution = self.resolver.remove_dependency(&mut draft.plan, dependency_id)?;
            Ok(((), Effects::events(resolution.events)))
        })
    }

    pub fn override_dependency(
        &self,
        household: &str,
        dependency_id: Uuid,
    ) -> Result<Dependency, PlannerError> {
        self.mutate(household, |draft| {
            let resolution = self
                .resolver
                .override_dependency(&mut draft.plan, dependency_id)?;
            let stored = draft
                .plan
                .graph
                .get(dependency_id)
                .cloned()
                .ok_or(GraphError::DependencyNotFound(dependency_id))?;
            Ok((stored, Effects::events(resolution.events)))
        })
    }

    pub fn get_readiness(&self, household: &str, goal_id: Uuid) -> Result<Readiness, PlannerError> {
        self.read(household, |h| Ok(self.resolver.readiness(&h.plan, goal_id)?))
    }

    /// Pull fresh measurements for every resource the plan depends on and
    /// re-evaluate the goals waiting on them.
    pub fn refresh_metrics(&self, household: &str) -> Result<Resolution, PlannerError> {
        let resources: BTreeSet<String> = self.read(household, |h| {
            Ok(h.plan
                .graph
                .iter()
                .filter_map(|dep| match &dep.kind {
                    DependencyKind::Resource { resource, .. } => Some(resource.clone()),
                    _ => None,
                })
                .collect())
        })?;
        if resources.is_empty() {
            return Ok(Resolution::default());
        }

        let values: BTreeMap<String, Option<f64>> = resources
            .into_iter()
            .map(|resource| {
                let value = self.metrics.current(&resource);
                (resource, value)
            })
            .collect();

        self.mutate(household, |draft| {
            let resolution = self
                .resolver
                .on_external_change(&mut draft.plan, &ExternalSignal::Measurements(values))?;
            let events = resolution.events.clone();
            Ok((resolution, Effects::events(events)))
        })
    }

    // -- life events --

    /// Record an event and apply it if it has already occurred.
    ///
    /// Re-declaring a known id never replaces the stored record. An
    /// anticipated event moves on only through its own status transitions
    /// (occurred or cancelled); an event that already occurred or was
    /// cancelled keeps its status, and re-declaring it with the same status
    /// only re-applies, which is a no-op.
    pub fn declare_life_event(
        &self,
        household: &str,
        event: LifeEvent,
    ) -> Result<ImpactReport, PlannerError> {
        event.validate()?;
        let event_id = event.id;
        let now = self.clock.now();
        self.mutate(household, |draft| {
            let applied = match draft.events.get_mut(&event_id) {
                None => {
                    tracing::info!(event_id = %event_id, event_type = %event.event_type, status = %event.status, "life event declared");
                    let stored = draft.events.entry(event_id).or_insert(event);
                    self.processor.apply(&mut draft.plan, stored)?
                }
                Some(stored) => match (stored.status, event.status) {
                    (LifeEventStatus::Anticipated, LifeEventStatus::Occurred) => {
                        stored.occur(event.occurred_at.unwrap_or(now))?;
                        self.processor.apply(&mut draft.plan, stored)?
                    }
                    (LifeEventStatus::Anticipated, LifeEventStatus::Cancelled) => {
                        let resolution = self.processor.cancel(&mut draft.plan, stored)?;
                        AppliedImpact {
                            report: ImpactReport {
                                event_id,
                                ..ImpactReport::default()
                            },
                            resolution,
                            emergency_retro: None,
                        }
                    }
                    (from, to) if from == to => {
                        tracing::info!(event_id = %event_id, status = %from, "life event already declared; keeping stored record");
                        self.processor.apply(&mut draft.plan, stored)?
                    }
                    (from, to) => {
                        return Err(LifeEventError::InvalidStatusTransition { event_id, from, to }.into());
                    }
                },
            };
            Ok(split(applied))
        })
    }

    /// Validate a raw JSON payload and declare it.
    pub fn declare_life_event_json(
        &self,
        household: &str,
        payload: serde_json::Value,
    ) -> Result<ImpactReport, PlannerError> {
        let event = LifeEvent::from_json(payload)?;
        self.declare_life_event(household, event)
    }

    /// Apply a stored event, marking it occurred first if it was only
    /// anticipated.
    pub fn apply_life_event(&self, household: &str, event_id: Uuid) -> Result<ImpactReport, PlannerError> {
        self.mutate(household, |draft| {
            let event = draft
                .events
                .get_mut(&event_id)
                .ok_or(LifeEventError::EventNotFound(event_id))?;
            let applied = if event.status == LifeEventStatus::Anticipated {
                self.processor.mark_occurred(&mut draft.plan, event)?
            } else {
                self.processor.apply(&mut draft.plan, event)?
            };
            Ok(split(applied))
        })
    }

    pub fn cancel_life_event(&self, household: &str, event_id: Uuid) -> Result<LifeEvent, PlannerError> {
        self.mutate(household, |draft| {
            let event = draft
                .events
                .get_mut(&event_id)
                .ok_or(LifeEventError::EventNotFound(event_id))?;
            let resolution = self.processor.cancel(&mut draft.plan, event)?;
            Ok((event.clone(), Effects::events(resolution.events)))
        })
    }

    pub fn resolve_life_event(&self, household: &str, event_id: Uuid) -> Result<Resolution, PlannerError> {
        self.mutate(household, |draft| {
            let event = draft
                .events
                .get_mut(&event_id)
                .ok_or(LifeEventError::EventNotFound(event_id))?;
            let resolution = self.processor.resolve(&mut draft.plan, event)?;
            let events = resolution.events.clone();
            Ok((resolution, Effects::events(events)))
        })
    }

    // -- reads --

    pub fn run_season_audit(&self, household: &str) -> Result<AuditReport, PlannerError> {
        let now = self.clock.now();
        self.read(household, |h| Ok(self.audit.run(&h.plan, h.events.values(), now)?))
    }

    /// All goals, oldest first.
    pub fn goals(&self, household: &str) -> Result<Vec<Goal>, PlannerError> {
        self.read(household, |h| {
            let mut goals: Vec<Goal> = h.plan.goals.values().cloned().collect();
            goals.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
            Ok(goals)
        })
    }

    pub fn goal(&self, household: &str, goal_id: Uuid) -> Result<Goal, PlannerError> {
        self.read(household, |h| Ok(h.plan.goal(goal_id)?.clone()))
    }

    pub fn dependencies(&self, household: &str) -> Result<Vec<Dependency>, PlannerError> {
        self.read(household, |h| Ok(h.plan.graph.iter().cloned().collect()))
    }

    pub fn life_events(&self, household: &str) -> Result<Vec<LifeEvent>, PlannerError> {
        self.read(household, |h| {
            let mut events: Vec<LifeEvent> = h.events.values().cloned().collect();
            events.sort_by(|a, b| a.declared_at.cmp(&b.declared_at).then_with(|| a.id.cmp(&b.id)));
            Ok(events)
        })
    }

    /// A consistent copy of the whole household.
    pub fn snapshot(&self, household: &str) -> Result<Household, PlannerError> {
        self.read(household, |h| Ok(h.clone()))
    }

    // -- plumbing --

    fn household(&self, id: &str) -> Result<Arc<RwLock<Household>>, PlannerError> {
        validate_household(id)?;
        if let Some(h) = self
            .households
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(id)
        {
            return Ok(h.clone());
        }

        let mut households = self.households.write().unwrap_or_else(|e| e.into_inner());
        if let Some(h) = households.get(id) {
            return Ok(h.clone());
        }
        let records = self.store.load(id)?;
        let household = Household::from_records(id, records);
        tracing::debug!(
            household = id,
            goals = household.plan.goals.len(),
            dependencies = household.plan.graph.len(),
            events = household.events.len(),
            "household loaded"
        );
        let handle = Arc::new(RwLock::new(household));
        households.insert(id.to_string(), handle.clone());
        Ok(handle)
    }

    fn read<T>(
        &self,
        household: &str,
        f: impl FnOnce(&Household) -> Result<T, PlannerError>,
    ) -> Result<T, PlannerError> {
        let handle = self.household(household)?;
        let guard = handle.read().unwrap_or_else(|e| e.into_inner());
        f(&guard)
    }

    /// Run `f` on a draft of the household; persist and swap it in only if
    /// `f` succeeds, then hand out the effects.
    fn mutate<T>(
        &self,
        household: &str,
        f: impl FnOnce(&mut Household) -> Result<(T, Effects), PlannerError>,
    ) -> Result<T, PlannerError> {
        let handle = self.household(household)?;
        let (out, effects) = {
            let mut guard = handle.write().unwrap_or_else(|e| e.into_inner());
            let mut draft = guard.clone();
            let (out, effects) = f(&mut draft)?;
            let changes = changes_between(&guard, &draft);
            if !changes.is_empty() {
                if let Err(e) = self.store.commit(&draft.id, &changes) {
                    self.roll_back(&guard, &changes);
                    return Err(e.into());
                }
            }
            *guard = draft;
            (out, effects)
        };

        self.dispatcher.dispatch_all(&effects.events);
        if let Some(retro) = effects.retro {
            match &self.scheduler {
                Some(scheduler) => {
                    // The event keeps its marker either way; a failed
                    // request is not retried.
                    if let Err(e) = scheduler.schedule_emergency_retro(&retro) {
                        tracing::warn!(event_id = %retro.event_id, error = %e, "failed to schedule emergency retrospective");
                    }
                }
                None => {
                    tracing::warn!(event_id = %retro.event_id, "no ceremony scheduler configured; emergency retrospective not scheduled");
                }
            }
        }
        Ok(out)
    }

    /// Put back the records a failed commit may have half-written, so the
    /// store matches the household still held in memory.
    fn roll_back(&self, before: &Household, changes: &ChangeSet) {
        let restore = reverse(before, changes);
        if let Err(e) = self.store.commit(&before.id, &restore) {
            tracing::error!(household = %before.id, error = %e, "rollback after failed commit also failed; store may differ from memory until reload");
        } else {
            tracing::warn!(household = %before.id, "commit failed; stored records rolled back");
        }
    }
}

/// Every record that differs between `before` and `after`.
fn changes_between(before: &Household, after: &Household) -> ChangeSet {
    let mut changes = ChangeSet::default();
    for goal in after.plan.goals.values() {
        if before.plan.goals.get(&goal.id) != Some(goal) {
            changes.goals.push(goal.clone());
        }
    }
    for dep in after.plan.graph.iter() {
        if before.plan.graph.get(dep.id) != Some(dep) {
            changes.dependencies.push(dep.clone());
        }
    }
    for dep in before.plan.graph.iter() {
        if after.plan.graph.get(dep.id).is_none() {
            changes.removed_dependencies.push(dep.id);
        }
    }
    for event in after.events.values() {
        if before.events.get(&event.id) != Some(event) {
            changes.life_events.push(event.clone());
        }
    }
    changes
}

/// The change set that takes a store from "`changes` applied" back to
/// `before`.
fn reverse(before: &Household, changes: &ChangeSet) -> ChangeSet {
    let mut restore = ChangeSet::default();
    for goal in &changes.goals {
        match before.plan.goals.get(&goal.id) {
            Some(old) => restore.goals.push(old.clone()),
            None => restore.removed_goals.push(goal.id),
        }
    }
    for dep in &changes.dependencies {
        match before.plan.graph.get(dep.id) {
            Some(old) => restore.dependencies.push(old.clone()),
            None => restore.removed_dependencies.push(dep.id),
        }
    }
    for id in &changes.removed_dependencies {
        if let Some(old) = before.plan.graph.get(*id) {
            restore.dependencies.push(old.clone());
        }
    }
    for event in &changes.life_events {
        match before.events.get(&event.id) {
            Some(old) => restore.life_events.push(old.clone()),
            None => restore.removed_life_events.push(event.id),
        }
    }
    restore
}
