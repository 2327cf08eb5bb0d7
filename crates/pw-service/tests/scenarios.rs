// scenarios.rs - End-to-end planner scenarios over a file-backed store.
//
// Each test drives a Planner the way the CLI does:
//
//   1. Prerequisite achieved → dependent goal becomes ready
//   2. Derailing event pauses a committed goal, once
//   3. Reverse prerequisite rejected as a cycle, graph unchanged
//   4. Overridden recommendation no longer holds a goal back
//   5. Cascading event schedules one emergency retrospective
//
// plus persistence (a reloaded household reproduces the same readiness),
// re-declared events, lapsed measurements, and readers racing a writer.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;

use chrono::{NaiveDate, Utc};
use serde_json::json;
use tempfile::tempdir;
use uuid::Uuid;

use pw_goal::{FixedClock, GoalState, Trigger};
use pw_graph::{Dependency, DependencyStatus, GraphError, MetricSource};
use pw_life_events::{
    CascadeEffect, CeremonyScheduler, DurationType, EmergencyRetro, EventImpact, GoalEffect,
    LifeEvent, LifeEventError, LifeEventStatus,
};
use pw_service::{Commitment, JsonFileStore, MemoryStore, Planner, PlannerConfig, PlannerError};

const HOME: &str = "home";

#[derive(Clone, Default)]
struct CountingScheduler {
    calls: Arc<AtomicUsize>,
}

impl CeremonyScheduler for CountingScheduler {
    fn schedule_emergency_retro(&self, _retro: &EmergencyRetro) -> Result<(), LifeEventError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[derive(Clone, Default)]
struct SharedMetrics {
    values: Arc<Mutex<BTreeMap<String, f64>>>,
}

impl SharedMetrics {
    fn set(&self, resource: &str, value: f64) {
        self.values.lock().unwrap().insert(resource.to_string(), value);
    }
}

impl MetricSource for SharedMetrics {
    fn current(&self, resource: &str) -> Option<f64> {
        self.values.lock().unwrap().get(resource).copied()
    }
}

fn memory_planner() -> Planner {
    Planner::new(MemoryStore::new(), Arc::new(FixedClock::new(Utc::now())))
}

fn commitment() -> Commitment {
    Commitment {
        why: Some("it matters".into()),
        sacrifice: Some("Saturday mornings".into()),
        deadline: NaiveDate::from_ymd_opt(2027, 9, 1),
        metrics: Some(vec!["finished".into()]),
        ..Commitment::default()
    }
}

/// Create a goal and walk it to `committed`.
fn committed_goal(planner: &Planner, name: &str) -> Uuid {
    let goal = planner.create_goal(HOME, name).unwrap();
    planner.set_commitment(HOME, goal.id, commitment()).unwrap();
    planner
        .transition_goal(HOME, goal.id, GoalState::Considered, "evaluate")
        .unwrap();
    planner
        .transition_goal(HOME, goal.id, GoalState::Committed, "all in")
        .unwrap();
    goal.id
}

#[test]
fn achieving_prerequisite_readies_dependent() {
    let planner = memory_planner();
    let a = planner.create_goal(HOME, "Run a marathon").unwrap().id;
    let b = committed_goal(&planner, "Run a half marathon");

    planner
        .add_dependency(HOME, Dependency::prerequisite(a, b, Utc::now()))
        .unwrap();
    planner
        .transition_goal(HOME, a, GoalState::Considered, "evaluate")
        .unwrap();

    let readiness = planner.get_readiness(HOME, a).unwrap();
    assert!(!readiness.satisfied);
    assert_eq!(readiness.unsatisfied.len(), 1);
    assert_eq!(planner.goal(HOME, a).unwrap().state(), GoalState::Considered);

    planner
        .transition_goal(HOME, b, GoalState::Achieved, "crossed the line")
        .unwrap();

    let a_goal = planner.goal(HOME, a).unwrap();
    assert_eq!(a_goal.state(), GoalState::Ready);
    let last = a_goal.state_history().last().unwrap();
    assert_eq!(last.trigger, Trigger::Auto);
    assert!(planner.get_readiness(HOME, a).unwrap().satisfied);
}

#[test]
fn derailing_event_pauses_committed_goal_once() {
    let planner = memory_planner();
    let c = committed_goal(&planner, "Climb Kilimanjaro");

    let event = LifeEvent::occurred(
        "knee_injury",
        DurationType::Indefinite,
        EventImpact::Derails { goals: vec![c] },
        Utc::now(),
    );
    let event_id = event.id;
    let report = planner.declare_life_event(HOME, event.clone()).unwrap();
    assert_eq!(report.goals_affected, vec![c]);

    let goal = planner.goal(HOME, c).unwrap();
    assert_eq!(goal.state(), GoalState::Paused);
    let last = goal.state_history().last().unwrap();
    assert_eq!(last.reason, event_id.to_string());
    assert_eq!(last.trigger, Trigger::Auto);
    let history_len = goal.state_history().len();

    let again = planner.apply_life_event(HOME, event_id).unwrap();
    assert!(again.goals_affected.is_empty());
    let redeclared = planner.declare_life_event(HOME, event).unwrap();
    assert!(redeclared.goals_affected.is_empty());
    assert_eq!(planner.goal(HOME, c).unwrap().state_history().len(), history_len);
}

#[test]
fn reverse_prerequisite_is_rejected_as_cycle() {
    let planner = memory_planner();
    let x = planner.create_goal(HOME, "X").unwrap().id;
    let y = planner.create_goal(HOME, "Y").unwrap().id;

    planner
        .add_dependency(HOME, Dependency::prerequisite(y, x, Utc::now()))
        .unwrap();
    let before = planner.snapshot(HOME).unwrap();

    let result = planner.add_dependency(HOME, Dependency::prerequisite(x, y, Utc::now()));
    match result {
        Err(PlannerError::Graph(GraphError::CycleDetected { path })) => {
            assert_eq!(path.first(), Some(&x));
            assert_eq!(path.last(), Some(&x));
        }
        other => panic!("expected CycleDetected, got {:?}", other),
    }
    assert_eq!(planner.snapshot(HOME).unwrap(), before);
}

#[test]
fn overridden_recommendation_does_not_block() {
    let planner = memory_planner();
    let d = planner.create_goal(HOME, "Start a business").unwrap().id;
    let mba = planner.create_goal(HOME, "Finish an MBA").unwrap().id;
    planner
        .transition_goal(HOME, d, GoalState::Considered, "evaluate")
        .unwrap();
    assert_eq!(planner.goal(HOME, d).unwrap().state(), GoalState::Ready);

    let dep = planner
        .add_dependency(HOME, Dependency::recommended(d, mba, Utc::now()))
        .unwrap();
    assert_eq!(dep.status, DependencyStatus::Pending);
    assert_eq!(planner.goal(HOME, d).unwrap().state(), GoalState::Considered);

    planner.override_dependency(HOME, dep.id).unwrap();
    let readiness = planner.get_readiness(HOME, d).unwrap();
    assert!(readiness.satisfied);
    assert_eq!(planner.goal(HOME, d).unwrap().state(), GoalState::Ready);

    // Prerequisites have no override.
    let hard = planner
        .add_dependency(HOME, Dependency::prerequisite(d, mba, Utc::now()))
        .unwrap();
    assert!(matches!(
        planner.override_dependency(HOME, hard.id),
        Err(PlannerError::Graph(GraphError::OverrideNotAllowed { .. }))
    ));
}

#[test]
fn cascading_event_schedules_one_emergency_retro() {
    let scheduler = CountingScheduler::default();
    let planner = memory_planner().with_scheduler(scheduler.clone());
    let job = committed_goal(&planner, "Get promoted");
    let house = planner.create_goal(HOME, "Buy a house").unwrap().id;

    let event = LifeEvent::occurred(
        "new_baby",
        DurationType::Permanent,
        EventImpact::Cascades {
            effects: vec![
                CascadeEffect { goal_id: job, effect: GoalEffect::Auto },
                CascadeEffect { goal_id: house, effect: GoalEffect::Invalidate },
            ],
        },
        Utc::now(),
    );
    let event_id = event.id;

    let first = planner.declare_life_event(HOME, event).unwrap();
    assert!(first.ceremony_triggered);
    let second = planner.apply_life_event(HOME, event_id).unwrap();
    assert!(!second.ceremony_triggered);

    assert_eq!(scheduler.calls.load(Ordering::SeqCst), 1);
    assert_eq!(planner.goal(HOME, job).unwrap().state(), GoalState::Paused);
    assert_eq!(planner.goal(HOME, house).unwrap().state(), GoalState::Invalidated);

    let stored = planner.life_events(HOME).unwrap();
    assert!(stored[0].emergency_retro_requested);
}

#[test]
fn raw_payload_with_unknown_impact_is_rejected() {
    let planner = memory_planner();
    let payload = json!({
        "id": Uuid::new_v4(),
        "type": "lottery_win",
        "status": "occurred",
        "duration_type": "permanent",
        "impact": { "impact_type": "delights", "goals": [] },
        "declared_at": Utc::now(),
    });
    assert!(matches!(
        planner.declare_life_event_json(HOME, payload),
        Err(PlannerError::LifeEvent(LifeEventError::UnknownImpactType(_)))
    ));
    assert!(planner.life_events(HOME).unwrap().is_empty());
}

#[test]
fn resource_dependency_follows_measurements() {
    let metrics = SharedMetrics::default();
    let planner = memory_planner().with_metrics(metrics.clone());
    let trip = planner.create_goal(HOME, "Family trip to Japan").unwrap().id;
    planner
        .transition_goal(HOME, trip, GoalState::Considered, "evaluate")
        .unwrap();

    planner
        .add_dependency(HOME, Dependency::resource(trip, "travel_fund", 5000.0, Utc::now()))
        .unwrap();
    assert_eq!(planner.goal(HOME, trip).unwrap().state(), GoalState::Considered);

    metrics.set("travel_fund", 3200.0);
    planner.refresh_metrics(HOME).unwrap();
    assert_eq!(planner.goal(HOME, trip).unwrap().state(), GoalState::Considered);

    metrics.set("travel_fund", 5000.0);
    let resolution = planner.refresh_metrics(HOME).unwrap();
    assert!(resolution.affected.contains(&trip));
    assert_eq!(planner.goal(HOME, trip).unwrap().state(), GoalState::Ready);
}

#[test]
fn temporary_block_clears_on_resolution() {
    let planner = memory_planner();
    let goal = planner.create_goal(HOME, "Learn to surf").unwrap().id;
    planner
        .transition_goal(HOME, goal, GoalState::Considered, "evaluate")
        .unwrap();

    let event = LifeEvent::occurred(
        "broken_arm",
        DurationType::Temporary,
        EventImpact::Blocks { goals: vec![goal] },
        Utc::now(),
    )
    .with_resolution("cast removed");
    let event_id = event.id;
    planner.declare_life_event(HOME, event).unwrap();
    assert_eq!(planner.goal(HOME, goal).unwrap().state(), GoalState::Considered);

    planner.resolve_life_event(HOME, event_id).unwrap();
    assert_eq!(planner.goal(HOME, goal).unwrap().state(), GoalState::Ready);
}

#[test]
fn reloaded_household_has_identical_readiness() {
    let dir = tempdir().unwrap();
    let config = PlannerConfig::for_root(dir.path());
    let clock = Arc::new(FixedClock::new(Utc::now()));

    let planner = Planner::new(JsonFileStore::new(&config.store_dir).unwrap(), clock.clone());
    let base = planner.create_goal(HOME, "Save emergency fund").unwrap().id;
    let top = planner.create_goal(HOME, "Buy a house").unwrap().id;
    let side = planner.create_goal(HOME, "Renovate kitchen").unwrap().id;
    planner
        .add_dependency(HOME, Dependency::prerequisite(top, base, Utc::now()))
        .unwrap();
    let rec = planner
        .add_dependency(HOME, Dependency::recommended(side, top, Utc::now()))
        .unwrap();
    planner.override_dependency(HOME, rec.id).unwrap();
    planner
        .add_dependency(HOME, Dependency::resource(side, "savings", 1000.0, Utc::now()))
        .unwrap();
    for id in [base, top, side] {
        planner
            .transition_goal(HOME, id, GoalState::Considered, "evaluate")
            .unwrap();
    }
    let event = LifeEvent::anticipated(
        "relocation",
        DurationType::Permanent,
        EventImpact::Derails { goals: vec![top] },
        Utc::now(),
    );
    planner.declare_life_event(HOME, event).unwrap();

    let reloaded = Planner::new(JsonFileStore::new(&config.store_dir).unwrap(), clock);
    assert_eq!(reloaded.snapshot(HOME).unwrap(), planner.snapshot(HOME).unwrap());
    for id in [base, top, side] {
        assert_eq!(
            reloaded.get_readiness(HOME, id).unwrap(),
            planner.get_readiness(HOME, id).unwrap()
        );
    }

    let audit = reloaded.run_season_audit(HOME).unwrap();
    assert_eq!(audit.ready_goals, 1);
    assert_eq!(audit.blocked_goals, 2);
    assert_eq!(audit.snapshot_digest, planner.run_season_audit(HOME).unwrap().snapshot_digest);
}

#[test]
fn cancelled_event_redeclared_as_occurred_stays_inert() {
    let scheduler = CountingScheduler::default();
    let planner = memory_planner().with_scheduler(scheduler.clone());
    let job = committed_goal(&planner, "Get promoted");

    let mut event = LifeEvent::anticipated(
        "new_baby",
        DurationType::Permanent,
        EventImpact::Cascades {
            effects: vec![CascadeEffect { goal_id: job, effect: GoalEffect::Auto }],
        },
        Utc::now(),
    );
    planner.declare_life_event(HOME, event.clone()).unwrap();
    planner.cancel_life_event(HOME, event.id).unwrap();

    event.status = LifeEventStatus::Occurred;
    event.occurred_at = Some(Utc::now());
    assert!(matches!(
        planner.declare_life_event(HOME, event.clone()),
        Err(PlannerError::LifeEvent(LifeEventError::InvalidStatusTransition {
            from: LifeEventStatus::Cancelled,
            to: LifeEventStatus::Occurred,
            ..
        }))
    ));
    let report = planner.apply_life_event(HOME, event.id).unwrap();
    assert_eq!(report.transitions_applied, 0);
    assert!(!report.ceremony_triggered);

    assert_eq!(planner.goal(HOME, job).unwrap().state(), GoalState::Committed);
    assert_eq!(scheduler.calls.load(Ordering::SeqCst), 0);
    let stored = planner.life_events(HOME).unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].status, LifeEventStatus::Cancelled);
    assert!(!stored[0].emergency_retro_requested);
}

#[test]
fn anticipated_event_redeclared_as_occurred_applies_once() {
    let planner = memory_planner();
    let climb = committed_goal(&planner, "Climb Kilimanjaro");

    let mut event = LifeEvent::anticipated(
        "relocation",
        DurationType::Permanent,
        EventImpact::Derails { goals: vec![climb] },
        Utc::now(),
    );
    let declared_at = event.declared_at;
    let report = planner.declare_life_event(HOME, event.clone()).unwrap();
    assert_eq!(report.transitions_applied, 0);
    assert_eq!(planner.goal(HOME, climb).unwrap().state(), GoalState::Committed);

    let moved = Utc::now();
    event.status = LifeEventStatus::Occurred;
    event.occurred_at = Some(moved);
    event.declared_at = moved;
    let report = planner.declare_life_event(HOME, event.clone()).unwrap();
    assert_eq!(report.transitions_applied, 1);
    assert_eq!(planner.goal(HOME, climb).unwrap().state(), GoalState::Paused);

    let again = planner.declare_life_event(HOME, event).unwrap();
    assert_eq!(again.transitions_applied, 0);

    let stored = planner.life_events(HOME).unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].status, LifeEventStatus::Occurred);
    assert_eq!(stored[0].occurred_at, Some(moved));
    assert_eq!(stored[0].declared_at, declared_at);
}

#[test]
fn lapsed_measurement_pauses_committed_goal() {
    let metrics = SharedMetrics::default();
    metrics.set("travel_fund", 6000.0);
    let planner = memory_planner().with_metrics(metrics.clone());
    let trip = committed_goal(&planner, "Family trip to Japan");
    let dep = planner
        .add_dependency(HOME, Dependency::resource(trip, "travel_fund", 5000.0, Utc::now()))
        .unwrap();
    assert_eq!(planner.goal(HOME, trip).unwrap().state(), GoalState::Committed);

    metrics.set("travel_fund", 1200.0);
    planner.refresh_metrics(HOME).unwrap();
    let goal = planner.goal(HOME, trip).unwrap();
    assert_eq!(goal.state(), GoalState::Paused);
    let last = goal.state_history().last().unwrap();
    assert_eq!(last.trigger, Trigger::Auto);
    assert!(last.reason.contains(&dep.id.to_string()));

    // Recovery does not resume the goal on its own.
    metrics.set("travel_fund", 6000.0);
    planner.refresh_metrics(HOME).unwrap();
    assert_eq!(planner.goal(HOME, trip).unwrap().state(), GoalState::Paused);
    assert!(planner.get_readiness(HOME, trip).unwrap().satisfied);

    planner
        .transition_goal(HOME, trip, GoalState::Committed, "fund rebuilt")
        .unwrap();
}

#[test]
fn readers_never_observe_half_propagated_plan() {
    const ROUNDS: usize = 8;
    const FAN_OUT: usize = 4;

    let planner = memory_planner();
    let first_base = committed_goal(&planner, "base-0");
    let watched = planner.create_goal(HOME, "dependent-0-0").unwrap().id;
    planner
        .add_dependency(HOME, Dependency::prerequisite(watched, first_base, Utc::now()))
        .unwrap();
    planner
        .transition_goal(HOME, watched, GoalState::Considered, "evaluate")
        .unwrap();
    let done = AtomicBool::new(false);

    thread::scope(|scope| {
        // Snapshots: a dependent's state always agrees with its edges, and
        // each base releases all of its dependents at once.
        scope.spawn(|| {
            while !done.load(Ordering::SeqCst) {
                let snap = planner.snapshot(HOME).unwrap();
                let mut ready = 0;
                for goal in snap.plan.goals.values() {
                    if !goal.name.starts_with("dependent-") || goal.name == "dependent-0-0" {
                        continue;
                    }
                    match goal.state() {
                        GoalState::Ready => {
                            ready += 1;
                            assert!(snap.plan.graph.is_satisfied(goal.id), "{} ready too early", goal.name);
                        }
                        GoalState::Considered => {
                            assert!(!snap.plan.graph.is_satisfied(goal.id), "{} left behind", goal.name);
                        }
                        _ => {}
                    }
                }
                assert_eq!(ready % FAN_OUT, 0, "partially released fan-out");
            }
        });

        scope.spawn(|| {
            while !done.load(Ordering::SeqCst) {
                let report = planner.run_season_audit(HOME).unwrap();
                assert_eq!(report.snapshot_digest.len(), 64);
                assert!(report.circular_dependencies.is_empty());
            }
        });

        // Readiness never flips back once the prerequisite is achieved.
        scope.spawn(|| {
            let mut seen_satisfied = false;
            while !done.load(Ordering::SeqCst) {
                let readiness = planner.get_readiness(HOME, watched).unwrap();
                if seen_satisfied {
                    assert!(readiness.satisfied);
                }
                if readiness.satisfied {
                    seen_satisfied = true;
                    assert_eq!(planner.goal(HOME, watched).unwrap().state(), GoalState::Ready);
                }
            }
        });

        scope.spawn(|| {
            planner
                .transition_goal(HOME, first_base, GoalState::Achieved, "done")
                .unwrap();
            for round in 1..=ROUNDS {
                let base = committed_goal(&planner, &format!("base-{round}"));
                for i in 0..FAN_OUT {
                    let dependent = planner
                        .create_goal(HOME, &format!("dependent-{round}-{i}"))
                        .unwrap()
                        .id;
                    planner
                        .add_dependency(HOME, Dependency::prerequisite(dependent, base, Utc::now()))
                        .unwrap();
                    planner
                        .transition_goal(HOME, dependent, GoalState::Considered, "evaluate")
                        .unwrap();
                }
                planner
                    .transition_goal(HOME, base, GoalState::Achieved, "done")
                    .unwrap();
            }
            done.store(true, Ordering::SeqCst);
        });
    });

    let snap = planner.snapshot(HOME).unwrap();
    let ready = snap
        .plan
        .goals
        .values()
        .filter(|g| g.name.starts_with("dependent-") && g.state() == GoalState::Ready)
        .count();
    assert_eq!(ready, ROUNDS * FAN_OUT + 1);
}
