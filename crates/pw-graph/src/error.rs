// error.rs - Error types for the dependency graph and resolver.

use pw_goal::GoalError;
use thiserror::Error;
use uuid::Uuid;

/// Errors that can occur while mutating or querying the dependency graph.
#[derive(Debug, Error)]
pub enum GraphError {
    /// Adding the edge would close a loop among goal-to-goal dependencies.
    /// The graph is left untouched.
    #[error("dependency cycle detected: {}", format_path(path))]
    CycleDetected { path: Vec<Uuid> },

    #[error("dependency not found: {0}")]
    DependencyNotFound(Uuid),

    #[error("dependency already exists: {0}")]
    DuplicateDependency(Uuid),

    #[error("goal not found: {0}")]
    GoalNotFound(Uuid),

    /// Only `recommended` dependencies can be overridden.
    #[error("dependency {dependency_id} of type {kind} cannot be overridden")]
    OverrideNotAllowed { dependency_id: Uuid, kind: String },

    /// A committed goal must never hold an unsatisfied dependency.
    #[error("goal {goal_id} is committed; unsatisfied dependency {dependency_id} rejected")]
    BlockedGoalCommitted { goal_id: Uuid, dependency_id: Uuid },

    /// The metrics file could not be read or parsed.
    #[error("failed to load metrics from {path}: {reason}")]
    MetricsFile { path: String, reason: String },

    #[error(transparent)]
    Goal(#[from] GoalError),
}

fn format_path(path: &[Uuid]) -> String {
    path.iter()
        .map(|id| id.to_string())
        .collect::<Vec<_>>()
        .join(" -> ")
}
