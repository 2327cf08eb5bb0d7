// plan.rs - Plan: arena of one household's goals and dependencies.
//
// Goals are addressed by stable UUIDs. Mutation happens on a cloned draft
// which replaces the committed plan only when the whole operation succeeds,
// so readers never observe a half-propagated graph.

use std::collections::BTreeMap;

use pw_goal::Goal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::GraphError;
use crate::graph::DependencyGraph;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Plan {
    pub goals: BTreeMap<Uuid, Goal>,
    pub graph: DependencyGraph,
}

impl Plan {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_goal(&mut self, goal: Goal) {
        self.goals.insert(goal.id, goal);
    }

    pub fn goal(&self, id: Uuid) -> Result<&Goal, GraphError> {
        self.goals.get(&id).ok_or(GraphError::GoalNotFound(id))
    }

    pub fn goal_mut(&mut self, id: Uuid) -> Result<&mut Goal, GraphError> {
        self.goals.get_mut(&id).ok_or(GraphError::GoalNotFound(id))
    }

    /// Run `f` against a draft copy; keep the draft only if `f` succeeds.
    pub fn commit<T, E>(&mut self, f: impl FnOnce(&mut Plan) -> Result<T, E>) -> Result<T, E> {
        let mut draft = self.clone();
        let out = f(&mut draft)?;
        *self = draft;
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn failed_commit_leaves_plan_untouched() {
        let mut plan = Plan::new();
        plan.insert_goal(Goal::new("Keep", Utc::now()));
        let before = plan.clone();

        let result: Result<(), GraphError> = plan.commit(|draft| {
            draft.insert_goal(Goal::new("Discard", Utc::now()));
            Err(GraphError::GoalNotFound(Uuid::new_v4()))
        });

        assert!(result.is_err());
        assert_eq!(plan, before);
    }

    #[test]
    fn successful_commit_replaces_plan() {
        let mut plan = Plan::new();
        plan.commit(|draft| {
            draft.insert_goal(Goal::new("Keep", Utc::now()));
            Ok::<_, GraphError>(())
        })
        .unwrap();
        assert_eq!(plan.goals.len(), 1);
    }
}
