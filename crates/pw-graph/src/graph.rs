// graph.rs - DependencyGraph: storage, readiness and cycle safety.
//
// Dependencies are stored by id, with two indexes:
//   by_blocked:  goal → dependencies that block it
//   by_required: goal → dependencies that point at it (its dependents)
//
// Goal edges (prerequisite/recommended) are mirrored into a petgraph
// `DiGraphMap` pointing from the required goal to the goal it blocks, with
// the number of parallel dependencies as the edge weight. Cycle checks,
// topological ordering and downstream walks run on that map. Life-event and
// resource dependencies point at conditions outside the graph.
//
// On disk the graph is just the list of dependencies; indexes are rebuilt
// on load.

use std::collections::{BTreeMap, BTreeSet};

use petgraph::algo::{astar, has_path_connecting, tarjan_scc, toposort};
use petgraph::graphmap::DiGraphMap;
use petgraph::visit::Bfs;
use petgraph::Direction;
use pw_goal::ReadinessCheck;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::dependency::Dependency;
use crate::error::GraphError;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(from = "Vec<Dependency>", into = "Vec<Dependency>")]
pub struct DependencyGraph {
    dependencies: BTreeMap<Uuid, Dependency>,
    by_blocked: BTreeMap<Uuid, BTreeSet<Uuid>>,
    by_required: BTreeMap<Uuid, BTreeSet<Uuid>>,
    /// required → blocked, weighted by how many goal edges join the pair.
    goal_edges: DiGraphMap<Uuid, usize>,
}

impl Default for DependencyGraph {
    fn default() -> Self {
        Self {
            dependencies: BTreeMap::new(),
            by_blocked: BTreeMap::new(),
            by_required: BTreeMap::new(),
            goal_edges: DiGraphMap::new(),
        }
    }
}

// Everything besides `dependencies` is derived from it.
impl PartialEq for DependencyGraph {
    fn eq(&self, other: &Self) -> bool {
        self.dependencies == other.dependencies
    }
}

impl From<Vec<Dependency>> for DependencyGraph {
    fn from(dependencies: Vec<Dependency>) -> Self {
        let mut graph = DependencyGraph::default();
        for dep in dependencies {
            graph.index(dep);
        }
        graph
    }
}

impl From<DependencyGraph> for Vec<Dependency> {
    fn from(graph: DependencyGraph) -> Self {
        graph.dependencies.into_values().collect()
    }
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.dependencies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dependencies.is_empty()
    }

    pub fn get(&self, id: Uuid) -> Option<&Dependency> {
        self.dependencies.get(&id)
    }

    pub(crate) fn get_mut(&mut self, id: Uuid) -> Option<&mut Dependency> {
        self.dependencies.get_mut(&id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Dependency> {
        self.dependencies.values()
    }

    /// Dependencies that block `goal_id`.
    pub fn dependencies_of(&self, goal_id: Uuid) -> impl Iterator<Item = &Dependency> {
        self.by_blocked
            .get(&goal_id)
            .into_iter()
            .flatten()
            .filter_map(|id| self.dependencies.get(id))
    }

    /// Goal edges that point at `goal_id`.
    pub fn dependents_of(&self, goal_id: Uuid) -> impl Iterator<Item = &Dependency> {
        self.by_required
            .get(&goal_id)
            .into_iter()
            .flatten()
            .filter_map(|id| self.dependencies.get(id))
    }

    /// Whether the goal appears in any dependency at all.
    pub fn has_edges(&self, goal_id: Uuid) -> bool {
        self.by_blocked.get(&goal_id).is_some_and(|s| !s.is_empty())
            || self.by_required.get(&goal_id).is_some_and(|s| !s.is_empty())
    }

    /// Blocking dependencies of `goal_id` that are not satisfied.
    pub fn unsatisfied(&self, goal_id: Uuid) -> Vec<&Dependency> {
        self.dependencies_of(goal_id)
            .filter(|dep| dep.holds_back())
            .collect()
    }

    /// True iff nothing holds the goal back: prerequisites and life events
    /// satisfied, non-overridden recommendations satisfied, every resource
    /// at or above its threshold.
    pub fn is_satisfied(&self, goal_id: Uuid) -> bool {
        self.dependencies_of(goal_id).all(|dep| !dep.holds_back())
    }

    /// Insert a dependency. Goal edges are checked for cycles first; on
    /// rejection nothing is mutated.
    pub fn insert(&mut self, dep: Dependency) -> Result<(), GraphError> {
        if self.dependencies.contains_key(&dep.id) {
            return Err(GraphError::DuplicateDependency(dep.id));
        }
        if let Some(required) = dep.required_goal() {
            if let Some(path) = self.cycle_path(dep.blocked_goal, required) {
                return Err(GraphError::CycleDetected { path });
            }
        }
        self.index(dep);
        Ok(())
    }

    pub fn remove(&mut self, id: Uuid) -> Option<Dependency> {
        let dep = self.dependencies.remove(&id)?;
        if let Some(set) = self.by_blocked.get_mut(&dep.blocked_goal) {
            set.remove(&id);
            if set.is_empty() {
                self.by_blocked.remove(&dep.blocked_goal);
            }
        }
        if let Some(required) = dep.required_goal() {
            if let Some(set) = self.by_required.get_mut(&required) {
                set.remove(&id);
                if set.is_empty() {
                    self.by_required.remove(&required);
                }
            }
            self.unlink(required, dep.blocked_goal);
        }
        Some(dep)
    }

    fn index(&mut self, dep: Dependency) {
        self.by_blocked
            .entry(dep.blocked_goal)
            .or_default()
            .insert(dep.id);
        if let Some(required) = dep.required_goal() {
            self.by_required.entry(required).or_default().insert(dep.id);
            match self.goal_edges.edge_weight_mut(required, dep.blocked_goal) {
                Some(count) => *count += 1,
                None => {
                    self.goal_edges.add_edge(required, dep.blocked_goal, 1);
                }
            }
        }
        self.dependencies.insert(dep.id, dep);
    }

    fn unlink(&mut self, required: Uuid, blocked: Uuid) {
        let remaining = match self.goal_edges.edge_weight_mut(required, blocked) {
            Some(count) => {
                *count = count.saturating_sub(1);
                *count
            }
            None => return,
        };
        if remaining == 0 {
            self.goal_edges.remove_edge(required, blocked);
            for node in [required, blocked] {
                if self.is_isolated(node) {
                    self.goal_edges.remove_node(node);
                }
            }
        }
    }

    fn is_isolated(&self, node: Uuid) -> bool {
        self.goal_edges
            .neighbors_directed(node, Direction::Incoming)
            .next()
            .is_none()
            && self
                .goal_edges
                .neighbors_directed(node, Direction::Outgoing)
                .next()
                .is_none()
    }

    /// Would the edge "`blocked` requires `required`" close a loop?
    ///
    /// It does when `required` already (transitively) depends on `blocked`.
    /// Returns the loop as `blocked → required → … → blocked`.
    fn cycle_path(&self, blocked: Uuid, required: Uuid) -> Option<Vec<Uuid>> {
        if blocked == required {
            return Some(vec![blocked, blocked]);
        }
        if !self.goal_edges.contains_node(blocked) || !self.goal_edges.contains_node(required) {
            return None;
        }
        if !has_path_connecting(&self.goal_edges, blocked, required, None) {
            return None;
        }

        // Path runs blocked → dependents → … → required; reversed, it reads
        // as a chain of "requires".
        let (_, forward) = astar(
            &self.goal_edges,
            blocked,
            |node| node == required,
            |_| 1usize,
            |_| 0,
        )?;
        let mut path = vec![blocked];
        path.extend(forward.into_iter().rev());
        Some(path)
    }

    /// Every group of goals caught in a cycle, members sorted by id.
    ///
    /// Insertion rejects cycles, so this is only non-empty when records were
    /// loaded from a store that was edited by hand or by a buggy writer.
    pub fn find_cycles(&self) -> Vec<Vec<Uuid>> {
        let mut cycles: Vec<Vec<Uuid>> = tarjan_scc(&self.goal_edges)
            .into_iter()
            .filter(|component| {
                component.len() > 1
                    || component
                        .first()
                        .is_some_and(|n| self.goal_edges.contains_edge(*n, *n))
            })
            .map(|mut component| {
                component.sort();
                component
            })
            .collect();
        cycles.sort();
        cycles
    }

    /// `seeds` plus every goal that transitively depends on them.
    pub fn downstream_closure(&self, seeds: &BTreeSet<Uuid>) -> BTreeSet<Uuid> {
        let mut visited = seeds.clone();
        for &seed in seeds {
            if !self.goal_edges.contains_node(seed) {
                continue;
            }
            let mut bfs = Bfs::new(&self.goal_edges, seed);
            while let Some(node) = bfs.next(&self.goal_edges) {
                visited.insert(node);
            }
        }
        visited
    }

    /// Order `subset` so every goal comes after the goals it requires,
    /// considering only edges inside the subset.
    pub fn topological_order(&self, subset: &BTreeSet<Uuid>) -> Vec<Uuid> {
        let mut within: DiGraphMap<Uuid, ()> = DiGraphMap::new();
        for &goal in subset {
            within.add_node(goal);
        }
        for &goal in subset {
            for required in self.goal_edges.neighbors_directed(goal, Direction::Incoming) {
                if subset.contains(&required) {
                    within.add_edge(required, goal, ());
                }
            }
        }

        match toposort(&within, None) {
            Ok(order) => order,
            Err(cycle) => {
                // Only reachable with corrupted input; keep every goal evaluated.
                tracing::warn!(goal_id = %cycle.node_id(), "cycle among goal dependencies; evaluating unordered");
                subset.iter().copied().collect()
            }
        }
    }
}

impl ReadinessCheck for DependencyGraph {
    fn is_satisfied(&self, goal_id: Uuid) -> bool {
        DependencyGraph::is_satisfied(self, goal_id)
    }
}
