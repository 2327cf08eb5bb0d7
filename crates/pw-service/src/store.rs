// store.rs - ConfigStore: household-scoped persistence of plan records.
//
// Each record lives in its own JSON file:
//
//   <store_dir>/<household>/goals/<goal_id>.json
//   <store_dir>/<household>/dependencies/<dependency_id>.json
//   <store_dir>/<household>/life_events/<event_id>.json
//
// Goals and life events are only deleted when a failed commit is rolled
// back. Dependencies are, once the resolver prunes or removes them.
//
// A committed mutation reaches the store as one ChangeSet. The file store
// stages every record as `<id>.json.tmp` and renames them into place only
// after all of them were written, so a failed write leaves the previous
// records untouched.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use pw_goal::Goal;
use pw_graph::Dependency;
use pw_life_events::LifeEvent;
use serde::de::DeserializeOwned;
use serde::Serialize;
use uuid::Uuid;

use crate::error::StoreError;

const GOALS: &str = "goals";
const DEPENDENCIES: &str = "dependencies";
const LIFE_EVENTS: &str = "life_events";

/// Everything stored for one household.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HouseholdRecords {
    pub goals: Vec<Goal>,
    pub dependencies: Vec<Dependency>,
    pub life_events: Vec<LifeEvent>,
}

/// Records written and deleted by one committed mutation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChangeSet {
    pub goals: Vec<Goal>,
    pub dependencies: Vec<Dependency>,
    pub life_events: Vec<LifeEvent>,
    pub removed_goals: Vec<Uuid>,
    pub removed_dependencies: Vec<Uuid>,
    pub removed_life_events: Vec<Uuid>,
}

impl ChangeSet {
    pub fn is_empty(&self) -> bool {
        self.goals.is_empty()
            && self.dependencies.is_empty()
            && self.life_events.is_empty()
            && self.removed_goals.is_empty()
            && self.removed_dependencies.is_empty()
            && self.removed_life_events.is_empty()
    }
}

/// Household ids become directory names: letters, digits, `-` and `_` only.
pub fn validate_household(household: &str) -> Result<(), StoreError> {
    let valid = !household.is_empty()
        && household
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if valid {
        Ok(())
    } else {
        Err(StoreError::InvalidHousehold(household.to_string()))
    }
}

pub trait ConfigStore: Send + Sync {
    fn load(&self, household: &str) -> Result<HouseholdRecords, StoreError>;
    fn save_goal(&self, household: &str, goal: &Goal) -> Result<(), StoreError>;
    fn remove_goal(&self, household: &str, goal_id: Uuid) -> Result<(), StoreError>;
    fn save_dependency(&self, household: &str, dep: &Dependency) -> Result<(), StoreError>;
    fn remove_dependency(&self, household: &str, dependency_id: Uuid) -> Result<(), StoreError>;
    fn save_life_event(&self, household: &str, event: &LifeEvent) -> Result<(), StoreError>;
    fn remove_life_event(&self, household: &str, event_id: Uuid) -> Result<(), StoreError>;

    /// Persist a whole change set. The default writes record by record and
    /// stops at the first failure; stores that can stage writes override it.
    fn commit(&self, household: &str, changes: &ChangeSet) -> Result<(), StoreError> {
        for goal in &changes.goals {
            self.save_goal(household, goal)?;
        }
        for dep in &changes.dependencies {
            self.save_dependency(household, dep)?;
        }
        for event in &changes.life_events {
            self.save_life_event(household, event)?;
        }
        for id in &changes.removed_goals {
            self.remove_goal(household, *id)?;
        }
        for id in &changes.removed_dependencies {
            self.remove_dependency(household, *id)?;
        }
        for id in &changes.removed_life_events {
            self.remove_life_event(household, *id)?;
        }
        Ok(())
    }
}

pub struct JsonFileStore {
    store_dir: PathBuf,
}

fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> StoreError + '_ {
    move |source| StoreError::IoError {
        path: path.display().to_string(),
        source,
    }
}

impl JsonFileStore {
    /// Creates the directory if it doesn't exist.
    pub fn new(store_dir: impl AsRef<Path>) -> Result<Self, StoreError> {
        let store_dir = store_dir.as_ref().to_path_buf();
        fs::create_dir_all(&store_dir).map_err(io_error(&store_dir))?;
        Ok(Self { store_dir })
    }

    fn collection_dir(&self, household: &str, collection: &str) -> Result<PathBuf, StoreError> {
        validate_household(household)?;
        Ok(self.store_dir.join(household).join(collection))
    }

    fn record_path(&self, household: &str, collection: &str, id: Uuid) -> Result<PathBuf, StoreError> {
        Ok(self
            .collection_dir(household, collection)?
            .join(format!("{}.json", id)))
    }

    /// Write `record` next to its final path and remember the pair.
    fn stage<T: Serialize>(
        &self,
        household: &str,
        collection: &str,
        id: Uuid,
        record: &T,
        staged: &mut Vec<(PathBuf, PathBuf)>,
    ) -> Result<(), StoreError> {
        let dir = self.collection_dir(household, collection)?;
        fs::create_dir_all(&dir).map_err(io_error(&dir))?;
        let target = dir.join(format!("{}.json", id));
        let tmp = dir.join(format!("{}.json.tmp", id));
        let json = serde_json::to_string_pretty(record)?;
        fs::write(&tmp, json).map_err(io_error(&tmp))?;
        staged.push((tmp, target));
        Ok(())
    }

    fn stage_all(
        &self,
        household: &str,
        changes: &ChangeSet,
        staged: &mut Vec<(PathBuf, PathBuf)>,
    ) -> Result<(), StoreError> {
        for goal in &changes.goals {
            self.stage(household, GOALS, goal.id, goal, staged)?;
        }
        for dep in &changes.dependencies {
            self.stage(household, DEPENDENCIES, dep.id, dep, staged)?;
        }
        for event in &changes.life_events {
            self.stage(household, LIFE_EVENTS, event.id, event, staged)?;
        }
        Ok(())
    }

    fn delete(&self, household: &str, collection: &str, id: Uuid) -> Result<(), StoreError> {
        let path = self.record_path(household, collection, id)?;
        if !path.exists() {
            return Ok(());
        }
        fs::remove_file(&path).map_err(io_error(&path))
    }

    fn read_all<T: DeserializeOwned>(
        &self,
        household: &str,
        collection: &str,
    ) -> Result<Vec<T>, StoreError> {
        let dir = self.collection_dir(household, collection)?;
        if !dir.exists() {
            return Ok(Vec::new());
        }

        let entries = fs::read_dir(&dir).map_err(io_error(&dir))?;

        let mut records = Vec::new();
        for entry in entries {
            let entry = entry.map_err(io_error(&dir))?;
            let path = entry.path();
            if !path.extension().is_some_and(|ext| ext == "json") {
                continue;
            }
            let json = fs::read_to_string(&path).map_err(io_error(&path))?;
            match serde_json::from_str::<T>(&json) {
                Ok(record) => records.push(record),
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "skipping unreadable record");
                }
            }
        }
        Ok(records)
    }
}

impl ConfigStore for JsonFileStore {
    fn load(&self, household: &str) -> Result<HouseholdRecords, StoreError> {
        let mut goals: Vec<Goal> = self.read_all(household, GOALS)?;
        goals.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(HouseholdRecords {
            goals,
            dependencies: self.read_all(household, DEPENDENCIES)?,
            life_events: self.read_all(household, LIFE_EVENTS)?,
        })
    }

    fn save_goal(&self, household: &str, goal: &Goal) -> Result<(), StoreError> {
        self.commit(
            household,
            &ChangeSet {
                goals: vec![goal.clone()],
                ..ChangeSet::default()
            },
        )
    }

    fn remove_goal(&self, household: &str, goal_id: Uuid) -> Result<(), StoreError> {
        self.delete(household, GOALS, goal_id)
    }

    fn save_dependency(&self, household: &str, dep: &Dependency) -> Result<(), StoreError> {
        self.commit(
            household,
            &ChangeSet {
                dependencies: vec![dep.clone()],
                ..ChangeSet::default()
            },
        )
    }

    fn remove_dependency(&self, household: &str, dependency_id: Uuid) -> Result<(), StoreError> {
        self.delete(household, DEPENDENCIES, dependency_id)
    }

    fn save_life_event(&self, household: &str, event: &LifeEvent) -> Result<(), StoreError> {
        self.commit(
            household,
            &ChangeSet {
                life_events: vec![event.clone()],
                ..ChangeSet::default()
            },
        )
    }

    fn remove_life_event(&self, household: &str, event_id: Uuid) -> Result<(), StoreError> {
        self.delete(household, LIFE_EVENTS, event_id)
    }

    fn commit(&self, household: &str, changes: &ChangeSet) -> Result<(), StoreError> {
        let mut staged = Vec::new();
        if let Err(e) = self.stage_all(household, changes, &mut staged) {
            for (tmp, _) in &staged {
                if let Err(cleanup) = fs::remove_file(tmp) {
                    tracing::warn!(path = %tmp.display(), error = %cleanup, "failed to remove staged record");
                }
            }
            return Err(e);
        }

        for (tmp, target) in &staged {
            fs::rename(tmp, target).map_err(io_error(target))?;
        }
        for id in &changes.removed_goals {
            self.delete(household, GOALS, *id)?;
        }
        for id in &changes.removed_dependencies {
            self.delete(household, DEPENDENCIES, *id)?;
        }
        for id in &changes.removed_life_events {
            self.delete(household, LIFE_EVENTS, *id)?;
        }
        Ok(())
    }
}

/// Volatile store for tests and embedding.
#[derive(Default)]
pub struct MemoryStore {
    households: Mutex<HashMap<String, MemoryHousehold>>,
}

#[derive(Default)]
struct MemoryHousehold {
    goals: HashMap<Uuid, Goal>,
    dependencies: HashMap<Uuid, Dependency>,
    life_events: HashMap<Uuid, LifeEvent>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_household<T>(&self, household: &str, f: impl FnOnce(&mut MemoryHousehold) -> T) -> T {
        let mut households = self.households.lock().unwrap_or_else(|e| e.into_inner());
        f(households.entry(household.to_string()).or_default())
    }
}

impl ConfigStore for MemoryStore {
    fn load(&self, household: &str) -> Result<HouseholdRecords, StoreError> {
        Ok(self.with_household(household, |h| HouseholdRecords {
            goals: h.goals.values().cloned().collect(),
            dependencies: h.dependencies.values().cloned().collect(),
            life_events: h.life_events.values().cloned().collect(),
        }))
    }

    fn save_goal(&self, household: &str, goal: &Goal) -> Result<(), StoreError> {
        self.with_household(household, |h| h.goals.insert(goal.id, goal.clone()));
        Ok(())
    }

    fn remove_goal(&self, household: &str, goal_id: Uuid) -> Result<(), StoreError> {
        self.with_household(household, |h| h.goals.remove(&goal_id));
        Ok(())
    }

    fn save_dependency(&self, household: &str, dep: &Dependency) -> Result<(), StoreError> {
        self.with_household(household, |h| h.dependencies.insert(dep.id, dep.clone()));
        Ok(())
    }

    fn remove_dependency(&self, household: &str, dependency_id: Uuid) -> Result<(), StoreError> {
        self.with_household(household, |h| h.dependencies.remove(&dependency_id));
        Ok(())
    }

    fn save_life_event(&self, household: &str, event: &LifeEvent) -> Result<(), StoreError> {
        self.with_household(household, |h| h.life_events.insert(event.id, event.clone()));
        Ok(())
    }

    fn remove_life_event(&self, household: &str, event_id: Uuid) -> Result<(), StoreError> {
        self.with_household(household, |h| h.life_events.remove(&event_id));
        Ok(())
    }

    /// Applied under one lock, so readers of the store see all or nothing.
    fn commit(&self, household: &str, changes: &ChangeSet) -> Result<(), StoreError> {
        self.with_household(household, |h| {
            for goal in &changes.goals {
                h.goals.insert(goal.id, goal.clone());
            }
            for dep in &changes.dependencies {
                h.dependencies.insert(dep.id, dep.clone());
            }
            for event in &changes.life_events {
                h.life_events.insert(event.id, event.clone());
            }
            for id in &changes.removed_goals {
                h.goals.remove(id);
            }
            for id in &changes.removed_dependencies {
                h.dependencies.remove(id);
            }
            for id in &changes.removed_life_events {
                h.life_events.remove(id);
            }
        });
        Ok(())
    }
}
