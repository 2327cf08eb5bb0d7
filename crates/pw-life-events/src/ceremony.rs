// ceremony.rs - CeremonyScheduler: hand-off point for emergency retros.
//
// Scheduling is an outer concern (calendars, reminders). The core only
// tells a scheduler that a retrospective is needed, after the plan change
// that caused it has been committed.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use pw_goal::append_jsonl;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::LifeEventError;
use crate::processor::EmergencyRetro;

pub trait CeremonyScheduler: Send + Sync {
    fn schedule_emergency_retro(&self, retro: &EmergencyRetro) -> Result<(), LifeEventError>;
}

/// One line of the ceremonies log.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CeremonyRequest {
    pub ceremony: String,
    pub event_id: Uuid,
    pub event_type: String,
    pub goals_affected: Vec<Uuid>,
    pub requested_at: DateTime<Utc>,
}

/// Appends each request as a JSON line for whatever runs the ceremonies.
pub struct LogCeremonyScheduler {
    path: PathBuf,
}

impl LogCeremonyScheduler {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read back every request in the log. A missing log is empty.
    pub fn requests(&self) -> Result<Vec<CeremonyRequest>, LifeEventError> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let content = fs::read_to_string(&self.path).map_err(|source| LifeEventError::IoError {
            path: self.path.display().to_string(),
            source,
        })?;
        content
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(|line| serde_json::from_str(line).map_err(LifeEventError::from))
            .collect()
    }
}

impl CeremonyScheduler for LogCeremonyScheduler {
    fn schedule_emergency_retro(&self, retro: &EmergencyRetro) -> Result<(), LifeEventError> {
        let request = CeremonyRequest {
            ceremony: "emergency_retro".to_string(),
            event_id: retro.event_id,
            event_type: retro.event_type.clone(),
            goals_affected: retro.goals_affected.clone(),
            requested_at: Utc::now(),
        };
        append_jsonl(&self.path, &request).map_err(|source| LifeEventError::IoError {
            path: self.path.display().to_string(),
            source,
        })?;

        tracing::info!(event_id = %retro.event_id, path = %self.path.display(), "emergency retrospective requested");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn log_scheduler_appends_requests() {
        let dir = tempdir().unwrap();
        let scheduler = LogCeremonyScheduler::new(dir.path().join("nested/ceremonies.jsonl"));
        assert!(scheduler.requests().unwrap().is_empty());

        let retro = EmergencyRetro {
            event_id: Uuid::new_v4(),
            event_type: "new_baby".into(),
            goals_affected: vec![Uuid::new_v4()],
        };
        scheduler.schedule_emergency_retro(&retro).unwrap();
        scheduler.schedule_emergency_retro(&retro).unwrap();

        let requests = scheduler.requests().unwrap();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0].event_id, retro.event_id);
        assert_eq!(requests[0].ceremony, "emergency_retro");
    }
}
