// config.rs - Planner configuration.
//
// PlannerConfig fixes where a planner keeps its state. `for_root()` lays
// everything out under a `.planwise/` directory. PlannerSettings holds the
// tunables read from `.planwise/planwise.toml`; a missing file means
// defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::PlannerError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlannerConfig {
    /// Directory the `.planwise/` layout lives in.
    pub root: PathBuf,

    /// Household records, one subdirectory per household.
    pub store_dir: PathBuf,

    /// Domain event log (JSONL).
    pub events_log: PathBuf,

    /// Emergency retrospective requests (JSONL).
    pub ceremonies_log: PathBuf,

    /// Resource measurements, a flat TOML table of name = value.
    pub metrics_file: PathBuf,

    pub settings_file: PathBuf,
}

impl PlannerConfig {
    pub fn for_root(root: impl AsRef<Path>) -> Self {
        let root = root.as_ref().to_path_buf();
        let pw_dir = root.join(".planwise");
        Self {
            root,
            store_dir: pw_dir.join("households"),
            events_log: pw_dir.join("events.jsonl"),
            ceremonies_log: pw_dir.join("ceremonies.jsonl"),
            metrics_file: pw_dir.join("metrics.toml"),
            settings_file: pw_dir.join("planwise.toml"),
        }
    }

    pub fn settings(&self) -> Result<PlannerSettings, PlannerError> {
        PlannerSettings::load_or_default(&self.settings_file)
    }
}

/// Contents of `.planwise/planwise.toml`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PlannerSettings {
    /// Household used when none is named on the command line.
    #[serde(default = "default_household")]
    pub default_household: String,

    #[serde(default)]
    pub audit: AuditSettings,
}

impl Default for PlannerSettings {
    fn default() -> Self {
        Self {
            default_household: default_household(),
            audit: AuditSettings::default(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct AuditSettings {
    /// Show at most this many bottlenecks. Unlimited when absent.
    pub bottleneck_limit: Option<usize>,
}

fn default_household() -> String {
    "home".to_string()
}

impl PlannerSettings {
    pub fn load(path: &Path) -> Result<Self, PlannerError> {
        let content = std::fs::read_to_string(path).map_err(|e| PlannerError::Settings {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        toml::from_str(&content).map_err(|e| PlannerError::Settings {
            path: path.display().to_string(),
            reason: e.to_string(),
        })
    }

    pub fn load_or_default(path: &Path) -> Result<Self, PlannerError> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn layout_is_under_planwise_dir() {
        let config = PlannerConfig::for_root("/tmp/family");
        assert_eq!(config.store_dir, PathBuf::from("/tmp/family/.planwise/households"));
        assert_eq!(config.settings_file, PathBuf::from("/tmp/family/.planwise/planwise.toml"));
    }

    #[test]
    fn missing_settings_file_gives_defaults() {
        let dir = tempdir().unwrap();
        let settings = PlannerConfig::for_root(dir.path()).settings().unwrap();
        assert_eq!(settings, PlannerSettings::default());
        assert_eq!(settings.default_household, "home");
    }

    #[test]
    fn partial_settings_fill_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("planwise.toml");
        std::fs::write(&path, "[audit]\nbottleneck_limit = 3\n").unwrap();
        let settings = PlannerSettings::load(&path).unwrap();
        assert_eq!(settings.default_household, "home");
        assert_eq!(settings.audit.bottleneck_limit, Some(3));
    }

    #[test]
    fn malformed_settings_are_reported() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("planwise.toml");
        std::fs::write(&path, "default_household = [").unwrap();
        assert!(matches!(
            PlannerSettings::load(&path),
            Err(PlannerError::Settings { .. })
        ));
    }
}
