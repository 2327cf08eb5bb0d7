// metric.rs - MetricSource port for resource dependencies.
//
// Resource dependencies compare an externally measured `current` value
// against a threshold. Lookups happen outside the recomputation path; the
// resolver only ever sees measurements that were already taken.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use crate::error::GraphError;

/// Supplies the current measurement for a named resource.
pub trait MetricSource: Send + Sync {
    /// `None` when no measurement is available. Callers treat that as pending.
    fn current(&self, resource: &str) -> Option<f64>;
}

/// Measurements held in memory, optionally loaded from a TOML table:
///
/// ```toml
/// savings = 12500.0
/// weekly_running_km = 32
/// ```
#[derive(Debug, Clone, Default)]
pub struct StaticMetricSource {
    values: BTreeMap<String, f64>,
}

impl StaticMetricSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a measurement and return self (builder pattern).
    pub fn with(mut self, resource: impl Into<String>, value: f64) -> Self {
        self.values.insert(resource.into(), value);
        self
    }

    pub fn set(&mut self, resource: impl Into<String>, value: f64) {
        self.values.insert(resource.into(), value);
    }

    pub fn load(path: &Path) -> Result<Self, GraphError> {
        let content = fs::read_to_string(path).map_err(|e| GraphError::MetricsFile {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        let values: BTreeMap<String, f64> =
            toml::from_str(&content).map_err(|e| GraphError::MetricsFile {
                path: path.display().to_string(),
                reason: e.to_string(),
            })?;
        Ok(Self { values })
    }

    /// Load the file if it exists; a missing file means "nothing measured".
    pub fn load_or_default(path: &Path) -> Result<Self, GraphError> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }
}

impl MetricSource for StaticMetricSource {
    fn current(&self, resource: &str) -> Option<f64> {
        self.values.get(resource).copied()
    }
}
