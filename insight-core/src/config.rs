//! Pipeline configuration.
//!
//! Every knob the pipeline reads lives in [`PipelineConfig`]. All fields have
//! defaults, so a partial JSON document (or none at all) is a valid
//! configuration:
//!
//! ```rust
//! use insight_core::config::PipelineConfig;
//!
//! let config = PipelineConfig::from_json_str(r#"{"contamination_rate": 0.1, "random_seed": 7}"#).unwrap();
//! assert_eq!(config.contamination_rate, 0.1);
//! assert_eq!(config.min_sample_size, 10);
//! ```

use serde::{Deserialize, Serialize};

use crate::error::{InsightError, Result};
use crate::insight::HealthStatus;

/// Default region hints used to split categorical breakdowns.
pub const DEFAULT_REGION_HINTS: &[&str] = &[
    "region",
    "state",
    "district",
    "city",
    "country",
    "zone",
    "area",
    "location",
    "pincode",
    "province",
    "territory",
];

/// Ordered anomaly-rate cutoffs separating the health levels.
///
/// Serialized as a two-element list `[watch, critical]`. A rate below `watch`
/// is healthy, below `critical` is watch, anything else is critical.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<f64>", into = "Vec<f64>")]
pub struct HealthThresholds {
    watch: f64,
    critical: f64,
}

impl HealthThresholds {
    /// Creates thresholds, checking that `0 <= watch <= critical <= 1`.
    pub fn new(watch: f64, critical: f64) -> Result<Self> {
        if !(0.0..=1.0).contains(&watch) || !(0.0..=1.0).contains(&critical) {
            return Err(InsightError::invalid_config(format!(
                "health_status_thresholds must lie in [0, 1], got [{watch}, {critical}]"
            )));
        }
        if watch > critical {
            return Err(InsightError::invalid_config(format!(
                "health_status_thresholds must be ascending, got [{watch}, {critical}]"
            )));
        }
        Ok(Self { watch, critical })
    }

    /// Rate at which the status leaves `healthy`.
    pub fn watch(&self) -> f64 {
        self.watch
    }

    /// Rate at which the status becomes `critical`.
    pub fn critical(&self) -> f64 {
        self.critical
    }

    /// Classifies an anomaly rate. Monotonic: a higher rate never yields a
    /// less severe status.
    pub fn classify(&self, anomaly_rate: f64) -> HealthStatus {
        if anomaly_rate < self.watch {
            HealthStatus::Healthy
        } else if anomaly_rate < self.critical {
            HealthStatus::Watch
        } else {
            HealthStatus::Critical
        }
    }
}

impl Default for HealthThresholds {
    fn default() -> Self {
        Self {
            watch: 0.02,
            critical: 0.10,
        }
    }
}

impl TryFrom<Vec<f64>> for HealthThresholds {
    type Error = InsightError;

    fn try_from(cutoffs: Vec<f64>) -> Result<Self> {
        match cutoffs.as_slice() {
            [watch, critical] => Self::new(*watch, *critical),
            other => Err(InsightError::invalid_config(format!(
                "health_status_thresholds needs exactly 2 cutoffs, got {}",
                other.len()
            ))),
        }
    }
}

impl From<HealthThresholds> for Vec<f64> {
    fn from(thresholds: HealthThresholds) -> Self {
        vec![thresholds.watch, thresholds.critical]
    }
}

/// Configuration for one pipeline run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Expected fraction of anomalous records (default: 0.05)
    pub contamination_rate: f64,
    /// Categorical columns with more distinct values than this are not broken down (default: 50)
    pub categorical_cardinality_ceiling: usize,
    /// Anomaly-rate cutoffs for the health status (default: [0.02, 0.10])
    pub health_status_thresholds: HealthThresholds,
    /// Minimum cleaned rows required before scoring (default: 10)
    pub min_sample_size: usize,
    /// Seed for the isolation forest (default: 42)
    pub random_seed: u64,
    /// Number of isolation trees (default: 100)
    pub n_estimators: usize,
    /// Subsample size per tree, capped at the row count (default: 256)
    pub max_samples: usize,
    /// Fraction of values that must parse as dates for a temporal column (default: 0.8)
    pub temporal_threshold: f64,
    /// Fraction of values that must parse as numbers for a numeric column (default: 0.8)
    pub numeric_threshold: f64,
    /// Distinct-to-row ratio at which a text column counts as an identifier (default: 0.95)
    pub identifier_ratio: f64,
    /// Token substituted for missing categorical values (default: "unknown")
    pub unknown_token: String,
    /// Maximum number of ranked features in the insight (default: 10)
    pub top_features_limit: usize,
    /// Column-name fragments that route a categorical breakdown to the region list
    pub region_column_hints: Vec<String>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            contamination_rate: 0.05,
            categorical_cardinality_ceiling: 50,
            health_status_thresholds: HealthThresholds::default(),
            min_sample_size: 10,
            random_seed: 42,
            n_estimators: 100,
            max_samples: 256,
            temporal_threshold: 0.8,
            numeric_threshold: 0.8,
            identifier_ratio: 0.95,
            unknown_token: "unknown".to_string(),
            top_features_limit: 10,
            region_column_hints: DEFAULT_REGION_HINTS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl PipelineConfig {
    /// Parses a configuration from JSON and validates it.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Sets the contamination rate.
    pub fn with_contamination_rate(mut self, rate: f64) -> Self {
        self.contamination_rate = rate;
        self
    }

    /// Sets the categorical cardinality ceiling.
    pub fn with_categorical_cardinality_ceiling(mut self, ceiling: usize) -> Self {
        self.categorical_cardinality_ceiling = ceiling;
        self
    }

    /// Sets the health status thresholds.
    pub fn with_health_status_thresholds(mut self, thresholds: HealthThresholds) -> Self {
        self.health_status_thresholds = thresholds;
        self
    }

    /// Sets the minimum sample size.
    pub fn with_min_sample_size(mut self, size: usize) -> Self {
        self.min_sample_size = size;
        self
    }

    /// Sets the random seed.
    pub fn with_random_seed(mut self, seed: u64) -> Self {
        self.random_seed = seed;
        self
    }

    /// Sets the number of trees.
    pub fn with_n_estimators(mut self, n: usize) -> Self {
        self.n_estimators = n;
        self
    }

    /// Sets the per-tree subsample size.
    pub fn with_max_samples(mut self, samples: usize) -> Self {
        self.max_samples = samples;
        self
    }

    /// Sets the number of ranked features reported.
    pub fn with_top_features_limit(mut self, limit: usize) -> Self {
        self.top_features_limit = limit;
        self
    }

    /// Checks every field and reports the first violation.
    pub fn validate(&self) -> Result<()> {
        if !(self.contamination_rate > 0.0 && self.contamination_rate <= 0.5) {
            return Err(InsightError::invalid_config(format!(
                "contamination_rate must be in (0, 0.5], got {}",
                self.contamination_rate
            )));
        }
        if self.categorical_cardinality_ceiling == 0 {
            return Err(InsightError::invalid_config(
                "categorical_cardinality_ceiling must be at least 1",
            ));
        }
        if self.min_sample_size < 2 {
            return Err(InsightError::invalid_config(format!(
                "min_sample_size must be at least 2, got {}",
                self.min_sample_size
            )));
        }
        if self.n_estimators == 0 {
            return Err(InsightError::invalid_config(
                "n_estimators must be at least 1",
            ));
        }
        if self.max_samples < 2 {
            return Err(InsightError::invalid_config(format!(
                "max_samples must be at least 2, got {}",
                self.max_samples
            )));
        }
        for (name, value) in [
            ("temporal_threshold", self.temporal_threshold),
            ("numeric_threshold", self.numeric_threshold),
            ("identifier_ratio", self.identifier_ratio),
        ] {
            if !(value > 0.0 && value <= 1.0) {
                return Err(InsightError::invalid_config(format!(
                    "{name} must be in (0, 1], got {value}"
                )));
            }
        }
        if self.unknown_token.trim().is_empty() {
            return Err(InsightError::invalid_config(
                "unknown_token must not be blank",
            ));
        }
        // Re-check thresholds in case the struct was built by hand.
        HealthThresholds::new(
            self.health_status_thresholds.watch,
            self.health_status_thresholds.critical,
        )?;
        Ok(())
    }
}
