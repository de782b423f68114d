//! The insight object produced once per upload.
//!
//! An [`Insight`] is built by the aggregator at the end of a run and never
//! mutated afterwards. It is the only thing downstream collaborators (report
//! rendering, dashboards) see, so every field serializes with serde and a JSON
//! round trip reproduces it exactly.

use std::fmt;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::analyzers::cleaning::CleaningReport;
use crate::analyzers::inference::ColumnProfile;
use crate::error::{InsightError, Result};

/// Version of the serialized insight layout. Bumped whenever a required field
/// is added or removed.
pub const INSIGHT_SCHEMA_VERSION: u32 = 1;

/// Three-level classification of a dataset's anomaly rate.
///
/// Variants are ordered by severity, so `Healthy < Watch < Critical`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Watch,
    Critical,
}

impl HealthStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            HealthStatus::Healthy => "healthy",
            HealthStatus::Watch => "watch",
            HealthStatus::Critical => "critical",
        }
    }
}

impl fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// A column that was excluded during cleaning, and why.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnWarning {
    pub column: String,
    pub reason: String,
}

impl ColumnWarning {
    /// Builds a warning from a recoverable cleaning error.
    ///
    /// Returns `None` for any other error kind.
    pub fn from_error(error: &InsightError) -> Option<Self> {
        match error {
            InsightError::Cleaning { column, .. } => Some(Self {
                column: column.clone(),
                reason: error.to_string(),
            }),
            _ => None,
        }
    }
}

/// Bucket width of the time breakdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Granularity {
    Hour,
    Day,
}

/// One time bucket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeBucket {
    /// `YYYY-MM-DD` for daily buckets, `YYYY-MM-DD HH:00` for hourly ones
    pub label: String,
    /// Inclusive start of the bucket
    pub start: NaiveDateTime,
    pub record_count: usize,
    pub anomaly_count: usize,
    pub anomaly_rate: f64,
}

/// Anomaly counts over time for one temporal column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeBreakdown {
    pub column: String,
    pub granularity: Granularity,
    /// Buckets in chronological order
    pub buckets: Vec<TimeBucket>,
}

/// Counts for one distinct value of a categorical column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupStat {
    pub value: String,
    pub record_count: usize,
    pub anomaly_count: usize,
    pub anomaly_rate: f64,
}

/// Anomaly counts per value of one categorical column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryBreakdown {
    pub column: String,
    /// Groups sorted by anomaly count, then record count (both descending),
    /// then value
    pub groups: Vec<GroupStat>,
}

/// How strongly one feature separates anomalous records from normal ones.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureContribution {
    pub feature: String,
    pub source_column: String,
    /// Absolute difference of the scaled feature means between the two classes
    pub contribution: f64,
}

/// Parameters and outcome of the scoring stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoringSummary {
    pub contamination_rate: f64,
    pub threshold: f64,
    pub n_estimators: usize,
    pub subsample_size: usize,
    pub random_seed: u64,
    /// Feature names in matrix order
    pub features_used: Vec<String>,
}

/// Decision-ready summary of one uploaded dataset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Insight {
    pub schema_version: u32,
    /// SHA-256 of the raw table (headers and cells), hex encoded
    pub dataset_fingerprint: String,
    pub total_records: usize,
    pub total_anomalies: usize,
    pub anomaly_rate: f64,
    pub health_status: HealthStatus,
    pub time_breakdown: Option<TimeBreakdown>,
    pub region_breakdown: Vec<CategoryBreakdown>,
    pub demographic_breakdown: Vec<CategoryBreakdown>,
    pub top_features: Vec<FeatureContribution>,
    pub columns: Vec<ColumnProfile>,
    pub cleaning: CleaningReport,
    pub scoring: ScoringSummary,
    pub warnings: Vec<ColumnWarning>,
}

impl Insight {
    /// Serializes the insight to compact JSON.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Serializes the insight to indented JSON.
    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Parses an insight previously produced by [`Insight::to_json`].
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Number of records not flagged as anomalous.
    pub fn normal_records(&self) -> usize {
        self.total_records - self.total_anomalies
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_health_status_ordering() {
        assert!(HealthStatus::Healthy < HealthStatus::Watch);
        assert!(HealthStatus::Watch < HealthStatus::Critical);
        assert_eq!(HealthStatus::Watch.to_string(), "watch");
        assert_eq!(
            serde_json::to_string(&HealthStatus::Critical).unwrap(),
            "\"critical\""
        );
    }

    #[test]
    fn test_warning_from_cleaning_error() {
        let err = InsightError::cleaning("amount", "no parseable values");
        let warning = ColumnWarning::from_error(&err).unwrap();
        assert_eq!(warning.column, "amount");
        assert!(warning.reason.contains("no parseable values"));

        assert!(ColumnWarning::from_error(&InsightError::NoFeatures).is_none());
    }

    #[test]
    fn test_granularity_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Granularity::Hour).unwrap(), "\"hour\"");
    }
}
