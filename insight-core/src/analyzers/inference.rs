//! Column kind inference.
//!
//! Every column of an upload is classified into one of four [`ColumnKind`]s,
//! which then drive cleaning policy, feature selection, and grouping:
//!
//! 1. **Temporal** if at least `temporal_threshold` of the non-missing values
//!    parse as dates or timestamps.
//! 2. **Numeric** if at least `numeric_threshold` parse as finite numbers.
//!    Checked after temporal so `2024-03-01` is never read as a number.
//! 3. **Identifier** if the column is near-unique
//!    (`distinct / rows >= identifier_ratio`).
//! 4. **Categorical** otherwise, including columns that are entirely empty.
//!
//! # Example
//!
//! ```rust
//! use insight_core::analyzers::inference::{ColumnKind, SchemaInferencer};
//! use insight_core::table::RawTable;
//!
//! let table = RawTable::builder(["when", "amount", "region"])
//!     .row(["2024-03-01", "10.5", "north"])
//!     .row(["2024-03-02", "11.0", "north"])
//!     .row(["2024-03-03", "9.75", "south"])
//!     .build()
//!     .unwrap();
//!
//! let profiles = SchemaInferencer::new().infer(&table).unwrap();
//! assert_eq!(profiles[0].kind, ColumnKind::Temporal);
//! assert_eq!(profiles[1].kind, ColumnKind::Numeric);
//! assert_eq!(profiles[2].kind, ColumnKind::Categorical);
//! ```

use std::collections::HashSet;
use std::fmt;

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use crate::config::PipelineConfig;
use crate::error::{InsightError, Result};
use crate::log_column;
use crate::logging::{truncate_field, LogConfig};
use crate::table::{CellValue, RawTable};

/// Configuration for the schema inferencer
#[derive(Debug, Clone)]
pub struct InferenceConfig {
    /// Fraction of non-missing values that must parse as dates (default: 0.8)
    pub temporal_threshold: f64,
    /// Fraction of non-missing values that must parse as numbers (default: 0.8)
    pub numeric_threshold: f64,
    /// Distinct-to-row ratio marking a near-unique identifier (default: 0.95)
    pub identifier_ratio: f64,
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            temporal_threshold: 0.8,
            numeric_threshold: 0.8,
            identifier_ratio: 0.95,
        }
    }
}

impl From<&PipelineConfig> for InferenceConfig {
    fn from(config: &PipelineConfig) -> Self {
        Self {
            temporal_threshold: config.temporal_threshold,
            numeric_threshold: config.numeric_threshold,
            identifier_ratio: config.identifier_ratio,
        }
    }
}

/// The four kinds every column is classified into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnKind {
    /// Dates or timestamps.
    Temporal,
    /// Measurements.
    Numeric,
    /// Low-to-moderate cardinality labels.
    Categorical,
    /// Near-unique keys; never scored or grouped.
    Identifier,
}

impl ColumnKind {
    /// Whether columns of this kind feed the feature matrix.
    pub fn is_scorable(&self) -> bool {
        match self {
            ColumnKind::Temporal | ColumnKind::Numeric => true,
            ColumnKind::Categorical | ColumnKind::Identifier => false,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ColumnKind::Temporal => "temporal",
            ColumnKind::Numeric => "numeric",
            ColumnKind::Categorical => "categorical",
            ColumnKind::Identifier => "identifier",
        }
    }
}

impl fmt::Display for ColumnKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// Inferred shape of one input column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnProfile {
    /// Column name as it appeared in the header
    pub name: String,
    /// Inferred kind
    pub kind: ColumnKind,
    /// Number of missing or blank cells
    pub missing_count: usize,
    /// Number of distinct non-missing values
    pub distinct_count: usize,
    /// Fraction of non-missing values that matched the chosen kind
    /// (0 for categorical and identifier columns)
    pub parse_ratio: f64,
}

/// Per-column match counters gathered in one pass.
#[derive(Debug, Default)]
pub struct ColumnStats {
    pub total: usize,
    pub missing: usize,
    pub temporal_matches: usize,
    pub numeric_matches: usize,
    pub distinct: HashSet<String>,
}

impl ColumnStats {
    fn non_missing(&self) -> usize {
        self.total - self.missing
    }
}

/// Pattern pre-filters for value classification
struct TypePatterns {
    number: Regex,
    date_like: Regex,
}

impl TypePatterns {
    fn new() -> Self {
        Self {
            number: Regex::new(r"^[+-]?(\d+\.?\d*|\.\d+)([eE][+-]?\d+)?$").unwrap(),
            date_like: Regex::new(
                r"^(\d{4}[-/.]\d{1,2}[-/.]\d{1,2}|\d{1,2}[-/.]\d{1,2}[-/.]\d{4})([T ]\d{1,2}:\d{2}.*)?$",
            )
            .unwrap(),
        }
    }
}

static PATTERNS: Lazy<TypePatterns> = Lazy::new(TypePatterns::new);

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
    "%Y/%m/%d %H:%M:%S",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
    "%d/%m/%Y %H:%M:%S",
    "%d/%m/%Y %H:%M",
];

const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y", "%d/%m/%Y", "%d.%m.%Y", "%d-%m-%Y",
];

/// Parses a date or timestamp in one of the recognized layouts.
///
/// Slash dates are read month-first, falling back to day-first when the
/// first field cannot be a month. Offsets in RFC 3339 values are normalized
/// to UTC.
pub fn parse_timestamp(value: &str) -> Option<NaiveDateTime> {
    let value = value.trim();
    if !PATTERNS.date_like.is_match(value) {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.naive_utc());
    }
    for format in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(value, format) {
            return Some(dt);
        }
    }
    for format in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(value, format) {
            return date.and_hms_opt(0, 0, 0);
        }
    }
    None
}

/// Parses a finite number. `NaN` and infinity literals are rejected.
pub fn parse_number(value: &str) -> Option<f64> {
    let value = value.trim();
    if !PATTERNS.number.is_match(value) {
        return None;
    }
    value.parse::<f64>().ok().filter(|n| n.is_finite())
}

/// Builder for SchemaInferencer
pub struct SchemaInferencerBuilder {
    config: InferenceConfig,
    log: LogConfig,
}

impl SchemaInferencerBuilder {
    /// Set the temporal threshold
    pub fn temporal_threshold(mut self, threshold: f64) -> Self {
        self.config.temporal_threshold = threshold;
        self
    }

    /// Set the numeric threshold
    pub fn numeric_threshold(mut self, threshold: f64) -> Self {
        self.config.numeric_threshold = threshold;
        self
    }

    /// Set the identifier ratio
    pub fn identifier_ratio(mut self, ratio: f64) -> Self {
        self.config.identifier_ratio = ratio;
        self
    }

    /// Set the logging configuration
    pub fn log_config(mut self, log: LogConfig) -> Self {
        self.log = log;
        self
    }

    /// Build the SchemaInferencer
    pub fn build(self) -> SchemaInferencer {
        SchemaInferencer {
            config: self.config,
            log: self.log,
        }
    }
}

/// Classifies the columns of a raw table.
pub struct SchemaInferencer {
    config: InferenceConfig,
    log: LogConfig,
}

impl SchemaInferencer {
    /// Create a new builder for SchemaInferencer
    pub fn builder() -> SchemaInferencerBuilder {
        SchemaInferencerBuilder {
            config: InferenceConfig::default(),
            log: LogConfig::default(),
        }
    }

    /// Create a SchemaInferencer with default configuration
    pub fn new() -> Self {
        Self::builder().build()
    }

    /// Create a SchemaInferencer from an explicit configuration
    pub fn with_config(config: InferenceConfig, log: LogConfig) -> Self {
        Self { config, log }
    }

    /// Produces one profile per column, in table order.
    ///
    /// Fails with [`InsightError::Schema`] when the table has no columns or
    /// no rows.
    #[instrument(skip_all, fields(columns = table.column_count(), rows = table.row_count()))]
    pub fn infer(&self, table: &RawTable) -> Result<Vec<ColumnProfile>> {
        if table.column_count() == 0 {
            return Err(InsightError::schema("table has no columns"));
        }
        if table.row_count() == 0 {
            return Err(InsightError::schema("table has no rows"));
        }

        let profiles: Vec<ColumnProfile> = table
            .columns()
            .iter()
            .enumerate()
            .map(|(idx, name)| {
                let stats = self.analyze_values(table.column_values(idx));
                let profile = self.determine_kind(name, &stats);
                log_column!(
                    self.log,
                    column = %truncate_field(name, self.log.max_field_length),
                    kind = %profile.kind,
                    missing = profile.missing_count,
                    distinct = profile.distinct_count,
                    parse_ratio = profile.parse_ratio,
                    "Classified column"
                );
                profile
            })
            .collect();

        info!(
            temporal = count_kind(&profiles, ColumnKind::Temporal),
            numeric = count_kind(&profiles, ColumnKind::Numeric),
            categorical = count_kind(&profiles, ColumnKind::Categorical),
            identifier = count_kind(&profiles, ColumnKind::Identifier),
            "Completed schema inference"
        );

        Ok(profiles)
    }

    /// Gathers match statistics for one column's values.
    pub fn analyze_values<'a>(&self, values: impl Iterator<Item = &'a CellValue>) -> ColumnStats {
        let mut stats = ColumnStats::default();
        for value in values {
            stats.total += 1;
            let Some(normalized) = value.normalized() else {
                stats.missing += 1;
                continue;
            };

            match value {
                CellValue::Number(_) => stats.numeric_matches += 1,
                _ => {
                    if parse_timestamp(&normalized).is_some() {
                        stats.temporal_matches += 1;
                    }
                    if parse_number(&normalized).is_some() {
                        stats.numeric_matches += 1;
                    }
                }
            }
            stats.distinct.insert(normalized);
        }
        stats
    }

    /// Picks the kind for a column from its statistics.
    pub fn determine_kind(&self, name: &str, stats: &ColumnStats) -> ColumnProfile {
        let non_missing = stats.non_missing();
        let distinct_count = stats.distinct.len();

        let (kind, parse_ratio) = if non_missing == 0 {
            (ColumnKind::Categorical, 0.0)
        } else {
            let temporal_ratio = stats.temporal_matches as f64 / non_missing as f64;
            let numeric_ratio = stats.numeric_matches as f64 / non_missing as f64;
            let unique_ratio = distinct_count as f64 / stats.total as f64;

            if temporal_ratio >= self.config.temporal_threshold {
                (ColumnKind::Temporal, temporal_ratio)
            } else if numeric_ratio >= self.config.numeric_threshold {
                (ColumnKind::Numeric, numeric_ratio)
            } else if stats.total > 1 && unique_ratio >= self.config.identifier_ratio {
                (ColumnKind::Identifier, 0.0)
            } else {
                (ColumnKind::Categorical, 0.0)
            }
        };

        ColumnProfile {
            name: name.to_string(),
            kind,
            missing_count: stats.missing,
            distinct_count,
            parse_ratio,
        }
    }
}

impl Default for SchemaInferencer {
    fn default() -> Self {
        Self::new()
    }
}

fn count_kind(profiles: &[ColumnProfile], kind: ColumnKind) -> usize {
    profiles.iter().filter(|p| p.kind == kind).count()
}

#[cfg(test)]
mod tests {
    use chrono::Timelike;

    use super::*;

    fn column(values: &[&str]) -> Vec<CellValue> {
        values.iter().map(|v| CellValue::from(*v)).collect()
    }

    #[test]
    fn test_inferencer_builder() {
        let inferencer = SchemaInferencer::builder()
            .temporal_threshold(0.9)
            .numeric_threshold(0.75)
            .identifier_ratio(0.99)
            .build();

        assert_eq!(inferencer.config.temporal_threshold, 0.9);
        assert_eq!(inferencer.config.numeric_threshold, 0.75);
        assert_eq!(inferencer.config.identifier_ratio, 0.99);
    }

    #[test]
    fn test_parse_timestamp_formats() {
        let iso = parse_timestamp("2023-12-25").unwrap();
        assert_eq!(iso.date(), NaiveDate::from_ymd_opt(2023, 12, 25).unwrap());
        assert_eq!(iso.hour(), 0);

        let with_time = parse_timestamp("2023-12-25 10:30:00").unwrap();
        assert_eq!(with_time.hour(), 10);
        assert_eq!(with_time.minute(), 30);

        assert!(parse_timestamp("2023-12-25T10:30:00").is_some());
        assert!(parse_timestamp("2023-12-25T10:30:00.250").is_some());
        assert!(parse_timestamp("2023-12-25 10:30").is_some());
        assert!(parse_timestamp("2023/12/25").is_some());
        assert!(parse_timestamp("25.12.2023").is_some());
        assert!(parse_timestamp("25-12-2023").is_some());

        let rfc = parse_timestamp("2023-12-25T10:30:00+02:00").unwrap();
        assert_eq!(rfc.hour(), 8);
    }

    #[test]
    fn test_parse_timestamp_slash_dates() {
        let us = parse_timestamp("12/25/2023").unwrap();
        assert_eq!(us.date(), NaiveDate::from_ymd_opt(2023, 12, 25).unwrap());

        // First field cannot be a month, so it is read day-first
        let eu = parse_timestamp("25/12/2023").unwrap();
        assert_eq!(eu.date(), NaiveDate::from_ymd_opt(2023, 12, 25).unwrap());
    }

    #[test]
    fn test_parse_timestamp_rejects_non_dates() {
        assert!(parse_timestamp("hello").is_none());
        assert!(parse_timestamp("2024").is_none());
        assert!(parse_timestamp("12.5").is_none());
        assert!(parse_timestamp("2023-13-45").is_none());
        assert!(parse_timestamp("").is_none());
    }

    #[test]
    fn test_parse_timestamp_requires_four_digit_year() {
        assert!(parse_timestamp("2.1.3").is_none());
        assert!(parse_timestamp("01-02-03").is_none());
        assert!(parse_timestamp("12/25/23").is_none());
        assert!(parse_timestamp("1.10.2").is_none());
        assert!(parse_timestamp("2023-1-5").is_some());
        assert!(parse_timestamp("5.1.2023").is_some());
    }

    #[test]
    fn test_version_strings_are_not_temporal() {
        let inferencer = SchemaInferencer::new();
        let versions: Vec<String> = (0..20)
            .map(|i| format!("{}.{}.{}", 1 + i % 3, i % 5, i % 4))
            .collect();
        let refs: Vec<&str> = versions.iter().map(String::as_str).collect();
        let stats = inferencer.analyze_values(column(&refs).iter());

        assert_eq!(stats.temporal_matches, 0);
        assert_eq!(
            inferencer.determine_kind("app_version", &stats).kind,
            ColumnKind::Categorical
        );
    }

    #[test]
    fn test_parse_number() {
        assert_eq!(parse_number("42"), Some(42.0));
        assert_eq!(parse_number(" -3.5 "), Some(-3.5));
        assert_eq!(parse_number("1e3"), Some(1000.0));
        assert_eq!(parse_number(".5"), Some(0.5));
        assert_eq!(parse_number("NaN"), None);
        assert_eq!(parse_number("inf"), None);
        assert_eq!(parse_number("1,000"), None);
        assert_eq!(parse_number("abc"), None);
    }

    #[test]
    fn test_analyze_values_with_missing() {
        let inferencer = SchemaInferencer::new();
        let values = column(&["123", "", "456", "  ", "789"]);
        let stats = inferencer.analyze_values(values.iter());

        assert_eq!(stats.total, 5);
        assert_eq!(stats.missing, 2);
        assert_eq!(stats.numeric_matches, 3);
        assert_eq!(stats.temporal_matches, 0);
        assert_eq!(stats.distinct.len(), 3);
    }

    #[test]
    fn test_number_cells_count_as_numeric() {
        let inferencer = SchemaInferencer::new();
        let values = vec![
            CellValue::Number(1.0),
            CellValue::Number(2.0),
            CellValue::Number(f64::NAN),
        ];
        let stats = inferencer.analyze_values(values.iter());
        assert_eq!(stats.numeric_matches, 2);
        assert_eq!(stats.missing, 1);
    }

    #[test]
    fn test_dates_are_temporal_not_numeric() {
        let inferencer = SchemaInferencer::new();
        let values = column(&["2024-01-01", "2024-01-02", "2024-01-03"]);
        let stats = inferencer.analyze_values(values.iter());
        let profile = inferencer.determine_kind("day", &stats);
        assert_eq!(profile.kind, ColumnKind::Temporal);
        assert_eq!(profile.parse_ratio, 1.0);
    }

    #[test]
    fn test_threshold_tolerates_some_bad_values() {
        let inferencer = SchemaInferencer::new();
        // 8 of 10 parse: exactly at the 0.8 threshold
        let values = column(&["1", "2", "3", "4", "5", "6", "7", "8", "n/a", "?"]);
        let stats = inferencer.analyze_values(values.iter());
        assert_eq!(
            inferencer.determine_kind("x", &stats).kind,
            ColumnKind::Numeric
        );

        // 7 of 10 do not
        let values = column(&["1", "2", "3", "4", "5", "6", "7", "n/a", "?", "-"]);
        let stats = inferencer.analyze_values(values.iter());
        assert_ne!(
            inferencer.determine_kind("x", &stats).kind,
            ColumnKind::Numeric
        );
    }

    #[test]
    fn test_identifier_vs_categorical() {
        let inferencer = SchemaInferencer::new();

        let ids: Vec<String> = (0..20).map(|i| format!("TX-{i:04}")).collect();
        let id_refs: Vec<&str> = ids.iter().map(String::as_str).collect();
        let stats = inferencer.analyze_values(column(&id_refs).iter());
        assert_eq!(
            inferencer.determine_kind("txn", &stats).kind,
            ColumnKind::Identifier
        );

        let regions = column(&["north", "south", "north", "east", "south", "north"]);
        let stats = inferencer.analyze_values(regions.iter());
        let profile = inferencer.determine_kind("region", &stats);
        assert_eq!(profile.kind, ColumnKind::Categorical);
        assert_eq!(profile.distinct_count, 3);
    }

    #[test]
    fn test_numeric_ids_stay_numeric() {
        let inferencer = SchemaInferencer::new();
        let values = column(&["1", "2", "3", "4", "5"]);
        let stats = inferencer.analyze_values(values.iter());
        assert_eq!(
            inferencer.determine_kind("id", &stats).kind,
            ColumnKind::Numeric
        );
    }

    #[test]
    fn test_empty_column_is_categorical() {
        let inferencer = SchemaInferencer::new();
        let values = column(&["", "", ""]);
        let stats = inferencer.analyze_values(values.iter());
        let profile = inferencer.determine_kind("notes", &stats);

        assert_eq!(profile.kind, ColumnKind::Categorical);
        assert_eq!(profile.missing_count, 3);
        assert_eq!(profile.distinct_count, 0);
        assert_eq!(profile.parse_ratio, 0.0);
    }

    #[test]
    fn test_infer_rejects_empty_shapes() {
        let inferencer = SchemaInferencer::new();

        let no_rows = RawTable::builder(["a"]).build().unwrap();
        assert!(matches!(
            inferencer.infer(&no_rows),
            Err(InsightError::Schema(_))
        ));

        let no_columns = RawTable::new(vec![], vec![]).unwrap();
        assert!(matches!(
            inferencer.infer(&no_columns),
            Err(InsightError::Schema(_))
        ));
    }

    #[test]
    fn test_infer_preserves_column_order() {
        let table = RawTable::builder(["b", "a"])
            .row(["x", "1"])
            .row(["y", "2"])
            .build()
            .unwrap();
        let profiles = SchemaInferencer::new().infer(&table).unwrap();
        assert_eq!(profiles[0].name, "b");
        assert_eq!(profiles[1].name, "a");
    }

    #[test]
    fn test_column_kind_serializes_lowercase() {
        let json = serde_json::to_string(&ColumnKind::Temporal).unwrap();
        assert_eq!(json, "\"temporal\"");
        assert!(ColumnKind::Numeric.is_scorable());
        assert!(!ColumnKind::Identifier.is_scorable());
    }
}
