//! Feature matrix construction.
//!
//! Numeric columns contribute their value; temporal columns are expanded into
//! calendar features. Every feature is min-max scaled into `[0, 1]` so that no
//! single unit dominates the isolation forest's split choices.

use chrono::{Datelike, NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::analyzers::cleaning::{Cell, CleanedTable};
use crate::analyzers::inference::ColumnKind;
use crate::error::{InsightError, Result};
use crate::log_stage;
use crate::logging::LogConfig;

/// How a feature was derived from its source column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Derivation {
    /// The numeric value itself
    Value,
    /// Monday = 0 ... Sunday = 6
    DayOfWeek,
    HourOfDay,
    /// Seconds since the column's earliest timestamp
    ElapsedSeconds,
}

impl Derivation {
    fn suffix(&self) -> Option<&'static str> {
        match self {
            Derivation::Value => None,
            Derivation::DayOfWeek => Some("day_of_week"),
            Derivation::HourOfDay => Some("hour_of_day"),
            Derivation::ElapsedSeconds => Some("elapsed_seconds"),
        }
    }

    /// Feature name for a column under this derivation.
    pub fn feature_name(&self, column: &str) -> String {
        match self.suffix() {
            Some(suffix) => format!("{column}:{suffix}"),
            None => column.to_string(),
        }
    }
}

/// Metadata for one feature of the matrix.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureColumn {
    pub name: String,
    pub source_column: String,
    pub derivation: Derivation,
    /// Unscaled minimum seen in this dataset
    pub observed_min: f64,
    /// Unscaled maximum seen in this dataset
    pub observed_max: f64,
}

impl FeatureColumn {
    /// True when every row had the same unscaled value.
    pub fn is_constant(&self) -> bool {
        self.observed_max <= self.observed_min
    }
}

/// Scaled feature vectors, one per cleaned row and in the same order.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureMatrix {
    columns: Vec<FeatureColumn>,
    rows: Vec<Vec<f64>>,
}

impl FeatureMatrix {
    /// Creates a matrix from already-scaled rows.
    ///
    /// Every row must have one value per column, each within `[0, 1]`.
    pub fn new(columns: Vec<FeatureColumn>, rows: Vec<Vec<f64>>) -> Result<Self> {
        for (idx, row) in rows.iter().enumerate() {
            if row.len() != columns.len() {
                return Err(InsightError::internal(format!(
                    "feature row {idx} has {} values, expected {}",
                    row.len(),
                    columns.len()
                )));
            }
            if let Some(v) = row.iter().find(|v| !(0.0..=1.0).contains(*v)) {
                return Err(InsightError::internal(format!(
                    "feature row {idx} holds unscaled value {v}"
                )));
            }
        }
        Ok(Self { columns, rows })
    }

    pub fn columns(&self) -> &[FeatureColumn] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<f64>] {
        &self.rows
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn feature_count(&self) -> usize {
        self.columns.len()
    }

    pub fn feature_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }

    /// Iterates the values of one feature.
    pub fn feature_values(&self, index: usize) -> impl Iterator<Item = f64> + '_ {
        self.rows.iter().map(move |row| row[index])
    }
}

/// Builds feature matrices from cleaned tables.
#[derive(Debug, Clone, Default)]
pub struct FeatureBuilder {
    log: LogConfig,
}

impl FeatureBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the logging configuration.
    pub fn with_log_config(mut self, log: LogConfig) -> Self {
        self.log = log;
        self
    }

    /// Derives and scales the features of `table`.
    ///
    /// Fails with [`InsightError::NoFeatures`] when no numeric or temporal
    /// column survived cleaning.
    #[instrument(skip_all, fields(rows = table.row_count()))]
    pub fn build(&self, table: &CleanedTable) -> Result<FeatureMatrix> {
        let mut raw_features: Vec<(String, Derivation, Vec<f64>)> = Vec::new();

        for (idx, column) in table.columns().iter().enumerate() {
            if column.excluded {
                continue;
            }
            match column.kind {
                ColumnKind::Numeric => {
                    let values = table
                        .column_values(idx)
                        .map(|cell| {
                            cell.as_number()
                                .ok_or_else(|| unexpected_cell(&column.name, cell))
                        })
                        .collect::<Result<Vec<_>>>()?;
                    raw_features.push((column.name.clone(), Derivation::Value, values));
                }
                ColumnKind::Temporal => {
                    let timestamps = table
                        .column_values(idx)
                        .map(|cell| {
                            cell.as_timestamp()
                                .ok_or_else(|| unexpected_cell(&column.name, cell))
                        })
                        .collect::<Result<Vec<_>>>()?;
                    for (derivation, values) in temporal_features(&timestamps) {
                        raw_features.push((column.name.clone(), derivation, values));
                    }
                }
                ColumnKind::Categorical | ColumnKind::Identifier => {}
            }
        }

        if raw_features.is_empty() {
            return Err(InsightError::NoFeatures);
        }

        let mut columns = Vec::with_capacity(raw_features.len());
        let mut rows = vec![Vec::with_capacity(raw_features.len()); table.row_count()];
        for (source, derivation, values) in raw_features {
            let (min, max) = min_max(&values);
            for (row, value) in rows.iter_mut().zip(&values) {
                row.push(scale(*value, min, max));
            }
            columns.push(FeatureColumn {
                name: derivation.feature_name(&source),
                source_column: source,
                derivation,
                observed_min: min,
                observed_max: max,
            });
        }

        log_stage!(
            self.log,
            features = columns.len(),
            rows = rows.len(),
            "Built feature matrix"
        );

        FeatureMatrix::new(columns, rows)
    }
}

fn unexpected_cell(column: &str, cell: &Cell) -> InsightError {
    InsightError::internal(format!("column '{column}' holds {cell:?} after cleaning"))
}

/// Calendar features for one temporal column. The hour feature is only
/// produced when some value carries a time of day.
fn temporal_features(timestamps: &[NaiveDateTime]) -> Vec<(Derivation, Vec<f64>)> {
    let mut features = vec![(
        Derivation::DayOfWeek,
        timestamps
            .iter()
            .map(|ts| ts.weekday().num_days_from_monday() as f64)
            .collect(),
    )];

    if timestamps.iter().any(|ts| ts.time() != chrono::NaiveTime::MIN) {
        features.push((
            Derivation::HourOfDay,
            timestamps.iter().map(|ts| ts.hour() as f64).collect(),
        ));
    }

    let earliest = timestamps.iter().min().copied().unwrap_or_default();
    features.push((
        Derivation::ElapsedSeconds,
        timestamps
            .iter()
            .map(|ts| (*ts - earliest).num_milliseconds() as f64 / 1000.0)
            .collect(),
    ));

    features
}

fn min_max(values: &[f64]) -> (f64, f64) {
    if values.is_empty() {
        return (0.0, 0.0);
    }
    values
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
            (lo.min(*v), hi.max(*v))
        })
}

fn scale(value: f64, min: f64, max: f64) -> f64 {
    if max > min {
        ((value - min) / (max - min)).clamp(0.0, 1.0)
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzers::cleaning::Cleaner;
    use crate::analyzers::inference::SchemaInferencer;
    use crate::table::RawTable;

    fn matrix_for(table: &RawTable) -> Result<FeatureMatrix> {
        let profiles = SchemaInferencer::new().infer(table)?;
        let cleaned = Cleaner::default().clean(table, &profiles)?;
        FeatureBuilder::new().build(&cleaned)
    }

    #[test]
    fn test_numeric_feature_scaled_to_unit_range() {
        let table = RawTable::builder(["amount", "region"])
            .row(["10", "north"])
            .row(["20", "south"])
            .row(["30", "north"])
            .build()
            .unwrap();
        let matrix = matrix_for(&table).unwrap();

        assert_eq!(matrix.feature_names(), vec!["amount".to_string()]);
        let values: Vec<f64> = matrix.feature_values(0).collect();
        assert_eq!(values, vec![0.0, 0.5, 1.0]);
        assert_eq!(matrix.columns()[0].observed_min, 10.0);
        assert_eq!(matrix.columns()[0].observed_max, 30.0);
        assert_eq!(matrix.columns()[0].derivation, Derivation::Value);
    }

    #[test]
    fn test_constant_feature_scales_to_zero() {
        let table = RawTable::builder(["amount", "n"])
            .row(["5", "1"])
            .row(["5", "2"])
            .build()
            .unwrap();
        let matrix = matrix_for(&table).unwrap();
        assert!(matrix.columns()[0].is_constant());
        assert!(matrix.feature_values(0).all(|v| v == 0.0));
    }

    #[test]
    fn test_date_column_expands_without_hour() {
        // 2024-03-04 is a Monday
        let table = RawTable::builder(["day"])
            .row(["2024-03-04"])
            .row(["2024-03-06"])
            .row(["2024-03-10"])
            .build()
            .unwrap();
        let matrix = matrix_for(&table).unwrap();

        assert_eq!(
            matrix.feature_names(),
            vec!["day:day_of_week".to_string(), "day:elapsed_seconds".to_string()]
        );
        assert_eq!(matrix.columns()[0].observed_min, 0.0);
        assert_eq!(matrix.columns()[0].observed_max, 6.0);
        assert_eq!(matrix.columns()[1].observed_max, 6.0 * 86_400.0);
    }

    #[test]
    fn test_timestamp_column_gets_hour_feature() {
        let table = RawTable::builder(["at", "amount"])
            .row(["2024-03-04 08:00:00", "1"])
            .row(["2024-03-04 17:30:00", "2"])
            .build()
            .unwrap();
        let matrix = matrix_for(&table).unwrap();

        assert_eq!(
            matrix.feature_names(),
            vec![
                "at:day_of_week".to_string(),
                "at:hour_of_day".to_string(),
                "at:elapsed_seconds".to_string(),
                "amount".to_string(),
            ]
        );
        assert_eq!(matrix.columns()[1].observed_min, 8.0);
        assert_eq!(matrix.columns()[1].observed_max, 17.0);
        assert_eq!(matrix.columns()[1].source_column, "at");
    }

    #[test]
    fn test_only_categorical_columns_is_no_features() {
        let table = RawTable::builder(["region", "segment"])
            .row(["north", "a"])
            .row(["north", "b"])
            .row(["south", "a"])
            .build()
            .unwrap();
        assert_eq!(matrix_for(&table).unwrap_err(), InsightError::NoFeatures);
    }

    #[test]
    fn test_all_values_within_unit_range() {
        let table = RawTable::builder(["a", "b"])
            .row(["-1e6", "0.001"])
            .row(["3.5", "0.002"])
            .row(["1e9", "-7"])
            .build()
            .unwrap();
        let matrix = matrix_for(&table).unwrap();
        assert_eq!(matrix.row_count(), 3);
        assert!(matrix
            .rows()
            .iter()
            .flatten()
            .all(|v| (0.0..=1.0).contains(v)));
    }

    #[test]
    fn test_matrix_rejects_unscaled_rows() {
        let column = FeatureColumn {
            name: "x".to_string(),
            source_column: "x".to_string(),
            derivation: Derivation::Value,
            observed_min: 0.0,
            observed_max: 1.0,
        };
        assert!(FeatureMatrix::new(vec![column.clone()], vec![vec![1.5]]).is_err());
        assert!(FeatureMatrix::new(vec![column], vec![vec![0.5, 0.5]]).is_err());
    }
}
