//! Row and cell cleaning.
//!
//! The cleaner turns a [`RawTable`] plus its inferred [`ColumnProfile`]s into a
//! [`CleanedTable`] of typed [`Cell`]s:
//!
//! 1. rows whose every cell is missing are dropped;
//! 2. exact duplicates (identical trimmed values across all columns) are
//!    dropped, keeping the first occurrence;
//! 3. cells are converted to their column's kind and missing values imputed:
//!    numeric columns take the median, temporal columns the mode, categorical
//!    columns the unknown token, identifiers stay as they are;
//! 4. a second duplicate pass collapses rows that imputation made identical.
//!
//! A numeric or temporal column with nothing to impute from is excluded and
//! reported as a [`ColumnWarning`]; the run carries on without it.

use std::collections::{BTreeMap, HashSet};

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use tracing::{instrument, warn};

use crate::analyzers::inference::{parse_number, parse_timestamp, ColumnKind, ColumnProfile};
use crate::config::PipelineConfig;
use crate::error::{InsightError, Result};
use crate::insight::ColumnWarning;
use crate::log_stage;
use crate::logging::LogConfig;
use crate::table::{format_number, CellValue, RawTable};

/// Layout used when timestamps are rendered back to text.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";

/// A typed cell of a cleaned table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Cell {
    Number(f64),
    Timestamp(NaiveDateTime),
    Text(String),
    Missing,
}

impl Cell {
    pub fn is_missing(&self) -> bool {
        matches!(self, Cell::Missing)
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Cell::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_timestamp(&self) -> Option<NaiveDateTime> {
        match self {
            Cell::Timestamp(ts) => Some(*ts),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Cell::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Canonical text form; `None` for missing cells.
    pub fn render(&self) -> Option<String> {
        match self {
            Cell::Number(n) => Some(format_number(*n)),
            Cell::Timestamp(ts) => Some(ts.format(TIMESTAMP_FORMAT).to_string()),
            Cell::Text(s) => Some(s.clone()),
            Cell::Missing => None,
        }
    }
}

/// Per-column metadata of a cleaned table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CleanedColumn {
    pub name: String,
    pub kind: ColumnKind,
    /// Set when the column could not be cleaned and must not be scored
    pub excluded: bool,
}

/// What the cleaner did to the table.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CleaningReport {
    pub input_rows: usize,
    pub empty_rows_removed: usize,
    pub duplicates_removed: usize,
    /// Number of imputed cells per column, for columns that needed any
    pub imputed_cells: BTreeMap<String, usize>,
    pub excluded_columns: Vec<String>,
}

impl CleaningReport {
    /// Rows remaining after cleaning.
    pub fn output_rows(&self) -> usize {
        self.input_rows - self.empty_rows_removed - self.duplicates_removed
    }

    pub fn total_imputed(&self) -> usize {
        self.imputed_cells.values().sum()
    }
}

/// Typed, deduplicated, imputed rows.
#[derive(Debug, Clone, PartialEq)]
pub struct CleanedTable {
    columns: Vec<CleanedColumn>,
    rows: Vec<Vec<Cell>>,
    report: CleaningReport,
    warnings: Vec<ColumnWarning>,
}

impl CleanedTable {
    pub fn columns(&self) -> &[CleanedColumn] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<Cell>] {
        &self.rows
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn report(&self) -> &CleaningReport {
        &self.report
    }

    pub fn warnings(&self) -> &[ColumnWarning] {
        &self.warnings
    }

    /// Iterates the cells of one column.
    pub fn column_values(&self, index: usize) -> impl Iterator<Item = &Cell> + '_ {
        self.rows.iter().map(move |row| &row[index])
    }

    /// Renders the cleaned rows back into a raw table so cleaning can be
    /// applied again.
    pub fn to_raw_table(&self) -> Result<RawTable> {
        let columns = self.columns.iter().map(|c| c.name.clone()).collect();
        let rows = self
            .rows
            .iter()
            .map(|row| {
                row.iter()
                    .map(|cell| CellValue::from_text(cell.render().as_deref()))
                    .collect()
            })
            .collect();
        RawTable::new(columns, rows)
    }
}

/// Cleans raw tables according to their inferred profiles.
#[derive(Debug, Clone)]
pub struct Cleaner {
    unknown_token: String,
    log: LogConfig,
}

impl Cleaner {
    /// Creates a cleaner that fills missing categorical values with `unknown_token`.
    pub fn new(unknown_token: impl Into<String>) -> Self {
        Self {
            unknown_token: unknown_token.into(),
            log: LogConfig::default(),
        }
    }

    /// Creates a cleaner from the pipeline configuration.
    pub fn from_config(config: &PipelineConfig) -> Self {
        Self::new(config.unknown_token.clone())
    }

    /// Sets the logging configuration.
    pub fn with_log_config(mut self, log: LogConfig) -> Self {
        self.log = log;
        self
    }

    /// Cleans `table` using `profiles`, which must describe the table's
    /// columns by name and in order.
    #[instrument(skip_all, fields(rows = table.row_count()))]
    pub fn clean(&self, table: &RawTable, profiles: &[ColumnProfile]) -> Result<CleanedTable> {
        check_profiles(table, profiles)?;

        let mut report = CleaningReport {
            input_rows: table.row_count(),
            ..Default::default()
        };

        // Empty rows, then exact raw duplicates
        let mut seen = HashSet::new();
        let mut kept: Vec<&[CellValue]> = Vec::with_capacity(table.row_count());
        for row in table.rows() {
            if row.iter().all(CellValue::is_missing) {
                report.empty_rows_removed += 1;
                continue;
            }
            let key: Vec<Option<String>> = row.iter().map(CellValue::normalized).collect();
            if seen.insert(key) {
                kept.push(row);
            } else {
                report.duplicates_removed += 1;
            }
        }

        let mut typed: Vec<Vec<Cell>> = kept
            .iter()
            .map(|row| {
                row.iter()
                    .zip(profiles)
                    .map(|(value, profile)| to_cell(value, profile.kind))
                    .collect()
            })
            .collect();

        let fallback_timestamp = earliest_timestamp(&typed);
        let mut columns = Vec::with_capacity(profiles.len());
        let mut warnings = Vec::new();

        for (idx, profile) in profiles.iter().enumerate() {
            let fill = match profile.kind {
                ColumnKind::Numeric => {
                    median(typed.iter().filter_map(|row| row[idx].as_number())).map(Cell::Number)
                }
                ColumnKind::Temporal => {
                    mode_timestamp(typed.iter().filter_map(|row| row[idx].as_timestamp()))
                        .or(fallback_timestamp)
                        .map(Cell::Timestamp)
                }
                ColumnKind::Categorical => Some(Cell::Text(self.unknown_token.clone())),
                ColumnKind::Identifier => None,
            };

            let missing = typed.iter().filter(|row| row[idx].is_missing()).count();
            let excluded = profile.kind.is_scorable() && fill.is_none() && !typed.is_empty();

            if excluded {
                let error = InsightError::cleaning(
                    &profile.name,
                    format!("no parseable {} values to impute from", profile.kind),
                );
                warn!(column = %profile.name, kind = %profile.kind, "Excluding column: {error}");
                warnings.extend(ColumnWarning::from_error(&error));
                report.excluded_columns.push(profile.name.clone());
                for (row, raw) in typed.iter_mut().zip(&kept) {
                    row[idx] = raw[idx]
                        .normalized()
                        .map(Cell::Text)
                        .unwrap_or(Cell::Missing);
                }
            } else if let Some(fill) = fill.filter(|_| missing > 0) {
                for row in typed.iter_mut().filter(|row| row[idx].is_missing()) {
                    row[idx] = fill.clone();
                }
                report.imputed_cells.insert(profile.name.clone(), missing);
            }

            columns.push(CleanedColumn {
                name: profile.name.clone(),
                kind: profile.kind,
                excluded,
            });
        }

        // Imputation can make previously distinct rows identical
        let mut seen = HashSet::new();
        let before = typed.len();
        typed.retain(|row| seen.insert(row.iter().map(Cell::render).collect::<Vec<_>>()));
        report.duplicates_removed += before - typed.len();

        log_stage!(
            self.log,
            input_rows = report.input_rows,
            empty_rows_removed = report.empty_rows_removed,
            duplicates_removed = report.duplicates_removed,
            imputed = report.total_imputed(),
            excluded = report.excluded_columns.len(),
            "Completed cleaning"
        );

        Ok(CleanedTable {
            columns,
            rows: typed,
            report,
            warnings,
        })
    }
}

impl Default for Cleaner {
    fn default() -> Self {
        Self::new("unknown")
    }
}

fn check_profiles(table: &RawTable, profiles: &[ColumnProfile]) -> Result<()> {
    if profiles.len() != table.column_count() {
        return Err(InsightError::schema(format!(
            "{} column profiles supplied for {} columns",
            profiles.len(),
            table.column_count()
        )));
    }
    for (name, profile) in table.columns().iter().zip(profiles) {
        if *name != profile.name {
            return Err(InsightError::schema(format!(
                "profile '{}' does not match column '{name}'",
                profile.name
            )));
        }
    }
    Ok(())
}

fn to_cell(value: &CellValue, kind: ColumnKind) -> Cell {
    let Some(text) = value.normalized() else {
        return Cell::Missing;
    };
    match kind {
        ColumnKind::Numeric => match value {
            CellValue::Number(n) => Cell::Number(*n),
            _ => parse_number(&text).map_or(Cell::Missing, Cell::Number),
        },
        ColumnKind::Temporal => parse_timestamp(&text).map_or(Cell::Missing, Cell::Timestamp),
        ColumnKind::Categorical | ColumnKind::Identifier => Cell::Text(text),
    }
}

/// Median of the values, or `None` when there are none.
pub fn median(values: impl Iterator<Item = f64>) -> Option<f64> {
    let mut values: Vec<f64> = values.collect();
    if values.is_empty() {
        return None;
    }
    values.sort_by(f64::total_cmp);
    let mid = values.len() / 2;
    if values.len() % 2 == 0 {
        Some((values[mid - 1] + values[mid]) / 2.0)
    } else {
        Some(values[mid])
    }
}

/// Most frequent timestamp; ties go to the earliest.
pub fn mode_timestamp(values: impl Iterator<Item = NaiveDateTime>) -> Option<NaiveDateTime> {
    let mut counts: BTreeMap<NaiveDateTime, usize> = BTreeMap::new();
    for ts in values {
        *counts.entry(ts).or_default() += 1;
    }
    let mut best: Option<(NaiveDateTime, usize)> = None;
    for (ts, count) in counts {
        match best {
            Some((_, best_count)) if count <= best_count => {}
            _ => best = Some((ts, count)),
        }
    }
    best.map(|(ts, _)| ts)
}

fn earliest_timestamp(rows: &[Vec<Cell>]) -> Option<NaiveDateTime> {
    rows.iter()
        .flat_map(|row| row.iter().filter_map(Cell::as_timestamp))
        .min()
}
