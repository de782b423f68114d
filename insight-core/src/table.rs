//! Raw tabular input.
//!
//! A [`RawTable`] is the pipeline's view of an upload before anything has
//! been inferred: named columns and rows of loosely typed [`CellValue`]s.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::error::{InsightError, Result};

/// A single raw value as read from the upload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CellValue {
    /// Text as it appeared in the source.
    Text(String),
    /// A value the source already carried as a number.
    Number(f64),
    /// Empty or absent.
    Missing,
}

impl CellValue {
    /// Builds a cell from optional text; `None` and blank strings become `Missing`.
    pub fn from_text(value: Option<&str>) -> Self {
        match value {
            Some(s) if !s.trim().is_empty() => CellValue::Text(s.to_string()),
            _ => CellValue::Missing,
        }
    }

    /// Returns true if the cell holds no usable value.
    pub fn is_missing(&self) -> bool {
        match self {
            CellValue::Missing => true,
            CellValue::Text(s) => s.trim().is_empty(),
            CellValue::Number(n) => !n.is_finite(),
        }
    }

    /// Canonical text form used for comparisons: trimmed text, or the
    /// shortest round-tripping rendering of a number. `None` when missing.
    pub fn normalized(&self) -> Option<String> {
        if self.is_missing() {
            return None;
        }
        match self {
            CellValue::Text(s) => Some(s.trim().to_string()),
            CellValue::Number(n) => Some(format_number(*n)),
            CellValue::Missing => None,
        }
    }
}

impl From<&str> for CellValue {
    fn from(value: &str) -> Self {
        CellValue::from_text(Some(value))
    }
}

impl From<String> for CellValue {
    fn from(value: String) -> Self {
        CellValue::from_text(Some(&value))
    }
}

impl From<f64> for CellValue {
    fn from(value: f64) -> Self {
        CellValue::Number(value)
    }
}

/// Renders a number so that parsing the text yields the same value.
pub fn format_number(value: f64) -> String {
    if value == value.trunc() && value.abs() < 1e15 {
        format!("{value:.0}")
    } else {
        format!("{value}")
    }
}

/// An immutable table of raw records sharing one column set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawTable {
    columns: Vec<String>,
    rows: Vec<Vec<CellValue>>,
}

impl RawTable {
    /// Creates a table, checking that column names are unique and non-blank
    /// and that every row has one value per column.
    pub fn new(columns: Vec<String>, rows: Vec<Vec<CellValue>>) -> Result<Self> {
        let mut seen = HashSet::new();
        for name in &columns {
            if name.trim().is_empty() {
                return Err(InsightError::schema("column names must not be blank"));
            }
            if !seen.insert(name.as_str()) {
                return Err(InsightError::schema(format!(
                    "duplicate column name '{name}'"
                )));
            }
        }
        for (idx, row) in rows.iter().enumerate() {
            if row.len() != columns.len() {
                return Err(InsightError::schema(format!(
                    "row {} has {} values, expected {}",
                    idx + 1,
                    row.len(),
                    columns.len()
                )));
            }
        }
        Ok(Self { columns, rows })
    }

    /// Starts a builder for assembling a table row by row.
    pub fn builder<I, S>(columns: I) -> RawTableBuilder
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        RawTableBuilder {
            columns: columns.into_iter().map(Into::into).collect(),
            rows: Vec::new(),
        }
    }

    /// Column names in table order.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// All rows in table order.
    pub fn rows(&self) -> &[Vec<CellValue>] {
        &self.rows
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Position of a column by name.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Iterates the values of one column.
    pub fn column_values(&self, index: usize) -> impl Iterator<Item = &CellValue> + '_ {
        self.rows.iter().map(move |row| &row[index])
    }
}

/// Row-by-row builder for [`RawTable`].
#[derive(Debug, Clone)]
pub struct RawTableBuilder {
    columns: Vec<String>,
    rows: Vec<Vec<CellValue>>,
}

impl RawTableBuilder {
    /// Appends a row of values.
    pub fn row<I, V>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<CellValue>,
    {
        self.rows.push(values.into_iter().map(Into::into).collect());
        self
    }

    /// Appends a row of values in place.
    pub fn push_row(&mut self, values: Vec<CellValue>) {
        self.rows.push(values);
    }

    /// Validates and builds the table.
    pub fn build(self) -> Result<RawTable> {
        RawTable::new(self.columns, self.rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_and_accessors() {
        let table = RawTable::builder(["id", "amount"])
            .row(["a", "1.5"])
            .row(["b", ""])
            .build()
            .unwrap();

        assert_eq!(table.column_count(), 2);
        assert_eq!(table.row_count(), 2);
        assert_eq!(table.column_index("amount"), Some(1));
        assert_eq!(table.column_index("nope"), None);

        let amounts: Vec<_> = table.column_values(1).cloned().collect();
        assert_eq!(
            amounts,
            vec![CellValue::Text("1.5".to_string()), CellValue::Missing]
        );
    }

    #[test]
    fn test_rejects_ragged_rows() {
        let err = RawTable::builder(["a", "b"])
            .row(["1", "2"])
            .row(["3"])
            .build()
            .unwrap_err();
        assert!(matches!(err, InsightError::Schema(msg) if msg.contains("row 2")));
    }

    #[test]
    fn test_rejects_duplicate_and_blank_columns() {
        assert!(RawTable::new(vec!["a".into(), "a".into()], vec![]).is_err());
        assert!(RawTable::new(vec!["a".into(), "  ".into()], vec![]).is_err());
    }

    #[test]
    fn test_missing_detection() {
        assert!(CellValue::Missing.is_missing());
        assert!(CellValue::Text("   ".to_string()).is_missing());
        assert!(CellValue::Number(f64::NAN).is_missing());
        assert!(!CellValue::Number(0.0).is_missing());
        assert!(!CellValue::Text("x".to_string()).is_missing());
    }

    #[test]
    fn test_normalized_forms() {
        assert_eq!(
            CellValue::Text("  north ".to_string()).normalized(),
            Some("north".to_string())
        );
        assert_eq!(CellValue::Number(3.0).normalized(), Some("3".to_string()));
        assert_eq!(CellValue::Number(2.5).normalized(), Some("2.5".to_string()));
        assert_eq!(CellValue::Missing.normalized(), None);
    }

    #[test]
    fn test_format_number_round_trips() {
        for value in [0.0, -4.0, 1.0 / 3.0, 1e20, 123456.789, -0.000_001] {
            let text = format_number(value);
            assert_eq!(text.parse::<f64>().unwrap(), value, "{text}");
        }
    }
}
