//! Delimited text source.

use std::io::{Cursor, Read};
use std::sync::Arc;

use arrow::csv::reader::Format;
use arrow::csv::ReaderBuilder;
use arrow::datatypes::{DataType, Field, Schema};
use tracing::{debug, instrument};

use super::batches::batch_rows;
use crate::error::{InsightError, Result};
use crate::table::RawTable;

/// Options for reading delimited text.
#[derive(Debug, Clone)]
pub struct CsvOptions {
    /// Field delimiter (default: ',')
    pub delimiter: u8,
    /// Quote character (default: '"')
    pub quote: u8,
    /// Rows decoded per Arrow batch (default: 8192)
    pub batch_size: usize,
}

impl Default for CsvOptions {
    fn default() -> Self {
        Self {
            delimiter: b',',
            quote: b'"',
            batch_size: 8192,
        }
    }
}

impl CsvOptions {
    /// Tab-separated values.
    pub fn tsv() -> Self {
        Self {
            delimiter: b'\t',
            ..Self::default()
        }
    }

    /// Sets the field delimiter.
    pub fn with_delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = delimiter;
        self
    }
}

/// Reads delimited text with a header row.
///
/// The whole input is buffered: one upload is one in-memory table.
pub fn read_csv<R: Read>(mut reader: R, options: &CsvOptions) -> Result<RawTable> {
    let mut buffer = Vec::new();
    reader
        .read_to_end(&mut buffer)
        .map_err(|e| InsightError::ingest(e.to_string()))?;
    read_csv_bytes(&buffer, options)
}

/// Reads delimited text held in a string.
///
/// ```rust
/// use insight_core::sources::{read_csv_str, CsvOptions};
///
/// let table = read_csv_str("id,amount\na,1\nb,2\n", &CsvOptions::default()).unwrap();
/// assert_eq!(table.columns(), &["id".to_string(), "amount".to_string()]);
/// assert_eq!(table.row_count(), 2);
/// ```
pub fn read_csv_str(text: &str, options: &CsvOptions) -> Result<RawTable> {
    read_csv_bytes(text.as_bytes(), options)
}

#[instrument(skip(bytes, options), fields(bytes = bytes.len()))]
fn read_csv_bytes(bytes: &[u8], options: &CsvOptions) -> Result<RawTable> {
    if bytes.iter().all(|b| b.is_ascii_whitespace()) {
        return Err(InsightError::schema("input is empty"));
    }

    let format = Format::default()
        .with_header(true)
        .with_delimiter(options.delimiter)
        .with_quote(options.quote);

    // Only the header names are taken from inference; every column is read as
    // text and typed later by the schema inferencer.
    let (inferred, _) = format.infer_schema(Cursor::new(bytes), Some(1))?;
    if inferred.fields().is_empty() {
        return Err(InsightError::schema("no header row found"));
    }
    let columns: Vec<String> = inferred
        .fields()
        .iter()
        .map(|f| f.name().trim().to_string())
        .collect();
    let text_schema = Schema::new(
        inferred
            .fields()
            .iter()
            .map(|f| Field::new(f.name(), DataType::Utf8, true))
            .collect::<Vec<_>>(),
    );

    let reader = ReaderBuilder::new(Arc::new(text_schema))
        .with_header(true)
        .with_delimiter(options.delimiter)
        .with_quote(options.quote)
        .with_batch_size(options.batch_size.max(1))
        .build(Cursor::new(bytes))?;

    let mut rows = Vec::new();
    for batch in reader {
        let batch = batch?;
        debug!(rows = batch.num_rows(), "Decoded CSV batch");
        rows.extend(batch_rows(batch.columns())?);
    }

    RawTable::new(columns, rows)
}
