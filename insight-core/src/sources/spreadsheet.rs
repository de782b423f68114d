//! Spreadsheet source (xlsx, xlsm, xlsb, xls, ods).

use std::io::{Cursor, Read};

use calamine::{open_workbook_auto_from_rs, Data, Reader};
use chrono::{NaiveDateTime, NaiveTime};
use tracing::{debug, instrument};

use crate::error::{InsightError, Result};
use crate::table::{CellValue, RawTable};

/// Reads the first sheet of a workbook. The first row holds the column names.
///
/// Numeric cells become [`CellValue::Number`], date cells their timestamp
/// text, empty and error cells [`CellValue::Missing`].
pub fn read_spreadsheet<R: Read>(mut reader: R) -> Result<RawTable> {
    let mut buffer = Vec::new();
    reader
        .read_to_end(&mut buffer)
        .map_err(|e| InsightError::ingest(e.to_string()))?;
    read_spreadsheet_bytes(buffer)
}

#[instrument(skip(bytes), fields(bytes = bytes.len()))]
fn read_spreadsheet_bytes(bytes: Vec<u8>) -> Result<RawTable> {
    if bytes.is_empty() {
        return Err(InsightError::schema("input is empty"));
    }

    let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes))
        .map_err(|e| InsightError::ingest(format!("not a readable workbook: {e}")))?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| InsightError::schema("workbook has no sheets"))?
        .map_err(|e| InsightError::ingest(e.to_string()))?;

    let mut rows = range.rows();
    let Some(header) = rows.next() else {
        return Err(InsightError::schema("no header row found"));
    };
    let columns: Vec<String> = header
        .iter()
        .map(|cell| cell.to_string().trim().to_string())
        .collect();

    let rows: Vec<Vec<CellValue>> = rows.map(|row| row.iter().map(cell_value).collect()).collect();
    debug!(columns = columns.len(), rows = rows.len(), "Decoded first sheet");

    RawTable::new(columns, rows)
}

fn cell_value(cell: &Data) -> CellValue {
    match cell {
        Data::Int(n) => CellValue::Number(*n as f64),
        Data::Float(n) => CellValue::Number(*n),
        Data::String(s) | Data::DateTimeIso(s) | Data::DurationIso(s) => {
            CellValue::from_text(Some(s))
        }
        Data::Bool(b) => CellValue::Text(b.to_string()),
        Data::DateTime(dt) => dt
            .as_datetime()
            .map_or(CellValue::Missing, |ts| CellValue::Text(timestamp_text(ts))),
        Data::Error(_) | Data::Empty => CellValue::Missing,
    }
}

fn timestamp_text(ts: NaiveDateTime) -> String {
    if ts.time() == NaiveTime::MIN {
        ts.format("%Y-%m-%d").to_string()
    } else {
        ts.format("%Y-%m-%d %H:%M:%S").to_string()
    }
}
