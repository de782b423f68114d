//! Arrow record batch source.

use arrow::array::{Array, ArrayRef, Float64Array};
use arrow::compute::cast;
use arrow::datatypes::DataType;
use arrow::record_batch::RecordBatch;
use arrow::util::display::array_value_to_string;

use crate::error::{InsightError, Result};
use crate::table::{CellValue, RawTable};

/// Converts record batches sharing one schema into a raw table.
///
/// Numeric arrays become [`CellValue::Number`]; other arrays are rendered
/// with Arrow's display formatting. Nulls become [`CellValue::Missing`].
pub fn from_record_batches(batches: &[RecordBatch]) -> Result<RawTable> {
    let first = batches
        .first()
        .ok_or_else(|| InsightError::schema("no record batches supplied"))?;
    let schema = first.schema();
    let columns: Vec<String> = schema
        .fields()
        .iter()
        .map(|f| f.name().trim().to_string())
        .collect();

    let mut rows = Vec::new();
    for batch in batches {
        if batch.schema().fields() != schema.fields() {
            return Err(InsightError::schema(
                "record batches do not share the same schema",
            ));
        }
        rows.extend(batch_rows(batch.columns())?);
    }

    RawTable::new(columns, rows)
}

/// Transposes column arrays into rows of cells.
pub(super) fn batch_rows(columns: &[ArrayRef]) -> Result<Vec<Vec<CellValue>>> {
    let num_rows = columns.first().map_or(0, |c| c.len());
    let decoded = columns
        .iter()
        .map(column_cells)
        .collect::<Result<Vec<_>>>()?;

    let mut rows = vec![Vec::with_capacity(columns.len()); num_rows];
    for column in decoded {
        for (row, cell) in rows.iter_mut().zip(column) {
            row.push(cell);
        }
    }
    Ok(rows)
}

fn column_cells(array: &ArrayRef) -> Result<Vec<CellValue>> {
    if array.data_type().is_numeric() {
        let as_float = cast(array.as_ref(), &DataType::Float64)?;
        let values = as_float
            .as_any()
            .downcast_ref::<Float64Array>()
            .ok_or_else(|| InsightError::internal("Float64 cast produced a different array type"))?;
        return Ok((0..values.len())
            .map(|i| {
                if values.is_null(i) {
                    CellValue::Missing
                } else {
                    CellValue::Number(values.value(i))
                }
            })
            .collect());
    }

    let mut cells = Vec::with_capacity(array.len());
    for i in 0..array.len() {
        if array.is_null(i) {
            cells.push(CellValue::Missing);
        } else {
            let text = array_value_to_string(array.as_ref(), i)?;
            cells.push(CellValue::from_text(Some(&text)));
        }
    }
    Ok(cells)
}
