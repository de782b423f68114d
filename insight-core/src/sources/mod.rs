//! Ingestion of uploads into [`RawTable`](crate::table::RawTable)s.
//!
//! Three entry points are provided:
//!
//! - [`read_csv`] / [`read_csv_str`]: delimited text with a header row, decoded
//!   through Arrow's CSV reader with every column read as text so that type
//!   decisions stay with the schema inferencer.
//! - [`read_spreadsheet`]: the first sheet of an Excel or OpenDocument
//!   workbook.
//! - [`from_record_batches`]: Arrow record batches produced elsewhere; numeric
//!   arrays arrive as numbers, everything else as its display text.
//!
//! None of them touches the filesystem; callers hand over a reader or the
//! batches. [`UploadFormat`] picks the decoder from a file name.

mod batches;
mod csv;
mod spreadsheet;

use std::path::Path;

pub use batches::from_record_batches;
pub use csv::{read_csv, read_csv_str, CsvOptions};
pub use spreadsheet::read_spreadsheet;

use crate::error::{InsightError, Result};

/// Decoder for an uploaded file, chosen by extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadFormat {
    /// `.csv`, `.tsv` and `.txt`
    Delimited,
    /// `.xlsx`, `.xlsm`, `.xlsb`, `.xls` and `.ods`
    Spreadsheet,
}

impl UploadFormat {
    /// Picks the format from the extension of `path`, ignoring case.
    ///
    /// ```rust
    /// use insight_core::sources::UploadFormat;
    /// use std::path::Path;
    ///
    /// let format = UploadFormat::from_path(Path::new("May.XLSX")).unwrap();
    /// assert_eq!(format, UploadFormat::Spreadsheet);
    /// assert!(UploadFormat::from_path(Path::new("notes.pdf")).is_err());
    /// ```
    pub fn from_path(path: &Path) -> Result<Self> {
        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();
        match extension.as_str() {
            "csv" | "tsv" | "txt" => Ok(Self::Delimited),
            "xlsx" | "xlsm" | "xlsb" | "xls" | "ods" => Ok(Self::Spreadsheet),
            "" => Err(InsightError::ingest(format!(
                "cannot tell the format of '{}' without a file extension; upload a CSV, XLSX or XLS file",
                path.display()
            ))),
            other => Err(InsightError::ingest(format!(
                "unsupported file format '.{other}'; upload a CSV, XLSX or XLS file"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_from_extension() {
        let cases = [
            ("upload.csv", UploadFormat::Delimited),
            ("upload.TSV", UploadFormat::Delimited),
            ("dir.v2/upload.txt", UploadFormat::Delimited),
            ("upload.xlsx", UploadFormat::Spreadsheet),
            ("upload.xls", UploadFormat::Spreadsheet),
            ("upload.ods", UploadFormat::Spreadsheet),
        ];
        for (name, expected) in cases {
            assert_eq!(UploadFormat::from_path(Path::new(name)).unwrap(), expected, "{name}");
        }
    }

    #[test]
    fn test_unsupported_extensions_are_ingest_errors() {
        let err = UploadFormat::from_path(Path::new("report.pdf")).unwrap_err();
        assert!(matches!(&err, InsightError::Ingest(msg) if msg.contains(".pdf")));
        assert!(err.is_user_facing());

        let err = UploadFormat::from_path(Path::new("upload")).unwrap_err();
        assert!(matches!(err, InsightError::Ingest(_)));
    }
}
