//! Prelude for commonly used types and traits in insight-core.

pub use crate::config::{HealthThresholds, PipelineConfig};
pub use crate::core::{ExecutorConfig, InsightPipeline, OverflowPolicy, PipelineExecutor};
pub use crate::error::{InsightError, Result};
pub use crate::formatters::{FormatterConfig, HumanFormatter, InsightFormatter, JsonFormatter};
pub use crate::insight::{HealthStatus, Insight};
pub use crate::logging::LogConfig;
pub use crate::sources::{
    from_record_batches, read_csv, read_csv_str, read_spreadsheet, CsvOptions, UploadFormat,
};
pub use crate::table::{CellValue, RawTable};
