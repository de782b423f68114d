//! Single-run orchestration of the pipeline stages.

use std::time::Instant;

use sha2::{Digest, Sha256};
use tracing::{info, instrument, warn};

use crate::analyzers::{
    AggregationContext, AnomalyScorer, Cleaner, FeatureBuilder, InsightAggregator,
    SchemaInferencer,
};
use crate::analyzers::inference::InferenceConfig;
use crate::config::PipelineConfig;
use crate::error::Result;
use crate::insight::Insight;
use crate::logging::LogConfig;
use crate::table::{format_number, CellValue, RawTable};

/// Runs schema inference, cleaning, feature building, scoring and
/// aggregation over one table.
///
/// A pipeline holds only validated configuration, so one instance can be
/// shared across threads and reused for any number of uploads.
///
/// # Example
///
/// ```rust
/// use insight_core::config::PipelineConfig;
/// use insight_core::core::InsightPipeline;
/// use insight_core::table::RawTable;
///
/// let mut builder = RawTable::builder(["id", "amount"]);
/// for i in 0..30 {
///     let amount = if i == 12 { "5000" } else { "20" };
///     builder = builder.row([format!("T{i}").as_str(), amount]);
/// }
/// let table = builder.build().unwrap();
///
/// let pipeline = InsightPipeline::new(PipelineConfig::default()).unwrap();
/// let insight = pipeline.run(&table).unwrap();
/// assert_eq!(insight.total_records, 30);
/// assert_eq!(insight.total_anomalies, 1);
/// ```
#[derive(Debug, Clone)]
pub struct InsightPipeline {
    config: PipelineConfig,
    log: LogConfig,
}

impl InsightPipeline {
    /// Creates a pipeline, rejecting invalid configuration up front.
    pub fn new(config: PipelineConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            log: LogConfig::default(),
        })
    }

    /// Sets the logging configuration used by every stage.
    pub fn with_log_config(mut self, log: LogConfig) -> Self {
        self.log = log;
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Turns `table` into an insight.
    ///
    /// Structural problems abort the run: an unusable table shape, no
    /// scorable column, or too few rows after cleaning. Columns that cannot
    /// be cleaned are excluded and reported as warnings instead.
    #[instrument(skip_all, fields(columns = table.column_count(), rows = table.row_count()))]
    pub fn run(&self, table: &RawTable) -> Result<Insight> {
        let start = Instant::now();
        info!("Starting insight pipeline");

        let profiles = SchemaInferencer::with_config(
            InferenceConfig::from(&self.config),
            self.log.clone(),
        )
        .infer(table)?;

        let cleaned = Cleaner::from_config(&self.config)
            .with_log_config(self.log.clone())
            .clean(table, &profiles)?;
        for warning in cleaned.warnings() {
            warn!(column = %warning.column, reason = %warning.reason, "Column excluded");
        }

        let matrix = FeatureBuilder::new()
            .with_log_config(self.log.clone())
            .build(&cleaned)?;

        let scores = AnomalyScorer::from_config(&self.config)
            .with_log_config(self.log.clone())
            .score(&matrix)?;

        let insight = InsightAggregator::from_config(&self.config)
            .with_log_config(self.log.clone())
            .aggregate(
                &cleaned,
                &matrix,
                &scores,
                AggregationContext {
                    dataset_fingerprint: dataset_fingerprint(table),
                    profiles,
                },
            );

        info!(
            total_records = insight.total_records,
            total_anomalies = insight.total_anomalies,
            health = %insight.health_status,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Completed insight pipeline"
        );

        Ok(insight)
    }
}

/// SHA-256 over the headers and cells of a raw table, hex encoded.
///
/// Every field is length-prefixed, so tables that differ only in how values
/// are split across cells hash differently.
pub fn dataset_fingerprint(table: &RawTable) -> String {
    let mut hasher = Sha256::new();

    fn field(hasher: &mut Sha256, tag: u8, bytes: &[u8]) {
        hasher.update([tag]);
        hasher.update((bytes.len() as u64).to_le_bytes());
        hasher.update(bytes);
    }

    for name in table.columns() {
        field(&mut hasher, b'h', name.as_bytes());
    }
    for row in table.rows() {
        hasher.update(b"r");
        for cell in row {
            match cell {
                CellValue::Text(s) => field(&mut hasher, b't', s.as_bytes()),
                CellValue::Number(n) => field(&mut hasher, b'n', format_number(*n).as_bytes()),
                CellValue::Missing => field(&mut hasher, b'm', &[]),
            }
        }
    }

    hex::encode(hasher.finalize())
}
