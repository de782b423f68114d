//! # insight-core - Anomaly Insights for Operational Records
//!
//! insight-core turns an uploaded table of operational records into a
//! decision-ready [`Insight`](insight::Insight): how many records look
//! anomalous, whether that rate is healthy, and where (in time, by region,
//! by demographic group) the anomalies concentrate.
//!
//! ## Overview
//!
//! Every upload flows through five stages, each a pure function of its input:
//!
//! ```text
//! RawTable
//!   └─► SchemaInferencer   temporal / numeric / categorical / identifier
//!        └─► Cleaner        empty rows, duplicates, imputation
//!             └─► FeatureBuilder   numeric + calendar features in [0, 1]
//!                  └─► AnomalyScorer   seeded isolation forest
//!                       └─► InsightAggregator   rate, health, breakdowns
//! ```
//!
//! No model is trained or kept across uploads; each dataset is scored on its
//! own, and identical input with identical configuration yields an identical
//! insight.
//!
//! ## Quick Start
//!
//! ```rust
//! use insight_core::prelude::*;
//!
//! let csv = "\
//! txn,date,region,amount
//! T1,2024-03-01,north,120.5
//! T2,2024-03-01,south,98.0
//! T3,2024-03-02,north,101.2
//! T4,2024-03-02,south,99.9
//! T5,2024-03-03,north,100.4
//! T6,2024-03-03,south,97.3
//! T7,2024-03-04,north,103.8
//! T8,2024-03-04,south,102.1
//! T9,2024-03-05,north,99.0
//! T10,2024-03-05,south,9800.0
//! ";
//!
//! let table = read_csv_str(csv, &CsvOptions::default())?;
//! let pipeline = InsightPipeline::new(PipelineConfig::default().with_contamination_rate(0.1))?;
//! let insight = pipeline.run(&table)?;
//!
//! assert_eq!(insight.total_records, 10);
//! assert!(insight.anomaly_rate <= 1.0);
//! assert_eq!(insight.region_breakdown[0].column, "region");
//! # Ok::<(), insight_core::error::InsightError>(())
//! ```
//!
//! ## Architecture
//!
//! - **`table`**: the raw input model ([`RawTable`](table::RawTable), [`CellValue`](table::CellValue))
//! - **`sources`**: CSV, spreadsheet and Arrow record batch ingestion
//! - **`analyzers`**: the five pipeline stages
//! - **`insight`**: the serializable result
//! - **`core`**: the single-run pipeline and the bounded concurrent executor
//! - **`config`**: every tunable, with defaults and validation
//! - **`formatters`**: JSON and console renderings of an insight
//! - **`logging`**: `tracing` configuration and subscriber setup
//!
//! ## Error Handling
//!
//! Structural problems (no rows, nothing to score, too few rows) abort the run
//! with an [`InsightError`](error::InsightError) whose
//! [`user_message`](error::InsightError::user_message) explains what to fix.
//! Columns that cannot be cleaned are excluded and reported as warnings on the
//! insight instead.

pub mod analyzers;
pub mod config;
pub mod core;
pub mod error;
pub mod formatters;
pub mod insight;
pub mod logging;
pub mod prelude;
pub mod sources;
pub mod table;
