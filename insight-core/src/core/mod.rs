//! Pipeline orchestration.
//!
//! - **[`InsightPipeline`]** runs the five stages over one table, synchronously
//! - **[`PipelineExecutor`]** runs many pipelines concurrently on blocking
//!   workers, with a concurrency limit, an overflow policy and cancellation
//!
//! ```text
//! RawTable ─► SchemaInferencer ─► Cleaner ─► FeatureBuilder ─► AnomalyScorer ─► InsightAggregator ─► Insight
//! ```

pub mod executor;
pub mod pipeline;

pub use executor::{ExecutorConfig, ExecutorStats, OverflowPolicy, PipelineExecutor};
pub use pipeline::{dataset_fingerprint, InsightPipeline};
