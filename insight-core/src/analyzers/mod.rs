//! Pipeline stages.
//!
//! Each stage owns its output and never mutates the input it was handed:
//!
//! - **Schema inference** (`inference`): classifies every column as temporal,
//!   numeric, categorical or identifier
//! - **Cleaning** (`cleaning`): drops empty and duplicate rows, imputes
//!   missing values per column kind
//! - **Feature building** (`features`): numeric values and calendar features,
//!   min-max scaled into `[0, 1]`
//! - **Anomaly scoring** (`anomaly`, `isolation_forest`): seeded isolation
//!   forest with a contamination-derived threshold
//! - **Aggregation** (`aggregation`): rate, health status, breakdowns and
//!   feature ranking
//!
//! The stages are usually driven by [`InsightPipeline`](crate::core::InsightPipeline),
//! but each one can be used on its own:
//!
//! ```rust
//! use insight_core::analyzers::{Cleaner, SchemaInferencer};
//! use insight_core::table::RawTable;
//!
//! let table = RawTable::builder(["amount", "region"])
//!     .row(["10", "north"])
//!     .row(["", "south"])
//!     .row(["10", "north"])
//!     .build()
//!     .unwrap();
//!
//! let profiles = SchemaInferencer::new().infer(&table).unwrap();
//! let cleaned = Cleaner::default().clean(&table, &profiles).unwrap();
//! assert_eq!(cleaned.report().duplicates_removed, 1);
//! assert_eq!(cleaned.report().imputed_cells.get("amount"), Some(&1));
//! ```

pub mod aggregation;
pub mod anomaly;
pub mod cleaning;
pub mod features;
pub mod inference;
pub mod isolation_forest;

pub use aggregation::{AggregationContext, InsightAggregator};
pub use anomaly::{AnomalyResult, AnomalyScorer, AnomalyScores};
pub use cleaning::{Cell, CleanedColumn, CleanedTable, Cleaner, CleaningReport};
pub use features::{Derivation, FeatureBuilder, FeatureColumn, FeatureMatrix};
pub use inference::{ColumnKind, ColumnProfile, SchemaInferencer};
pub use isolation_forest::{IsolationForest, IsolationForestConfig};
