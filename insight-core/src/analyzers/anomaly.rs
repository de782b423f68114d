//! Record-level anomaly scoring.
//!
//! The [`AnomalyScorer`] fits a fresh [`IsolationForest`] to each feature
//! matrix, scores every row, and flags the rows whose score lies strictly
//! above the `(1 - contamination_rate)` quantile. Nothing is kept between
//! calls: every dataset is scored on its own.
//!
//! ## Example
//!
//! ```rust
//! use insight_core::analyzers::anomaly::AnomalyScorer;
//! use insight_core::analyzers::features::{Derivation, FeatureColumn, FeatureMatrix};
//! use insight_core::config::PipelineConfig;
//!
//! let column = FeatureColumn {
//!     name: "amount".to_string(),
//!     source_column: "amount".to_string(),
//!     derivation: Derivation::Value,
//!     observed_min: 0.0,
//!     observed_max: 1.0,
//! };
//! let mut rows = vec![vec![0.0]; 19];
//! rows.push(vec![1.0]);
//! let matrix = FeatureMatrix::new(vec![column], rows).unwrap();
//!
//! let scores = AnomalyScorer::from_config(&PipelineConfig::default())
//!     .score(&matrix)
//!     .unwrap();
//! assert_eq!(scores.anomaly_count(), 1);
//! assert!(scores.results()[19].is_anomaly);
//! ```

use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::analyzers::features::FeatureMatrix;
use crate::analyzers::isolation_forest::{IsolationForest, IsolationForestConfig};
use crate::config::PipelineConfig;
use crate::error::{InsightError, Result};
use crate::log_stage;
use crate::logging::LogConfig;

/// Outcome for one record.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AnomalyResult {
    pub is_anomaly: bool,
    /// Higher is more anomalous
    pub score: f64,
}

/// Per-record results, aligned with the feature matrix rows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnomalyScores {
    results: Vec<AnomalyResult>,
    threshold: f64,
    n_estimators: usize,
    subsample_size: usize,
}

impl AnomalyScores {
    pub fn results(&self) -> &[AnomalyResult] {
        &self.results
    }

    /// Score above which a record is flagged.
    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn n_estimators(&self) -> usize {
        self.n_estimators
    }

    pub fn subsample_size(&self) -> usize {
        self.subsample_size
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn anomaly_count(&self) -> usize {
        self.results.iter().filter(|r| r.is_anomaly).count()
    }

    /// Anomaly flags in row order.
    pub fn flags(&self) -> impl Iterator<Item = bool> + '_ {
        self.results.iter().map(|r| r.is_anomaly)
    }
}

/// Fits and applies an isolation forest in one call.
#[derive(Debug, Clone)]
pub struct AnomalyScorer {
    contamination_rate: f64,
    min_sample_size: usize,
    forest: IsolationForestConfig,
    log: LogConfig,
}

impl AnomalyScorer {
    pub fn from_config(config: &PipelineConfig) -> Self {
        Self {
            contamination_rate: config.contamination_rate,
            min_sample_size: config.min_sample_size,
            forest: IsolationForestConfig {
                n_estimators: config.n_estimators,
                max_samples: config.max_samples,
                seed: config.random_seed,
            },
            log: LogConfig::default(),
        }
    }

    /// Sets the logging configuration.
    pub fn with_log_config(mut self, log: LogConfig) -> Self {
        self.log = log;
        self
    }

    /// Scores every row of `matrix`.
    ///
    /// Fails with [`InsightError::Scoring`] when the matrix has fewer rows
    /// than the configured minimum sample size.
    #[instrument(skip_all, fields(rows = matrix.row_count(), features = matrix.feature_count()))]
    pub fn score(&self, matrix: &FeatureMatrix) -> Result<AnomalyScores> {
        if matrix.row_count() < self.min_sample_size {
            return Err(InsightError::Scoring {
                min_required: self.min_sample_size,
                actual: matrix.row_count(),
            });
        }
        if matrix.feature_count() == 0 {
            return Err(InsightError::NoFeatures);
        }

        let forest = IsolationForest::fit(matrix.rows(), &self.forest)?;
        let scores = forest.score_all(matrix.rows());
        let threshold = quantile(&scores, 1.0 - self.contamination_rate);

        let results: Vec<AnomalyResult> = scores
            .into_iter()
            .map(|score| AnomalyResult {
                is_anomaly: score > threshold,
                score,
            })
            .collect();

        let scored = AnomalyScores {
            results,
            threshold,
            n_estimators: forest.n_estimators(),
            subsample_size: forest.subsample_size(),
        };

        log_stage!(
            self.log,
            rows = scored.len(),
            anomalies = scored.anomaly_count(),
            threshold = scored.threshold,
            subsample_size = scored.subsample_size,
            "Scored records"
        );

        Ok(scored)
    }
}

/// Linear-interpolation quantile of `values` at `q` in `[0, 1]`.
pub fn quantile(values: &[f64], q: f64) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);

    let position = q.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lower = position.floor() as usize;
    let upper = position.ceil() as usize;
    let fraction = position - lower as f64;
    sorted[lower] + (sorted[upper] - sorted[lower]) * fraction
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzers::features::{Derivation, FeatureColumn};

    fn matrix(rows: Vec<Vec<f64>>) -> FeatureMatrix {
        let width = rows.first().map_or(1, Vec::len);
        let columns = (0..width)
            .map(|i| FeatureColumn {
                name: format!("f{i}"),
                source_column: format!("f{i}"),
                derivation: Derivation::Value,
                observed_min: 0.0,
                observed_max: 1.0,
            })
            .collect();
        FeatureMatrix::new(columns, rows).unwrap()
    }

    #[test]
    fn test_quantile_interpolates() {
        assert_eq!(quantile(&[1.0, 2.0, 3.0, 4.0, 5.0], 0.5), 3.0);
        assert_eq!(quantile(&[1.0, 2.0], 0.5), 1.5);
        assert_eq!(quantile(&[4.0, 1.0, 3.0, 2.0], 1.0), 4.0);
        assert_eq!(quantile(&[4.0, 1.0, 3.0, 2.0], 0.0), 1.0);
        assert_eq!(quantile(&[], 0.9), 0.0);
    }

    #[test]
    fn test_too_few_rows_is_scoring_error() {
        let scorer = AnomalyScorer::from_config(&PipelineConfig::default());
        let err = scorer.score(&matrix(vec![vec![0.5]; 5])).unwrap_err();
        assert_eq!(
            err,
            InsightError::Scoring {
                min_required: 10,
                actual: 5
            }
        );
    }

    #[test]
    fn test_single_spike_is_only_anomaly() {
        let mut rows = vec![vec![0.0, 0.3]; 99];
        rows.push(vec![1.0, 0.3]);
        let scores = AnomalyScorer::from_config(&PipelineConfig::default())
            .score(&matrix(rows))
            .unwrap();

        assert_eq!(scores.len(), 100);
        assert_eq!(scores.anomaly_count(), 1);
        assert!(scores.results()[99].is_anomaly);
        assert!(scores.results()[99].score > scores.results()[0].score);
        assert_eq!(scores.subsample_size(), 100);
        assert_eq!(scores.n_estimators(), 100);
    }

    #[test]
    fn test_uniform_scores_flag_nothing() {
        let scores = AnomalyScorer::from_config(&PipelineConfig::default())
            .score(&matrix(vec![vec![0.0, 0.0]; 30]))
            .unwrap();
        assert_eq!(scores.anomaly_count(), 0);
    }

    #[test]
    fn test_scoring_is_deterministic() {
        let rows: Vec<Vec<f64>> = (0..50)
            .map(|i| vec![(i * 7 % 50) as f64 / 49.0, (i * 3 % 50) as f64 / 49.0])
            .collect();
        let config = PipelineConfig::default().with_random_seed(99);
        let a = AnomalyScorer::from_config(&config).score(&matrix(rows.clone())).unwrap();
        let b = AnomalyScorer::from_config(&config).score(&matrix(rows)).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_contamination_bounds_flagged_share() {
        let rows: Vec<Vec<f64>> = (0..200).map(|i| vec![i as f64 / 199.0]).collect();
        let config = PipelineConfig::default().with_contamination_rate(0.1);
        let scores = AnomalyScorer::from_config(&config).score(&matrix(rows)).unwrap();
        assert!(scores.anomaly_count() <= 20);
    }
}
