//! Insight aggregation.
//!
//! Combines the row-level anomaly flags with the cleaned table to produce the
//! [`Insight`]: overall rate and health, breakdowns over time and over
//! low-cardinality categorical columns, and a ranking of the features that
//! separate flagged records from the rest.
//!
//! Categorical breakdowns are split in two lists. Columns whose name contains
//! one of the configured region hints (`state`, `district`, ...) land in
//! `region_breakdown`; everything else lands in `demographic_breakdown`.

use std::collections::{BTreeMap, HashMap};

use chrono::{NaiveDateTime, NaiveTime, Timelike};
use tracing::{debug, instrument};

use crate::analyzers::anomaly::AnomalyScores;
use crate::analyzers::cleaning::{Cell, CleanedTable};
use crate::analyzers::features::FeatureMatrix;
use crate::analyzers::inference::{ColumnKind, ColumnProfile};
use crate::config::{HealthThresholds, PipelineConfig};
use crate::insight::{
    CategoryBreakdown, FeatureContribution, Granularity, GroupStat, Insight, ScoringSummary,
    TimeBreakdown, TimeBucket, INSIGHT_SCHEMA_VERSION,
};
use crate::log_stage;
use crate::logging::LogConfig;

/// Per-run values that do not come from the scored data itself.
#[derive(Debug, Clone)]
pub struct AggregationContext {
    pub dataset_fingerprint: String,
    pub profiles: Vec<ColumnProfile>,
}

/// Builds insights from scored tables.
#[derive(Debug, Clone)]
pub struct InsightAggregator {
    thresholds: HealthThresholds,
    cardinality_ceiling: usize,
    region_hints: Vec<String>,
    top_features_limit: usize,
    contamination_rate: f64,
    random_seed: u64,
    log: LogConfig,
}

impl InsightAggregator {
    pub fn from_config(config: &PipelineConfig) -> Self {
        Self {
            thresholds: config.health_status_thresholds,
            cardinality_ceiling: config.categorical_cardinality_ceiling,
            region_hints: config
                .region_column_hints
                .iter()
                .map(|hint| hint.to_lowercase())
                .collect(),
            top_features_limit: config.top_features_limit,
            contamination_rate: config.contamination_rate,
            random_seed: config.random_seed,
            log: LogConfig::default(),
        }
    }

    /// Sets the logging configuration.
    pub fn with_log_config(mut self, log: LogConfig) -> Self {
        self.log = log;
        self
    }

    /// Assembles the insight. `table`, `matrix` and `scores` must describe
    /// the same rows in the same order.
    #[instrument(skip_all, fields(rows = table.row_count()))]
    pub fn aggregate(
        &self,
        table: &CleanedTable,
        matrix: &FeatureMatrix,
        scores: &AnomalyScores,
        context: AggregationContext,
    ) -> Insight {
        let flags: Vec<bool> = scores.flags().collect();
        let total_records = flags.len();
        let total_anomalies = flags.iter().filter(|f| **f).count();
        let anomaly_rate = rate(total_anomalies, total_records);
        let health_status = self.thresholds.classify(anomaly_rate);

        let time_breakdown = time_breakdown(table, &flags);
        let (region_breakdown, demographic_breakdown) =
            self.categorical_breakdowns(table, &context.profiles, &flags);
        let top_features = self.rank_features(matrix, &flags);

        log_stage!(
            self.log,
            total_records,
            total_anomalies,
            anomaly_rate,
            health = %health_status,
            "Aggregated insight"
        );

        Insight {
            schema_version: INSIGHT_SCHEMA_VERSION,
            dataset_fingerprint: context.dataset_fingerprint,
            total_records,
            total_anomalies,
            anomaly_rate,
            health_status,
            time_breakdown,
            region_breakdown,
            demographic_breakdown,
            top_features,
            columns: context.profiles,
            cleaning: table.report().clone(),
            scoring: ScoringSummary {
                contamination_rate: self.contamination_rate,
                threshold: scores.threshold(),
                n_estimators: scores.n_estimators(),
                subsample_size: scores.subsample_size(),
                random_seed: self.random_seed,
                features_used: matrix.feature_names(),
            },
            warnings: table.warnings().to_vec(),
        }
    }

    fn is_region_column(&self, name: &str) -> bool {
        let name = name.to_lowercase();
        self.region_hints.iter().any(|hint| name.contains(hint.as_str()))
    }

    fn categorical_breakdowns(
        &self,
        table: &CleanedTable,
        profiles: &[ColumnProfile],
        flags: &[bool],
    ) -> (Vec<CategoryBreakdown>, Vec<CategoryBreakdown>) {
        let mut region = Vec::new();
        let mut demographic = Vec::new();

        for (idx, column) in table.columns().iter().enumerate() {
            if column.kind != ColumnKind::Categorical {
                continue;
            }
            let Some(profile) = profiles.iter().find(|p| p.name == column.name) else {
                continue;
            };
            // A column with no distinct values has nothing but missing cells
            if profile.distinct_count == 0 {
                continue;
            }
            // Imputation may add the unknown group, so the ceiling applies
            // to the cleaned values
            let groups = group_stats(table.column_values(idx), flags);
            if groups.len() > self.cardinality_ceiling {
                debug!(
                    column = %column.name,
                    groups = groups.len(),
                    "Skipping categorical breakdown"
                );
                continue;
            }

            let breakdown = CategoryBreakdown {
                column: column.name.clone(),
                groups,
            };
            if self.is_region_column(&column.name) {
                region.push(breakdown);
            } else {
                demographic.push(breakdown);
            }
        }

        (region, demographic)
    }

    fn rank_features(&self, matrix: &FeatureMatrix, flags: &[bool]) -> Vec<FeatureContribution> {
        let mut ranked: Vec<FeatureContribution> = matrix
            .columns()
            .iter()
            .enumerate()
            .map(|(idx, column)| {
                let mut sums = [0.0f64; 2];
                let mut counts = [0usize; 2];
                for (value, flagged) in matrix.feature_values(idx).zip(flags) {
                    let class = usize::from(*flagged);
                    sums[class] += value;
                    counts[class] += 1;
                }
                let contribution = if counts[0] == 0 || counts[1] == 0 {
                    0.0
                } else {
                    (sums[1] / counts[1] as f64 - sums[0] / counts[0] as f64).abs()
                };
                FeatureContribution {
                    feature: column.name.clone(),
                    source_column: column.source_column.clone(),
                    contribution,
                }
            })
            .collect();

        // Stable sort keeps matrix order among equal contributions
        ranked.sort_by(|a, b| b.contribution.total_cmp(&a.contribution));
        ranked.truncate(self.top_features_limit);
        ranked
    }
}

/// `part / whole`, or 0 when `whole` is 0.
pub fn rate(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64
    }
}

fn group_stats<'a>(values: impl Iterator<Item = &'a Cell>, flags: &[bool]) -> Vec<GroupStat> {
    let mut counts: HashMap<String, (usize, usize)> = HashMap::new();
    for (cell, flagged) in values.zip(flags) {
        let Some(value) = cell.render() else {
            continue;
        };
        let entry = counts.entry(value).or_default();
        entry.0 += 1;
        if *flagged {
            entry.1 += 1;
        }
    }

    let mut groups: Vec<GroupStat> = counts
        .into_iter()
        .map(|(value, (record_count, anomaly_count))| GroupStat {
            value,
            record_count,
            anomaly_count,
            anomaly_rate: rate(anomaly_count, record_count),
        })
        .collect();
    groups.sort_by(|a, b| {
        b.anomaly_count
            .cmp(&a.anomaly_count)
            .then(b.record_count.cmp(&a.record_count))
            .then_with(|| a.value.cmp(&b.value))
    });
    groups
}

fn time_breakdown(table: &CleanedTable, flags: &[bool]) -> Option<TimeBreakdown> {
    let (idx, column) = table
        .columns()
        .iter()
        .enumerate()
        .find(|(_, c)| c.kind == ColumnKind::Temporal && !c.excluded)?;

    let timestamps: Vec<Option<NaiveDateTime>> =
        table.column_values(idx).map(Cell::as_timestamp).collect();
    let granularity = if timestamps
        .iter()
        .flatten()
        .any(|ts| ts.time() != NaiveTime::MIN)
    {
        Granularity::Hour
    } else {
        Granularity::Day
    };

    let mut buckets: BTreeMap<NaiveDateTime, (usize, usize)> = BTreeMap::new();
    for (ts, flagged) in timestamps.iter().zip(flags) {
        let Some(ts) = ts else {
            continue;
        };
        let entry = buckets.entry(bucket_start(*ts, granularity)).or_default();
        entry.0 += 1;
        if *flagged {
            entry.1 += 1;
        }
    }

    let label_format = match granularity {
        Granularity::Hour => "%Y-%m-%d %H:00",
        Granularity::Day => "%Y-%m-%d",
    };

    Some(TimeBreakdown {
        column: column.name.clone(),
        granularity,
        buckets: buckets
            .into_iter()
            .map(|(start, (record_count, anomaly_count))| TimeBucket {
                label: start.format(label_format).to_string(),
                start,
                record_count,
                anomaly_count,
                anomaly_rate: rate(anomaly_count, record_count),
            })
            .collect(),
    })
}

fn bucket_start(ts: NaiveDateTime, granularity: Granularity) -> NaiveDateTime {
    let hour = match granularity {
        Granularity::Hour => ts.hour(),
        Granularity::Day => 0,
    };
    ts.date()
        .and_time(NaiveTime::from_hms_opt(hour, 0, 0).unwrap_or(NaiveTime::MIN))
}
