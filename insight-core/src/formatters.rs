//! Rendering of insights for people and programs.
//!
//! # Examples
//!
//! ```rust
//! use insight_core::config::PipelineConfig;
//! use insight_core::core::InsightPipeline;
//! use insight_core::formatters::{HumanFormatter, InsightFormatter, JsonFormatter};
//! use insight_core::table::RawTable;
//!
//! let mut builder = RawTable::builder(["amount"]);
//! for i in 0..20 {
//!     builder = builder.row([i as f64]);
//! }
//! let insight = InsightPipeline::new(PipelineConfig::default())
//!     .unwrap()
//!     .run(&builder.build().unwrap())
//!     .unwrap();
//!
//! let json = JsonFormatter::new().with_pretty(false).format(&insight).unwrap();
//! assert!(json.starts_with("{\"schema_version\":1"));
//!
//! let text = HumanFormatter::new().format(&insight).unwrap();
//! assert!(text.contains("Records: 20"));
//! ```

use std::fmt::Write;

use crate::error::{InsightError, Result};
use crate::insight::{CategoryBreakdown, HealthStatus, Insight};

/// Options controlling how much of an insight is rendered.
#[derive(Debug, Clone)]
pub struct FormatterConfig {
    /// Include time and categorical breakdowns
    pub include_breakdowns: bool,
    /// Include inferred column kinds
    pub include_columns: bool,
    /// Include the cleaning summary
    pub include_cleaning: bool,
    /// Maximum number of groups shown per breakdown (None for all)
    pub max_groups: Option<usize>,
    /// Whether to use ANSI colors (human formatter only)
    pub use_colors: bool,
}

impl Default for FormatterConfig {
    fn default() -> Self {
        Self {
            include_breakdowns: true,
            include_columns: true,
            include_cleaning: true,
            max_groups: Some(10),
            use_colors: false,
        }
    }
}

impl FormatterConfig {
    /// Headline numbers only.
    pub fn minimal() -> Self {
        Self {
            include_breakdowns: false,
            include_columns: false,
            include_cleaning: false,
            max_groups: Some(0),
            use_colors: false,
        }
    }

    /// Everything, with no group limit.
    pub fn detailed() -> Self {
        Self {
            include_breakdowns: true,
            include_columns: true,
            include_cleaning: true,
            max_groups: None,
            use_colors: false,
        }
    }

    pub fn with_colors(mut self, use_colors: bool) -> Self {
        self.use_colors = use_colors;
        self
    }

    pub fn with_max_groups(mut self, max: Option<usize>) -> Self {
        self.max_groups = max;
        self
    }
}

/// Converts an insight into a textual representation.
pub trait InsightFormatter {
    fn format(&self, insight: &Insight) -> Result<String>;
}

/// Serializes the complete insight as JSON.
///
/// JSON output is never filtered: it is the machine contract and must
/// round-trip.
#[derive(Debug, Clone)]
pub struct JsonFormatter {
    pretty: bool,
}

impl JsonFormatter {
    /// Creates a formatter producing pretty-printed JSON.
    pub fn new() -> Self {
        Self { pretty: true }
    }

    pub fn with_pretty(mut self, pretty: bool) -> Self {
        self.pretty = pretty;
        self
    }
}

impl Default for JsonFormatter {
    fn default() -> Self {
        Self::new()
    }
}

impl InsightFormatter for JsonFormatter {
    fn format(&self, insight: &Insight) -> Result<String> {
        let json = if self.pretty {
            serde_json::to_string_pretty(insight)
        } else {
            serde_json::to_string(insight)
        };
        json.map_err(|e| InsightError::Serialization(format!("Failed to serialize insight: {e}")))
    }
}

/// Console summary of an insight.
#[derive(Debug, Clone, Default)]
pub struct HumanFormatter {
    config: FormatterConfig,
}

impl HumanFormatter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: FormatterConfig) -> Self {
        Self { config }
    }

    fn status_line(&self, status: HealthStatus) -> String {
        let (symbol, color) = match status {
            HealthStatus::Healthy => ("✅", "\x1b[32m"),
            HealthStatus::Watch => ("⚠️", "\x1b[33m"),
            HealthStatus::Critical => ("🚨", "\x1b[31m"),
        };
        let label = status.as_str().to_uppercase();
        if self.config.use_colors {
            format!("{symbol} Health: {color}{label}\x1b[0m")
        } else {
            format!("{symbol} Health: {label}")
        }
    }

    fn write_breakdown(&self, output: &mut String, title: &str, breakdown: &CategoryBreakdown) {
        writeln!(output, "   {title} by {}:", breakdown.column).unwrap();
        let shown = self
            .config
            .max_groups
            .unwrap_or(breakdown.groups.len())
            .min(breakdown.groups.len());
        for group in &breakdown.groups[..shown] {
            writeln!(
                output,
                "      {:<20} {:>4}/{:<6} ({:.1}%)",
                group.value,
                group.anomaly_count,
                group.record_count,
                group.anomaly_rate * 100.0
            )
            .unwrap();
        }
        if breakdown.groups.len() > shown {
            writeln!(output, "      ... and {} more", breakdown.groups.len() - shown).unwrap();
        }
    }
}

impl InsightFormatter for HumanFormatter {
    fn format(&self, insight: &Insight) -> Result<String> {
        let mut output = String::new();

        writeln!(output).unwrap();
        writeln!(output, "{}", self.status_line(insight.health_status)).unwrap();
        writeln!(output).unwrap();
        writeln!(output, "📊 Summary:").unwrap();
        writeln!(output, "   Records: {}", insight.total_records).unwrap();
        writeln!(output, "   Anomalies: {}", insight.total_anomalies).unwrap();
        writeln!(output, "   Anomaly Rate: {:.2}%", insight.anomaly_rate * 100.0).unwrap();
        writeln!(output, "   Fingerprint: {}", insight.dataset_fingerprint).unwrap();

        if !insight.top_features.is_empty() {
            writeln!(output).unwrap();
            writeln!(output, "📈 Top Features:").unwrap();
            for feature in &insight.top_features {
                writeln!(output, "   {:<32} {:.3}", feature.feature, feature.contribution).unwrap();
            }
        }

        if self.config.include_breakdowns {
            if let Some(time) = &insight.time_breakdown {
                writeln!(output).unwrap();
                writeln!(
                    output,
                    "🕒 Anomalies over time ({}, per {:?}):",
                    time.column, time.granularity
                )
                .unwrap();
                for bucket in &time.buckets {
                    writeln!(
                        output,
                        "   {:<16} {:>4}/{:<6} ({:.1}%)",
                        bucket.label,
                        bucket.anomaly_count,
                        bucket.record_count,
                        bucket.anomaly_rate * 100.0
                    )
                    .unwrap();
                }
            }
            if !insight.region_breakdown.is_empty() || !insight.demographic_breakdown.is_empty() {
                writeln!(output).unwrap();
                writeln!(output, "🗺️  Breakdowns:").unwrap();
                for breakdown in &insight.region_breakdown {
                    self.write_breakdown(&mut output, "Region", breakdown);
                }
                for breakdown in &insight.demographic_breakdown {
                    self.write_breakdown(&mut output, "Group", breakdown);
                }
            }
        }

        if self.config.include_columns {
            writeln!(output).unwrap();
            writeln!(output, "🔎 Columns:").unwrap();
            for column in &insight.columns {
                writeln!(
                    output,
                    "   {:<24} {:<12} missing={} distinct={}",
                    column.name, column.kind, column.missing_count, column.distinct_count
                )
                .unwrap();
            }
        }

        if self.config.include_cleaning {
            let cleaning = &insight.cleaning;
            writeln!(output).unwrap();
            writeln!(output, "🧹 Cleaning:").unwrap();
            writeln!(output, "   Input rows: {}", cleaning.input_rows).unwrap();
            writeln!(output, "   Empty rows removed: {}", cleaning.empty_rows_removed).unwrap();
            writeln!(output, "   Duplicates removed: {}", cleaning.duplicates_removed).unwrap();
            writeln!(output, "   Cells imputed: {}", cleaning.total_imputed()).unwrap();
        }

        if !insight.warnings.is_empty() {
            writeln!(output).unwrap();
            writeln!(output, "⚠️  Warnings:").unwrap();
            for warning in &insight.warnings {
                writeln!(output, "   {}", warning.reason).unwrap();
            }
        }

        writeln!(output).unwrap();
        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzers::cleaning::CleaningReport;
    use crate::insight::{ColumnWarning, GroupStat, ScoringSummary, INSIGHT_SCHEMA_VERSION};

    fn insight() -> Insight {
        Insight {
            schema_version: INSIGHT_SCHEMA_VERSION,
            dataset_fingerprint: "abc123".to_string(),
            total_records: 200,
            total_anomalies: 30,
            anomaly_rate: 0.15,
            health_status: HealthStatus::Critical,
            time_breakdown: None,
            region_breakdown: vec![CategoryBreakdown {
                column: "state".to_string(),
                groups: (0..5)
                    .map(|i| GroupStat {
                        value: format!("s{i}"),
                        record_count: 40,
                        anomaly_count: 6,
                        anomaly_rate: 0.15,
                    })
                    .collect(),
            }],
            demographic_breakdown: vec![],
            top_features: vec![],
            columns: vec![],
            cleaning: CleaningReport::default(),
            scoring: ScoringSummary {
                contamination_rate: 0.05,
                threshold: 0.61,
                n_estimators: 100,
                subsample_size: 200,
                random_seed: 42,
                features_used: vec!["amount".to_string()],
            },
            warnings: vec![ColumnWarning {
                column: "notes".to_string(),
                reason: "Column 'notes' could not be cleaned: no values".to_string(),
            }],
        }
    }

    #[test]
    fn test_json_formatter_round_trips() {
        let json = JsonFormatter::new().format(&insight()).unwrap();
        assert!(json.contains('\n'));
        assert_eq!(Insight::from_json(&json).unwrap(), insight());

        let compact = JsonFormatter::new().with_pretty(false).format(&insight()).unwrap();
        assert!(!compact.contains('\n'));
    }

    #[test]
    fn test_human_formatter_summary() {
        let output = HumanFormatter::new().format(&insight()).unwrap();
        assert!(output.contains("Health: CRITICAL"));
        assert!(output.contains("Anomaly Rate: 15.00%"));
        assert!(output.contains("Region by state:"));
        assert!(output.contains("could not be cleaned"));
        assert!(!output.contains("\x1b["));
    }

    #[test]
    fn test_human_formatter_limits_groups() {
        let config = FormatterConfig::default().with_max_groups(Some(2));
        let output = HumanFormatter::with_config(config).format(&insight()).unwrap();
        assert!(output.contains("s1"));
        assert!(!output.contains("s2 "));
        assert!(output.contains("... and 3 more"));
    }

    #[test]
    fn test_minimal_config_hides_sections() {
        let output = HumanFormatter::with_config(FormatterConfig::minimal())
            .format(&insight())
            .unwrap();
        assert!(!output.contains("Breakdowns"));
        assert!(!output.contains("Cleaning"));
        assert!(output.contains("Records: 200"));
    }

    #[test]
    fn test_colors_applied_when_enabled() {
        let config = FormatterConfig::default().with_colors(true);
        let output = HumanFormatter::with_config(config).format(&insight()).unwrap();
        assert!(output.contains("\x1b[31mCRITICAL\x1b[0m"));
    }
}
