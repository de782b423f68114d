//! insight-cli - command-line front end for insight-core
//!
//! Shared pieces of the `insight` binary: configuration loading, input
//! decoding and report rendering. They live in a library so they can be
//! tested without spawning the process.

use std::fs::File;
use std::io::{self, BufReader};
use std::path::Path;

use anyhow::{Context, Result};
use insight_core::prelude::*;
use serde::Serialize;

/// Output format of the `analyze` command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// The full insight as JSON
    Json,
    /// A console summary
    Human,
}

/// Command-line values that take precedence over the configuration file.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub contamination_rate: Option<f64>,
    pub random_seed: Option<u64>,
    pub min_sample_size: Option<usize>,
    pub categorical_cardinality_ceiling: Option<usize>,
}

/// Loads the pipeline configuration.
///
/// Starts from the JSON file at `path` (or the defaults when there is none),
/// applies `overrides` and validates the result.
pub fn load_config(path: Option<&Path>, overrides: &ConfigOverrides) -> Result<PipelineConfig> {
    let mut config = match path {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read config file {}", path.display()))?;
            PipelineConfig::from_json_str(&text)
                .with_context(|| format!("invalid config file {}", path.display()))?
        }
        None => PipelineConfig::default(),
    };

    if let Some(rate) = overrides.contamination_rate {
        config = config.with_contamination_rate(rate);
    }
    if let Some(seed) = overrides.random_seed {
        config = config.with_random_seed(seed);
    }
    if let Some(size) = overrides.min_sample_size {
        config = config.with_min_sample_size(size);
    }
    if let Some(ceiling) = overrides.categorical_cardinality_ceiling {
        config = config.with_categorical_cardinality_ceiling(ceiling);
    }

    config.validate()?;
    Ok(config)
}

/// Reads one upload, picking the decoder from the file extension.
///
/// `-` reads delimited text from standard input. Without an explicit
/// `delimiter`, `.tsv` files are split on tabs and everything else on commas.
pub fn read_table(path: &Path, delimiter: Option<u8>) -> insight_core::error::Result<RawTable> {
    if path == Path::new("-") {
        return read_csv(io::stdin().lock(), &csv_options(path, delimiter));
    }

    let format = UploadFormat::from_path(path)?;
    let file = File::open(path).map_err(|e| {
        InsightError::ingest(format!("failed to open {}: {e}", path.display()))
    })?;
    let reader = BufReader::new(file);
    match format {
        UploadFormat::Delimited => read_csv(reader, &csv_options(path, delimiter)),
        UploadFormat::Spreadsheet => read_spreadsheet(reader),
    }
}

fn csv_options(path: &Path, delimiter: Option<u8>) -> CsvOptions {
    let is_tsv = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("tsv"));
    let default = if is_tsv { b'\t' } else { b',' };
    CsvOptions::default().with_delimiter(delimiter.unwrap_or(default))
}

/// Parses a single-byte delimiter; `\t` and `tab` mean a tab.
pub fn parse_delimiter(value: &str) -> std::result::Result<u8, String> {
    match value {
        "\\t" | "tab" => Ok(b'\t'),
        _ if value.len() == 1 && value.is_ascii() => Ok(value.as_bytes()[0]),
        _ => Err(format!("delimiter must be a single ASCII character, got '{value}'")),
    }
}

/// Renders a batch of insights.
///
/// A single insight renders on its own; several render as a JSON array or
/// as consecutive console sections headed by their source.
pub fn render(
    reports: &[(String, Insight)],
    format: OutputFormat,
    pretty: bool,
    colors: bool,
) -> Result<String> {
    match format {
        OutputFormat::Json => {
            let formatter = JsonFormatter::new().with_pretty(pretty);
            if let [(_, insight)] = reports {
                return Ok(formatter.format(insight)?);
            }
            let batch: Vec<SourcedInsight<'_>> = reports
                .iter()
                .map(|(source, insight)| SourcedInsight { source, insight })
                .collect();
            let json = if pretty {
                serde_json::to_string_pretty(&batch)?
            } else {
                serde_json::to_string(&batch)?
            };
            Ok(json)
        }
        OutputFormat::Human => {
            let formatter =
                HumanFormatter::with_config(FormatterConfig::default().with_colors(colors));
            let mut output = String::new();
            for (source, insight) in reports {
                if reports.len() > 1 {
                    output.push_str(&format!("=== {source} ===\n"));
                }
                output.push_str(&formatter.format(insight)?);
            }
            Ok(output)
        }
    }
}

#[derive(Serialize)]
struct SourcedInsight<'a> {
    source: &'a str,
    insight: &'a Insight,
}

/// Machine-readable failure written in JSON mode.
#[derive(Debug, Serialize, PartialEq)]
pub struct ErrorReport {
    pub source: Option<String>,
    pub kind: &'static str,
    pub message: String,
}

impl ErrorReport {
    pub fn new(source: Option<&str>, err: &anyhow::Error) -> Self {
        let (kind, message) = match err.downcast_ref::<InsightError>() {
            Some(insight_err) => (error_kind(insight_err), insight_err.user_message()),
            None => ("io", format!("{err:#}")),
        };
        Self {
            source: source.map(str::to_string),
            kind,
            message,
        }
    }
}

fn error_kind(err: &InsightError) -> &'static str {
    match err {
        InsightError::Schema(_) => "schema",
        InsightError::Cleaning { .. } => "cleaning",
        InsightError::NoFeatures => "no_features",
        InsightError::Scoring { .. } => "scoring",
        InsightError::Ingest(_) => "ingest",
        InsightError::InvalidConfiguration(_) => "invalid_configuration",
        InsightError::Serialization(_) => "serialization",
        InsightError::CapacityExceeded { .. } => "capacity_exceeded",
        InsightError::Cancelled => "cancelled",
        InsightError::Internal(_) => "internal",
    }
}

/// Process exit code for a failure: 2 for problems with the uploaded data,
/// 1 for everything else.
pub fn exit_code(err: &anyhow::Error) -> i32 {
    match err.downcast_ref::<InsightError>() {
        Some(insight_err) if insight_err.is_user_facing() => 2,
        _ => 1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_temp(contents: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_load_config_defaults_without_file() {
        let config = load_config(None, &ConfigOverrides::default()).unwrap();
        assert_eq!(config, PipelineConfig::default());
    }

    #[test]
    fn test_load_config_file_then_overrides() {
        let file = write_temp(r#"{"contamination_rate": 0.2, "random_seed": 9}"#);
        let overrides = ConfigOverrides {
            random_seed: Some(77),
            ..Default::default()
        };
        let config = load_config(Some(file.path()), &overrides).unwrap();
        assert_eq!(config.contamination_rate, 0.2);
        assert_eq!(config.random_seed, 77);
    }

    #[test]
    fn test_load_config_rejects_invalid_override() {
        let overrides = ConfigOverrides {
            contamination_rate: Some(0.9),
            ..Default::default()
        };
        let err = load_config(None, &overrides).unwrap_err();
        assert_eq!(exit_code(&err), 1);
        assert!(matches!(
            err.downcast_ref::<InsightError>(),
            Some(InsightError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn test_load_config_missing_file() {
        let err = load_config(Some(Path::new("/nonexistent/insight.json")), &Default::default())
            .unwrap_err();
        assert!(format!("{err:#}").contains("failed to read config file"));
    }

    fn write_named(suffix: &str, contents: &[u8]) -> NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(suffix).tempfile().unwrap();
        file.write_all(contents).unwrap();
        file
    }

    #[test]
    fn test_read_table_with_semicolons() {
        let file = write_named(".csv", b"id;amount\na;1\nb;2\n");
        let table = read_table(file.path(), Some(b';')).unwrap();
        assert_eq!(table.column_count(), 2);
        assert_eq!(table.row_count(), 2);
    }

    #[test]
    fn test_read_table_tsv_defaults_to_tabs() {
        let file = write_named(".tsv", b"id\tamount\na\t1\n");
        let table = read_table(file.path(), None).unwrap();
        assert_eq!(table.columns(), &["id", "amount"]);
    }

    #[test]
    fn test_read_table_spreadsheet() {
        let mut workbook = rust_xlsxwriter::Workbook::new();
        let sheet = workbook.add_worksheet();
        sheet.write_string(0, 0, "region").unwrap();
        sheet.write_string(0, 1, "amount").unwrap();
        for row in 1..=3u32 {
            sheet.write_string(row, 0, "north").unwrap();
            sheet.write_number(row, 1, f64::from(row) * 10.0).unwrap();
        }
        let file = write_named(".xlsx", &workbook.save_to_buffer().unwrap());

        let table = read_table(file.path(), None).unwrap();
        assert_eq!(table.columns(), &["region", "amount"]);
        assert_eq!(table.row_count(), 3);
        assert_eq!(table.rows()[2][1], CellValue::Number(30.0));
    }

    #[test]
    fn test_read_table_rejects_unknown_extension() {
        let file = write_named(".pdf", b"%PDF-1.7");
        let err = read_table(file.path(), None).unwrap_err();
        assert!(matches!(&err, InsightError::Ingest(msg) if msg.contains(".pdf")));
        assert_eq!(exit_code(&anyhow::Error::new(err)), 2);
    }

    #[test]
    fn test_read_table_missing_file() {
        let err = read_table(Path::new("/nonexistent/upload.csv"), None).unwrap_err();
        assert!(matches!(&err, InsightError::Ingest(msg) if msg.contains("failed to open")));
    }

    #[test]
    fn test_parse_delimiter() {
        assert_eq!(parse_delimiter(","), Ok(b','));
        assert_eq!(parse_delimiter("tab"), Ok(b'\t'));
        assert_eq!(parse_delimiter("\\t"), Ok(b'\t'));
        assert!(parse_delimiter(";;").is_err());
    }

    #[test]
    fn test_user_facing_errors_exit_with_two() {
        let err = anyhow::Error::new(InsightError::NoFeatures);
        assert_eq!(exit_code(&err), 2);

        let report = ErrorReport::new(Some("upload.csv"), &err);
        assert_eq!(report.kind, "no_features");
        assert!(report.message.contains("nothing to score"));
    }

    #[test]
    fn test_render_batch_as_json_array() {
        let mut builder = RawTable::builder(["amount"]);
        for i in 0..15 {
            builder = builder.row([i as f64]);
        }
        let insight = InsightPipeline::new(PipelineConfig::default())
            .unwrap()
            .run(&builder.build().unwrap())
            .unwrap();
        let reports = vec![
            ("a.csv".to_string(), insight.clone()),
            ("b.csv".to_string(), insight),
        ];

        let json = render(&reports, OutputFormat::Json, false, false).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.as_array().unwrap().len(), 2);
        assert_eq!(parsed[1]["source"], "b.csv");

        let text = render(&reports, OutputFormat::Human, false, false).unwrap();
        assert!(text.contains("=== a.csv ==="));
        assert!(text.contains("Records: 15"));
    }
}
