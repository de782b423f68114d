//! `insight` - turn CSV and spreadsheet uploads into anomaly insight reports.

use std::path::PathBuf;
use std::process;

use anyhow::Result;
use clap::{Parser, Subcommand};
use insight_cli::{
    exit_code, load_config, parse_delimiter, read_table, render, ConfigOverrides, ErrorReport,
    OutputFormat,
};
use insight_core::logging::setup::{init_logging, LoggingConfig};
use insight_core::prelude::*;
use tokio::sync::watch;
use tracing::{error, info, Level};

#[derive(Parser, Debug)]
#[command(name = "insight", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Log level for stderr diagnostics
    #[arg(long, global = true, default_value = "warn")]
    log_level: Level,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Analyze CSV, TSV or spreadsheet files (`-` reads CSV from stdin)
    Analyze {
        #[arg(required = true)]
        files: Vec<PathBuf>,

        #[command(flatten)]
        settings: Settings,

        /// Field delimiter for delimited files (`tab` for tabs; default: tab
        /// for `.tsv`, comma otherwise)
        #[arg(long, value_parser = parse_delimiter)]
        delimiter: Option<u8>,

        #[arg(long, value_enum, default_value = "json")]
        format: OutputFormat,

        /// Indent JSON output
        #[arg(long)]
        pretty: bool,

        /// Colorize console output
        #[arg(long)]
        color: bool,

        /// Maximum number of files analyzed at once
        #[arg(long)]
        jobs: Option<usize>,
    },
    /// Print the effective configuration as JSON
    Config {
        #[command(flatten)]
        settings: Settings,
    },
}

#[derive(clap::Args, Debug)]
struct Settings {
    /// JSON configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    #[arg(long)]
    contamination: Option<f64>,

    #[arg(long)]
    seed: Option<u64>,

    #[arg(long)]
    min_sample_size: Option<usize>,

    #[arg(long)]
    cardinality_ceiling: Option<usize>,
}

impl Settings {
    fn load(&self) -> Result<PipelineConfig> {
        let overrides = ConfigOverrides {
            contamination_rate: self.contamination,
            random_seed: self.seed,
            min_sample_size: self.min_sample_size,
            categorical_cardinality_ceiling: self.cardinality_ceiling,
        };
        load_config(self.config.as_deref(), &overrides)
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let logging = LoggingConfig::default()
        .with_level(cli.log_level)
        .with_core_level(cli.log_level)
        .with_json_format(cli.log_json);
    if let Err(e) = init_logging(logging) {
        eprintln!("warning: failed to initialize logging: {e}");
    }

    let code = match cli.command {
        Command::Config { settings } => match settings.load().and_then(|config| {
            Ok(serde_json::to_string_pretty(&config)?)
        }) {
            Ok(json) => {
                println!("{json}");
                0
            }
            Err(err) => report_failure(None, &err, OutputFormat::Human),
        },
        Command::Analyze {
            files,
            settings,
            delimiter,
            format,
            pretty,
            color,
            jobs,
        } => {
            let output = Output {
                format,
                pretty,
                color,
            };
            analyze(files, &settings, delimiter, output, jobs, cli.log_level).await
        }
    };

    process::exit(code);
}

struct Output {
    format: OutputFormat,
    pretty: bool,
    color: bool,
}

async fn analyze(
    files: Vec<PathBuf>,
    settings: &Settings,
    delimiter: Option<u8>,
    output: Output,
    jobs: Option<usize>,
    log_level: Level,
) -> i32 {
    let format = output.format;
    let executor = match settings.load().and_then(|config| {
        let mut executor_config = ExecutorConfig::default();
        if let Some(jobs) = jobs {
            executor_config = executor_config.with_max_concurrent_runs(jobs);
        }
        let pipeline =
            InsightPipeline::new(config)?.with_log_config(LogConfig::for_level(log_level));
        Ok(PipelineExecutor::new(pipeline, executor_config)?)
    }) {
        Ok(executor) => executor,
        Err(err) => return report_failure(None, &err, format),
    };

    // Ctrl-C abandons every run still queued or in flight
    let (cancel_tx, cancel_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            let _ = cancel_tx.send(true);
        }
    });

    let handles: Vec<_> = files
        .into_iter()
        .map(|path| {
            let executor = executor.clone();
            let cancel = cancel_rx.clone();
            tokio::spawn(async move {
                let source = path.display().to_string();
                // Decoding waits for an executor slot, so `--jobs` also bounds
                // how many uploads sit in memory
                let result = executor
                    .submit_deferred(move || read_table(&path, delimiter), cancel)
                    .await
                    .map_err(anyhow::Error::from);
                (source, result)
            })
        })
        .collect();

    let mut reports = Vec::new();
    let mut code = 0;
    for handle in handles {
        let (source, result) = match handle.await {
            Ok(outcome) => outcome,
            Err(join_err) => {
                error!(error = %join_err, "Analysis task failed");
                code = code.max(1);
                continue;
            }
        };
        match result {
            Ok(insight) => {
                info!(
                    source = %source,
                    records = insight.total_records,
                    anomalies = insight.total_anomalies,
                    health = %insight.health_status,
                    "Analyzed file"
                );
                reports.push((source, insight));
            }
            Err(err) => code = code.max(report_failure(Some(&source), &err, format)),
        }
    }

    if !reports.is_empty() {
        match render(&reports, format, output.pretty, output.color) {
            Ok(output) => println!("{}", output.trim_end()),
            Err(err) => code = code.max(report_failure(None, &err, format)),
        }
    }

    let stats = executor.stats();
    info!(
        submitted = stats.submitted,
        completed = stats.completed,
        failed = stats.failed,
        cancelled = stats.cancelled,
        "Finished"
    );

    code
}

fn report_failure(source: Option<&str>, err: &anyhow::Error, format: OutputFormat) -> i32 {
    let report = ErrorReport::new(source, err);
    match format {
        OutputFormat::Json => match serde_json::to_string(&report) {
            Ok(json) => eprintln!("{json}"),
            Err(_) => eprintln!("error: {}", report.message),
        },
        OutputFormat::Human => match source {
            Some(source) => eprintln!("error: {source}: {}", report.message),
            None => eprintln!("error: {}", report.message),
        },
    }
    exit_code(err)
}
