//! Workload Profiler - daily K-Means profiling of server workload telemetry
//!
//! Runs the full pipeline once, a single stage over a stdin/stdout text
//! channel, or as a long-lived daily scheduler with health and metrics
//! endpoints.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use output::OutputFormat;
use profiler_lib::config::validate_model_filename;
use profiler_lib::stages::{Loader, Predictor, Preprocessor, Trainer};
use profiler_lib::{new_run_id, synth, CancelToken, Pipeline, SseCurve, StructuredLogger};
use std::io::Read;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod api;
mod config;
mod output;
mod schedule;

const PROFILER_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Server workload profiler
#[derive(Parser)]
#[command(name = "workload-profiler")]
#[command(author, version, about = "Daily K-Means profiling of server workload telemetry", long_about = None)]
pub struct Cli {
    /// Configuration file (TOML, YAML or JSON)
    #[arg(long, short, env = "PROFILER_CONFIG")]
    pub config: Option<PathBuf>,

    /// Pipeline root; overrides `pipeline.root_dir`
    #[arg(long, env = "PROFILER_ROOT")]
    pub root: Option<PathBuf>,

    /// Output format
    #[arg(long, short, default_value = "table")]
    pub format: OutputFormat,

    /// Log line format (logs go to stderr)
    #[arg(long, default_value = "json")]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub enum LogFormat {
    #[default]
    Json,
    Pretty,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run every stage once
    Run {
        /// Run identifier (defaults to a timestamp)
        #[arg(long)]
        run_id: Option<String>,
    },

    /// Run a single stage; artifacts are exchanged over stdin/stdout
    #[command(subcommand)]
    Stage(StageCommands),

    /// Write synthetic training and test CSVs
    Generate {
        /// Seed for the workload generator
        #[arg(long, default_value_t = 42)]
        seed: u64,
    },

    /// Run the pipeline daily and serve /healthz and /metrics
    Schedule,
}

#[derive(Subcommand)]
pub enum StageCommands {
    /// Read the training CSV and print the encoded table
    Load,

    /// Read an encoded table from stdin and print the encoded scaled matrix
    Preprocess,

    /// Read an encoded matrix from stdin, persist the model, print the SSE curve as JSON
    Train {
        /// Model file name inside the model directory
        #[arg(long)]
        model_filename: Option<String>,
    },

    /// Read the SSE curve JSON from stdin and print the first workload's cluster
    Predict {
        /// Model file name inside the model directory
        #[arg(long)]
        model_filename: Option<String>,
    },
}

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);
    match format {
        LogFormat::Json => registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init(),
        LogFormat::Pretty => registry
            .with(fmt::layer().with_writer(std::io::stderr))
            .init(),
    }
}

fn read_stdin() -> Result<String> {
    let mut input = String::new();
    std::io::stdin()
        .read_to_string(&mut input)
        .context("Failed to read stage input from stdin")?;
    Ok(input.trim().to_string())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_format);

    let mut config = config::ProfilerConfig::load(cli.config.as_deref())?;
    if let Some(root) = &cli.root {
        config.pipeline.root_dir = root.clone();
    }

    match cli.command {
        Commands::Run { run_id } => run_pipeline(config, run_id, cli.format).await,
        Commands::Stage(stage) => run_stage(&config, stage),
        Commands::Generate { seed } => {
            let pipeline = &config.pipeline;
            let rows = synth::write_fixtures(&pipeline.training_csv(), &pipeline.test_csv(), seed)?;
            output::print_success(&format!(
                "Wrote {} training rows to {} and {} test rows to {}",
                rows,
                pipeline.training_csv().display(),
                synth::TEST_BATCH.len(),
                pipeline.test_csv().display()
            ));
            Ok(())
        }
        Commands::Schedule => run_scheduler(config).await,
    }
}

async fn run_pipeline(
    config: config::ProfilerConfig,
    run_id: Option<String>,
    format: OutputFormat,
) -> Result<()> {
    let pipeline = Pipeline::with_fs_store(config.pipeline)?;
    let run_id = run_id.unwrap_or_else(new_run_id);

    let cancel = CancelToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_signal.cancel();
        }
    });

    let summary = tokio::task::spawn_blocking(move || pipeline.run(&run_id, &cancel))
        .await
        .context("Pipeline task panicked")??;
    output::print_summary(&summary, format);
    Ok(())
}

fn run_stage(config: &config::ProfilerConfig, stage: StageCommands) -> Result<()> {
    let pipeline = &config.pipeline;
    pipeline.validate()?;
    let logger = StructuredLogger::new(new_run_id());

    let model_path = |filename: Option<String>| -> Result<PathBuf> {
        let filename = filename.unwrap_or_else(|| pipeline.model_filename.clone());
        validate_model_filename(&filename)?;
        Ok(pipeline.model_path(&filename))
    };

    match stage {
        StageCommands::Load => {
            println!("{}", Loader::new(pipeline.training_csv()).run(&logger)?);
        }
        StageCommands::Preprocess => {
            println!("{}", Preprocessor::new().run(&read_stdin()?, &logger)?);
        }
        StageCommands::Train { model_filename } => {
            let path = model_path(model_filename)?;
            let sse = Trainer::from_config(pipeline).run(&read_stdin()?, &path, &logger)?;
            println!("{}", serde_json::to_string(&sse)?);
        }
        StageCommands::Predict { model_filename } => {
            let path = model_path(model_filename)?;
            let sse: SseCurve =
                serde_json::from_str(&read_stdin()?).context("Stage input is not an SSE curve")?;
            println!("{}", Predictor::from_config(pipeline).run(&path, &sse, &logger)?);
        }
    }
    Ok(())
}

async fn run_scheduler(config: config::ProfilerConfig) -> Result<()> {
    info!(version = PROFILER_VERSION, "Starting workload-profiler scheduler");

    let state = Arc::new(api::AppState::new());
    let api_handle = tokio::spawn(api::serve(config.service.api_port, Arc::clone(&state)));

    let cancel = CancelToken::new();
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("SIGINT received, stopping at the next stage boundary");
            on_signal.cancel();
            let _ = shutdown_tx.send(true);
        }
    });

    let result = schedule::run(config, state, cancel, shutdown_rx).await;
    api_handle.abort();
    info!("Shutting down");
    result
}
