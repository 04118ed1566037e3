use std::fs::File;
use std::io::BufReader;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use gclens::cli::Cli;
use gclens::config::AnalysisConfig;
use gclens::dispatch::{HandlerOutcome, RunSummary};
use gclens::registry::{basename_for, HandlerRegistry};
use gclens::source::JsonLinesSource;
use tracing_subscriber::EnvFilter;

/// Initialize tracing subscriber; `--debug` forces TRACE
fn init_tracing(debug: bool) {
    let filter = if debug {
        EnvFilter::from_default_env().add_directive(tracing::Level::TRACE.into())
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(args: &Cli) -> Result<AnalysisConfig> {
    let mut config = match &args.config {
        Some(path) => AnalysisConfig::from_toml_file(path)?,
        None => AnalysisConfig::default(),
    };
    args.apply_overrides(&mut config);
    config.validate().map_err(anyhow::Error::msg)?;
    Ok(config)
}

fn print_summary(summary: &RunSummary) {
    println!(
        "events: {} read, {} unhandled, {} undecodable",
        summary.stats.events_read, summary.stats.unhandled, summary.stats.malformed_records
    );
    for handler in &summary.handlers {
        match &handler.outcome {
            HandlerOutcome::Published(report) => println!(
                "{:<24} {:>8} events {:>8} rows {:>6} failures  {}{}",
                handler.name,
                handler.events,
                report.rows,
                handler.failures,
                report.path.display(),
                if report.is_degraded() { "  (degraded)" } else { "" }
            ),
            HandlerOutcome::Failed(err) => {
                println!("{:<24} {:>8} events  FAILED: {}", handler.name, handler.events, err)
            }
        }
    }
}

fn run(args: &Cli) -> Result<bool> {
    let config = load_config(args)?;
    let basename = basename_for(&args.events);
    let file = File::open(&args.events)
        .with_context(|| format!("Failed to open events file: {}", args.events.display()))?;
    let mut source = JsonLinesSource::new(BufReader::new(file));

    let mut dispatcher = HandlerRegistry::create_default(&config, &basename)?.into_dispatcher();
    let drained = dispatcher.run(&mut source);
    let summary = dispatcher.shutdown();
    print_summary(&summary);

    drained.with_context(|| format!("Failed reading {}", args.events.display()))?;
    Ok(summary.is_success())
}

fn main() -> ExitCode {
    let args = Cli::parse();
    init_tracing(args.debug);

    match run(&args) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => {
            tracing::error!("one or more handlers failed to publish their output");
            ExitCode::FAILURE
        }
        Err(err) => {
            eprintln!("Error: {:#}", err);
            ExitCode::FAILURE
        }
    }
}
