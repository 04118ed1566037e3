//! CLI argument parsing for gclens

use std::path::PathBuf;

use clap::Parser;

use crate::config::AnalysisConfig;
use crate::sink::SinkKind;

#[derive(Parser, Debug)]
#[command(name = "gclens")]
#[command(version)]
#[command(
    about = "Correlate JVM flight-recorder GC events into per-collection summaries",
    long_about = None
)]
pub struct Cli {
    /// TOML configuration file
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Directory for published output (overrides the config file)
    #[arg(short, long = "output-dir", value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// Output sink (overrides the config file)
    #[arg(long, value_enum)]
    pub sink: Option<SinkKind>,

    /// Enable debug tracing output to stderr
    #[arg(long)]
    pub debug: bool,

    /// Decoded events, one JSON object per line
    #[arg(value_name = "EVENTS")]
    pub events: PathBuf,
}

impl Cli {
    /// Apply command-line overrides on top of a loaded config
    pub fn apply_overrides(&self, config: &mut AnalysisConfig) {
        if let Some(dir) = &self.output_dir {
            config.output_dir = dir.clone();
        }
        if let Some(sink) = self.sink {
            config.sink = sink;
        }
    }
}
