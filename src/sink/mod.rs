//! Output sinks for handler rows
//!
//! Every handler writes its rows through one [`RecordSink`]. Two
//! implementations exist, selected by configuration:
//! - [`CsvFileSink`]: one CSV line per row
//! - [`InstrumentSink`]: folds numeric columns into count/sum/min/max
//!   instruments and emits a JSON snapshot
//!
//! Both publish atomically: content is written under a temporary name in the
//! output directory and renamed into place only on [`RecordSink::finalize`].
//! A run that dies before finalize leaves the temporary file and never a
//! truncated file under the final name.

mod csv;
mod instruments;

pub use csv::CsvFileSink;
pub use instruments::{Instrument, InstrumentSink, InstrumentSnapshot};

use std::fmt;
use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised by sinks
#[derive(Error, Debug)]
pub enum SinkError {
    #[error("failed to open output in {}: {source}", dir.display())]
    Open {
        dir: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to write row: {0}")]
    Write(#[source] io::Error),

    #[error("row has {got} cells but the header has {expected}")]
    Arity { expected: usize, got: usize },

    #[error("failed to publish {}: {source}", target.display())]
    Finalize {
        target: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Sink implementation selector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum SinkKind {
    /// One CSV file per handler
    #[default]
    Csv,
    /// Aggregated instruments, published as a JSON snapshot
    Instruments,
}

/// A single output value
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Empty,
    Int(i64),
    UInt(u64),
    Float(f64),
    Text(String),
}

impl Cell {
    /// Numeric view used by instruments; text and empty cells have none
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Cell::Int(v) => Some(*v as f64),
            Cell::UInt(v) => Some(*v as f64),
            Cell::Float(v) => Some(*v),
            Cell::Empty | Cell::Text(_) => None,
        }
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Empty => Ok(()),
            Cell::Int(v) => write!(f, "{}", v),
            Cell::UInt(v) => write!(f, "{}", v),
            Cell::Float(v) => write!(f, "{:.6}", v),
            Cell::Text(v) => f.write_str(v),
        }
    }
}

impl From<i64> for Cell {
    fn from(v: i64) -> Self {
        Cell::Int(v)
    }
}

impl From<u64> for Cell {
    fn from(v: u64) -> Self {
        Cell::UInt(v)
    }
}

impl From<f64> for Cell {
    fn from(v: f64) -> Self {
        Cell::Float(v)
    }
}

impl From<&str> for Cell {
    fn from(v: &str) -> Self {
        Cell::Text(v.to_string())
    }
}

impl From<String> for Cell {
    fn from(v: String) -> Self {
        Cell::Text(v)
    }
}

impl<T: Into<Cell>> From<Option<T>> for Cell {
    fn from(v: Option<T>) -> Self {
        v.map_or(Cell::Empty, Into::into)
    }
}

/// Outcome of a successful finalize
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SinkReport {
    /// Final, published location
    pub path: PathBuf,
    pub rows: u64,
    pub write_failures: u64,
}

impl SinkReport {
    /// At least one row could not be written
    pub fn is_degraded(&self) -> bool {
        self.write_failures > 0
    }
}

/// Append-only row writer owned by exactly one handler
pub trait RecordSink: fmt::Debug {
    /// Column names, written once at open
    fn header(&self) -> &[String];

    /// Append one row
    ///
    /// # Errors
    /// A failed write marks the sink degraded; later rows are still attempted.
    fn write_row(&mut self, row: &[Cell]) -> Result<(), SinkError>;

    fn rows_written(&self) -> u64;

    fn is_degraded(&self) -> bool;

    /// Where the artifact will be published
    fn target(&self) -> &Path;

    /// Flush, close and publish under the final name
    fn finalize(self: Box<Self>) -> Result<SinkReport, SinkError>;
}

/// Opens sinks of one kind for every handler of a run
#[derive(Debug, Clone)]
pub struct SinkFactory {
    kind: SinkKind,
    output_dir: PathBuf,
    basename: String,
}

impl SinkFactory {
    pub fn new(kind: SinkKind, output_dir: impl Into<PathBuf>, basename: impl Into<String>) -> Self {
        Self {
            kind,
            output_dir: output_dir.into(),
            basename: basename.into(),
        }
    }

    pub fn kind(&self) -> SinkKind {
        self.kind
    }

    /// Final artifact path for a handler prefix
    pub fn target_for(&self, prefix: &str) -> PathBuf {
        let extension = match self.kind {
            SinkKind::Csv => "csv",
            SinkKind::Instruments => "json",
        };
        self.output_dir
            .join(format!("{}{}.{}", prefix, self.basename, extension))
    }

    pub fn open(&self, prefix: &str, header: &[&str]) -> Result<Box<dyn RecordSink>, SinkError> {
        let target = self.target_for(prefix);
        Ok(match self.kind {
            SinkKind::Csv => Box::new(CsvFileSink::create(&self.output_dir, target, header)?),
            SinkKind::Instruments => Box::new(InstrumentSink::new(&self.output_dir, target, header)),
        })
    }
}

/// Create a uniquely named file next to `target` that survives drop
///
/// Only [`publish`] moves it to its final name.
fn create_temp(dir: &Path, target: &Path) -> Result<(File, PathBuf), SinkError> {
    let stem = target
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let open_err = |source| SinkError::Open {
        dir: dir.to_path_buf(),
        source,
    };
    let named = tempfile::Builder::new()
        .prefix(&format!(".{}.", stem))
        .suffix(".tmp")
        .tempfile_in(dir)
        .map_err(open_err)?;
    named.keep().map_err(|e| open_err(e.error))
}

/// Sync the closed temporary file and rename it over `target`
fn publish(file: File, temp_path: &Path, target: &Path) -> Result<(), SinkError> {
    let finalize_err = |source| SinkError::Finalize {
        target: target.to_path_buf(),
        source,
    };
    file.sync_all().map_err(finalize_err)?;
    drop(file);
    std::fs::rename(temp_path, target).map_err(finalize_err)
}
