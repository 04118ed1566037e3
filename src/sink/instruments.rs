//! Instrument emission sink
//!
//! Rather than keeping rows, every numeric column feeds an instrument that
//! tracks count, sum, min and max. Text and empty cells are skipped. On
//! finalize the instruments are logged and published as a JSON snapshot.

use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::{create_temp, publish, Cell, RecordSink, SinkError, SinkReport};

/// Running summary of one column
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Instrument {
    pub count: u64,
    pub sum: f64,
    pub min: Option<f64>,
    pub max: Option<f64>,
}

impl Instrument {
    pub fn record(&mut self, value: f64) {
        self.count += 1;
        self.sum += value;
        self.min = Some(self.min.map_or(value, |m| m.min(value)));
        self.max = Some(self.max.map_or(value, |m| m.max(value)));
    }

    pub fn mean(&self) -> Option<f64> {
        (self.count > 0).then(|| self.sum / self.count as f64)
    }
}

/// Published form of an instrument sink
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstrumentSnapshot {
    pub rows: u64,
    pub instruments: BTreeMap<String, Instrument>,
}

#[derive(Debug)]
pub struct InstrumentSink {
    header: Vec<String>,
    dir: PathBuf,
    target: PathBuf,
    instruments: BTreeMap<String, Instrument>,
    rows: u64,
}

impl InstrumentSink {
    pub fn new(dir: &Path, target: PathBuf, header: &[&str]) -> Self {
        Self {
            header: header.iter().map(|h| h.to_string()).collect(),
            dir: dir.to_path_buf(),
            target,
            instruments: BTreeMap::new(),
            rows: 0,
        }
    }

    pub fn instrument(&self, column: &str) -> Option<&Instrument> {
        self.instruments.get(column)
    }

    pub fn snapshot(&self) -> InstrumentSnapshot {
        InstrumentSnapshot {
            rows: self.rows,
            instruments: self.instruments.clone(),
        }
    }
}

impl RecordSink for InstrumentSink {
    fn header(&self) -> &[String] {
        &self.header
    }

    fn write_row(&mut self, row: &[Cell]) -> Result<(), SinkError> {
        if row.len() != self.header.len() {
            return Err(SinkError::Arity {
                expected: self.header.len(),
                got: row.len(),
            });
        }
        for (column, cell) in self.header.iter().zip(row) {
            if let Some(value) = cell.as_f64() {
                self.instruments
                    .entry(column.clone())
                    .or_default()
                    .record(value);
            }
        }
        self.rows += 1;
        Ok(())
    }

    fn rows_written(&self) -> u64 {
        self.rows
    }

    fn is_degraded(&self) -> bool {
        false
    }

    fn target(&self) -> &Path {
        &self.target
    }

    fn finalize(self: Box<Self>) -> Result<SinkReport, SinkError> {
        let snapshot = self.snapshot();
        for (name, inst) in &snapshot.instruments {
            tracing::info!(
                output = %self.target.display(),
                instrument = %name,
                count = inst.count,
                sum = inst.sum,
                min = ?inst.min,
                max = ?inst.max,
                "instrument"
            );
        }

        let (mut file, temp_path) = create_temp(&self.dir, &self.target)?;
        let finalize_err = |source| SinkError::Finalize {
            target: self.target.clone(),
            source,
        };
        serde_json::to_writer_pretty(&mut file, &snapshot)
            .map_err(|e| finalize_err(e.into()))?;
        file.write_all(b"\n").map_err(finalize_err)?;
        publish(file, &temp_path, &self.target)?;

        Ok(SinkReport {
            path: self.target.clone(),
            rows: self.rows,
            write_failures: 0,
        })
    }
}
