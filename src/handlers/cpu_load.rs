use std::time::Duration;

use tracing::warn;

use super::{finalize, write_row};
use crate::dispatch::EventHandler;
use crate::error::{AnalysisError, Result};
use crate::event::{names, Event, Timestamp};
use crate::sink::{Cell, RecordSink, SinkError, SinkFactory, SinkReport};

const HANDLER: &str = "cpu_load";
const COLUMNS: &[&str] = &["timestamp", "user", "system", "total"];

/// Fields of one `jdk.CPULoad` sample
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CpuLoadSample {
    pub timestamp: Timestamp,
    pub user: f64,
    pub system: f64,
    pub total: f64,
}

impl CpuLoadSample {
    pub fn extract(event: &Event) -> Result<Self> {
        let fields = &event.fields;
        let wrap = |e| AnalysisError::malformed(&event.name, e);
        Ok(Self {
            timestamp: event.timestamp,
            user: fields.get_f64("jvmUser").map_err(wrap)?,
            system: fields.get_f64("jvmSystem").map_err(wrap)?,
            total: fields.get_f64("machineTotal").map_err(wrap)?,
        })
    }

    fn row(&self) -> [Cell; 4] {
        [
            Cell::from(self.timestamp.as_millis()),
            Cell::from(self.user),
            Cell::from(self.system),
            Cell::from(self.total),
        ]
    }
}

/// One row per CPU load sample
#[derive(Debug)]
pub struct CpuLoadHandler {
    sink: Box<dyn RecordSink>,
    last: Option<Timestamp>,
    backwards: u64,
}

impl CpuLoadHandler {
    pub fn new(sinks: &SinkFactory) -> std::result::Result<Self, SinkError> {
        Ok(Self {
            sink: sinks.open("cpu_", COLUMNS)?,
            last: None,
            backwards: 0,
        })
    }

    /// Samples whose timestamp preceded the previous sample
    pub fn backwards(&self) -> u64 {
        self.backwards
    }
}

impl EventHandler for CpuLoadHandler {
    fn name(&self) -> &str {
        HANDLER
    }

    fn matches(&self, event: &Event) -> bool {
        event.name == names::CPU_LOAD
    }

    fn handle(&mut self, event: &Event) -> Result<()> {
        let sample = CpuLoadSample::extract(event)?;
        if let Some(last) = self.last {
            if sample.timestamp < last {
                self.backwards += 1;
                warn!(
                    previous = %last,
                    current = %sample.timestamp,
                    "CPU load timestamp went backwards"
                );
            }
        }
        self.last = Some(sample.timestamp);
        write_row(HANDLER, self.sink.as_mut(), &sample.row())
    }

    fn polling_duration(&self) -> Option<Duration> {
        Some(Duration::from_secs(1))
    }

    fn finish(self: Box<Self>) -> Result<SinkReport> {
        finalize(HANDLER, self.sink)
    }
}
