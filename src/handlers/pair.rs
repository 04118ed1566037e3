use std::fmt;
use std::marker::PhantomData;

use tracing::debug;

use super::{finalize, write_row};
use crate::correlator::{correlation_id, role_from_when, PairCorrelator};
use crate::dispatch::EventHandler;
use crate::error::Result;
use crate::event::Event;
use crate::sink::{Cell, RecordSink, SinkError, SinkFactory, SinkReport};

/// Output shape of a before/after pair handler
pub trait PairRow {
    const HANDLER: &'static str;
    const EVENT: &'static str;
    const PREFIX: &'static str;
    const COLUMNS: &'static [&'static str];

    /// Build one row from a completed pair
    fn row(before: &Event, after: &Event) -> Result<Vec<Cell>>;
}

/// Emits one row per completed before/after pair of `R::EVENT`
pub struct PairHandler<R> {
    correlator: PairCorrelator,
    sink: Box<dyn RecordSink>,
    _row: PhantomData<R>,
}

impl<R: PairRow> PairHandler<R> {
    pub fn new(sinks: &SinkFactory) -> std::result::Result<Self, SinkError> {
        Ok(Self::with_sink(sinks.open(R::PREFIX, R::COLUMNS)?))
    }

    /// Write rows to an already opened sink
    pub fn with_sink(sink: Box<dyn RecordSink>) -> Self {
        Self {
            correlator: PairCorrelator::new(),
            sink,
            _row: PhantomData,
        }
    }

    pub fn pending(&self) -> usize {
        self.correlator.pending_len()
    }
}

impl<R> fmt::Debug for PairHandler<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PairHandler")
            .field("correlator", &self.correlator)
            .field("sink", &self.sink)
            .finish()
    }
}

impl<R: PairRow> EventHandler for PairHandler<R> {
    fn name(&self) -> &str {
        R::HANDLER
    }

    fn matches(&self, event: &Event) -> bool {
        event.name == R::EVENT
    }

    fn handle(&mut self, event: &Event) -> Result<()> {
        let Some(pair) = self
            .correlator
            .correlate(event, correlation_id, role_from_when)?
        else {
            return Ok(());
        };
        let row = R::row(&pair.before, &pair.after)?;
        write_row(R::HANDLER, self.sink.as_mut(), &row)
    }

    fn finish(mut self: Box<Self>) -> Result<SinkReport> {
        let unpaired = self.correlator.drain_unpaired();
        if !unpaired.is_empty() {
            debug!(
                handler = R::HANDLER,
                unpaired = unpaired.len(),
                duplicates = self.correlator.duplicates(),
                "discarding unpaired events"
            );
        }
        finalize(R::HANDLER, self.sink)
    }
}
