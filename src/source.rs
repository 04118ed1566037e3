//! Event sources
//!
//! Decoding of the recording format happens outside the engine. The bundled
//! [`JsonLinesSource`] reads one JSON event per line:
//!
//! ```text
//! {"name":"jdk.CPULoad","timestamp":1700000000000000000,"fields":{"jvmUser":0.25}}
//! ```

use std::io::{self, BufRead};

use thiserror::Error;

use crate::event::Event;

/// Errors raised while pulling events
#[derive(Error, Debug)]
pub enum SourceError {
    /// Underlying reader failed; the source cannot continue
    #[error("failed to read events: {0}")]
    Io(#[from] io::Error),

    /// One record could not be decoded; later records may still be fine
    #[error("line {line}: {reason}")]
    Malformed { line: u64, reason: String },
}

impl SourceError {
    /// Whether the drain loop can keep pulling after this error
    pub fn is_recoverable(&self) -> bool {
        matches!(self, SourceError::Malformed { .. })
    }
}

/// Pull-based, finite stream of decoded events
pub trait EventSource {
    /// Next event, `None` once the stream is exhausted
    fn next_event(&mut self) -> Option<Result<Event, SourceError>>;
}

impl EventSource for std::vec::IntoIter<Event> {
    fn next_event(&mut self) -> Option<Result<Event, SourceError>> {
        self.next().map(Ok)
    }
}

/// Decode a single JSON line into an event
///
/// A missing `correlation_id` falls back to an integer `fields.gcId`.
pub fn parse_event_line(line: &str) -> Result<Event, serde_json::Error> {
    let mut event: Event = serde_json::from_str(line)?;
    if event.correlation_id.is_none() {
        event.correlation_id = event.fields.get_i64("gcId").ok();
    }
    Ok(event)
}

#[derive(Debug)]
pub struct JsonLinesSource<R> {
    reader: R,
    line: u64,
    buf: String,
}

impl<R: BufRead> JsonLinesSource<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            line: 0,
            buf: String::new(),
        }
    }

    /// Number of lines consumed so far
    pub fn lines_read(&self) -> u64 {
        self.line
    }
}

impl<R: BufRead> EventSource for JsonLinesSource<R> {
    fn next_event(&mut self) -> Option<Result<Event, SourceError>> {
        loop {
            self.buf.clear();
            match self.reader.read_line(&mut self.buf) {
                Ok(0) => return None,
                Ok(_) => {}
                Err(e) => return Some(Err(SourceError::Io(e))),
            }
            self.line += 1;

            let trimmed = self.buf.trim();
            if trimmed.is_empty() {
                continue;
            }
            return Some(parse_event_line(trimmed).map_err(|e| SourceError::Malformed {
                line: self.line,
                reason: e.to_string(),
            }));
        }
    }
}
