//! Event dispatch to registered handlers
//!
//! One synchronous loop drains an [`EventSource`]; each event is delivered to
//! every matching handler, in registration order, before the next event is
//! read. A handler error is logged and counted against that handler only.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use tracing::{debug, error, info, warn};

use crate::error::{AnalysisError, Result};
use crate::event::Event;
use crate::sink::SinkReport;
use crate::source::{EventSource, SourceError};

/// A consumer of a subset of the event stream
pub trait EventHandler: fmt::Debug {
    /// Name used in logs and reports
    fn name(&self) -> &str;

    fn matches(&self, event: &Event) -> bool;

    fn handle(&mut self, event: &Event) -> Result<()>;

    /// Advisory sampling interval for push-style exporters
    fn polling_duration(&self) -> Option<Duration> {
        None
    }

    /// Emit deferred rows, then flush and publish the handler's output
    fn finish(self: Box<Self>) -> Result<SinkReport>;
}

/// Counters for one drain of a source
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunStats {
    pub events_read: u64,
    /// Events no handler matched
    pub unhandled: u64,
    /// Source records that could not be decoded
    pub malformed_records: u64,
}

/// Final state of one handler's output
#[derive(Debug)]
pub enum HandlerOutcome {
    Published(SinkReport),
    Failed(AnalysisError),
}

#[derive(Debug)]
pub struct HandlerReport {
    pub name: String,
    pub events: u64,
    /// Events whose handling returned an error
    pub failures: u64,
    /// Fatal errors raised while handling events
    pub fatal: u64,
    pub outcome: HandlerOutcome,
}

impl HandlerReport {
    pub fn rows(&self) -> u64 {
        match &self.outcome {
            HandlerOutcome::Published(report) => report.rows,
            HandlerOutcome::Failed(_) => 0,
        }
    }

    pub fn is_degraded(&self) -> bool {
        matches!(&self.outcome, HandlerOutcome::Published(r) if r.is_degraded())
    }

    pub fn published_path(&self) -> Option<&PathBuf> {
        match &self.outcome {
            HandlerOutcome::Published(report) => Some(&report.path),
            HandlerOutcome::Failed(_) => None,
        }
    }

    /// Output was published and no fatal error occurred
    pub fn succeeded(&self) -> bool {
        self.fatal == 0 && matches!(self.outcome, HandlerOutcome::Published(_))
    }
}

#[derive(Debug)]
pub struct RunSummary {
    pub stats: RunStats,
    pub handlers: Vec<HandlerReport>,
}

impl RunSummary {
    pub fn is_success(&self) -> bool {
        self.handlers.iter().all(HandlerReport::succeeded)
    }

    pub fn handler(&self, name: &str) -> Option<&HandlerReport> {
        self.handlers.iter().find(|h| h.name == name)
    }
}

#[derive(Debug)]
struct Registered {
    handler: Box<dyn EventHandler>,
    events: u64,
    failures: u64,
    fatal: u64,
}

#[derive(Debug, Default)]
pub struct Dispatcher {
    handlers: Vec<Registered>,
    stats: RunStats,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, handler: Box<dyn EventHandler>) {
        debug!(handler = handler.name(), "registered handler");
        self.handlers.push(Registered {
            handler,
            events: 0,
            failures: 0,
            fatal: 0,
        });
    }

    pub fn handler_count(&self) -> usize {
        self.handlers.len()
    }

    pub fn handler_names(&self) -> Vec<&str> {
        self.handlers.iter().map(|r| r.handler.name()).collect()
    }

    /// Deliver one event; returns how many handlers received it
    pub fn dispatch(&mut self, event: &Event) -> usize {
        let mut delivered = 0;
        for entry in &mut self.handlers {
            if !entry.handler.matches(event) {
                continue;
            }
            delivered += 1;
            entry.events += 1;
            if let Err(err) = entry.handler.handle(event) {
                entry.failures += 1;
                let handler = entry.handler.name();
                match &err {
                    AnalysisError::MalformedEvent { .. } => {
                        debug!(handler, event = %event.name, error = %err, "dropped event")
                    }
                    e if e.is_fatal() => {
                        entry.fatal += 1;
                        error!(handler, event = %event.name, error = %err, "handler failed")
                    }
                    _ => warn!(handler, event = %event.name, error = %err, "handler error"),
                }
            }
        }
        if delivered == 0 {
            self.stats.unhandled += 1;
        }
        delivered
    }

    /// Drain `source` until it is exhausted
    ///
    /// Undecodable records are skipped and counted.
    ///
    /// # Errors
    /// An I/O failure of the source ends the drain. Handlers keep their
    /// state, so [`Dispatcher::shutdown`] can still publish what was seen.
    pub fn run(&mut self, source: &mut dyn EventSource) -> std::result::Result<RunStats, SourceError> {
        while let Some(next) = source.next_event() {
            match next {
                Ok(event) => {
                    self.stats.events_read += 1;
                    self.dispatch(&event);
                }
                Err(err) if err.is_recoverable() => {
                    self.stats.malformed_records += 1;
                    debug!(error = %err, "skipping undecodable record");
                }
                Err(err) => return Err(err),
            }
        }
        Ok(self.stats)
    }

    pub fn stats(&self) -> RunStats {
        self.stats
    }

    /// Finish every handler and collect the outcome of each
    pub fn shutdown(self) -> RunSummary {
        let mut handlers = Vec::with_capacity(self.handlers.len());
        for entry in self.handlers {
            let name = entry.handler.name().to_string();
            let outcome = match entry.handler.finish() {
                Ok(report) => {
                    if report.is_degraded() {
                        warn!(
                            handler = %name,
                            path = %report.path.display(),
                            write_failures = report.write_failures,
                            "published degraded output"
                        );
                    } else {
                        info!(handler = %name, path = %report.path.display(), rows = report.rows, "published output");
                    }
                    HandlerOutcome::Published(report)
                }
                Err(err) => {
                    error!(handler = %name, error = %err, "failed to finish handler");
                    HandlerOutcome::Failed(err)
                }
            };
            handlers.push(HandlerReport {
                name,
                events: entry.events,
                failures: entry.failures,
                fatal: entry.fatal,
                outcome,
            });
        }
        RunSummary {
            stats: self.stats,
            handlers,
        }
    }
}
