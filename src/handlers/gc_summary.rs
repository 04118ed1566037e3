//! Per-collection summary with estimated CPU cost
//!
//! Four event kinds feed one record per collection:
//! - `jdk.GCConfiguration`: collector setup, loaded once
//! - `jdk.GCHeapSummary` pairs: wall-clock elapsed time and heap after
//! - `jdk.GCPhaseParallel`: summed into the accumulated phase time
//! - `jdk.GarbageCollection`: collector name and pause totals
//!
//! Rows are written at end of stream in ascending `gcId` order.

use tracing::{debug, info, warn};

use super::{finalize, write_row};
use crate::accumulator::PhaseAccumulator;
use crate::config::MissingConfigPolicy;
use crate::correlator::{correlation_id, role_from_when, PairCorrelator};
use crate::dispatch::EventHandler;
use crate::error::{AnalysisError, Result};
use crate::estimator::estimate_cpu_ns;
use crate::event::{names, Event};
use crate::gc_config::GcConfig;
use crate::record::{CollectionRecord, CollectionSummary};
use crate::sink::{Cell, RecordSink, SinkError, SinkFactory, SinkReport};

const HANDLER: &str = "gc_summary";
const COLUMNS: &[&str] = &[
    "timestamp",
    "gcId",
    "name",
    "elapsedMs",
    "cpuUsedMs",
    "totalPauseMs",
    "longestPauseMs",
    "accumulatedPhaseNs",
    "heapUsedAfter",
    "committedAfter",
];

const NS_PER_MS: u64 = 1_000_000;

#[derive(Debug)]
pub struct GcSummaryHandler {
    policy: MissingConfigPolicy,
    config: Option<GcConfig>,
    correlator: PairCorrelator,
    accumulator: PhaseAccumulator,
    sink: Box<dyn RecordSink>,
}

impl GcSummaryHandler {
    pub fn new(sinks: &SinkFactory, policy: MissingConfigPolicy) -> std::result::Result<Self, SinkError> {
        Ok(Self {
            policy,
            config: None,
            correlator: PairCorrelator::new(),
            accumulator: PhaseAccumulator::new(),
            sink: sinks.open("gcsum_", COLUMNS)?,
        })
    }

    pub fn gc_config(&self) -> Option<&GcConfig> {
        self.config.as_ref()
    }

    pub fn accumulator(&self) -> &PhaseAccumulator {
        &self.accumulator
    }

    fn load_config(&mut self, event: &Event) -> Result<()> {
        if self.config.is_some() {
            debug!("ignoring repeated GC configuration");
            return Ok(());
        }
        let config = GcConfig::from_event(event)?;
        info!(
            young = %config.young_collector,
            old = %config.old_collector,
            stw_threads = config.stw_thread_count,
            concurrent_threads = config.concurrent_thread_count,
            "loaded GC configuration"
        );
        self.config = Some(config);
        Ok(())
    }

    fn require_id(event: &Event) -> Result<i64> {
        correlation_id(event).ok_or_else(|| AnalysisError::MalformedEvent {
            event: event.name.clone(),
            reason: "no correlation id".to_string(),
        })
    }

    /// CPU estimate in milliseconds, or why there is none
    fn cpu_cell(&self, record: &CollectionRecord) -> Cell {
        let Some(config) = &self.config else {
            return Cell::Empty;
        };
        match estimate_cpu_ns(record, config) {
            Ok(ns) => Cell::from(ns / NS_PER_MS as i64),
            Err(err) => {
                debug!(gc_id = record.correlation_id, error = %err, "no CPU estimate");
                Cell::Empty
            }
        }
    }

    fn row(&self, record: &CollectionRecord) -> Vec<Cell> {
        vec![
            Cell::from(record.start_time().map(|t| t.as_millis())),
            Cell::from(record.correlation_id),
            Cell::from(record.name()),
            Cell::from(record.stw_duration_ms()),
            self.cpu_cell(record),
            Cell::from(record.total_pause_ns().map(|ns| ns / NS_PER_MS)),
            Cell::from(record.longest_pause_ns().map(|ns| ns / NS_PER_MS)),
            Cell::from(record.accumulated_phase_ns),
            Cell::from(record.heap_used_after()),
            Cell::from(record.committed_after()),
        ]
    }
}

impl EventHandler for GcSummaryHandler {
    fn name(&self) -> &str {
        HANDLER
    }

    fn matches(&self, event: &Event) -> bool {
        matches!(
            event.name.as_str(),
            names::GC_CONFIGURATION
                | names::GC_HEAP_SUMMARY
                | names::GC_PHASE_PARALLEL
                | names::GARBAGE_COLLECTION
        )
    }

    fn handle(&mut self, event: &Event) -> Result<()> {
        match event.name.as_str() {
            names::GC_CONFIGURATION => self.load_config(event),
            names::GC_HEAP_SUMMARY => {
                if let Some(pair) = self
                    .correlator
                    .correlate(event, correlation_id, role_from_when)?
                {
                    self.accumulator
                        .merge_baseline(pair.id, &pair.before, &pair.after)?;
                }
                Ok(())
            }
            names::GC_PHASE_PARALLEL => {
                let id = Self::require_id(event)?;
                let duration = event
                    .fields
                    .get_duration_ns("duration")
                    .map_err(|e| AnalysisError::malformed(&event.name, e))?;
                self.accumulator.add_phase(id, duration);
                Ok(())
            }
            names::GARBAGE_COLLECTION => {
                let id = Self::require_id(event)?;
                self.accumulator
                    .merge_summary(id, CollectionSummary::extract(event)?);
                Ok(())
            }
            _ => Ok(()),
        }
    }

    fn finish(mut self: Box<Self>) -> Result<SinkReport> {
        let unpaired = self.correlator.drain_unpaired();
        let records = self.accumulator.drain();

        if self.config.is_none() && !records.is_empty() {
            match self.policy {
                MissingConfigPolicy::Fail => return Err(AnalysisError::ConfigUnavailable),
                MissingConfigPolicy::Omit => {
                    warn!(records = records.len(), "no GC configuration seen, omitting CPU estimates")
                }
            }
        }

        let partial = records.iter().filter(|r| !r.is_complete()).count();
        let mut write_failures = 0u64;
        for record in &records {
            let row = self.row(record);
            if let Err(err) = write_row(HANDLER, self.sink.as_mut(), &row) {
                write_failures += 1;
                warn!(gc_id = record.correlation_id, error = %err, "failed to write collection row");
            }
        }
        info!(
            collections = records.len(),
            partial,
            unpaired = unpaired.len(),
            duplicates = self.correlator.duplicates(),
            write_failures,
            "GC summary complete"
        );

        finalize(HANDLER, self.sink)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{Fields, Timestamp};
    use crate::sink::SinkKind;
    use std::fs;

    fn config_event() -> Event {
        Event::new(names::GC_CONFIGURATION, Timestamp(0))
            .with_field("youngCollector", "G1New")
            .with_field("oldCollector", "G1Old")
            .with_field("parallelGCThreads", 2)
            .with_field("concurrentGCThreads", 1)
    }

    fn heap(id: i64, when: &str, at_ms: u64) -> Event {
        Event::new(names::GC_HEAP_SUMMARY, Timestamp::from_millis(at_ms))
            .with_correlation_id(id)
            .with_field("when", when)
            .with_field("heapUsed", 1000)
            .with_field("heapSpace", Fields::new().with("committedSize", 2000))
    }

    fn phase(id: i64, ns: u64) -> Event {
        Event::new(names::GC_PHASE_PARALLEL, Timestamp(0))
            .with_correlation_id(id)
            .with_field("duration", ns)
    }

    fn collection(id: i64, name: &str, pause_ms: u64) -> Event {
        Event::new(names::GARBAGE_COLLECTION, Timestamp(0))
            .with_correlation_id(id)
            .with_field("name", name)
            .with_field("sumOfPauses", pause_ms * NS_PER_MS)
            .with_field("longestPause", pause_ms * NS_PER_MS)
    }

    fn run(dir: &std::path::Path, policy: MissingConfigPolicy, events: &[Event]) -> Result<SinkReport> {
        let sinks = SinkFactory::new(SinkKind::Csv, dir, "rec");
        let mut handler = Box::new(GcSummaryHandler::new(&sinks, policy).unwrap());
        for event in events {
            assert!(handler.matches(event));
            let _ = handler.handle(event);
        }
        handler.finish()
    }

    fn rows(dir: &std::path::Path) -> Vec<String> {
        fs::read_to_string(dir.join("gcsum_rec.csv"))
            .unwrap()
            .lines()
            .skip(1)
            .map(str::to_string)
            .collect()
    }

    #[test]
    fn test_full_record_with_estimate() {
        let dir = tempfile::tempdir().unwrap();
        let report = run(
            dir.path(),
            MissingConfigPolicy::Omit,
            &[
                config_event(),
                heap(1, "Before GC", 1_000),
                phase(1, 10),
                heap(1, "After GC", 1_050),
                phase(1, 15),
                collection(1, "G1New", 20),
            ],
        )
        .unwrap();

        assert_eq!(report.rows, 1);
        // 50ms elapsed * 2 STW threads
        assert_eq!(rows(dir.path()), vec!["1000,1,G1New,50,100,20,20,25,1000,2000"]);
    }

    #[test]
    fn test_partial_records_emitted_in_id_order() {
        let dir = tempfile::tempdir().unwrap();
        run(
            dir.path(),
            MissingConfigPolicy::Omit,
            &[
                config_event(),
                phase(9, 5),
                heap(3, "After GC", 2_010),
                heap(3, "Before GC", 2_000),
                heap(4, "Before GC", 3_000),
            ],
        )
        .unwrap();

        assert_eq!(
            rows(dir.path()),
            vec!["2000,3,,10,,,,0,1000,2000", ",9,,,,,,5,,"]
        );
    }

    #[test]
    fn test_missing_config_omits_cpu() {
        let dir = tempfile::tempdir().unwrap();
        run(
            dir.path(),
            MissingConfigPolicy::Omit,
            &[
                heap(1, "Before GC", 0),
                heap(1, "After GC", 10),
                collection(1, "G1New", 5),
            ],
        )
        .unwrap();
        assert_eq!(rows(dir.path()), vec!["0,1,G1New,10,,5,5,0,1000,2000"]);
    }

    #[test]
    fn test_missing_config_fail_policy() {
        let dir = tempfile::tempdir().unwrap();
        let err = run(dir.path(), MissingConfigPolicy::Fail, &[phase(1, 5)]).unwrap_err();
        assert!(matches!(err, AnalysisError::ConfigUnavailable));
        assert!(err.is_fatal());
        assert!(!dir.path().join("gcsum_rec.csv").exists());
    }

    #[test]
    fn test_fail_policy_without_records_publishes_header() {
        let dir = tempfile::tempdir().unwrap();
        let report = run(dir.path(), MissingConfigPolicy::Fail, &[]).unwrap();
        assert_eq!(report.rows, 0);
    }

    #[test]
    fn test_first_config_wins() {
        let dir = tempfile::tempdir().unwrap();
        let sinks = SinkFactory::new(SinkKind::Csv, dir.path(), "rec");
        let mut handler = GcSummaryHandler::new(&sinks, MissingConfigPolicy::Omit).unwrap();
        handler.handle(&config_event()).unwrap();
        let other = Event::new(names::GC_CONFIGURATION, Timestamp(1))
            .with_field("youngCollector", "DefNew")
            .with_field("oldCollector", "SerialOld")
            .with_field("parallelGCThreads", 1)
            .with_field("concurrentGCThreads", 0);
        handler.handle(&other).unwrap();
        assert_eq!(handler.gc_config().unwrap().stw_thread_count, 2);
    }

    #[test]
    fn test_phase_without_id_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let sinks = SinkFactory::new(SinkKind::Csv, dir.path(), "rec");
        let mut handler = GcSummaryHandler::new(&sinks, MissingConfigPolicy::Omit).unwrap();
        handler.handle(&phase(1, 5)).unwrap();
        let orphan = Event::new(names::GC_PHASE_PARALLEL, Timestamp(0)).with_field("duration", 5);
        assert!(matches!(
            handler.handle(&orphan),
            Err(AnalysisError::MalformedEvent { .. })
        ));
        assert_eq!(handler.accumulator().get(1).unwrap().accumulated_phase_ns, 5);
    }

    #[test]
    fn test_concurrent_collector_estimate() {
        let dir = tempfile::tempdir().unwrap();
        run(
            dir.path(),
            MissingConfigPolicy::Omit,
            &[
                config_event(),
                heap(2, "Before GC", 0),
                heap(2, "After GC", 100),
                collection(2, "G1Old", 10),
            ],
        )
        .unwrap();
        // 100ms * 1 + (10ms * 2 - 1ns), truncated to ms
        let row = &rows(dir.path())[0];
        assert_eq!(row, "0,2,G1Old,100,119,10,10,0,1000,2000");
    }
}
