//! Approximate CPU cost of a collection
//!
//! The recorder does not measure GC CPU time directly. The estimate scales
//! the elapsed wall-clock time of a collection by the number of GC worker
//! threads that were busy during it:
//!
//! - stop-the-world: `elapsed * stw_threads`
//! - concurrent: `elapsed * concurrent_threads + (total_pause * stw_threads - concurrent_threads)`
//!
//! The concurrent formula subtracts a bare thread count, not a duration.
//! That term is kept as recorded in the cost model.

use thiserror::Error;

use crate::gc_config::{CollectionMode, CollectorKind, GcConfig};
use crate::record::CollectionRecord;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EstimateError {
    #[error("collection {0} has no elapsed duration (baseline pair missing)")]
    MissingElapsed(i64),

    #[error("collection {0} has no collector name")]
    MissingCollectorName(i64),

    #[error("unknown collector `{0}`")]
    UnknownCollector(String),
}

/// Classify a collector name through the closed collector table
pub fn classify(name: &str) -> Result<CollectionMode, EstimateError> {
    CollectorKind::from_name(name)
        .map(CollectorKind::mode)
        .ok_or_else(|| EstimateError::UnknownCollector(name.to_string()))
}

/// Core formula, on raw nanosecond inputs
pub fn estimate_ns(mode: CollectionMode, elapsed_ns: u64, total_pause_ns: u64, config: &GcConfig) -> i64 {
    let elapsed = i64::try_from(elapsed_ns).unwrap_or(i64::MAX);
    let pause = i64::try_from(total_pause_ns).unwrap_or(i64::MAX);
    let stw = i64::from(config.stw_thread_count);
    let concurrent = i64::from(config.concurrent_thread_count);

    match mode {
        CollectionMode::StopTheWorld => elapsed.saturating_mul(stw),
        CollectionMode::Concurrent => elapsed
            .saturating_mul(concurrent)
            .saturating_add(pause.saturating_mul(stw).saturating_sub(concurrent)),
    }
}

/// Estimated CPU nanoseconds spent on one collection
///
/// A record without a pause total is treated as having paused for zero time.
pub fn estimate_cpu_ns(record: &CollectionRecord, config: &GcConfig) -> Result<i64, EstimateError> {
    let elapsed_ns = record
        .elapsed_ns()
        .ok_or(EstimateError::MissingElapsed(record.correlation_id))?;
    let name = record
        .name()
        .ok_or(EstimateError::MissingCollectorName(record.correlation_id))?;
    let mode = classify(name)?;
    Ok(estimate_ns(
        mode,
        elapsed_ns,
        record.total_pause_ns().unwrap_or(0),
        config,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::Timestamp;
    use crate::record::{Baseline, CollectionSummary};

    fn config() -> GcConfig {
        GcConfig {
            young_collector: CollectorKind::G1New,
            old_collector: CollectorKind::G1Old,
            stw_thread_count: 2,
            concurrent_thread_count: 1,
        }
    }

    fn record(name: &str, elapsed_ns: u64, total_pause_ns: u64) -> CollectionRecord {
        let mut r = CollectionRecord::from_baseline(
            1,
            Baseline {
                start_time: Timestamp(0),
                elapsed_ns,
                heap_used_after: 0,
                committed_after: 0,
            },
        );
        r.merge(CollectionRecord::from_summary(
            1,
            CollectionSummary {
                name: name.to_string(),
                total_pause_ns,
                longest_pause_ns: total_pause_ns,
            },
        ));
        r
    }

    #[test]
    fn test_stop_the_world_estimate() {
        assert_eq!(estimate_cpu_ns(&record("G1New", 100, 10), &config()), Ok(200));
        assert_eq!(estimate_cpu_ns(&record("G1Full", 100, 10), &config()), Ok(200));
    }

    #[test]
    fn test_concurrent_estimate() {
        // 100*1 + (10*2 - 1)
        assert_eq!(estimate_cpu_ns(&record("G1Old", 100, 10), &config()), Ok(119));
    }

    #[test]
    fn test_concurrent_without_pause_goes_below_elapsed() {
        assert_eq!(estimate_ns(CollectionMode::Concurrent, 100, 0, &config()), 99);
    }

    #[test]
    fn test_missing_inputs() {
        let phase_only = CollectionRecord::from_phase(4, 10);
        assert_eq!(
            estimate_cpu_ns(&phase_only, &config()),
            Err(EstimateError::MissingElapsed(4))
        );

        let unnamed = CollectionRecord::from_baseline(
            5,
            Baseline {
                start_time: Timestamp(0),
                elapsed_ns: 1,
                heap_used_after: 0,
                committed_after: 0,
            },
        );
        assert_eq!(
            estimate_cpu_ns(&unnamed, &config()),
            Err(EstimateError::MissingCollectorName(5))
        );
    }

    #[test]
    fn test_unknown_collector() {
        assert_eq!(
            estimate_cpu_ns(&record("Shenandoah", 100, 10), &config()),
            Err(EstimateError::UnknownCollector("Shenandoah".to_string()))
        );
    }

    #[test]
    fn test_saturates_instead_of_overflowing() {
        let est = estimate_ns(CollectionMode::StopTheWorld, u64::MAX, 0, &config());
        assert_eq!(est, i64::MAX);
    }
}
