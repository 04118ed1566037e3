//! Per-collection summary records
//!
//! A [`CollectionRecord`] is assembled from three independent contributions
//! that may arrive in any order:
//! - the baseline, derived from a before/after heap summary pair
//! - parallel phase durations, summed
//! - the collection summary (collector name and pause totals)
//!
//! [`CollectionRecord::merge`] is commutative and associative, so the final
//! record does not depend on arrival order.

use std::cmp::Ordering;

use crate::correlator::CorrelatedPair;
use crate::error::{AnalysisError, Result};
use crate::event::{Event, Timestamp};

/// Values taken from a completed before/after pair
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct Baseline {
    /// Timestamp of the before marker
    pub start_time: Timestamp,
    /// Wall-clock time between the two markers
    ///
    /// This is larger than the sum of pauses, which comes from the
    /// collection summary.
    pub elapsed_ns: u64,
    pub heap_used_after: u64,
    pub committed_after: u64,
}

impl Baseline {
    /// Extract every required value from a pair, or reject it
    pub fn from_events(before: &Event, after: &Event) -> Result<Self> {
        let heap_used_after = after
            .fields
            .get_u64("heapUsed")
            .map_err(|e| AnalysisError::malformed(&after.name, e))?;
        let committed_after = after
            .fields
            .get_fields("heapSpace")
            .and_then(|space| space.get_u64("committedSize"))
            .map_err(|e| AnalysisError::malformed(&after.name, e))?;

        Ok(Self {
            start_time: before.timestamp,
            elapsed_ns: after.timestamp.saturating_sub_ns(before.timestamp),
            heap_used_after,
            committed_after,
        })
    }

    pub fn from_pair(pair: &CorrelatedPair) -> Result<Self> {
        Self::from_events(&pair.before, &pair.after)
    }
}

/// Values reported once per collection by the collector itself
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct CollectionSummary {
    pub name: String,
    pub total_pause_ns: u64,
    pub longest_pause_ns: u64,
}

impl CollectionSummary {
    pub fn extract(event: &Event) -> Result<Self> {
        let fields = &event.fields;
        let wrap = |e| AnalysisError::malformed(&event.name, e);
        Ok(Self {
            name: fields.get_str("name").map_err(wrap)?.to_string(),
            total_pause_ns: fields.get_duration_ns("sumOfPauses").map_err(wrap)?,
            longest_pause_ns: fields.get_duration_ns("longestPause").map_err(wrap)?,
        })
    }
}

/// Everything known about one collection cycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionRecord {
    pub correlation_id: i64,
    pub baseline: Option<Baseline>,
    pub summary: Option<CollectionSummary>,
    pub accumulated_phase_ns: u64,
    pub phase_count: u64,
}

impl CollectionRecord {
    pub fn new(correlation_id: i64) -> Self {
        Self {
            correlation_id,
            baseline: None,
            summary: None,
            accumulated_phase_ns: 0,
            phase_count: 0,
        }
    }

    pub fn from_phase(correlation_id: i64, duration_ns: u64) -> Self {
        let mut record = Self::new(correlation_id);
        record.add_phase(duration_ns);
        record
    }

    pub fn from_baseline(correlation_id: i64, baseline: Baseline) -> Self {
        Self {
            baseline: Some(baseline),
            ..Self::new(correlation_id)
        }
    }

    pub fn from_summary(correlation_id: i64, summary: CollectionSummary) -> Self {
        Self {
            summary: Some(summary),
            ..Self::new(correlation_id)
        }
    }

    pub fn add_phase(&mut self, duration_ns: u64) {
        self.accumulated_phase_ns = self.accumulated_phase_ns.saturating_add(duration_ns);
        self.phase_count += 1;
    }

    /// Fold another contribution for the same cycle into this one
    ///
    /// Phase sums add. Baseline and summary each have a single contributor;
    /// if one is nonetheless contributed twice the greater value is kept, so
    /// the result stays independent of merge order.
    pub fn merge(&mut self, other: CollectionRecord) {
        debug_assert_eq!(self.correlation_id, other.correlation_id);
        self.accumulated_phase_ns = self
            .accumulated_phase_ns
            .saturating_add(other.accumulated_phase_ns);
        self.phase_count += other.phase_count;
        self.baseline = merge_single(
            self.correlation_id,
            "baseline",
            self.baseline.take(),
            other.baseline,
        );
        self.summary = merge_single(
            self.correlation_id,
            "summary",
            self.summary.take(),
            other.summary,
        );
    }

    /// Both the baseline pair and at least one phase have been seen
    pub fn is_complete(&self) -> bool {
        self.baseline.is_some() && self.phase_count > 0
    }

    pub fn start_time(&self) -> Option<Timestamp> {
        self.baseline.as_ref().map(|b| b.start_time)
    }

    pub fn elapsed_ns(&self) -> Option<u64> {
        self.baseline.as_ref().map(|b| b.elapsed_ns)
    }

    /// Wall-clock time between the before and after markers, in milliseconds
    pub fn stw_duration_ms(&self) -> Option<u64> {
        self.elapsed_ns().map(|ns| ns / 1_000_000)
    }

    pub fn heap_used_after(&self) -> Option<u64> {
        self.baseline.as_ref().map(|b| b.heap_used_after)
    }

    pub fn committed_after(&self) -> Option<u64> {
        self.baseline.as_ref().map(|b| b.committed_after)
    }

    pub fn name(&self) -> Option<&str> {
        self.summary.as_ref().map(|s| s.name.as_str())
    }

    pub fn total_pause_ns(&self) -> Option<u64> {
        self.summary.as_ref().map(|s| s.total_pause_ns)
    }

    pub fn longest_pause_ns(&self) -> Option<u64> {
        self.summary.as_ref().map(|s| s.longest_pause_ns)
    }
}

fn merge_single<T: Ord>(id: i64, what: &str, a: Option<T>, b: Option<T>) -> Option<T> {
    match (a, b) {
        (Some(a), Some(b)) => {
            if a.cmp(&b) != Ordering::Equal {
                tracing::warn!(id, what, "conflicting contributions for one collection");
            }
            Some(a.max(b))
        }
        (a, b) => a.or(b),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{names, Fields};

    fn baseline(elapsed_ms: u64) -> Baseline {
        Baseline {
            start_time: Timestamp::from_millis(100),
            elapsed_ns: elapsed_ms * 1_000_000,
            heap_used_after: 1000,
            committed_after: 2000,
        }
    }

    #[test]
    fn test_baseline_from_events() {
        let before = Event::new(names::GC_HEAP_SUMMARY, Timestamp::from_millis(100))
            .with_field("heapUsed", 5000);
        let after = Event::new(names::GC_HEAP_SUMMARY, Timestamp::from_millis(150))
            .with_field("heapUsed", 1000)
            .with_field("heapSpace", Fields::new().with("committedSize", 2000));

        let b = Baseline::from_events(&before, &after).unwrap();
        assert_eq!(b.start_time, Timestamp::from_millis(100));
        assert_eq!(b.elapsed_ns, 50_000_000);
        assert_eq!(b.heap_used_after, 1000);
        assert_eq!(b.committed_after, 2000);
    }

    #[test]
    fn test_baseline_rejects_missing_committed() {
        let before = Event::new(names::GC_HEAP_SUMMARY, Timestamp(0));
        let after = Event::new(names::GC_HEAP_SUMMARY, Timestamp(1)).with_field("heapUsed", 1);
        let err = Baseline::from_events(&before, &after).unwrap_err();
        assert!(err.to_string().contains("heapSpace"));
    }

    #[test]
    fn test_summary_extract() {
        let ev = Event::new(names::GARBAGE_COLLECTION, Timestamp(0))
            .with_field("name", "G1New")
            .with_field("sumOfPauses", 10)
            .with_field("longestPause", 7);
        let s = CollectionSummary::extract(&ev).unwrap();
        assert_eq!(s.name, "G1New");
        assert_eq!(s.total_pause_ns, 10);
        assert_eq!(s.longest_pause_ns, 7);
    }

    #[test]
    fn test_merge_is_order_independent() {
        let phase_a = CollectionRecord::from_phase(1, 10);
        let phase_b = CollectionRecord::from_phase(1, 15);
        let base = CollectionRecord::from_baseline(1, baseline(50));

        let mut forward = phase_a.clone();
        forward.merge(phase_b.clone());
        forward.merge(base.clone());

        let mut reverse = base;
        reverse.merge(phase_b);
        reverse.merge(phase_a);

        assert_eq!(forward, reverse);
        assert_eq!(forward.accumulated_phase_ns, 25);
        assert_eq!(forward.phase_count, 2);
        assert_eq!(forward.stw_duration_ms(), Some(50));
        assert!(forward.is_complete());
    }

    #[test]
    fn test_conflicting_baselines_keep_greater() {
        let mut a = CollectionRecord::from_baseline(2, baseline(10));
        a.merge(CollectionRecord::from_baseline(2, baseline(30)));
        let mut b = CollectionRecord::from_baseline(2, baseline(30));
        b.merge(CollectionRecord::from_baseline(2, baseline(10)));
        assert_eq!(a, b);
        assert_eq!(a.stw_duration_ms(), Some(30));
    }

    #[test]
    fn test_partial_record_accessors() {
        let r = CollectionRecord::from_phase(3, 40);
        assert!(!r.is_complete());
        assert_eq!(r.elapsed_ns(), None);
        assert_eq!(r.heap_used_after(), None);
        assert_eq!(r.name(), None);
        assert_eq!(r.accumulated_phase_ns, 40);
    }
}
