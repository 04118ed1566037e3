//! Order-independent assembly of collection records
//!
//! Records are held until end-of-stream and then emitted in ascending
//! correlation id order, complete or not. A truncated recording therefore
//! still yields a row for every cycle it saw, with empty cells for what is
//! missing.

use std::collections::BTreeMap;

use crate::error::Result;
use crate::event::Event;
use crate::record::{Baseline, CollectionRecord, CollectionSummary};

#[derive(Debug, Default)]
pub struct PhaseAccumulator {
    records: BTreeMap<i64, CollectionRecord>,
}

impl PhaseAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    fn contribute(&mut self, contribution: CollectionRecord) {
        match self.records.get_mut(&contribution.correlation_id) {
            Some(existing) => existing.merge(contribution),
            None => {
                self.records
                    .insert(contribution.correlation_id, contribution);
            }
        }
    }

    /// Add one parallel phase duration to the cycle `id`
    pub fn add_phase(&mut self, id: i64, duration_ns: u64) {
        self.contribute(CollectionRecord::from_phase(id, duration_ns));
    }

    /// Merge the baseline derived from a completed before/after pair
    ///
    /// # Errors
    /// `MalformedEvent` when the after event lacks heap usage or committed
    /// size; the accumulator is left unchanged.
    pub fn merge_baseline(&mut self, id: i64, before: &Event, after: &Event) -> Result<()> {
        let baseline = Baseline::from_events(before, after)?;
        self.contribute(CollectionRecord::from_baseline(id, baseline));
        Ok(())
    }

    /// Merge the collector's own per-cycle summary
    pub fn merge_summary(&mut self, id: i64, summary: CollectionSummary) {
        self.contribute(CollectionRecord::from_summary(id, summary));
    }

    pub fn get(&self, id: i64) -> Option<&CollectionRecord> {
        self.records.get(&id)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Remove and return every record, ascending by correlation id
    pub fn drain(&mut self) -> Vec<CollectionRecord> {
        std::mem::take(&mut self.records).into_values().collect()
    }
}
