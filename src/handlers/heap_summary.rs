use super::pair::{PairHandler, PairRow};
use crate::error::Result;
use crate::event::{names, Event};
use crate::record::Baseline;
use crate::sink::Cell;

const NS_PER_MS: u64 = 1_000_000;

/// Heap occupancy after each collection
#[derive(Debug)]
pub struct HeapSummaryRow;

pub type HeapSummaryHandler = PairHandler<HeapSummaryRow>;

impl PairRow for HeapSummaryRow {
    const HANDLER: &'static str = "heap_summary";
    const EVENT: &'static str = names::GC_HEAP_SUMMARY;
    const PREFIX: &'static str = "gc_";
    const COLUMNS: &'static [&'static str] = &["timestamp", "duration", "used", "committed"];

    fn row(before: &Event, after: &Event) -> Result<Vec<Cell>> {
        let baseline = Baseline::from_events(before, after)?;
        Ok(vec![
            Cell::from(after.timestamp.as_millis()),
            Cell::from(baseline.elapsed_ns / NS_PER_MS),
            Cell::from(baseline.heap_used_after),
            Cell::from(baseline.committed_after),
        ])
    }
}
