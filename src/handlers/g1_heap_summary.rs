use super::pair::{PairHandler, PairRow};
use crate::error::{AnalysisError, Result};
use crate::event::{names, Event};
use crate::sink::Cell;

/// Young generation detail of G1 collections
#[derive(Debug)]
pub struct G1HeapRow;

pub type G1HeapSummaryHandler = PairHandler<G1HeapRow>;

impl PairRow for G1HeapRow {
    const HANDLER: &'static str = "g1_heap_summary";
    const EVENT: &'static str = names::G1_HEAP_SUMMARY;
    const PREFIX: &'static str = "g1gc_";
    const COLUMNS: &'static [&'static str] = &[
        "timestamp",
        "edenUsed",
        "edenDelta",
        "edenTotal",
        "survivorUsed",
        "regions",
    ];

    fn row(before: &Event, after: &Event) -> Result<Vec<Cell>> {
        let eden_before = before
            .fields
            .get_i64("edenUsedSize")
            .map_err(|e| AnalysisError::malformed(&before.name, e))?;
        let fields = &after.fields;
        let wrap = |e| AnalysisError::malformed(&after.name, e);
        let eden_used = fields.get_i64("edenUsedSize").map_err(wrap)?;
        let eden_total = fields.get_i64("edenTotalSize").map_err(wrap)?;
        let survivor_used = fields.get_i64("survivorUsedSize").map_err(wrap)?;
        let regions = fields.get_i64("numberOfRegions").map_err(wrap)?;

        Ok(vec![
            Cell::from(after.timestamp.as_millis()),
            Cell::from(eden_used),
            Cell::from(eden_used.saturating_sub(eden_before)),
            Cell::from(eden_total),
            Cell::from(survivor_used),
            Cell::from(regions),
        ])
    }
}
