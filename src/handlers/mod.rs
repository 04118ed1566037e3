//! Concrete event handlers
//!
//! Every handler owns its sink and its correlation state; nothing is shared
//! between handler instances except the thread grouper.

mod allocation;
mod cpu_load;
mod g1_heap_summary;
mod gc_summary;
mod heap_summary;
mod pair;

pub use allocation::{AllocationHandler, AllocationKind, AllocationSample, GroupAllocation};
pub use cpu_load::{CpuLoadHandler, CpuLoadSample};
pub use g1_heap_summary::{G1HeapRow, G1HeapSummaryHandler};
pub use gc_summary::GcSummaryHandler;
pub use heap_summary::{HeapSummaryHandler, HeapSummaryRow};
pub use pair::{PairHandler, PairRow};

use crate::error::{AnalysisError, Result};
use crate::sink::{Cell, RecordSink, SinkReport};

/// Write one row, attributing a failure to `handler`
fn write_row(handler: &str, sink: &mut dyn RecordSink, row: &[Cell]) -> Result<()> {
    sink.write_row(row)
        .map_err(|source| AnalysisError::SinkWrite {
            handler: handler.to_string(),
            source,
        })
}

fn finalize(handler: &str, sink: Box<dyn RecordSink>) -> Result<SinkReport> {
    sink.finalize().map_err(|source| AnalysisError::SinkFinalize {
        handler: handler.to_string(),
        source,
    })
}
