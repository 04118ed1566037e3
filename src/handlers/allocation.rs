use std::rc::Rc;

use tracing::debug;

use super::{finalize, write_row};
use crate::dispatch::EventHandler;
use crate::error::{AnalysisError, Result};
use crate::event::{names, Event, Timestamp};
use crate::sink::{Cell, RecordSink, SinkError, SinkFactory, SinkReport};
use crate::thread_group::{GroupAggregator, GroupLimits, ThreadGroupDispatcher, ThreadGrouper};

const COLUMNS: &[&str] = &["timestamp", "allocated", "groupAllocated", "group", "className"];

/// Which allocation event a handler consumes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AllocationKind {
    /// Allocation that required a new thread-local allocation buffer
    InNewTlab,
    /// Allocation made directly in the shared heap
    OutsideTlab,
}

impl AllocationKind {
    pub fn event_name(self) -> &'static str {
        match self {
            AllocationKind::InNewTlab => names::ALLOCATION_IN_NEW_TLAB,
            AllocationKind::OutsideTlab => names::ALLOCATION_OUTSIDE_TLAB,
        }
    }

    /// Field carrying the allocated byte count
    pub fn size_field(self) -> &'static str {
        match self {
            AllocationKind::InNewTlab => "tlabSize",
            AllocationKind::OutsideTlab => "allocationSize",
        }
    }

    pub fn prefix(self) -> &'static str {
        match self {
            AllocationKind::InNewTlab => "tlab_",
            AllocationKind::OutsideTlab => "lalloc_",
        }
    }

    pub fn handler_name(self) -> &'static str {
        match self {
            AllocationKind::InNewTlab => "allocation_in_new_tlab",
            AllocationKind::OutsideTlab => "allocation_outside_tlab",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AllocationSample {
    pub timestamp: Timestamp,
    pub allocated: u64,
    pub class_name: String,
}

impl AllocationSample {
    pub fn extract(kind: AllocationKind, event: &Event) -> Result<Self> {
        let fields = &event.fields;
        let wrap = |e| AnalysisError::malformed(&event.name, e);
        Ok(Self {
            timestamp: event.timestamp,
            allocated: fields.get_u64(kind.size_field()).map_err(wrap)?,
            class_name: fields
                .get_name_like("objectClass", "name")
                .map_err(wrap)?
                .to_string(),
        })
    }
}

/// Running allocation total of one thread group
#[derive(Debug)]
pub struct GroupAllocation {
    kind: AllocationKind,
    group: String,
    total: u64,
}

impl GroupAllocation {
    pub fn total(&self) -> u64 {
        self.total
    }
}

impl GroupAggregator for GroupAllocation {
    type Row = Vec<Cell>;

    fn accept(&mut self, event: &Event) -> Result<Option<Self::Row>> {
        let sample = AllocationSample::extract(self.kind, event)?;
        self.total = self.total.saturating_add(sample.allocated);
        Ok(Some(vec![
            Cell::from(sample.timestamp.as_millis()),
            Cell::from(sample.allocated),
            Cell::from(self.total),
            Cell::from(self.group.as_str()),
            Cell::from(sample.class_name),
        ]))
    }
}

/// Allocation rows annotated with a per-thread-group running total
#[derive(Debug)]
pub struct AllocationHandler {
    kind: AllocationKind,
    groups: ThreadGroupDispatcher<GroupAllocation>,
    sink: Box<dyn RecordSink>,
}

impl AllocationHandler {
    pub fn new(
        kind: AllocationKind,
        sinks: &SinkFactory,
        grouper: Rc<ThreadGrouper>,
        limits: GroupLimits,
    ) -> std::result::Result<Self, SinkError> {
        let groups = ThreadGroupDispatcher::new(
            move |event| grouper.group_of(event),
            move |group| GroupAllocation {
                kind,
                group: group.to_string(),
                total: 0,
            },
            limits,
        );
        Ok(Self {
            kind,
            groups,
            sink: sinks.open(kind.prefix(), COLUMNS)?,
        })
    }

    pub fn groups(&self) -> &ThreadGroupDispatcher<GroupAllocation> {
        &self.groups
    }
}

impl EventHandler for AllocationHandler {
    fn name(&self) -> &str {
        self.kind.handler_name()
    }

    fn matches(&self, event: &Event) -> bool {
        event.name == self.kind.event_name()
    }

    fn handle(&mut self, event: &Event) -> Result<()> {
        match self.groups.dispatch(event)? {
            Some(row) => write_row(self.kind.handler_name(), self.sink.as_mut(), &row),
            None => Ok(()),
        }
    }

    fn finish(mut self: Box<Self>) -> Result<SinkReport> {
        let live = self.groups.finish();
        debug!(
            handler = self.kind.handler_name(),
            live,
            evictions = self.groups.evictions(),
            ungrouped = self.groups.ungrouped(),
            "allocation grouping finished"
        );
        finalize(self.kind.handler_name(), self.sink)
    }
}
