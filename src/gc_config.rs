//! Collector configuration reported once near the start of a recording

use std::fmt;

use crate::error::{AnalysisError, Result};
use crate::event::Event;

/// Heap generation a collector works on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Generation {
    Young,
    Old,
}

/// Whether a collector's work pauses the application
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectionMode {
    StopTheWorld,
    Concurrent,
}

/// Collector kinds known to the recorder, as named in its events
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CollectorKind {
    G1New,
    ParallelScavenge,
    DefNew,
    ParNew,
    G1Old,
    G1Full,
    ParallelOld,
    SerialOld,
    PsMarkSweep,
}

const COLLECTORS: &[(&str, CollectorKind, Generation, CollectionMode)] = &[
    ("G1New", CollectorKind::G1New, Generation::Young, CollectionMode::StopTheWorld),
    ("ParallelScavenge", CollectorKind::ParallelScavenge, Generation::Young, CollectionMode::StopTheWorld),
    ("DefNew", CollectorKind::DefNew, Generation::Young, CollectionMode::StopTheWorld),
    ("ParNew", CollectorKind::ParNew, Generation::Young, CollectionMode::StopTheWorld),
    ("G1Old", CollectorKind::G1Old, Generation::Old, CollectionMode::Concurrent),
    ("G1Full", CollectorKind::G1Full, Generation::Old, CollectionMode::StopTheWorld),
    ("ParallelOld", CollectorKind::ParallelOld, Generation::Old, CollectionMode::StopTheWorld),
    ("SerialOld", CollectorKind::SerialOld, Generation::Old, CollectionMode::StopTheWorld),
    ("PSMarkSweep", CollectorKind::PsMarkSweep, Generation::Old, CollectionMode::StopTheWorld),
];

impl CollectorKind {
    pub fn from_name(name: &str) -> Option<CollectorKind> {
        COLLECTORS
            .iter()
            .find(|(n, ..)| *n == name)
            .map(|(_, kind, ..)| *kind)
    }

    fn entry(self) -> &'static (&'static str, CollectorKind, Generation, CollectionMode) {
        // every variant has exactly one row
        COLLECTORS
            .iter()
            .find(|(_, kind, ..)| *kind == self)
            .unwrap_or(&COLLECTORS[0])
    }

    pub fn name(self) -> &'static str {
        self.entry().0
    }

    pub fn generation(self) -> Generation {
        self.entry().2
    }

    /// Only the G1 old-generation cycle runs concurrently with the application
    pub fn mode(self) -> CollectionMode {
        self.entry().3
    }
}

impl fmt::Display for CollectorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Collector setup of the recorded process; immutable once loaded
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GcConfig {
    pub young_collector: CollectorKind,
    pub old_collector: CollectorKind,
    /// Worker threads used during stop-the-world phases
    pub stw_thread_count: u32,
    /// Worker threads used by concurrent phases
    pub concurrent_thread_count: u32,
}

impl GcConfig {
    /// Read a `jdk.GCConfiguration` event
    pub fn from_event(event: &Event) -> Result<Self> {
        let fields = &event.fields;
        let wrap = |e| AnalysisError::malformed(&event.name, e);
        let collector = |field: &str| -> Result<CollectorKind> {
            let name = fields.get_str(field).map_err(wrap)?;
            CollectorKind::from_name(name).ok_or_else(|| AnalysisError::MalformedEvent {
                event: event.name.clone(),
                reason: format!("unknown collector `{}` in {}", name, field),
            })
        };
        let threads = |field: &str| -> Result<u32> {
            let n = fields.get_u64(field).map_err(wrap)?;
            u32::try_from(n).map_err(|_| AnalysisError::MalformedEvent {
                event: event.name.clone(),
                reason: format!("{} out of range: {}", field, n),
            })
        };

        Ok(Self {
            young_collector: collector("youngCollector")?,
            old_collector: collector("oldCollector")?,
            stw_thread_count: threads("parallelGCThreads")?,
            concurrent_thread_count: threads("concurrentGCThreads")?,
        })
    }
}
