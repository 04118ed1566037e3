// Shared event builders for integration tests
#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use gclens::event::{names, Event, Fields, Timestamp};

pub fn gc_config(young: &str, old: &str, stw: u32, concurrent: u32) -> Event {
    Event::new(names::GC_CONFIGURATION, Timestamp(0))
        .with_field("youngCollector", young)
        .with_field("oldCollector", old)
        .with_field("parallelGCThreads", stw)
        .with_field("concurrentGCThreads", concurrent)
}

pub fn heap_summary(id: i64, when: &str, at_ms: u64, used: u64, committed: u64) -> Event {
    Event::new(names::GC_HEAP_SUMMARY, Timestamp::from_millis(at_ms))
        .with_correlation_id(id)
        .with_field("when", when)
        .with_field("heapUsed", used)
        .with_field("heapSpace", Fields::new().with("committedSize", committed))
}

pub fn phase(id: i64, duration_ns: u64) -> Event {
    Event::new(names::GC_PHASE_PARALLEL, Timestamp(0))
        .with_correlation_id(id)
        .with_field("duration", duration_ns)
}

pub fn collection(id: i64, name: &str, pause_ns: u64) -> Event {
    Event::new(names::GARBAGE_COLLECTION, Timestamp(0))
        .with_correlation_id(id)
        .with_field("name", name)
        .with_field("sumOfPauses", pause_ns)
        .with_field("longestPause", pause_ns)
}

pub fn cpu_load(at_ms: u64, user: f64) -> Event {
    Event::new(names::CPU_LOAD, Timestamp::from_millis(at_ms))
        .with_field("jvmUser", user)
        .with_field("jvmSystem", 0.1)
        .with_field("machineTotal", 0.5)
}

pub fn tlab(thread: &str, size: u64, class: &str, at_ms: u64) -> Event {
    Event::new(names::ALLOCATION_IN_NEW_TLAB, Timestamp::from_millis(at_ms))
        .with_field("eventThread", Fields::new().with("javaName", thread))
        .with_field("tlabSize", size)
        .with_field("objectClass", Fields::new().with("name", class))
}

/// Render events in the JSON-lines input format
pub fn to_jsonl(events: &[Event]) -> String {
    events
        .iter()
        .map(|e| serde_json::to_string(e).unwrap())
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn write_events(dir: &Path, name: &str, events: &[Event]) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, to_jsonl(events)).unwrap();
    path
}

/// Data lines of a published CSV file, header excluded
pub fn csv_rows(path: &Path) -> Vec<String> {
    fs::read_to_string(path)
        .unwrap()
        .lines()
        .skip(1)
        .map(str::to_string)
        .collect()
}

pub fn file_names(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = fs::read_dir(dir)
        .unwrap()
        .filter_map(|e| e.ok())
        .map(|e| e.file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}
