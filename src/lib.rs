//! gclens - correlation engine for JVM flight-recorder GC telemetry
//!
//! This library turns a stream of decoded recorder events into per-handler
//! tabular output: before/after heap summaries are paired by collection id,
//! parallel phase durations are accumulated, collection CPU cost is
//! estimated from the collector configuration, and allocation events are
//! aggregated per thread group.

pub mod accumulator;
pub mod cli;
pub mod config;
pub mod correlator;
pub mod dispatch;
pub mod error;
pub mod estimator;
pub mod event;
pub mod gc_config;
pub mod handlers;
pub mod record;
pub mod registry;
pub mod sink;
pub mod source;
pub mod thread_group;
