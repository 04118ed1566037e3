//! Default handler set for a run

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};

use crate::config::AnalysisConfig;
use crate::dispatch::{Dispatcher, EventHandler};
use crate::handlers::{
    AllocationHandler, AllocationKind, CpuLoadHandler, G1HeapSummaryHandler, GcSummaryHandler,
    HeapSummaryHandler,
};
use crate::sink::SinkFactory;

/// Output basename for an input file: its name up to the first `.`
///
/// `recording.jfr.jsonl` becomes `recording`.
pub fn basename_for(path: &Path) -> String {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    match name.split('.').next() {
        Some(stem) if !stem.is_empty() => stem.to_string(),
        _ => "events".to_string(),
    }
}

#[derive(Debug, Default)]
pub struct HandlerRegistry {
    handlers: Vec<Box<dyn EventHandler>>,
}

impl HandlerRegistry {
    /// Build every handler, each with its own sink under `config.output_dir`
    pub fn create_default(config: &AnalysisConfig, basename: &str) -> Result<Self> {
        fs::create_dir_all(&config.output_dir).with_context(|| {
            format!("Failed to create output directory: {}", config.output_dir.display())
        })?;
        tracing::info!(
            basename,
            output_dir = %config.output_dir.display(),
            sink = ?config.sink,
            "creating handlers"
        );

        let sinks = SinkFactory::new(config.sink, &config.output_dir, basename);
        let grouper = config.grouping.grouper()?;
        let limits = config.grouping.limits();
        let open_err = |handler: &str| format!("Failed to open output for {} handler", handler);

        let mut registry = Self::default();
        for kind in [AllocationKind::InNewTlab, AllocationKind::OutsideTlab] {
            registry.add(Box::new(
                AllocationHandler::new(kind, &sinks, grouper.clone(), limits)
                    .with_context(|| open_err(kind.handler_name()))?,
            ));
        }
        registry.add(Box::new(
            G1HeapSummaryHandler::new(&sinks).with_context(|| open_err("g1_heap_summary"))?,
        ));
        registry.add(Box::new(
            HeapSummaryHandler::new(&sinks).with_context(|| open_err("heap_summary"))?,
        ));
        registry.add(Box::new(
            GcSummaryHandler::new(&sinks, config.missing_gc_config)
                .with_context(|| open_err("gc_summary"))?,
        ));
        registry.add(Box::new(
            CpuLoadHandler::new(&sinks).with_context(|| open_err("cpu_load"))?,
        ));
        Ok(registry)
    }

    pub fn add(&mut self, handler: Box<dyn EventHandler>) {
        self.handlers.push(handler);
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    pub fn names(&self) -> Vec<&str> {
        self.handlers.iter().map(|h| h.name()).collect()
    }

    /// Register every handler, in order, with a fresh dispatcher
    pub fn into_dispatcher(self) -> Dispatcher {
        let mut dispatcher = Dispatcher::new();
        for handler in self.handlers {
            dispatcher.register(handler);
        }
        dispatcher
    }
}
