// Run configuration, loaded from TOML
//
// Every field has a default so an empty file (or no file) is a valid config.

use std::fs;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::sink::SinkKind;
use crate::thread_group::{GroupLimits, ThreadGrouper};

/// What to do when a CPU estimate is needed but no GC configuration was seen
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MissingConfigPolicy {
    /// Emit the row with an empty `cpuUsedMs` cell
    #[default]
    Omit,
    /// Fail the handler's output
    Fail,
}

/// Regex on the thread name mapped to a group key
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupingRuleConfig {
    pub pattern: String,
    /// Group key; may reference capture groups (`$1`)
    pub group: String,
}

/// Thread-group aggregation settings
///
/// # Example
/// ```toml
/// [grouping]
/// capacity = 256
/// idle_timeout_ms = 30000
///
/// [[grouping.rules]]
/// pattern = "^ForkJoinPool-\\d+-worker-\\d+$"
/// group = "ForkJoinPool-workers"
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GroupingConfig {
    /// Maximum number of live per-group aggregators
    pub capacity: usize,
    /// Evict aggregators idle for this long, in event time; 0 disables
    pub idle_timeout_ms: u64,
    pub rules: Vec<GroupingRuleConfig>,
}

impl Default for GroupingConfig {
    fn default() -> Self {
        Self {
            capacity: 1024,
            idle_timeout_ms: 60_000,
            rules: Vec::new(),
        }
    }
}

impl GroupingConfig {
    pub fn limits(&self) -> GroupLimits {
        GroupLimits {
            capacity: NonZeroUsize::new(self.capacity).unwrap_or(NonZeroUsize::MIN),
            idle_timeout: (self.idle_timeout_ms > 0).then(|| Duration::from_millis(self.idle_timeout_ms)),
        }
    }

    /// Compile the grouping rules
    pub fn grouper(&self) -> Result<Rc<ThreadGrouper>> {
        let mut grouper = ThreadGrouper::new();
        for rule in &self.rules {
            grouper = grouper
                .with_rule(&rule.pattern, rule.group.as_str())
                .with_context(|| format!("Invalid grouping pattern: {}", rule.pattern))?;
        }
        Ok(Rc::new(grouper))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Directory that receives published artifacts
    pub output_dir: PathBuf,
    pub sink: SinkKind,
    pub missing_gc_config: MissingConfigPolicy,
    pub grouping: GroupingConfig,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("."),
            sink: SinkKind::Csv,
            missing_gc_config: MissingConfigPolicy::Omit,
            grouping: GroupingConfig::default(),
        }
    }
}

impl AnalysisConfig {
    /// Parse and validate a TOML document
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content).context("Failed to parse TOML configuration")?;
        config.validate().map_err(anyhow::Error::msg)?;
        Ok(config)
    }

    pub fn from_toml_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;
        Self::from_toml_str(&content)
            .with_context(|| format!("Invalid config file: {}", path.as_ref().display()))
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.grouping.capacity == 0 {
            return Err("grouping.capacity must be >= 1, got 0".to_string());
        }

        if self.output_dir.as_os_str().is_empty() {
            return Err("output_dir must not be empty".to_string());
        }

        for rule in &self.grouping.rules {
            if let Err(e) = regex::Regex::new(&rule.pattern) {
                return Err(format!("invalid grouping pattern '{}': {}", rule.pattern, e));
            }
        }

        Ok(())
    }
}
