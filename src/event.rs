//! Decoded telemetry events and typed field access
//!
//! Events arrive already decoded: a name, a timestamp and a map of named
//! fields. Handlers never test fields with has/get pairs; they call the
//! typed accessors on [`Fields`], which fail with a [`FieldError`] naming the
//! field on absence or type mismatch.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::FieldError;

/// Event names emitted by the JVM flight recorder that the handlers consume
pub mod names {
    pub const GC_CONFIGURATION: &str = "jdk.GCConfiguration";
    pub const GC_HEAP_SUMMARY: &str = "jdk.GCHeapSummary";
    pub const G1_HEAP_SUMMARY: &str = "jdk.G1HeapSummary";
    pub const GC_PHASE_PARALLEL: &str = "jdk.GCPhaseParallel";
    pub const GARBAGE_COLLECTION: &str = "jdk.GarbageCollection";
    pub const CPU_LOAD: &str = "jdk.CPULoad";
    pub const ALLOCATION_IN_NEW_TLAB: &str = "jdk.ObjectAllocationInNewTLAB";
    pub const ALLOCATION_OUTSIDE_TLAB: &str = "jdk.ObjectAllocationOutsideTLAB";
}

/// Point in time, in nanoseconds since the Unix epoch
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(pub u64);

impl Timestamp {
    pub fn from_millis(ms: u64) -> Self {
        Timestamp(ms.saturating_mul(1_000_000))
    }

    pub fn as_nanos(self) -> u64 {
        self.0
    }

    pub fn as_millis(self) -> u64 {
        self.0 / 1_000_000
    }

    /// Nanoseconds elapsed since `earlier`, zero if `earlier` is later
    pub fn saturating_sub_ns(self, earlier: Timestamp) -> u64 {
        self.0.saturating_sub(earlier.0)
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_millis())
    }
}

/// A single field value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    /// Lists such as stack frames; carried through, never read by handlers
    Array(Vec<Value>),
    Object(Fields),
}

impl Value {
    fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Int(_) => "integer",
            Value::Float(_) => "float",
            Value::Str(_) => "string",
            Value::Array(_) => "array",
            Value::Object(_) => "object",
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(i64::from(v))
    }
}

impl From<u32> for Value {
    fn from(v: u32) -> Self {
        Value::Int(i64::from(v))
    }
}

impl From<u64> for Value {
    fn from(v: u64) -> Self {
        Value::Int(i64::try_from(v).unwrap_or(i64::MAX))
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Str(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Str(v)
    }
}

impl From<Vec<Value>> for Value {
    fn from(v: Vec<Value>) -> Self {
        Value::Array(v)
    }
}

impl From<Fields> for Value {
    fn from(v: Fields) -> Self {
        Value::Object(v)
    }
}

/// Named field values of an event, or of a nested object inside one
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fields(BTreeMap<String, Value>);

impl Fields {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(name.into(), value.into());
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(name.into(), value.into());
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    fn require(&self, name: &str) -> Result<&Value, FieldError> {
        match self.0.get(name) {
            Some(Value::Null) | None => Err(FieldError::Missing {
                field: name.to_string(),
            }),
            Some(value) => Ok(value),
        }
    }

    fn mismatch(name: &str, expected: &'static str, found: &Value) -> FieldError {
        FieldError::TypeMismatch {
            field: name.to_string(),
            expected,
            found: found.type_name(),
        }
    }

    pub fn get_i64(&self, name: &str) -> Result<i64, FieldError> {
        match self.require(name)? {
            Value::Int(v) => Ok(*v),
            other => Err(Self::mismatch(name, "integer", other)),
        }
    }

    /// Non-negative integer field (sizes, counts, durations)
    pub fn get_u64(&self, name: &str) -> Result<u64, FieldError> {
        match self.require(name)? {
            Value::Int(v) => u64::try_from(*v).map_err(|_| FieldError::TypeMismatch {
                field: name.to_string(),
                expected: "non-negative integer",
                found: "negative integer",
            }),
            other => Err(Self::mismatch(name, "non-negative integer", other)),
        }
    }

    /// Floating point field; integers are widened
    pub fn get_f64(&self, name: &str) -> Result<f64, FieldError> {
        match self.require(name)? {
            Value::Float(v) => Ok(*v),
            Value::Int(v) => Ok(*v as f64),
            other => Err(Self::mismatch(name, "float", other)),
        }
    }

    pub fn get_str(&self, name: &str) -> Result<&str, FieldError> {
        match self.require(name)? {
            Value::Str(v) => Ok(v),
            other => Err(Self::mismatch(name, "string", other)),
        }
    }

    /// Nested object field
    pub fn get_fields(&self, name: &str) -> Result<&Fields, FieldError> {
        match self.require(name)? {
            Value::Object(v) => Ok(v),
            other => Err(Self::mismatch(name, "object", other)),
        }
    }

    /// Duration field in nanoseconds
    pub fn get_duration_ns(&self, name: &str) -> Result<u64, FieldError> {
        self.get_u64(name)
    }

    /// String field that may also be encoded as an object carrying `inner`
    ///
    /// Decoders render thread and class references either as a plain name or
    /// as a small object (`{"javaName": ...}`, `{"name": ...}`).
    pub fn get_name_like(&self, name: &str, inner: &str) -> Result<&str, FieldError> {
        match self.require(name)? {
            Value::Str(v) => Ok(v),
            Value::Object(nested) => nested.get_str(inner),
            other => Err(Self::mismatch(name, "string or object", other)),
        }
    }
}

impl FromIterator<(String, Value)> for Fields {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Fields(iter.into_iter().collect())
    }
}

/// An immutable, externally decoded telemetry event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub name: String,
    pub timestamp: Timestamp,
    #[serde(default)]
    pub fields: Fields,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<i64>,
}

impl Event {
    pub fn new(name: impl Into<String>, timestamp: Timestamp) -> Self {
        Self {
            name: name.into(),
            timestamp,
            fields: Fields::new(),
            correlation_id: None,
        }
    }

    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(name, value);
        self
    }

    pub fn with_correlation_id(mut self, id: i64) -> Self {
        self.correlation_id = Some(id);
        self
    }

    /// Name of the thread that emitted this event, if recorded
    pub fn thread_name(&self) -> Option<&str> {
        self.fields.get_name_like("eventThread", "javaName").ok()
    }
}
