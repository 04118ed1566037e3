//! Error taxonomy for event analysis
//!
//! Every per-event or per-handler failure is expressed as an [`AnalysisError`].
//! The dispatcher logs and counts them; none of them stops the shared
//! dispatch loop.

use thiserror::Error;

use crate::estimator::EstimateError;
use crate::sink::SinkError;

/// Failure of a typed field accessor
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FieldError {
    #[error("field `{field}` is missing")]
    Missing { field: String },

    #[error("field `{field}` has type {found}, expected {expected}")]
    TypeMismatch {
        field: String,
        expected: &'static str,
        found: &'static str,
    },
}

impl FieldError {
    /// Name of the field that failed to extract
    pub fn field(&self) -> &str {
        match self {
            FieldError::Missing { field } | FieldError::TypeMismatch { field, .. } => field,
        }
    }
}

/// Errors raised while correlating, aggregating or emitting events
#[derive(Error, Debug)]
pub enum AnalysisError {
    #[error("malformed {event} event: {reason}")]
    MalformedEvent { event: String, reason: String },

    #[error("duplicate {role} event for correlation id {id}")]
    DuplicateRole { id: i64, role: &'static str },

    #[error("GC configuration not available yet")]
    ConfigUnavailable,

    #[error("CPU cost estimate failed: {0}")]
    Estimate(#[from] EstimateError),

    #[error("sink write failed for {handler}: {source}")]
    SinkWrite {
        handler: String,
        #[source]
        source: SinkError,
    },

    #[error("sink finalize failed for {handler}: {source}")]
    SinkFinalize {
        handler: String,
        #[source]
        source: SinkError,
    },
}

impl AnalysisError {
    /// Build a malformed-event error from a field accessor failure
    pub fn malformed(event: &str, err: FieldError) -> Self {
        AnalysisError::MalformedEvent {
            event: event.to_string(),
            reason: err.to_string(),
        }
    }

    /// Whether this error should be surfaced as a failed run for its handler
    ///
    /// Per-event problems and sink write failures are recoverable; a failed
    /// publish or a missing GC configuration under the fail-fast policy is not.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            AnalysisError::ConfigUnavailable | AnalysisError::SinkFinalize { .. }
        )
    }
}

/// Result type for analysis operations
pub type Result<T> = std::result::Result<T, AnalysisError>;
