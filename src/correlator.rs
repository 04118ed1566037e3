//! Before/after pairing of phase events by correlation id
//!
//! Collection cycles report heap state twice, once before and once after the
//! collection. Events for different cycles interleave freely, so pairs are
//! keyed by correlation id and ordered by role, never by arrival.

use std::collections::{BTreeMap, HashSet, VecDeque};
use std::fmt;

use crate::error::{AnalysisError, Result};
use crate::event::Event;

/// Marker text used by the recorder for the `when` field
pub const BEFORE_GC: &str = "Before GC";
pub const AFTER_GC: &str = "After GC";

/// Which half of a paired measurement an event represents
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    Before,
    After,
}

impl Role {
    /// Parse the recorder's `when` marker
    pub fn from_when(when: &str) -> Option<Role> {
        match when {
            BEFORE_GC => Some(Role::Before),
            AFTER_GC => Some(Role::After),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Role::Before => "before",
            Role::After => "after",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Completed ids remembered so a late repeat is not mistaken for a new pair
pub const COMPLETED_WINDOW: usize = 4096;

/// Default role extractor: the `when` field of heap summary events
pub fn role_from_when(event: &Event) -> Option<Role> {
    event
        .fields
        .get_str("when")
        .ok()
        .and_then(Role::from_when)
}

/// Default id extractor: the event's correlation id
pub fn correlation_id(event: &Event) -> Option<i64> {
    event.correlation_id
}

/// A completed before/after pair
#[derive(Debug, Clone, PartialEq)]
pub struct CorrelatedPair {
    pub id: i64,
    pub before: Event,
    pub after: Event,
}

#[derive(Debug)]
struct Pending {
    role: Role,
    event: Event,
}

/// Holds the first half of each pair until its counterpart arrives
///
/// At most one pending entry exists per id. A second event with the same id
/// and the same role replaces the pending one (last write wins) and is
/// counted as a duplicate. Once a pair has been handed out it is closed: any
/// further event for one of the last [`COMPLETED_WINDOW`] completed ids is
/// rejected with `DuplicateRole` and counted the same way.
#[derive(Debug, Default)]
pub struct PairCorrelator {
    pending: BTreeMap<i64, Pending>,
    completed: HashSet<i64>,
    completed_order: VecDeque<i64>,
    duplicates: u64,
    rejected: u64,
}

impl PairCorrelator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Offer an event; returns the completed pair once both halves are seen
    ///
    /// # Errors
    /// `MalformedEvent` when the id or role cannot be extracted, and
    /// `DuplicateRole` when the id belongs to a recently completed pair.
    /// Nothing is stored in either case and other pending pairs are untouched.
    pub fn correlate<I, R>(
        &mut self,
        event: &Event,
        id_of: I,
        role_of: R,
    ) -> Result<Option<CorrelatedPair>>
    where
        I: Fn(&Event) -> Option<i64>,
        R: Fn(&Event) -> Option<Role>,
    {
        let Some(id) = id_of(event) else {
            self.rejected += 1;
            return Err(AnalysisError::MalformedEvent {
                event: event.name.clone(),
                reason: "no correlation id".to_string(),
            });
        };
        let Some(role) = role_of(event) else {
            self.rejected += 1;
            return Err(AnalysisError::MalformedEvent {
                event: event.name.clone(),
                reason: format!("unrecognized role for correlation id {}", id),
            });
        };

        if self.completed.contains(&id) {
            self.duplicates += 1;
            return Err(AnalysisError::DuplicateRole {
                id,
                role: role.as_str(),
            });
        }

        match self.pending.remove(&id) {
            None => {
                self.pending.insert(
                    id,
                    Pending {
                        role,
                        event: event.clone(),
                    },
                );
                Ok(None)
            }
            Some(previous) if previous.role == role => {
                self.duplicates += 1;
                tracing::warn!(
                    id,
                    role = role.as_str(),
                    event = %event.name,
                    "duplicate role for correlation id, keeping the latest event"
                );
                self.pending.insert(
                    id,
                    Pending {
                        role,
                        event: event.clone(),
                    },
                );
                Ok(None)
            }
            Some(previous) => {
                let (before, after) = match role {
                    Role::After => (previous.event, event.clone()),
                    Role::Before => (event.clone(), previous.event),
                };
                self.close(id);
                Ok(Some(CorrelatedPair { id, before, after }))
            }
        }
    }

    fn close(&mut self, id: i64) {
        if self.completed_order.len() >= COMPLETED_WINDOW {
            if let Some(oldest) = self.completed_order.pop_front() {
                self.completed.remove(&oldest);
            }
        }
        self.completed.insert(id);
        self.completed_order.push_back(id);
    }

    /// Number of events waiting for their counterpart
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_pending(&self, id: i64) -> bool {
        self.pending.contains_key(&id)
    }

    /// Number of same-role replacements and late repeats seen so far
    pub fn duplicates(&self) -> u64 {
        self.duplicates
    }

    /// Number of events rejected for a missing id or role
    pub fn rejected(&self) -> u64 {
        self.rejected
    }

    /// Remove every unpaired event, ascending by correlation id
    pub fn drain_unpaired(&mut self) -> Vec<(i64, Role, Event)> {
        std::mem::take(&mut self.pending)
            .into_iter()
            .map(|(id, p)| (id, p.role, p.event))
            .collect()
    }
}
