//! Fan-out of events to per-thread-group aggregators
//!
//! Thread-heavy applications (executor pools, virtual threads) create and
//! retire threads continuously, so the set of live groups must stay bounded:
//! - at most `capacity` aggregators are alive; a new group at capacity
//!   evicts the least recently used one
//! - a group that has not seen an event for `idle_timeout` (event time) is
//!   evicted on the next dispatch
//!
//! Evicted aggregators are dropped; a group that shows up again after
//! eviction starts over with a fresh aggregator.

mod grouper;

pub use grouper::ThreadGrouper;

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::num::NonZeroUsize;
use std::time::Duration;

use crate::error::Result;
use crate::event::{Event, Timestamp};

/// Aggregation unit for one thread group
pub trait GroupAggregator {
    type Row;

    /// Consume one event of this group, optionally producing a row
    ///
    /// Must leave the aggregator unchanged when it returns an error.
    fn accept(&mut self, event: &Event) -> Result<Option<Self::Row>>;
}

/// Bounds on the number and lifetime of live aggregators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GroupLimits {
    pub capacity: NonZeroUsize,
    pub idle_timeout: Option<Duration>,
}

impl Default for GroupLimits {
    fn default() -> Self {
        Self {
            capacity: NonZeroUsize::new(1024).unwrap_or(NonZeroUsize::MIN),
            idle_timeout: Some(Duration::from_secs(60)),
        }
    }
}

struct Slot<A> {
    aggregator: A,
    last_seen: Timestamp,
    /// Position in the recency index; zero until first touched
    touch: u64,
}

pub type GroupFn = Box<dyn Fn(&Event) -> Option<String>>;
pub type AggregatorFactory<A> = Box<dyn FnMut(&str) -> A>;

pub struct ThreadGroupDispatcher<A: GroupAggregator> {
    group_of: GroupFn,
    factory: AggregatorFactory<A>,
    limits: GroupLimits,
    groups: HashMap<String, Slot<A>>,
    /// touch tick -> group key, oldest first
    recency: BTreeMap<u64, String>,
    clock: u64,
    evictions: u64,
    ungrouped: u64,
}

impl<A: GroupAggregator> fmt::Debug for ThreadGroupDispatcher<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ThreadGroupDispatcher")
            .field("limits", &self.limits)
            .field("groups", &self.groups.len())
            .field("evictions", &self.evictions)
            .field("ungrouped", &self.ungrouped)
            .finish()
    }
}

impl<A: GroupAggregator> ThreadGroupDispatcher<A> {
    pub fn new(
        group_of: impl Fn(&Event) -> Option<String> + 'static,
        factory: impl FnMut(&str) -> A + 'static,
        limits: GroupLimits,
    ) -> Self {
        Self {
            group_of: Box::new(group_of),
            factory: Box::new(factory),
            limits,
            groups: HashMap::new(),
            recency: BTreeMap::new(),
            clock: 0,
            evictions: 0,
            ungrouped: 0,
        }
    }

    /// Route an event to its group's aggregator, creating it on first use
    ///
    /// Events without a group are dropped and counted. An event the
    /// aggregator rejects leaves the live groups exactly as they were: no
    /// group is created, evicted or touched.
    pub fn dispatch(&mut self, event: &Event) -> Result<Option<A::Row>> {
        let Some(key) = (self.group_of)(event) else {
            self.ungrouped += 1;
            return Ok(None);
        };
        let now = event.timestamp;

        let live = self
            .groups
            .get(&key)
            .is_some_and(|slot| !self.is_idle(slot, now));
        if live {
            let row = match self.groups.get_mut(&key) {
                Some(slot) => slot.aggregator.accept(event)?,
                None => None,
            };
            self.touch(&key, now);
            self.evict_idle(now);
            return Ok(row);
        }

        let mut aggregator = (self.factory)(&key);
        let row = aggregator.accept(event)?;
        tracing::trace!(group = %key, "creating group aggregator");

        // an idle slot for this key is replaced by the fresh aggregator
        if let Some(tick) = self.groups.get(&key).map(|slot| slot.touch) {
            self.recency.remove(&tick);
            self.evict_slot(tick, &key, "idle");
        }
        self.evict_idle(now);
        self.make_room();
        self.groups.insert(
            key.clone(),
            Slot {
                aggregator,
                last_seen: now,
                touch: 0,
            },
        );
        self.touch(&key, now);
        Ok(row)
    }

    fn is_idle(&self, slot: &Slot<A>, now: Timestamp) -> bool {
        self.limits
            .idle_timeout
            .is_some_and(|idle| u128::from(now.saturating_sub_ns(slot.last_seen)) >= idle.as_nanos())
    }

    /// Mark a live group as the most recently used
    fn touch(&mut self, key: &str, now: Timestamp) {
        let Some(slot) = self.groups.get_mut(key) else {
            return;
        };
        self.clock += 1;
        if slot.touch != 0 {
            self.recency.remove(&slot.touch);
        }
        slot.touch = self.clock;
        slot.last_seen = slot.last_seen.max(now);
        self.recency.insert(self.clock, key.to_string());
    }

    fn make_room(&mut self) {
        while self.groups.len() >= self.limits.capacity.get() {
            let Some((tick, key)) = self.recency.pop_first() else {
                break;
            };
            self.evict_slot(tick, &key, "capacity");
        }
    }

    /// Evict from the least recently touched end while groups are idle
    ///
    /// Timestamps are only loosely ordered, so the scan stops at the first
    /// group that is still active rather than inspecting every group.
    fn evict_idle(&mut self, now: Timestamp) {
        let Some(idle) = self.limits.idle_timeout else {
            return;
        };
        let idle_ns = u64::try_from(idle.as_nanos()).unwrap_or(u64::MAX);

        while let Some((&tick, key)) = self.recency.first_key_value() {
            let idle_for = self
                .groups
                .get(key)
                .map_or(u64::MAX, |slot| now.saturating_sub_ns(slot.last_seen));
            if idle_for < idle_ns {
                break;
            }
            let key = key.clone();
            self.recency.remove(&tick);
            self.evict_slot(tick, &key, "idle");
        }
    }

    fn evict_slot(&mut self, tick: u64, key: &str, reason: &'static str) {
        if let Some(slot) = self.groups.remove(key) {
            debug_assert_eq!(slot.touch, tick);
            self.evictions += 1;
            tracing::debug!(group = %key, reason, "evicting group aggregator");
        }
    }

    /// Drop every live aggregator, returning how many there were
    pub fn finish(&mut self) -> usize {
        self.recency.clear();
        let live = self.groups.len();
        self.groups.clear();
        live
    }

    pub fn aggregator(&self, key: &str) -> Option<&A> {
        self.groups.get(key).map(|slot| &slot.aggregator)
    }

    /// Number of live aggregators
    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn evictions(&self) -> u64 {
        self.evictions
    }

    /// Events dropped because no group could be derived
    pub fn ungrouped(&self) -> u64 {
        self.ungrouped
    }

    pub fn limits(&self) -> GroupLimits {
        self.limits
    }
}

#[cfg(test)]
mod tests;
