use super::*;
use crate::event::Fields;
use std::cell::Cell;
use std::rc::Rc;

#[derive(Debug)]
struct Counter {
    instance: u32,
    group: String,
    seen: u64,
}

impl GroupAggregator for Counter {
    type Row = (String, u32, u64);

    fn accept(&mut self, event: &Event) -> Result<Option<Self::Row>> {
        if event.fields.contains("reject") {
            return Err(crate::error::AnalysisError::MalformedEvent {
                event: event.name.clone(),
                reason: "rejected".to_string(),
            });
        }
        self.seen += 1;
        Ok(Some((self.group.clone(), self.instance, self.seen)))
    }
}

fn event_on(thread: &str, at_ms: u64) -> Event {
    Event::new("jdk.ObjectAllocationInNewTLAB", Timestamp::from_millis(at_ms))
        .with_field("eventThread", Fields::new().with("javaName", thread))
}

fn dispatcher(limits: GroupLimits) -> (ThreadGroupDispatcher<Counter>, Rc<Cell<u32>>) {
    let created = Rc::new(Cell::new(0));
    let counter = Rc::clone(&created);
    let grouper = ThreadGrouper::new();
    let dispatcher = ThreadGroupDispatcher::new(
        move |event| grouper.group_of(event),
        move |group| {
            counter.set(counter.get() + 1);
            Counter {
                instance: counter.get(),
                group: group.to_string(),
                seen: 0,
            }
        },
        limits,
    );
    (dispatcher, created)
}

fn limits(capacity: usize, idle_ms: Option<u64>) -> GroupLimits {
    GroupLimits {
        capacity: NonZeroUsize::new(capacity).unwrap(),
        idle_timeout: idle_ms.map(Duration::from_millis),
    }
}

#[test]
fn test_same_group_reuses_aggregator() {
    let (mut groups, created) = dispatcher(GroupLimits::default());

    let first = groups.dispatch(&event_on("main", 1)).unwrap().unwrap();
    groups.dispatch(&event_on("worker-1", 2)).unwrap();
    let again = groups.dispatch(&event_on("main", 3)).unwrap().unwrap();

    assert_eq!(first.1, again.1);
    assert_eq!(again.2, 2);
    assert_eq!(created.get(), 2);
    assert_eq!(groups.len(), 2);
    assert_eq!(groups.aggregator("main").unwrap().seen, 2);
}

#[test]
fn test_distinct_groups_get_distinct_aggregators() {
    let (mut groups, _) = dispatcher(GroupLimits::default());
    let a = groups.dispatch(&event_on("a", 1)).unwrap().unwrap();
    let b = groups.dispatch(&event_on("b", 1)).unwrap().unwrap();
    assert_ne!(a.1, b.1);
}

#[test]
fn test_event_without_thread_is_ungrouped() {
    let (mut groups, created) = dispatcher(GroupLimits::default());
    let row = groups
        .dispatch(&Event::new("jdk.ObjectAllocationInNewTLAB", Timestamp(0)))
        .unwrap();
    assert!(row.is_none());
    assert_eq!(groups.ungrouped(), 1);
    assert_eq!(created.get(), 0);
    assert!(groups.is_empty());
}

#[test]
fn test_capacity_evicts_least_recently_used() {
    let (mut groups, _) = dispatcher(limits(2, None));

    groups.dispatch(&event_on("a", 1)).unwrap();
    groups.dispatch(&event_on("b", 2)).unwrap();
    groups.dispatch(&event_on("a", 3)).unwrap();
    groups.dispatch(&event_on("c", 4)).unwrap();

    assert_eq!(groups.len(), 2);
    assert_eq!(groups.evictions(), 1);
    assert!(groups.aggregator("a").is_some());
    assert!(groups.aggregator("b").is_none());
    assert!(groups.aggregator("c").is_some());

    let row = groups.dispatch(&event_on("a", 5)).unwrap().unwrap();
    assert_eq!(row, ("a".to_string(), 1, 3));
}

#[test]
fn test_rejected_event_for_new_group_evicts_nothing() {
    let (mut groups, _) = dispatcher(limits(1, Some(1_000)));

    groups.dispatch(&event_on("a", 1)).unwrap();
    let bad = event_on("b", 5_000).with_field("reject", true);
    assert!(groups.dispatch(&bad).is_err());

    assert_eq!(groups.evictions(), 0);
    assert_eq!(groups.len(), 1);
    assert!(groups.aggregator("b").is_none());

    let row = groups.dispatch(&event_on("a", 2)).unwrap().unwrap();
    assert_eq!(row, ("a".to_string(), 1, 2));
}

#[test]
fn test_rejected_event_does_not_refresh_recency() {
    let (mut groups, _) = dispatcher(limits(2, None));

    groups.dispatch(&event_on("a", 1)).unwrap();
    groups.dispatch(&event_on("b", 2)).unwrap();
    assert!(groups.dispatch(&event_on("a", 3).with_field("reject", true)).is_err());
    assert_eq!(groups.aggregator("a").unwrap().seen, 1);

    groups.dispatch(&event_on("c", 4)).unwrap();
    assert!(groups.aggregator("a").is_none());
    assert!(groups.aggregator("b").is_some());
}

#[test]
fn test_idle_group_replaced_on_its_own_next_event() {
    let (mut groups, _) = dispatcher(limits(16, Some(1_000)));

    groups.dispatch(&event_on("a", 0)).unwrap();
    let row = groups.dispatch(&event_on("a", 1_500)).unwrap().unwrap();

    assert_eq!(row, ("a".to_string(), 2, 1));
    assert_eq!(groups.evictions(), 1);
    assert_eq!(groups.len(), 1);
}

#[test]
fn test_evicted_group_is_recreated_fresh() {
    let (mut groups, created) = dispatcher(limits(1, None));

    groups.dispatch(&event_on("a", 1)).unwrap();
    groups.dispatch(&event_on("b", 2)).unwrap();
    let row = groups.dispatch(&event_on("a", 3)).unwrap().unwrap();

    assert_eq!(created.get(), 3);
    assert_eq!(row, ("a".to_string(), 3, 1));
}

#[test]
fn test_idle_groups_evicted_in_event_time() {
    let (mut groups, _) = dispatcher(limits(16, Some(1_000)));

    groups.dispatch(&event_on("a", 0)).unwrap();
    groups.dispatch(&event_on("b", 500)).unwrap();
    groups.dispatch(&event_on("b", 1_200)).unwrap();

    assert!(groups.aggregator("a").is_none());
    assert!(groups.aggregator("b").is_some());
    assert_eq!(groups.evictions(), 1);
}

#[test]
fn test_no_idle_timeout_keeps_groups() {
    let (mut groups, _) = dispatcher(limits(16, None));
    groups.dispatch(&event_on("a", 0)).unwrap();
    groups.dispatch(&event_on("b", 10_000_000)).unwrap();
    assert_eq!(groups.len(), 2);
    assert_eq!(groups.evictions(), 0);
}

#[test]
fn test_finish_drops_every_live_group() {
    let (mut groups, _) = dispatcher(limits(2, None));
    groups.dispatch(&event_on("a", 1)).unwrap();
    groups.dispatch(&event_on("b", 2)).unwrap();
    groups.dispatch(&event_on("c", 3)).unwrap();

    assert_eq!(groups.finish(), 2);
    assert!(groups.is_empty());
    assert_eq!(groups.evictions(), 1);
}

#[test]
fn test_live_groups_never_exceed_capacity() {
    let (mut groups, _) = dispatcher(limits(8, None));
    for i in 0..100u64 {
        groups
            .dispatch(&event_on(&format!("pool-1-thread-{}", i % 13), i))
            .unwrap();
        assert!(groups.len() <= 8);
    }
}
