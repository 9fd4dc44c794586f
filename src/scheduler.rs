//! Deterministic event queue.
//!
//! A `BinaryHeap` with reversed `Ord` on `Event` acts as a min-heap keyed by
//! `(scheduled_at, event_id)`. Event IDs are strictly increasing, so two runs
//! that schedule the same events in the same order dispatch them in the same
//! order.

use std::collections::BinaryHeap;

use crate::event::{Event, EventId, EventIdGen, EventKind};
use crate::time::VirtualTime;

/// Owns the event queue and the ID generator.
#[derive(Debug, Clone, Default)]
pub struct Scheduler {
    queue: BinaryHeap<Event>,
    id_gen: EventIdGen,
}

impl Scheduler {
    pub fn new() -> Self {
        Scheduler {
            queue: BinaryHeap::new(),
            id_gen: EventIdGen::new(),
        }
    }

    /// Schedule `kind` at `at`. Returns the ID assigned to the event.
    pub fn schedule(&mut self, at: VirtualTime, kind: EventKind) -> EventId {
        let id = self.id_gen.next_id();
        self.queue.push(Event::new(id, at, kind));
        id
    }

    /// Pop the next event (earliest time, lowest ID).
    pub fn pop_next(&mut self) -> Option<Event> {
        self.queue.pop()
    }

    pub fn peek_next(&self) -> Option<&Event> {
        self.queue.peek()
    }

    /// Time of the next event, if any.
    pub fn peek_time(&self) -> Option<VirtualTime> {
        self.queue.peek().map(|e| e.scheduled_at)
    }

    /// Pop every event currently queued at exactly `at`, in dispatch order.
    ///
    /// Events scheduled at `at` *after* this call are left for the next call.
    pub fn pop_due(&mut self, at: VirtualTime) -> Vec<Event> {
        let mut due = Vec::new();
        while self.peek_time() == Some(at) {
            if let Some(e) = self.queue.pop() {
                due.push(e);
            }
        }
        due
    }

    /// Put back events taken by [`pop_due`](Self::pop_due). Ids are kept, so
    /// they dispatch in their original order.
    pub fn restore(&mut self, events: impl IntoIterator<Item = Event>) {
        self.queue.extend(events);
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    /// The next event ID that will be assigned.
    pub fn next_event_id(&self) -> EventId {
        self.id_gen.peek()
    }

    /// Drain all events in dispatch order.
    pub fn drain_ordered(&mut self) -> Vec<Event> {
        let mut events = Vec::with_capacity(self.queue.len());
        while let Some(e) = self.queue.pop() {
            events.push(e);
        }
        events
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cell::{CellId, LinkId};

    fn transition(cell: u32) -> EventKind {
        EventKind::Transition {
            cell: CellId::new(cell),
        }
    }

    #[test]
    fn test_fifo_at_same_time() {
        let mut sched = Scheduler::new();
        sched.schedule(VirtualTime::new(10), transition(7));
        sched.schedule(VirtualTime::new(10), transition(3));
        sched.schedule(VirtualTime::new(10), transition(5));

        let order: Vec<EventKind> = sched.drain_ordered().into_iter().map(|e| e.kind).collect();
        // Same time → creation order, not cell order.
        assert_eq!(order, vec![transition(7), transition(3), transition(5)]);
    }

    #[test]
    fn test_time_ordering() {
        let mut sched = Scheduler::new();
        sched.schedule(VirtualTime::new(30), transition(0));
        sched.schedule(VirtualTime::new(10), transition(0));
        sched.schedule(VirtualTime::new(20), transition(0));

        let times: Vec<u64> = sched
            .drain_ordered()
            .iter()
            .map(|e| e.scheduled_at.ticks())
            .collect();
        assert_eq!(times, vec![10, 20, 30]);
    }

    #[test]
    fn test_pop_due_takes_only_that_instant() {
        let mut sched = Scheduler::new();
        sched.schedule(VirtualTime::new(2), transition(0));
        sched.schedule(VirtualTime::new(1), transition(1));
        sched.schedule(VirtualTime::new(1), transition(2));

        assert!(sched.pop_due(VirtualTime::new(2)).is_empty());
        let due = sched.pop_due(VirtualTime::new(1));
        assert_eq!(due.len(), 2);
        assert_eq!(due[0].kind, transition(1));
        assert_eq!(sched.peek_time(), Some(VirtualTime::new(2)));
    }

    #[test]
    fn test_restore_keeps_dispatch_order() {
        let mut sched = Scheduler::new();
        sched.schedule(VirtualTime::new(1), transition(4));
        sched.schedule(VirtualTime::new(1), transition(2));
        sched.schedule(VirtualTime::new(3), transition(0));

        let due = sched.pop_due(VirtualTime::new(1));
        let ids: Vec<EventId> = due.iter().map(|e| e.id).collect();
        sched.restore(due);
        assert_eq!(sched.len(), 3);

        let again = sched.pop_due(VirtualTime::new(1));
        assert_eq!(again.iter().map(|e| e.id).collect::<Vec<_>>(), ids);
        assert_eq!(again[0].kind, transition(4));
        assert_eq!(sched.next_event_id(), EventId::new(3));
    }

    #[test]
    fn test_empty_scheduler() {
        let mut sched = Scheduler::new();
        assert!(sched.is_empty());
        assert_eq!(sched.len(), 0);
        assert!(sched.pop_next().is_none());
        assert!(sched.peek_time().is_none());
    }

    #[test]
    fn test_next_event_id_tracks_schedule() {
        let mut sched = Scheduler::new();
        assert_eq!(sched.next_event_id(), EventId::new(0));
        let id = sched.schedule(
            VirtualTime::ZERO,
            EventKind::Delivery {
                link: LinkId::new(0),
                seq: 0,
            },
        );
        assert_eq!(id, EventId::new(0));
        assert_eq!(sched.next_event_id(), EventId::new(1));
        assert_eq!(sched.peek_next().map(|e| e.id), Some(id));
    }

    #[test]
    fn test_determinism_across_runs() {
        fn build() -> Vec<Event> {
            let mut sched = Scheduler::new();
            sched.schedule(VirtualTime::new(5), transition(1));
            sched.schedule(VirtualTime::new(3), transition(2));
            sched.schedule(VirtualTime::new(5), transition(3));
            sched.schedule(VirtualTime::new(1), transition(4));
            sched.drain_ordered()
        }
        assert_eq!(build(), build());
    }
}
