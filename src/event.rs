//! Event records for the Cell-DEVS scheduler.
//!
//! An event says "something must happen to a cell at this time": either the
//! cell recomputes its state, or a message delivery on one of its inbound
//! links becomes due. Events are immutable once scheduled.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::cell::{CellId, LinkId};
use crate::time::VirtualTime;

// ── Event ID ──────────────────────────────────────────────────────────

/// A strictly increasing event identifier.
///
/// Two events scheduled at the same `VirtualTime` are ordered by their
/// `EventId`, which is creation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EventId(u64);

impl EventId {
    #[inline]
    pub fn new(raw: u64) -> Self {
        EventId(raw)
    }

    #[inline]
    pub fn raw(self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for EventId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "E#{}", self.0)
    }
}

// ── Event ID Generator ───────────────────────────────────────────────

/// Deterministic, strictly increasing event-ID generator.
///
/// Each scheduler owns exactly one of these.
#[derive(Debug, Clone, Default)]
pub struct EventIdGen {
    next: u64,
}

impl EventIdGen {
    pub fn new() -> Self {
        EventIdGen { next: 0 }
    }

    /// Mint the next event ID.
    pub fn next_id(&mut self) -> EventId {
        let id = EventId(self.next);
        self.next += 1;
        id
    }

    /// Peek at the next ID without consuming it.
    pub fn peek(&self) -> EventId {
        EventId(self.next)
    }
}

// ── Event Kind ────────────────────────────────────────────────────────

/// What an event asks the engine to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventKind {
    /// Recompute the local state of `cell`.
    Transition { cell: CellId },

    /// The message `seq` on `link` is due. Stale if the transport layer no
    /// longer holds that message.
    Delivery { link: LinkId, seq: u64 },
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EventKind::Transition { cell } => write!(f, "Transition({})", cell),
            EventKind::Delivery { link, seq } => write!(f, "Delivery({}, #{})", link, seq),
        }
    }
}

// ── Event ─────────────────────────────────────────────────────────────

/// A single scheduled event, ordered by `(scheduled_at, id)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    pub id: EventId,
    pub scheduled_at: VirtualTime,
    pub kind: EventKind,
}

impl Event {
    pub fn new(id: EventId, scheduled_at: VirtualTime, kind: EventKind) -> Self {
        Event {
            id,
            scheduled_at,
            kind,
        }
    }
}

/// Ordering: smallest `(scheduled_at, id)` first.
///
/// `BinaryHeap` is a max-heap, so the natural ordering is reversed here.
impl Ord for Event {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .scheduled_at
            .cmp(&self.scheduled_at)
            .then_with(|| other.id.cmp(&self.id))
    }
}

impl PartialOrd for Event {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn transition(cell: u32) -> EventKind {
        EventKind::Transition {
            cell: CellId::new(cell),
        }
    }

    #[test]
    fn test_event_id_monotonic() {
        let mut gen = EventIdGen::new();
        let a = gen.next_id();
        let b = gen.next_id();
        assert_eq!(a.raw(), 0);
        assert_eq!(b.raw(), 1);
        assert_eq!(gen.peek().raw(), 2);
    }

    #[test]
    fn test_event_ordering_by_time() {
        let e1 = Event::new(EventId::new(5), VirtualTime::new(10), transition(0));
        let e2 = Event::new(EventId::new(1), VirtualTime::new(20), transition(0));
        // Earlier time wins regardless of id; reversed ordering → e1 > e2.
        assert!(e1 > e2);
    }

    #[test]
    fn test_event_ordering_tiebreak_by_id() {
        let e1 = Event::new(EventId::new(0), VirtualTime::new(10), transition(3));
        let e2 = Event::new(
            EventId::new(1),
            VirtualTime::new(10),
            EventKind::Delivery {
                link: LinkId::new(0),
                seq: 0,
            },
        );
        assert!(e1 > e2);
    }

    #[test]
    fn test_event_display() {
        assert_eq!(EventId::new(42).to_string(), "E#42");
        assert_eq!(transition(4).to_string(), "Transition(C4)");
        let d = EventKind::Delivery {
            link: LinkId::new(2),
            seq: 9,
        };
        assert_eq!(d.to_string(), "Delivery(L2, #9)");
    }
}
