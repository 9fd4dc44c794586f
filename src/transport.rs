//! Delay transport layer.
//!
//! Decouples "a cell committed a new state" from "a neighbor observes that
//! state". Every outbound message is held here, per link, until its delivery
//! time. Two policies exist: transport delay keeps every message and delivers
//! them in order, inertial delay keeps only the latest one in flight.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::cell::LinkId;
use crate::time::VirtualTime;

// ── Delay Policy ──────────────────────────────────────────────────────

/// How a link treats a new message while an older one is still in flight.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DelayPolicy {
    /// Every message is delivered, FIFO per link.
    #[default]
    Transport,
    /// A newer message supersedes the one in flight.
    Inertial,
}

impl std::fmt::Display for DelayPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DelayPolicy::Transport => write!(f, "transport"),
            DelayPolicy::Inertial => write!(f, "inertial"),
        }
    }
}

// ── Pending Message ───────────────────────────────────────────────────

/// A message held until its delivery time.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingMessage<S> {
    /// Transport-wide sequence number; matches the delivery event.
    pub seq: u64,
    pub link: LinkId,
    pub value: S,
    pub sent_at: VirtualTime,
    pub deliver_at: VirtualTime,
}

/// What `send` did with a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SendReceipt {
    pub seq: u64,
    pub deliver_at: VirtualTime,
    /// Sequence number of the inertial message this one replaced.
    pub superseded: Option<u64>,
}

#[derive(Debug, Clone)]
enum LinkQueue<S> {
    Transport {
        queue: VecDeque<PendingMessage<S>>,
        last_deliver_at: VirtualTime,
    },
    Inertial(Option<PendingMessage<S>>),
}

impl<S> LinkQueue<S> {
    fn new(policy: DelayPolicy) -> Self {
        match policy {
            DelayPolicy::Transport => LinkQueue::Transport {
                queue: VecDeque::new(),
                last_deliver_at: VirtualTime::ZERO,
            },
            DelayPolicy::Inertial => LinkQueue::Inertial(None),
        }
    }

    fn len(&self) -> usize {
        match self {
            LinkQueue::Transport { queue, .. } => queue.len(),
            LinkQueue::Inertial(slot) => usize::from(slot.is_some()),
        }
    }
}

// ── Delay Transport ───────────────────────────────────────────────────

/// Per-link message buffers with a policy fixed at construction.
#[derive(Debug, Clone)]
pub struct DelayTransport<S> {
    links: Vec<LinkQueue<S>>,
    next_seq: u64,
    sent: u64,
    delivered: u64,
    superseded: u64,
}

impl<S: Clone> DelayTransport<S> {
    /// Create buffers for links `0..policies.len()`, link `i` using
    /// `policies[i]`.
    pub fn new(policies: impl IntoIterator<Item = DelayPolicy>) -> Self {
        DelayTransport {
            links: policies.into_iter().map(LinkQueue::new).collect(),
            next_seq: 0,
            sent: 0,
            delivered: 0,
            superseded: 0,
        }
    }

    /// Queue `value` on `link`, sent at `now` with `delay`.
    ///
    /// Returns `None` if the delivery time overflows virtual time or the link
    /// does not exist.
    pub fn send(
        &mut self,
        link: LinkId,
        now: VirtualTime,
        delay: VirtualTime,
        value: S,
    ) -> Option<SendReceipt> {
        let earliest = now.plus(delay)?;
        let seq = self.next_seq;
        let slot = self.links.get_mut(link.index())?;
        self.next_seq += 1;
        self.sent += 1;

        match slot {
            LinkQueue::Transport {
                queue,
                last_deliver_at,
            } => {
                // Keep FIFO even when a model shortens its output delay.
                let deliver_at = earliest.max(*last_deliver_at);
                *last_deliver_at = deliver_at;
                queue.push_back(PendingMessage {
                    seq,
                    link,
                    value,
                    sent_at: now,
                    deliver_at,
                });
                trace!(%link, seq, deliver_at = deliver_at.ticks(), "transport message queued");
                Some(SendReceipt {
                    seq,
                    deliver_at,
                    superseded: None,
                })
            }
            LinkQueue::Inertial(pending) => {
                let previous = pending.replace(PendingMessage {
                    seq,
                    link,
                    value,
                    sent_at: now,
                    deliver_at: earliest,
                });
                let superseded = previous.map(|p| p.seq);
                if let Some(old) = superseded {
                    self.superseded += 1;
                    trace!(%link, seq, old, "inertial message superseded");
                }
                Some(SendReceipt {
                    seq,
                    deliver_at: earliest,
                    superseded,
                })
            }
        }
    }

    /// Hand over the message `seq` on `link` for delivery.
    ///
    /// Returns `None` when `seq` is no longer the live message on the link
    /// (an inertial message that was superseded).
    pub fn take(&mut self, link: LinkId, seq: u64) -> Option<PendingMessage<S>> {
        let slot = self.links.get_mut(link.index())?;
        let taken = match slot {
            LinkQueue::Transport { queue, .. } => {
                if queue.front().map(|m| m.seq) == Some(seq) {
                    queue.pop_front()
                } else {
                    None
                }
            }
            LinkQueue::Inertial(pending) => {
                if pending.as_ref().map(|m| m.seq) == Some(seq) {
                    pending.take()
                } else {
                    None
                }
            }
        };
        if taken.is_some() {
            self.delivered += 1;
        }
        taken
    }

    /// The message `seq` on `link`, if it is still waiting for delivery.
    pub fn pending(&self, link: LinkId, seq: u64) -> Option<&PendingMessage<S>> {
        match self.links.get(link.index())? {
            LinkQueue::Transport { queue, .. } => queue.iter().find(|m| m.seq == seq),
            LinkQueue::Inertial(pending) => pending.as_ref().filter(|m| m.seq == seq),
        }
    }

    /// Whether a delivery event for `seq` on `link` would deliver anything.
    pub fn is_live(&self, link: LinkId, seq: u64) -> bool {
        self.pending(link, seq).is_some()
    }

    /// Messages still in flight on `link`.
    pub fn pending_on(&self, link: LinkId) -> usize {
        self.links.get(link.index()).map_or(0, LinkQueue::len)
    }

    /// Messages still in flight on all links.
    pub fn pending_count(&self) -> usize {
        self.links.iter().map(LinkQueue::len).sum()
    }

    pub fn link_count(&self) -> usize {
        self.links.len()
    }

    pub fn sent_count(&self) -> u64 {
        self.sent
    }

    pub fn delivered_count(&self) -> u64 {
        self.delivered
    }

    pub fn superseded_count(&self) -> u64 {
        self.superseded
    }
}
