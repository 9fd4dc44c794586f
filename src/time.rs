//! Virtual time for the Cell-DEVS kernel.
//!
//! The one time type of the whole system: an unsigned tick count. Scenario
//! delays, the run horizon and every event timestamp use it. Time advances
//! only when the engine dequeues the next instant, never from wall-clock
//! observation.

use serde::{Deserialize, Serialize};

/// A logical tick in simulation time.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct VirtualTime(u64);

impl VirtualTime {
    /// The zero-point of simulation time.
    pub const ZERO: VirtualTime = VirtualTime(0);

    /// The largest representable time.
    pub const MAX: VirtualTime = VirtualTime(u64::MAX);

    /// Create a new `VirtualTime` from a raw tick value.
    #[inline]
    pub fn new(ticks: u64) -> Self {
        VirtualTime(ticks)
    }

    /// Return the raw tick value.
    #[inline]
    pub fn ticks(self) -> u64 {
        self.0
    }

    /// Compute the absolute time that is `delay` after `self`.
    ///
    /// Returns `None` on overflow.
    #[inline]
    pub fn plus(self, delay: VirtualTime) -> Option<VirtualTime> {
        self.0.checked_add(delay.0).map(VirtualTime)
    }

    /// Returns `true` if `self` is strictly before `other`.
    #[inline]
    pub fn is_before(self, other: VirtualTime) -> bool {
        self.0 < other.0
    }

    /// Returns the duration between two points in time.
    /// Returns `None` if `other` is after `self`.
    #[inline]
    pub fn duration_since(self, other: VirtualTime) -> Option<VirtualTime> {
        self.0.checked_sub(other.0).map(VirtualTime)
    }
}

impl From<u64> for VirtualTime {
    fn from(ticks: u64) -> Self {
        VirtualTime(ticks)
    }
}

impl std::fmt::Display for VirtualTime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "T={}", self.0)
    }
}
