//! Port (C1): a tri-valued request/achieved cell with update arithmetic.

use crate::types::{flow_eq, Flow, RealTime, FLOW_TOLERANCE};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A `(requested, achieved)` pair plus the time it last changed.
///
/// Invariant: `achieved <= requested` except during the transient
/// propagation within one event instant, where an upstream over-deliver is
/// clamped on the next settle step (see [`Port::with_achieved`]).
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Port {
    /// The rate requested from upstream.
    pub requested: Flow,
    /// The rate actually delivered.
    pub achieved: Flow,
    /// The logical time of the most recent change to either field.
    pub last_change: RealTime,
}

/// Which of a port's two halves changed visibly enough to require
/// propagation, returned alongside the updated [`Port`] by every `with_*`
/// method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PortUpdate {
    /// Propagate the new request upstream.
    pub send_request: bool,
    /// Propagate the new achieved value downstream.
    pub send_achieved: bool,
    /// The input to `with_achieved` exceeded the prior request: upstream
    /// over-delivered and must be told to cut back on a later step.
    pub over_delivered: bool,
}

impl PortUpdate {
    /// `true` if anything changed at all.
    pub fn changed(&self) -> bool {
        self.send_request || self.send_achieved
    }
}

impl Default for Port {
    fn default() -> Self {
        Self {
            requested: 0.0,
            achieved: 0.0,
            last_change: 0,
        }
    }
}

impl Port {
    /// A fresh, zeroed-out port.
    pub fn new() -> Self {
        Self::default()
    }

    /// `true` if `0 <= achieved <= requested` within [`FLOW_TOLERANCE`].
    pub fn is_balanced(&self) -> bool {
        self.achieved >= -FLOW_TOLERANCE && self.achieved <= self.requested + FLOW_TOLERANCE
    }

    /// Set a new request. Achieved is clamped down to the new request if it
    /// would otherwise exceed it (achieved never exceeds requested).
    pub fn with_requested(self, r: Flow, now: RealTime) -> (Self, PortUpdate) {
        let send_request = !flow_eq(r, self.requested);
        let new_achieved = self.achieved.min(r);
        let send_achieved = !flow_eq(new_achieved, self.achieved);
        let update = PortUpdate {
            send_request,
            send_achieved,
            over_delivered: false,
        };
        (self.settle(r, new_achieved, now, update.changed()), update)
    }

    /// Set a newly-reported achieved value. If `a` exceeds the current
    /// request, achieved is clamped to the request and `over_delivered` is
    /// raised so the caller can lower its own upstream request on a later
    /// step (§4.1).
    pub fn with_achieved(self, a: Flow, now: RealTime) -> (Self, PortUpdate) {
        let over_delivered = a > self.requested + FLOW_TOLERANCE;
        let new_achieved = a.min(self.requested);
        let send_achieved = !flow_eq(new_achieved, self.achieved);
        let update = PortUpdate {
            send_request: over_delivered,
            send_achieved,
            over_delivered,
        };
        let changed = send_achieved || over_delivered;
        (
            self.settle(self.requested, new_achieved, now, changed),
            update,
        )
    }

    /// Atomically set a new request and recompute achieved against an
    /// upstream-supplied availability ceiling: `achieved = min(r, avail)`.
    pub fn with_requested_and_available(
        self,
        r: Flow,
        avail: Flow,
        now: RealTime,
    ) -> (Self, PortUpdate) {
        let send_request = !flow_eq(r, self.requested);
        let new_achieved = r.min(avail);
        let send_achieved = !flow_eq(new_achieved, self.achieved);
        let update = PortUpdate {
            send_request,
            send_achieved,
            over_delivered: false,
        };
        (self.settle(r, new_achieved, now, update.changed()), update)
    }

    fn settle(self, requested: Flow, achieved: Flow, now: RealTime, changed: bool) -> Self {
        Self {
            requested,
            achieved,
            last_change: if changed { now } else { self.last_change },
        }
    }
}
