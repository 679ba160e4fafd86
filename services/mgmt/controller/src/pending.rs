//! Pending-operation state machine for one controller.
//!
//! The controller accepts a single outstanding add/remove UUID command.
//! Further requests queue behind it in FIFO order, and class-of-device or
//! power-on requests issued meanwhile are deferred until the queue drains.

use std::collections::VecDeque;
use std::mem;
use uuid::Uuid;

/// A queued service UUID operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdentifierOp {
    /// Register a service UUID
    Add {
        /// Service UUID
        uuid: Uuid,
        /// Service class hint
        svc_hint: u8,
    },
    /// Unregister a service UUID
    Remove {
        /// Service UUID
        uuid: Uuid,
    },
}

impl IdentifierOp {
    /// UUID this operation targets
    pub fn uuid(&self) -> &Uuid {
        match self {
            IdentifierOp::Add { uuid, .. } | IdentifierOp::Remove { uuid } => uuid,
        }
    }
}

/// UUID command sequencing state
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum IdentifierState {
    /// No UUID command outstanding
    #[default]
    Idle,
    /// One UUID command outstanding, others waiting
    InFlight {
        /// Operations waiting for the outstanding one to complete
        queue: VecDeque<IdentifierOp>,
        /// The outstanding add was rejected as busy; the next
        /// class-of-device change resumes draining
        busy_retry: bool,
    },
}

/// What to do after the outstanding UUID command completed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Drain {
    /// Send this queued operation; the controller stays in flight
    Send(IdentifierOp),
    /// Queue is empty; send whatever was deferred
    Flush {
        /// Deferred class of device (major, minor)
        class: Option<(u8, u8)>,
        /// Deferred power-on
        power_on: bool,
    },
}

/// Pending-operation state of one controller
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PendingOps {
    state: IdentifierState,
    deferred_class: Option<(u8, u8)>,
    deferred_power_on: bool,
}

impl PendingOps {
    /// Create an idle state machine
    pub fn new() -> Self {
        Self::default()
    }

    /// Current sequencing state
    pub fn state(&self) -> &IdentifierState {
        &self.state
    }

    /// Whether a UUID command is outstanding
    pub fn in_flight(&self) -> bool {
        matches!(self.state, IdentifierState::InFlight { .. })
    }

    /// Number of operations waiting behind the outstanding one
    pub fn queued(&self) -> usize {
        match &self.state {
            IdentifierState::Idle => 0,
            IdentifierState::InFlight { queue, .. } => queue.len(),
        }
    }

    /// Deferred class of device, if any
    pub fn deferred_class(&self) -> Option<(u8, u8)> {
        self.deferred_class
    }

    /// Whether a power-on is deferred
    pub fn deferred_power_on(&self) -> bool {
        self.deferred_power_on
    }

    /// Offer an operation.
    ///
    /// Returns the operation back when it should be sent now; the caller
    /// marks the controller in flight once the write succeeded. Returns
    /// `None` when it was queued.
    pub fn submit(&mut self, op: IdentifierOp) -> Option<IdentifierOp> {
        match &mut self.state {
            IdentifierState::Idle => Some(op),
            IdentifierState::InFlight { queue, .. } => {
                queue.push_back(op);
                None
            }
        }
    }

    /// Record that a UUID command was written
    pub fn mark_in_flight(&mut self) {
        if let IdentifierState::Idle = self.state {
            self.state = IdentifierState::InFlight {
                queue: VecDeque::new(),
                busy_retry: false,
            };
        }
    }

    /// The outstanding UUID command completed (successfully or not).
    pub fn complete(&mut self) -> Drain {
        if let IdentifierState::InFlight { queue, busy_retry } = &mut self.state {
            if let Some(op) = queue.pop_front() {
                *busy_retry = false;
                return Drain::Send(op);
            }
        }

        self.state = IdentifierState::Idle;
        Drain::Flush {
            class: self.deferred_class.take(),
            power_on: mem::take(&mut self.deferred_power_on),
        }
    }

    /// Defer a class-of-device change while in flight.
    ///
    /// Returns `false` when nothing is in flight and the change should be
    /// sent immediately.
    pub fn defer_class(&mut self, major: u8, minor: u8) -> bool {
        if !self.in_flight() {
            return false;
        }
        self.deferred_class = Some((major, minor));
        true
    }

    /// Defer a power-on while in flight.
    ///
    /// Returns `false` when nothing is in flight.
    pub fn defer_power_on(&mut self) -> bool {
        if !self.in_flight() {
            return false;
        }
        self.deferred_power_on = true;
        true
    }

    /// Drop a deferred power-on
    pub fn cancel_power_on(&mut self) {
        self.deferred_power_on = false;
    }

    /// The outstanding add was rejected with a busy status
    pub fn mark_busy(&mut self) -> bool {
        match &mut self.state {
            IdentifierState::InFlight { busy_retry, .. } => {
                *busy_retry = true;
                true
            }
            IdentifierState::Idle => false,
        }
    }

    /// Consume the busy-retry flag, returning whether it was set
    pub fn take_busy_retry(&mut self) -> bool {
        match &mut self.state {
            IdentifierState::InFlight { busy_retry, .. } => mem::take(busy_retry),
            IdentifierState::Idle => false,
        }
    }

    /// Discard everything queued or deferred, returning the number of
    /// queued operations dropped
    pub fn reset(&mut self) -> usize {
        let dropped = self.queued();
        *self = Self::default();
        dropped
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn add(short: u128) -> IdentifierOp {
        IdentifierOp::Add {
            uuid: Uuid::from_u128(short << 96),
            svc_hint: 0,
        }
    }

    fn remove(short: u128) -> IdentifierOp {
        IdentifierOp::Remove {
            uuid: Uuid::from_u128(short << 96),
        }
    }

    #[test]
    fn test_single_flight_fifo() {
        let mut pending = PendingOps::new();

        assert_eq!(pending.submit(add(1)), Some(add(1)));
        pending.mark_in_flight();

        assert_eq!(pending.submit(add(2)), None);
        assert_eq!(pending.submit(remove(1)), None);
        assert_eq!(pending.queued(), 2);

        assert_eq!(pending.complete(), Drain::Send(add(2)));
        assert!(pending.in_flight());
        assert_eq!(pending.complete(), Drain::Send(remove(1)));
        assert!(pending.in_flight());
        assert_eq!(
            pending.complete(),
            Drain::Flush {
                class: None,
                power_on: false
            }
        );
        assert!(!pending.in_flight());
    }

    #[test]
    fn test_deferred_flush_after_drain() {
        let mut pending = PendingOps::new();
        assert!(!pending.defer_class(1, 4));
        assert!(!pending.defer_power_on());

        pending.mark_in_flight();
        assert!(pending.defer_class(1, 4));
        assert!(pending.defer_class(2, 0));
        assert!(pending.defer_power_on());

        assert_eq!(
            pending.complete(),
            Drain::Flush {
                class: Some((2, 0)),
                power_on: true
            }
        );
        assert_eq!(pending.deferred_class(), None);
        assert!(!pending.deferred_power_on());
    }

    #[test]
    fn test_cancel_power_on() {
        let mut pending = PendingOps::new();
        pending.mark_in_flight();
        pending.defer_power_on();
        pending.cancel_power_on();
        assert_eq!(
            pending.complete(),
            Drain::Flush {
                class: None,
                power_on: false
            }
        );
    }

    #[test]
    fn test_busy_retry_flag() {
        let mut pending = PendingOps::new();
        assert!(!pending.mark_busy());

        pending.mark_in_flight();
        assert!(pending.mark_busy());
        assert!(pending.take_busy_retry());
        assert!(!pending.take_busy_retry());
    }

    #[test]
    fn test_reset_discards_everything() {
        let mut pending = PendingOps::new();
        pending.mark_in_flight();
        pending.submit(add(3));
        pending.defer_class(1, 1);
        pending.defer_power_on();
        pending.mark_busy();

        assert_eq!(pending.reset(), 1);
        assert_eq!(pending, PendingOps::default());
    }
}
