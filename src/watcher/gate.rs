//! Reload arming state shared by the event loop and its deferred trigger.
//!
//! A burst of filesystem events must collapse into a single reload. The gate
//! arms on the first qualifying event and holds a fixed deadline measured
//! from that event; later events in the same burst are absorbed without
//! rescheduling. This bounds the worst-case latency between the first write
//! and the reload, at the cost of a slightly stale reload point.

use std::time::{Duration, Instant};

/// Debounce gate: armed once per burst, fires at a fixed deadline.
#[derive(Debug)]
pub struct ReloadGate {
    /// Quiescence window measured from the first event of a burst.
    window: Duration,
    /// True while a deferred trigger is scheduled.
    reloading: bool,
    /// When the armed trigger becomes due.
    deadline: Option<Instant>,
}

impl ReloadGate {
    /// Create a gate with the given quiescence window in milliseconds.
    pub fn new(debounce_ms: u64) -> Self {
        Self {
            window: Duration::from_millis(debounce_ms),
            reloading: false,
            deadline: None,
        }
    }

    /// Arm the gate for a qualifying event.
    ///
    /// Returns true when this event started a new burst and a trigger was
    /// scheduled. Returns false while already armed: the deadline is not
    /// extended, the event is absorbed into the pending burst.
    pub fn arm(&mut self) -> bool {
        if self.reloading {
            return false;
        }
        self.reloading = true;
        self.deadline = Some(Instant::now() + self.window);
        true
    }

    /// Whether a trigger is currently scheduled.
    pub fn is_armed(&self) -> bool {
        self.reloading
    }

    /// Deadline of the armed trigger, if any.
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// The configured quiescence window.
    pub fn window(&self) -> Duration {
        self.window
    }

    /// Disarm, allowing the next qualifying event to start a fresh burst.
    pub fn reset(&mut self) {
        self.reloading = false;
        self.deadline = None;
    }
}
