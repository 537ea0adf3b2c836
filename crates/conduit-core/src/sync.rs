//! Sync rate limiting.
//!
//! Change detection lives on the node (sections remember the last amount and
//! direction sent); [`SendTimer`] adds the minimum-interval gate so a noisy
//! node cannot flood observers with differential updates.

use serde::{Deserialize, Serialize};

use crate::fixed::Ticks;

/// Minimum-interval tracker for outgoing sync messages. Purely local state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendTimer {
    interval: Ticks,
    last_mark: Option<Ticks>,
}

impl SendTimer {
    /// A timer that allows at most one mark per `interval` ticks.
    pub fn new(interval: Ticks) -> Self {
        Self {
            interval,
            last_mark: None,
        }
    }

    /// If at least `interval` ticks have passed since the last successful
    /// mark (or none has happened yet), record `now` and return true.
    pub fn mark_if_elapsed(&mut self, now: Ticks) -> bool {
        match self.last_mark {
            Some(last) if now < last + self.interval => false,
            _ => {
                self.last_mark = Some(now);
                true
            }
        }
    }
}
