//! One fluid buffer of a pipe node.
//!
//! Each node owns seven [`Section`]s: a center reservoir and one per face.
//! A section accounts for capacity, enforces the delayed-insertion ring
//! (fluid that entered this cycle cannot leave until the delay elapses), and
//! carries the direction lock that keeps flow from oscillating.
//!
//! All fill/drain operations are self-clamping: they return the achievable
//! amount and never overflow or underflow, so callers need no error handling.

use serde::{Deserialize, Serialize};

use crate::config::FlowRateConfig;

/// How long a successful transfer biases a section to one direction, in ticks.
pub const DIRECTION_COOLDOWN: i32 = 60;

// ---------------------------------------------------------------------------
// Flow direction
// ---------------------------------------------------------------------------

/// The direction a section is currently locked to.
///
/// Encoded in two bits on the wire; the discriminant order (In, None, Out)
/// is part of the protocol and must not change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum FlowDir {
    /// Locked to input: accepts fluid from outside, feeds the center.
    In,
    /// Undecided; fluid may move either way.
    #[default]
    None,
    /// Locked to output: feeds fluid out of the node.
    Out,
}

impl FlowDir {
    /// Direction from the sign of a lock countdown.
    pub fn from_ticks(ticks: i32) -> FlowDir {
        match ticks {
            0 => FlowDir::None,
            t if t < 0 => FlowDir::In,
            _ => FlowDir::Out,
        }
    }

    /// May fluid move into this section from outside? (Not locked Out.)
    pub fn can_input(self) -> bool {
        self != FlowDir::Out
    }

    /// May fluid move out of this section? (Not locked In.)
    pub fn can_output(self) -> bool {
        self != FlowDir::In
    }

    pub fn is_input(self) -> bool {
        self == FlowDir::In
    }

    pub fn is_output(self) -> bool {
        self == FlowDir::Out
    }

    /// Two-bit wire tag.
    pub fn to_bits(self) -> u8 {
        match self {
            FlowDir::In => 0,
            FlowDir::None => 1,
            FlowDir::Out => 2,
        }
    }

    /// Inverse of [`to_bits`](FlowDir::to_bits); the tag value 3 is invalid.
    pub fn from_bits(bits: u8) -> Option<FlowDir> {
        match bits {
            0 => Some(FlowDir::In),
            1 => Some(FlowDir::None),
            2 => Some(FlowDir::Out),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Section
// ---------------------------------------------------------------------------

/// One per-direction fluid buffer of a node.
///
/// Invariants maintained by every operation:
/// - `0 <= amount <= capacity`
/// - `sum(incoming) <= amount`
/// - `ticks_in_direction` decays toward 0 by exactly 1 per tick, never past it
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Section {
    amount: u32,
    capacity: u32,
    transfer_per_tick: u32,

    /// Ring of \[slot\] -> \[amount inserted at that slot\]. Fluid recorded
    /// here is in flight and cannot be drained until its slot is reused.
    incoming: Vec<u32>,
    /// Ring cursor; advances by one slot per tick.
    current_time: usize,

    /// Direction lock countdown. Zero means undecided; negative means input
    /// for `|value|` more ticks; positive means output.
    ticks_in_direction: i32,

    /// Last amount sent to observers; server-side sync bookkeeping.
    #[serde(skip)]
    last_sent_amount: u32,
    /// Last direction sent to observers.
    #[serde(skip)]
    last_sent_direction: FlowDir,
}

impl Section {
    /// Create an empty section for a node with the given flow config.
    pub fn new(config: &FlowRateConfig) -> Self {
        Self {
            amount: 0,
            capacity: config.capacity(),
            transfer_per_tick: config.transfer_per_tick,
            incoming: vec![0; config.delay()],
            current_time: 0,
            ticks_in_direction: 0,
            last_sent_amount: 0,
            last_sent_direction: FlowDir::None,
        }
    }

    pub fn amount(&self) -> u32 {
        self.amount
    }

    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    /// The lock countdown, exposed for diagnostics and tests.
    pub fn ticks_in_direction(&self) -> i32 {
        self.ticks_in_direction
    }

    /// Total fluid currently in flight (inserted within the delay window).
    pub fn incoming_total(&self) -> u32 {
        self.incoming.iter().sum()
    }

    /// The delay ring, oldest-to-newest slot order not guaranteed; for
    /// persistence and diagnostics.
    pub fn incoming(&self) -> &[u32] {
        &self.incoming
    }

    pub fn current_direction(&self) -> FlowDir {
        FlowDir::from_ticks(self.ticks_in_direction)
    }

    /// The maximum amount a fill could insert this tick: capped by both the
    /// remaining room and the per-tick throughput already used at the
    /// current ring slot.
    pub fn max_fillable(&self) -> u32 {
        let room_total = self.capacity - self.amount;
        let room_this_tick = self
            .transfer_per_tick
            .saturating_sub(self.incoming[self.current_time]);
        room_total.min(room_this_tick)
    }

    /// The maximum amount a drain could remove this tick: in-flight fluid is
    /// excluded, and throughput caps the rest.
    pub fn max_drainable(&self) -> u32 {
        let settled = self.amount.saturating_sub(self.incoming_total());
        settled.min(self.transfer_per_tick)
    }

    /// Insert up to `requested`; returns the amount actually fillable.
    /// Commits only when `commit` is true.
    pub fn fill(&mut self, requested: u32, commit: bool) -> u32 {
        let filled = self.max_fillable().min(requested);
        if filled == 0 {
            return 0;
        }
        if commit {
            self.incoming[self.current_time] += filled;
            self.amount += filled;
        }
        filled
    }

    /// Remove up to `requested`; returns the amount actually drainable.
    /// Commits only when `commit` is true.
    pub fn drain(&mut self, requested: u32, commit: bool) -> u32 {
        let drained = self.max_drainable().min(requested);
        if drained == 0 {
            return 0;
        }
        if commit {
            self.amount -= drained;
        }
        drained
    }

    /// Bias this section to one direction for [`DIRECTION_COOLDOWN`] ticks.
    /// Called after every successful transfer in that direction.
    pub fn lock_direction(&mut self, dir: FlowDir) {
        self.ticks_in_direction = match dir {
            FlowDir::In => -DIRECTION_COOLDOWN,
            FlowDir::None => 0,
            FlowDir::Out => DIRECTION_COOLDOWN,
        };
    }

    /// Move the lock countdown one step toward zero, never past it.
    pub fn decay_lock(&mut self) {
        if self.ticks_in_direction > 0 {
            self.ticks_in_direction -= 1;
        } else if self.ticks_in_direction < 0 {
            self.ticks_in_direction += 1;
        }
    }

    /// Rotate the ring cursor and clear the slot about to be reused,
    /// releasing the fluid inserted one full delay cycle ago.
    pub fn advance_ring_cursor(&mut self) {
        self.current_time = (self.current_time + 1) % self.incoming.len();
        self.incoming[self.current_time] = 0;
    }

    /// Drop all contents and the lock, resizing the ring to `delay` slots.
    /// Only [`PipeNode::set_fluid`](crate::node::PipeNode::set_fluid) calls
    /// this; section buffers never survive a species change.
    pub(crate) fn reset(&mut self, delay: usize) {
        self.amount = 0;
        self.incoming = vec![0; delay.max(1)];
        self.current_time = 0;
        self.ticks_in_direction = 0;
    }

    /// Restore persisted contents. The caller has already validated that
    /// `amount <= capacity` and `sum(incoming) <= amount`.
    pub(crate) fn restore(&mut self, amount: u32, incoming: Vec<u32>) {
        self.amount = amount;
        self.incoming = incoming;
        self.current_time = 0;
        self.ticks_in_direction = 0;
    }

    // -- sync bookkeeping ---------------------------------------------------

    pub fn last_sent_amount(&self) -> u32 {
        self.last_sent_amount
    }

    pub fn last_sent_direction(&self) -> FlowDir {
        self.last_sent_direction
    }

    /// Record the current amount as sent to observers.
    pub fn mark_amount_sent(&mut self) {
        self.last_sent_amount = self.amount;
    }

    /// Record the current direction as sent to observers.
    pub fn mark_direction_sent(&mut self) {
        self.last_sent_direction = self.current_direction();
    }

    /// Force an amount directly, bypassing throughput limits. Test setup
    /// only; the fluid is settled (not in flight).
    #[cfg(any(test, feature = "test-utils"))]
    pub fn prime(&mut self, amount: u32) {
        assert!(amount <= self.capacity);
        self.amount = amount;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn section() -> Section {
        // transfer 10/tick, delay 2, capacity 400
        Section::new(&FlowRateConfig::new(10, 2))
    }

    #[test]
    fn fill_is_capped_by_throughput() {
        let mut s = section();
        assert_eq!(s.fill(25, true), 10);
        // Same tick: the ring slot is full, nothing more fits.
        assert_eq!(s.fill(5, true), 0);
        assert_eq!(s.amount(), 10);
    }

    #[test]
    fn fill_is_capped_by_capacity() {
        let mut s = section();
        s.prime(395);
        assert_eq!(s.max_fillable(), 5);
        assert_eq!(s.fill(10, true), 5);
        assert_eq!(s.amount(), 400);
    }

    #[test]
    fn uncommitted_fill_changes_nothing() {
        let mut s = section();
        assert_eq!(s.fill(10, false), 10);
        assert_eq!(s.amount(), 0);
        assert_eq!(s.incoming_total(), 0);
        assert_eq!(s.fill(10, false), 10);
    }

    #[test]
    fn in_flight_fluid_cannot_be_drained() {
        let mut s = section();
        s.fill(10, true);
        // Everything inside entered this cycle.
        assert_eq!(s.max_drainable(), 0);
        assert_eq!(s.drain(10, true), 0);
        assert_eq!(s.amount(), 10);
    }

    #[test]
    fn fluid_settles_after_the_delay_elapses() {
        let mut s = section();
        s.fill(10, true);
        // Delay ring has 2 slots: after two cursor advances the insertion
        // slot is cleared and the fluid is free.
        s.advance_ring_cursor();
        assert_eq!(s.max_drainable(), 0);
        s.advance_ring_cursor();
        assert_eq!(s.max_drainable(), 10);
        assert_eq!(s.drain(10, true), 10);
        assert_eq!(s.amount(), 0);
    }

    #[test]
    fn drain_is_capped_by_throughput() {
        let mut s = section();
        s.prime(100);
        assert_eq!(s.max_drainable(), 10);
        assert_eq!(s.drain(50, true), 10);
        assert_eq!(s.amount(), 90);
    }

    #[test]
    fn incoming_never_exceeds_amount() {
        let mut s = section();
        for _ in 0..100 {
            s.fill(7, true);
            s.drain(3, true);
            assert!(s.incoming_total() <= s.amount());
            s.advance_ring_cursor();
        }
    }

    #[test]
    fn lock_decays_by_one_toward_zero() {
        let mut s = section();
        s.lock_direction(FlowDir::Out);
        assert_eq!(s.ticks_in_direction(), DIRECTION_COOLDOWN);
        s.decay_lock();
        assert_eq!(s.ticks_in_direction(), DIRECTION_COOLDOWN - 1);

        s.lock_direction(FlowDir::In);
        assert_eq!(s.ticks_in_direction(), -DIRECTION_COOLDOWN);
        s.decay_lock();
        assert_eq!(s.ticks_in_direction(), -(DIRECTION_COOLDOWN - 1));
    }

    #[test]
    fn lock_never_skips_past_zero() {
        let mut s = section();
        s.lock_direction(FlowDir::Out);
        for _ in 0..DIRECTION_COOLDOWN + 10 {
            s.decay_lock();
        }
        assert_eq!(s.ticks_in_direction(), 0);
        assert_eq!(s.current_direction(), FlowDir::None);
    }

    #[test]
    fn direction_from_lock_sign() {
        let mut s = section();
        assert_eq!(s.current_direction(), FlowDir::None);
        s.lock_direction(FlowDir::In);
        assert_eq!(s.current_direction(), FlowDir::In);
        assert!(!s.current_direction().can_output());
        assert!(s.current_direction().can_input());
        s.lock_direction(FlowDir::Out);
        assert_eq!(s.current_direction(), FlowDir::Out);
        assert!(s.current_direction().can_output());
        assert!(!s.current_direction().can_input());
    }

    #[test]
    fn none_direction_permits_both() {
        assert!(FlowDir::None.can_input());
        assert!(FlowDir::None.can_output());
    }

    #[test]
    fn flow_dir_bits_round_trip() {
        for dir in [FlowDir::In, FlowDir::None, FlowDir::Out] {
            assert_eq!(FlowDir::from_bits(dir.to_bits()), Some(dir));
        }
        assert_eq!(FlowDir::from_bits(3), None);
    }

    #[test]
    fn reset_clears_everything() {
        let mut s = section();
        s.fill(10, true);
        s.lock_direction(FlowDir::In);
        s.reset(4);
        assert_eq!(s.amount(), 0);
        assert_eq!(s.incoming_total(), 0);
        assert_eq!(s.incoming().len(), 4);
        assert_eq!(s.ticks_in_direction(), 0);
    }

    #[test]
    fn sync_bookkeeping_tracks_current_state() {
        let mut s = section();
        s.fill(10, true);
        s.lock_direction(FlowDir::Out);
        assert_ne!(s.amount(), s.last_sent_amount());
        assert_ne!(s.current_direction(), s.last_sent_direction());

        s.mark_amount_sent();
        s.mark_direction_sent();
        assert_eq!(s.last_sent_amount(), 10);
        assert_eq!(s.last_sent_direction(), FlowDir::Out);
    }

    #[test]
    fn delay_of_one_still_delays_one_tick() {
        let mut s = Section::new(&FlowRateConfig::new(10, 1));
        s.fill(10, true);
        assert_eq!(s.max_drainable(), 0);
        s.advance_ring_cursor();
        assert_eq!(s.max_drainable(), 10);
    }
}
