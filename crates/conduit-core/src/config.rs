//! Per-pipe-kind flow rate configuration.
//!
//! A [`FlowRateConfig`] is read-only data looked up once per pipe kind; the
//! node derives its section capacity and delay-ring length from it at
//! construction.

use serde::{Deserialize, Serialize};

use crate::fixed::Ticks;

/// Section capacity is this many ticks' worth of throughput.
pub const CAPACITY_TICKS: u32 = 40;

/// Default minimum interval between differential sync messages, in ticks.
pub const NETWORK_UPDATE_INTERVAL: Ticks = 10;

/// Throughput and delay descriptor for one pipe kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlowRateConfig {
    /// Maximum millibuckets moved per direction per tick.
    pub transfer_per_tick: u32,
    /// Depth of the delayed-insertion ring: fluid entering a section is in
    /// flight for this many ticks before it may leave again.
    pub transfer_delay: u32,
}

impl FlowRateConfig {
    /// Standard throughput pipe.
    pub const STANDARD: FlowRateConfig = FlowRateConfig {
        transfer_per_tick: 10,
        transfer_delay: 12,
    };

    /// High-throughput, low-latency pipe.
    pub const HIGH_FLOW: FlowRateConfig = FlowRateConfig {
        transfer_per_tick: 40,
        transfer_delay: 4,
    };

    /// Build a config. `transfer_delay` is clamped to at least 1 (a ring of
    /// length zero cannot exist). Section amounts are 16-bit on the wire, so
    /// the derived capacity must fit in a `u16`.
    pub fn new(transfer_per_tick: u32, transfer_delay: u32) -> Self {
        debug_assert!(
            transfer_per_tick * CAPACITY_TICKS <= u16::MAX as u32,
            "capacity {} exceeds the 16-bit wire amount",
            transfer_per_tick * CAPACITY_TICKS
        );
        Self {
            transfer_per_tick,
            transfer_delay: transfer_delay.max(1),
        }
    }

    /// Capacity of every section of a node with this config.
    pub fn capacity(&self) -> u32 {
        self.transfer_per_tick * CAPACITY_TICKS
    }

    /// Ring length, never zero.
    pub fn delay(&self) -> usize {
        self.transfer_delay.max(1) as usize
    }
}
