//! Diagnostic events emitted by the flow controller.
//!
//! Events are buffered on the node and delivered in batch with each tick's
//! outcome. None of them are errors: a contract mismatch is reported and the
//! committed amount is treated as ground truth.

use crate::direction::Direction;
use crate::fixed::Ticks;
use crate::fluid::FluidKey;

/// A node event. All events carry the tick at which they occurred.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipeEvent {
    /// An external collaborator committed a different amount than the engine
    /// attempted: the section accepted `committed` of the `attempted`
    /// millibuckets drained from the adjacent container. Non-fatal; the
    /// committed amount is ground truth.
    TransferMismatch {
        direction: Direction,
        attempted: u32,
        committed: u32,
        tick: Ticks,
    },

    /// Extraction established a species on a previously empty node.
    FluidSet { fluid: FluidKey, tick: Ticks },

    /// The node drained to zero and its species was cleared.
    FluidCleared { tick: Ticks },
}
