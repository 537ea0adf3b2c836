//! Full and differential sync payloads.
//!
//! Both encodings share one section-ordered layout (center first, then the
//! six faces in wire order):
//!
//! - **Full**: species presence bit (+ cache handle), then per section a
//!   16-bit amount and a 2-bit direction tag.
//! - **Delta**: species presence bit and handle are always resent; per
//!   section a changed bit gates the 16-bit amount, while the 2-bit
//!   direction tag is always present (it is cheaper than the flag would be).
//!
//! Decoding builds a pure [`NodeStateUpdate`] and resolves the species
//! handle up front, so a failed decode can never partially apply.

use conduit_core::direction::SectionKey;
use conduit_core::fluid::FluidKey;
use conduit_core::node::PipeNode;
use conduit_core::section::FlowDir;

use crate::bits::{BitError, BitReader, BitWriter};
use crate::cache::FluidCache;

/// Message id of a full state payload.
pub const FULL_STATE: u8 = 1;
/// Message id of a differential payload.
pub const DELTA_STATE: u8 = 2;

/// Which of the two encodings a payload uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadKind {
    Full,
    Delta,
}

impl PayloadKind {
    pub fn message_id(self) -> u8 {
        match self {
            PayloadKind::Full => FULL_STATE,
            PayloadKind::Delta => DELTA_STATE,
        }
    }

    pub fn from_message_id(id: u8) -> Result<PayloadKind, DecodeError> {
        match id {
            FULL_STATE => Ok(PayloadKind::Full),
            DELTA_STATE => Ok(PayloadKind::Delta),
            other => Err(DecodeError::UnknownMessageId(other)),
        }
    }
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors from decoding a sync payload. Any error voids the whole update.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error(transparent)]
    Bits(#[from] BitError),
    #[error("unknown fluid handle {0}")]
    UnknownFluidHandle(u32),
    #[error("invalid direction tag {0}")]
    InvalidDirectionTag(u8),
    #[error("unknown message id {0}")]
    UnknownMessageId(u8),
}

// ---------------------------------------------------------------------------
// Decoded update
// ---------------------------------------------------------------------------

/// One section's slice of an update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SectionUpdate {
    /// New amount, present in every full payload and in delta payloads only
    /// for sections whose amount changed.
    pub amount: Option<u16>,
    /// Direction is always on the wire.
    pub direction: FlowDir,
}

/// A decoded payload, ready to apply to client state in one step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeStateUpdate {
    pub kind: PayloadKind,
    /// The species, already resolved through the cache. `None` means the
    /// node is empty.
    pub fluid: Option<FluidKey>,
    /// Per-section updates in wire order (center first).
    pub sections: [SectionUpdate; SectionKey::COUNT],
}

// ---------------------------------------------------------------------------
// Encode
// ---------------------------------------------------------------------------

/// Encode a node's state. Updates the node's last-sent bookkeeping: a delta
/// marks every amount it carries as sent, and both kinds mark directions.
pub fn encode(node: &mut PipeNode, kind: PayloadKind, cache: &mut FluidCache) -> Vec<u8> {
    let mut w = BitWriter::new();

    match node.fluid().cloned() {
        None => w.write_bit(false),
        Some(key) => {
            w.write_bit(true);
            w.write_u32(cache.store(&key));
        }
    }

    for key in SectionKey::ALL {
        let section = node.section_mut(key);
        match kind {
            PayloadKind::Full => {
                w.write_u16(section.amount() as u16);
            }
            PayloadKind::Delta => {
                if section.amount() == section.last_sent_amount() {
                    w.write_bit(false);
                } else {
                    w.write_bit(true);
                    w.write_u16(section.amount() as u16);
                    section.mark_amount_sent();
                }
            }
        }
        w.write_bits(section.current_direction().to_bits() as u32, 2);
        section.mark_direction_sent();
    }

    w.finish()
}

// ---------------------------------------------------------------------------
// Decode
// ---------------------------------------------------------------------------

/// Decode a payload. The species handle must already be present in `cache`;
/// an unknown handle fails the update atomically, nothing is applied.
pub fn decode(
    kind: PayloadKind,
    data: &[u8],
    cache: &FluidCache,
) -> Result<NodeStateUpdate, DecodeError> {
    let mut r = BitReader::new(data);

    let fluid = if r.read_bit()? {
        let handle = r.read_u32()?;
        let key = cache
            .resolve(handle)
            .ok_or(DecodeError::UnknownFluidHandle(handle))?;
        Some(key.clone())
    } else {
        None
    };

    let mut sections = [SectionUpdate::default(); SectionKey::COUNT];
    for update in &mut sections {
        let amount = match kind {
            PayloadKind::Full => Some(r.read_u16()?),
            PayloadKind::Delta => {
                if r.read_bit()? {
                    Some(r.read_u16()?)
                } else {
                    None
                }
            }
        };
        let tag = r.read_bits(2)? as u8;
        let direction =
            FlowDir::from_bits(tag).ok_or(DecodeError::InvalidDirectionTag(tag))?;
        *update = SectionUpdate { amount, direction };
    }

    Ok(NodeStateUpdate {
        kind,
        fluid,
        sections,
    })
}
