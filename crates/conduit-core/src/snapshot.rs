//! Persistence of a node's fluid state.
//!
//! The container format is opaque binary via `bitcode`, prefixed by a
//! magic/version header so foreign or future data is rejected before any
//! state is touched. A node holding no species persists as nothing at all.
//!
//! Restores are atomic: every section is validated against the node's
//! capacity and the in-flight invariant before the first mutation.

use serde::{Deserialize, Serialize};

use crate::direction::SectionKey;
use crate::fluid::FluidKey;
use crate::node::PipeNode;

/// Magic number identifying a conduit node snapshot.
pub const SNAPSHOT_MAGIC: u32 = 0xC0D1_0001;

/// Current format version. Increment when breaking the layout.
pub const FORMAT_VERSION: u32 = 1;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors that can occur while persisting or restoring node state.
#[derive(Debug, thiserror::Error)]
pub enum SnapshotError {
    #[error("bitcode encoding failed: {0}")]
    Encode(String),
    #[error("bitcode decoding failed: {0}")]
    Decode(String),
    #[error("invalid magic number: expected 0x{:08X}, got 0x{:08X}", SNAPSHOT_MAGIC, .0)]
    InvalidMagic(u32),
    #[error("unsupported format version: expected {}, got {}", FORMAT_VERSION, .0)]
    UnsupportedVersion(u32),
    #[error("expected {} sections, found {}", SectionKey::COUNT, .0)]
    SectionCount(usize),
    #[error("section {index} is corrupt: {reason}")]
    CorruptSection { index: usize, reason: String },
}

// ---------------------------------------------------------------------------
// Snapshot layout
// ---------------------------------------------------------------------------

/// Header prepended to every snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct SnapshotHeader {
    magic: u32,
    version: u32,
}

impl SnapshotHeader {
    fn current() -> Self {
        Self {
            magic: SNAPSHOT_MAGIC,
            version: FORMAT_VERSION,
        }
    }

    fn validate(&self) -> Result<(), SnapshotError> {
        if self.magic != SNAPSHOT_MAGIC {
            return Err(SnapshotError::InvalidMagic(self.magic));
        }
        if self.version != FORMAT_VERSION {
            return Err(SnapshotError::UnsupportedVersion(self.version));
        }
        Ok(())
    }
}

/// One section's persisted contents.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct SectionState {
    amount: u32,
    incoming: Vec<u32>,
}

/// The serialized portion of a node: species plus section contents, in wire
/// order. Locks and sync bookkeeping are transient and not persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct NodeSnapshot {
    header: SnapshotHeader,
    fluid: FluidKey,
    sections: Vec<SectionState>,
}

// ---------------------------------------------------------------------------
// Save / load
// ---------------------------------------------------------------------------

/// Serialize a node's fluid state. Returns `None` when the node holds no
/// species (an empty node persists as nothing).
pub fn save_node(node: &PipeNode) -> Result<Option<Vec<u8>>, SnapshotError> {
    let Some(fluid) = node.fluid() else {
        return Ok(None);
    };
    let snapshot = NodeSnapshot {
        header: SnapshotHeader::current(),
        fluid: fluid.clone(),
        sections: SectionKey::ALL
            .into_iter()
            .map(|key| {
                let s = node.section(key);
                SectionState {
                    amount: s.amount(),
                    incoming: s.incoming().to_vec(),
                }
            })
            .collect(),
    };
    let data =
        bitcode::serialize(&snapshot).map_err(|e| SnapshotError::Encode(e.to_string()))?;
    Ok(Some(data))
}

/// Restore a node's fluid state from bytes produced by [`save_node`].
///
/// Validation happens before the first mutation; on any error the node is
/// left exactly as it was.
pub fn load_node(node: &mut PipeNode, data: &[u8]) -> Result<(), SnapshotError> {
    let snapshot: NodeSnapshot =
        bitcode::deserialize(data).map_err(|e| SnapshotError::Decode(e.to_string()))?;
    snapshot.header.validate()?;

    if snapshot.sections.len() != SectionKey::COUNT {
        return Err(SnapshotError::SectionCount(snapshot.sections.len()));
    }
    let capacity = node.capacity();
    for (index, state) in snapshot.sections.iter().enumerate() {
        if state.amount > capacity {
            return Err(SnapshotError::CorruptSection {
                index,
                reason: format!("amount {} exceeds capacity {}", state.amount, capacity),
            });
        }
        let in_flight: u32 = state.incoming.iter().sum();
        if in_flight > state.amount {
            return Err(SnapshotError::CorruptSection {
                index,
                reason: format!(
                    "in-flight {} exceeds amount {}",
                    in_flight, state.amount
                ),
            });
        }
        if state.incoming.is_empty() {
            return Err(SnapshotError::CorruptSection {
                index,
                reason: "empty delay ring".to_string(),
            });
        }
    }

    node.set_fluid(Some(snapshot.fluid));
    for (section, state) in node.sections_mut().iter_mut().zip(snapshot.sections) {
        section.restore(state.amount, state.incoming);
    }
    Ok(())
}
