//! Fluid species identity and stacks.
//!
//! A node holds at most one species at a time; all capacity accounting is
//! plain integer millibuckets on top of that single identity.

use serde::{Deserialize, Serialize};

/// Identifies a fluid species in the registry. Cheap to copy and compare.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct FluidTypeId(pub u32);

/// Full species identity: registry id plus opaque tag bytes.
///
/// Two keys are the same species iff both fields match; the tag lets modified
/// variants of one registry entry (potions, tainted fluids) stay distinct.
/// Amounts never participate in identity.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct FluidKey {
    pub type_id: FluidTypeId,
    /// Opaque per-stack tag data, compared byte-for-byte.
    pub tag: Option<Vec<u8>>,
}

impl FluidKey {
    /// A key with no tag data.
    pub fn new(type_id: FluidTypeId) -> Self {
        Self { type_id, tag: None }
    }

    /// A key carrying tag data.
    pub fn with_tag(type_id: FluidTypeId, tag: Vec<u8>) -> Self {
        Self {
            type_id,
            tag: Some(tag),
        }
    }
}

/// A quantity of one species, in millibuckets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FluidStack {
    pub key: FluidKey,
    pub amount: u32,
}

impl FluidStack {
    pub fn new(key: FluidKey, amount: u32) -> Self {
        Self { key, amount }
    }

    /// Species equality, independent of amount.
    pub fn is_fluid_equal(&self, other: &FluidStack) -> bool {
        self.key == other.key
    }
}
