//! Conduit Core -- the per-node fluid transport simulator.
//!
//! Each pipe segment owns one [`node::PipeNode`]: seven fluid sections (a
//! center reservoir plus one per face), a single optional fluid species, and
//! the flow controller that moves fluid between sections and the outside
//! world under a discrete tick clock.
//!
//! # Seven-Phase Tick Pipeline
//!
//! Each call to [`node::PipeNode::tick`] advances the node through:
//!
//! 1. **Ring advance** -- rotate delay cursors, record output eligibility.
//! 2. **Push out** -- output faces offer fluid to adjacent containers.
//! 3. **Distribute** -- the center shares fluid across eligible output
//!    faces in shuffled order.
//! 4. **Collect** -- input faces feed the center with fair shares.
//! 5. **Lock decay** -- direction locks step toward neutral.
//! 6. **Emptiness** -- a drained node clears its species.
//! 7. **Sync check** -- changed state marks the node for a rate-limited
//!    differential update.
//!
//! # Key Types
//!
//! - [`node::PipeNode`] -- the flow controller and section owner.
//! - [`node::PipeWorld`] -- the external-container collaborator trait.
//! - [`section::Section`] -- one bounded fluid buffer with a delayed-
//!   insertion ring and a direction lock.
//! - [`direction::SectionKey`] -- the closed seven-entry section space.
//! - [`snapshot`] -- versioned persistence of node fluid state via bitcode.
//! - [`rng::SimRng`] -- injected deterministic randomness for distribution.

pub mod config;
pub mod diagnostics;
pub mod direction;
pub mod event;
pub mod fixed;
pub mod fluid;
pub mod node;
pub mod rng;
pub mod section;
pub mod snapshot;
pub mod sync;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
