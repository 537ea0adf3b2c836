//! Conduit Net -- the low-bandwidth sync codec for pipe node state.
//!
//! Serializes a node's section amounts and flow directions as either a full
//! snapshot or a differential update, with the fluid species carried as a
//! handle into a shared interning cache. Packet transport is out of scope;
//! this crate defines only the payload layout and the message ids.
//!
//! - [`bits`] -- LSB-first bit-level reader/writer.
//! - [`cache`] -- bidirectional species-handle interning.
//! - [`codec`] -- `FULL_STATE` / `DELTA_STATE` encode and decode.

pub mod bits;
pub mod cache;
pub mod codec;
