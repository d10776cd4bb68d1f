//! # Wire Protocol
//!
//! Snapshots cross the wire as a self-describing binary tree: a compact
//! tagged encoding of [`Value`], wrapped in an envelope carrying the
//! snapshot kind (full or delta), the tick and the send timestamp.
//!
//! Decoding is total: any malformed input yields a [`WireError`] and the
//! packet is dropped. The connection survives.

pub mod delta;
pub mod value;
pub mod wire;

pub use delta::{apply_delta, diff};
pub use value::Value;
pub use wire::{decode_packet, encode_packet, SnapshotKind, SnapshotPacket, WireError};
