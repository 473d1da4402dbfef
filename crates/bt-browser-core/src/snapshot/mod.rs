//! Snapshot module: the persisted byte form of a [`crate::Registry`].

pub mod codec;

pub use codec::{decode_snapshot, encode_snapshot, SnapshotError};
