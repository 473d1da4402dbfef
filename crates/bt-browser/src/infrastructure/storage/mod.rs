//! Storage infrastructure: record store, snapshot persistence, configuration.
//!
//! - **`record_store`** – Named byte records on disk or in memory.
//! - **`snapshot_store`** – Encodes the registry into one named record and
//!   parses it back, telling "absent" apart from "corrupted".
//! - **`config`** – Reads the TOML configuration file from the
//!   platform-appropriate directory, with defaults on first run.

pub mod config;
pub mod record_store;
pub mod snapshot_store;
