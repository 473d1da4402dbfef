//! Infrastructure layer for the browser.
//!
//! Contains the adapters around the application: key input, console output,
//! the record store and configuration file, and the platform radio (a
//! simulated one for the binary and recording doubles for tests).

pub mod console;
pub mod input;
pub mod platform;
pub mod storage;
