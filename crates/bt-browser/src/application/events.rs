//! Events delivered to the browser by the single event loop.

use thiserror::Error;

use super::connection::ConnectionEvent;
use super::discovery::DiscoveryEvent;
use crate::infrastructure::input::RawKeyEvent;

/// A negative result code returned by a platform start call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("platform error {code}")]
pub struct PlatformError {
    pub code: i32,
}

impl PlatformError {
    pub const fn new(code: i32) -> Self {
        Self { code }
    }
}

/// Everything that can wake the event loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppEvent {
    /// Raw key press or release from the input source.
    Key(RawKeyEvent),
    /// Callback from the discovery engine.
    Discovery(DiscoveryEvent),
    /// Callback from the stream connector.
    Connection(ConnectionEvent),
    /// The watchdog armed for scan cycle `n` expired.
    Watchdog(u64),
}
