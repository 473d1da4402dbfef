//! Recording platform doubles for testing.
//!
//! These implement the platform traits without any radio.  Every call is
//! recorded so tests can assert on what the application asked for, and the
//! next start call can be told to fail with a given code.  No callbacks are
//! produced; tests feed [`crate::application::discovery::DiscoveryEvent`]s and
//! [`crate::application::connection::ConnectionEvent`]s to the browser
//! themselves.

use std::collections::VecDeque;
use std::sync::Mutex;

use bt_browser_core::BtAddress;
use uuid::Uuid;

use crate::application::connection::{Endpoint, StreamConnector};
use crate::application::discovery::DiscoveryEngine;
use crate::application::events::PlatformError;
use crate::application::notify::{Notice, NoticeListener};

// ── Discovery ─────────────────────────────────────────────────────────────────

/// A call made to [`RecordingDiscoveryEngine`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiscoveryCall {
    Devices { include_names: bool },
    Services { address: BtAddress, filter: Uuid },
}

/// A [`DiscoveryEngine`] that records start calls.
#[derive(Debug, Default)]
pub struct RecordingDiscoveryEngine {
    calls: Mutex<Vec<DiscoveryCall>>,
    failures: Mutex<VecDeque<i32>>,
}

impl RecordingDiscoveryEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the next start call (of either kind) fail with `code`.
    pub fn fail_next(&self, code: i32) {
        self.failures.lock().expect("lock poisoned").push_back(code);
    }

    /// Returns every start call in order, including failed ones.
    pub fn calls(&self) -> Vec<DiscoveryCall> {
        self.calls.lock().expect("lock poisoned").clone()
    }

    /// Returns only the service discovery calls.
    pub fn service_calls(&self) -> Vec<BtAddress> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                DiscoveryCall::Services { address, .. } => Some(address),
                DiscoveryCall::Devices { .. } => None,
            })
            .collect()
    }

    fn record(&self, call: DiscoveryCall) -> Result<(), PlatformError> {
        self.calls.lock().expect("lock poisoned").push(call);
        match self.failures.lock().expect("lock poisoned").pop_front() {
            Some(code) => Err(PlatformError::new(code)),
            None => Ok(()),
        }
    }
}

impl DiscoveryEngine for RecordingDiscoveryEngine {
    fn start_device_discovery(&self, include_names: bool) -> Result<(), PlatformError> {
        self.record(DiscoveryCall::Devices { include_names })
    }

    fn start_service_discovery(
        &self,
        address: BtAddress,
        filter: Uuid,
    ) -> Result<(), PlatformError> {
        self.record(DiscoveryCall::Services { address, filter })
    }
}

// ── Connection ────────────────────────────────────────────────────────────────

/// A call made to [`RecordingConnector`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectorCall {
    Connect(Endpoint),
    Recv(usize),
    Close,
}

/// A [`StreamConnector`] that records calls.
#[derive(Debug, Default)]
pub struct RecordingConnector {
    calls: Mutex<Vec<ConnectorCall>>,
    connect_failures: Mutex<VecDeque<i32>>,
    recv_failures: Mutex<VecDeque<i32>>,
}

impl RecordingConnector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_next_connect(&self, code: i32) {
        self.connect_failures
            .lock()
            .expect("lock poisoned")
            .push_back(code);
    }

    pub fn fail_next_recv(&self, code: i32) {
        self.recv_failures
            .lock()
            .expect("lock poisoned")
            .push_back(code);
    }

    pub fn calls(&self) -> Vec<ConnectorCall> {
        self.calls.lock().expect("lock poisoned").clone()
    }

    /// Number of `recv` calls made so far.
    pub fn recv_count(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, ConnectorCall::Recv(_)))
            .count()
    }

    fn push(&self, call: ConnectorCall) {
        self.calls.lock().expect("lock poisoned").push(call);
    }
}

impl StreamConnector for RecordingConnector {
    fn connect(&self, endpoint: &Endpoint) -> Result<(), PlatformError> {
        self.push(ConnectorCall::Connect(*endpoint));
        match self.connect_failures.lock().expect("lock poisoned").pop_front() {
            Some(code) => Err(PlatformError::new(code)),
            None => Ok(()),
        }
    }

    fn recv(&self, max_len: usize) -> Result<(), PlatformError> {
        self.push(ConnectorCall::Recv(max_len));
        match self.recv_failures.lock().expect("lock poisoned").pop_front() {
            Some(code) => Err(PlatformError::new(code)),
            None => Ok(()),
        }
    }

    fn close(&self) {
        self.push(ConnectorCall::Close);
    }
}

// ── Notices ───────────────────────────────────────────────────────────────────

/// A [`NoticeListener`] that keeps every notice it receives.
#[derive(Debug, Default)]
pub struct RecordingNoticeListener {
    notices: Mutex<Vec<Notice>>,
}

impl RecordingNoticeListener {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn notices(&self) -> Vec<Notice> {
        self.notices.lock().expect("lock poisoned").clone()
    }

    /// The notices as console text.
    pub fn lines(&self) -> Vec<String> {
        self.notices().iter().map(ToString::to_string).collect()
    }

    pub fn clear(&self) {
        self.notices.lock().expect("lock poisoned").clear();
    }
}

impl NoticeListener for RecordingNoticeListener {
    fn on_notice(&self, notice: &Notice) {
        self.notices
            .lock()
            .expect("lock poisoned")
            .push(notice.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recording_engine_fails_only_next_call() {
        // Arrange
        let engine = RecordingDiscoveryEngine::new();
        engine.fail_next(-1);

        // Act
        let first = engine.start_device_discovery(true);
        let second = engine.start_device_discovery(false);

        // Assert
        assert_eq!(first, Err(PlatformError::new(-1)));
        assert_eq!(second, Ok(()));
        assert_eq!(engine.calls().len(), 2);
    }

    #[test]
    fn test_recording_connector_counts_receives() {
        let connector = RecordingConnector::new();
        connector.recv(127).unwrap();
        connector.close();
        connector.recv(127).unwrap();
        assert_eq!(connector.recv_count(), 2);
    }
}
