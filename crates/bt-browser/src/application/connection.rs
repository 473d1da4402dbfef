//! ConnectionController: one stream connection with a continuous read loop.
//!
//! After the connect callback succeeds the controller keeps exactly one
//! receive outstanding.  Each completed receive is terminated, surfaced as
//! text, and immediately followed by the next receive, until the connection is
//! closed or a receive fails.

use std::fmt;
use std::sync::Arc;

use bt_browser_core::{BtAddress, Device, Service};
use tracing::{debug, info, warn};

use super::events::PlatformError;
use super::notify::{Broadcaster, Notice, NoticeListener};

/// Size of the receive buffer, including the terminator.
pub const RECV_BUFFER_LEN: usize = 128;

/// Remote stream endpoint derived from a discovered service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Endpoint {
    pub address: BtAddress,
    pub port: u32,
}

impl Endpoint {
    pub fn for_service(device: &Device, service: &Service) -> Self {
        Self {
            address: device.address,
            port: service.port,
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "btspp://{}:{}", self.address, self.port)
    }
}

/// The platform's stream connection primitive.
///
/// `connect` and `recv` return immediately; results arrive later as
/// [`ConnectionEvent`]s.
#[cfg_attr(test, mockall::automock)]
pub trait StreamConnector: Send + Sync {
    fn connect(&self, endpoint: &Endpoint) -> Result<(), PlatformError>;

    /// Requests at most `max_len` bytes.
    fn recv(&self, max_len: usize) -> Result<(), PlatformError>;

    /// Releases the connection.  Safe to call at any time.
    fn close(&self);
}

/// Callbacks produced by a [`StreamConnector`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionEvent {
    ConnectFinished(i32),
    RecvFinished(Result<Vec<u8>, PlatformError>),
}

/// Lifecycle of the controlled connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionPhase {
    /// No connection; callbacks are ignored.
    Idle,
    /// Waiting for the connect callback.
    Connecting,
    /// A receive is outstanding.
    Receiving,
    /// The connection failed or the read loop ended; waiting for `close`.
    Stopped,
}

pub struct ConnectionController {
    connector: Arc<dyn StreamConnector>,
    phase: ConnectionPhase,
    endpoint: Option<Endpoint>,
    buf: [u8; RECV_BUFFER_LEN],
}

impl ConnectionController {
    pub fn new(connector: Arc<dyn StreamConnector>) -> Self {
        Self {
            connector,
            phase: ConnectionPhase::Idle,
            endpoint: None,
            buf: [0; RECV_BUFFER_LEN],
        }
    }

    pub fn phase(&self) -> ConnectionPhase {
        self.phase
    }

    pub fn endpoint(&self) -> Option<Endpoint> {
        self.endpoint
    }

    /// Opens a connection to `endpoint`, closing any previous one first.
    pub fn connect(&mut self, endpoint: Endpoint, notices: &Broadcaster<dyn NoticeListener>) {
        self.close();
        info!(%endpoint, "connecting");
        notices.publish(Notice::Connecting(endpoint));
        self.endpoint = Some(endpoint);

        match self.connector.connect(&endpoint) {
            Ok(()) => self.phase = ConnectionPhase::Connecting,
            Err(e) => {
                warn!(%endpoint, "connect failed to start: {e}");
                notices.publish(Notice::ConnectError(e.code));
                self.phase = ConnectionPhase::Stopped;
            }
        }
    }

    /// Applies a connector callback.
    pub fn on_event(&mut self, event: ConnectionEvent, notices: &Broadcaster<dyn NoticeListener>) {
        match (self.phase, event) {
            (ConnectionPhase::Idle, event) => {
                debug!(?event, "connection callback after close ignored");
            }
            (ConnectionPhase::Connecting, ConnectionEvent::ConnectFinished(status)) => {
                notices.publish(Notice::ConnectFinished(status));
                if status < 0 {
                    warn!(status, "connect failed");
                    self.phase = ConnectionPhase::Stopped;
                } else {
                    self.issue_recv(notices);
                }
            }
            (ConnectionPhase::Receiving, ConnectionEvent::RecvFinished(Ok(bytes))) => {
                let text = self.terminate(&bytes);
                notices.publish(Notice::Received(text));
                self.issue_recv(notices);
            }
            (ConnectionPhase::Receiving, ConnectionEvent::RecvFinished(Err(e))) => {
                info!(code = e.code, "read loop ended");
                notices.publish(Notice::RecvFailed(e.code));
                self.phase = ConnectionPhase::Stopped;
            }
            (phase, event) => {
                warn!(?phase, ?event, "unexpected connection callback ignored");
            }
        }
    }

    /// Releases the connection.  Safe to call in any phase.
    pub fn close(&mut self) {
        if self.phase != ConnectionPhase::Idle {
            debug!(endpoint = ?self.endpoint, "closing connection");
            self.connector.close();
        }
        self.phase = ConnectionPhase::Idle;
        self.endpoint = None;
    }

    fn issue_recv(&mut self, notices: &Broadcaster<dyn NoticeListener>) {
        match self.connector.recv(RECV_BUFFER_LEN - 1) {
            Ok(()) => self.phase = ConnectionPhase::Receiving,
            Err(e) => {
                warn!("recv failed to start: {e}");
                notices.publish(Notice::RecvFailed(e.code));
                self.phase = ConnectionPhase::Stopped;
            }
        }
    }

    /// Copies received bytes into the buffer, terminates them, and returns
    /// the text up to the first terminator.
    fn terminate(&mut self, bytes: &[u8]) -> String {
        let len = bytes.len().min(RECV_BUFFER_LEN - 1);
        self.buf[..len].copy_from_slice(&bytes[..len]);
        self.buf[len] = 0;
        let end = self.buf[..len].iter().position(|&b| b == 0).unwrap_or(len);
        String::from_utf8_lossy(&self.buf[..end]).into_owned()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use mockall::predicate::eq;
    use mockall::Sequence;

    use super::*;
    use crate::infrastructure::platform::mock::RecordingNoticeListener;

    fn endpoint() -> Endpoint {
        Endpoint {
            address: BtAddress::new([0x00, 0x50, 0xC0, 0x00, 0x32, 0x1B]),
            port: 3,
        }
    }

    fn notices() -> (Broadcaster<dyn NoticeListener>, Arc<RecordingNoticeListener>) {
        let recorder = Arc::new(RecordingNoticeListener::new());
        let mut broadcaster: Broadcaster<dyn NoticeListener> = Broadcaster::new();
        broadcaster.add_listener(recorder.clone());
        (broadcaster, recorder)
    }

    #[test]
    fn test_endpoint_renders_as_stream_url() {
        assert_eq!(endpoint().to_string(), "btspp://0050C000321B:3");
    }

    #[test]
    fn test_successful_connect_issues_first_receive() {
        // Arrange
        let mut seq = Sequence::new();
        let mut connector = MockStreamConnector::new();
        connector
            .expect_connect()
            .with(eq(endpoint()))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(()));
        connector
            .expect_recv()
            .with(eq(RECV_BUFFER_LEN - 1))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(()));
        let mut controller = ConnectionController::new(Arc::new(connector));
        let (notices, recorder) = notices();

        // Act
        controller.connect(endpoint(), &notices);
        controller.on_event(ConnectionEvent::ConnectFinished(0), &notices);

        // Assert
        assert_eq!(controller.phase(), ConnectionPhase::Receiving);
        assert_eq!(recorder.lines(), vec!["btspp://0050C000321B:3", "connect 0"]);
    }

    #[test]
    fn test_failed_connect_callback_does_not_receive() {
        let mut connector = MockStreamConnector::new();
        connector.expect_connect().returning(|_| Ok(()));
        connector.expect_recv().never();
        let mut controller = ConnectionController::new(Arc::new(connector));
        let (notices, recorder) = notices();

        controller.connect(endpoint(), &notices);
        controller.on_event(ConnectionEvent::ConnectFinished(-6), &notices);

        assert_eq!(controller.phase(), ConnectionPhase::Stopped);
        assert_eq!(recorder.lines().last().unwrap(), "connect -6");
    }

    #[test]
    fn test_connect_start_error_is_reported() {
        let mut connector = MockStreamConnector::new();
        connector
            .expect_connect()
            .returning(|_| Err(PlatformError::new(-4)));
        let mut controller = ConnectionController::new(Arc::new(connector));
        let (notices, recorder) = notices();

        controller.connect(endpoint(), &notices);

        assert_eq!(controller.phase(), ConnectionPhase::Stopped);
        assert_eq!(recorder.lines().last().unwrap(), "Error: -4");
    }

    #[test]
    fn test_received_text_stops_at_embedded_terminator() {
        let mut connector = MockStreamConnector::new();
        connector.expect_connect().returning(|_| Ok(()));
        connector.expect_recv().times(2).returning(|_| Ok(()));
        let mut controller = ConnectionController::new(Arc::new(connector));
        let (notices, recorder) = notices();
        controller.connect(endpoint(), &notices);
        controller.on_event(ConnectionEvent::ConnectFinished(0), &notices);

        controller.on_event(
            ConnectionEvent::RecvFinished(Ok(b"hi\0there".to_vec())),
            &notices,
        );

        assert_eq!(recorder.lines().last().unwrap(), "hi");
    }

    #[test]
    fn test_oversized_receive_is_clipped_to_buffer() {
        let mut connector = MockStreamConnector::new();
        connector.expect_connect().returning(|_| Ok(()));
        connector.expect_recv().times(2).returning(|_| Ok(()));
        let mut controller = ConnectionController::new(Arc::new(connector));
        let (notices, recorder) = notices();
        controller.connect(endpoint(), &notices);
        controller.on_event(ConnectionEvent::ConnectFinished(0), &notices);

        controller.on_event(ConnectionEvent::RecvFinished(Ok(vec![b'x'; 300])), &notices);

        assert_eq!(recorder.lines().last().unwrap().len(), RECV_BUFFER_LEN - 1);
    }

    #[test]
    fn test_receive_error_ends_read_loop() {
        let mut connector = MockStreamConnector::new();
        connector.expect_connect().returning(|_| Ok(()));
        connector.expect_recv().times(1).returning(|_| Ok(()));
        let mut controller = ConnectionController::new(Arc::new(connector));
        let (notices, recorder) = notices();
        controller.connect(endpoint(), &notices);
        controller.on_event(ConnectionEvent::ConnectFinished(0), &notices);

        controller.on_event(
            ConnectionEvent::RecvFinished(Err(PlatformError::new(-6))),
            &notices,
        );

        assert_eq!(controller.phase(), ConnectionPhase::Stopped);
        assert_eq!(recorder.lines().last().unwrap(), "recv -6");
    }

    #[test]
    fn test_callbacks_after_close_are_ignored() {
        let mut connector = MockStreamConnector::new();
        connector.expect_connect().returning(|_| Ok(()));
        connector.expect_close().times(1).return_const(());
        connector.expect_recv().never();
        let mut controller = ConnectionController::new(Arc::new(connector));
        let (notices, recorder) = notices();
        controller.connect(endpoint(), &notices);
        assert_eq!(controller.endpoint(), Some(endpoint()));

        controller.close();
        controller.on_event(ConnectionEvent::ConnectFinished(0), &notices);

        assert_eq!(controller.phase(), ConnectionPhase::Idle);
        assert_eq!(controller.endpoint(), None);
        assert_eq!(recorder.lines(), vec!["btspp://0050C000321B:3"]);
    }

    #[test]
    fn test_close_when_idle_does_not_touch_connector() {
        let mut connector = MockStreamConnector::new();
        connector.expect_close().never();
        let mut controller = ConnectionController::new(Arc::new(connector));

        controller.close();

        assert_eq!(controller.phase(), ConnectionPhase::Idle);
    }
}
