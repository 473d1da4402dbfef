//! User-visible status lines and the listener fan-out that delivers them.
//!
//! Every step of the browser workflow produces a [`Notice`].  The application
//! never prints directly; it publishes notices through a
//! [`Broadcaster<dyn NoticeListener>`] and whichever listeners are registered
//! (the console in the binary, a recorder in tests) decide what to do.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use bt_browser_core::BtAddress;

use super::connection::Endpoint;

// ── Broadcaster ───────────────────────────────────────────────────────────────

/// Ordered set of listeners of type `T`.
///
/// Listeners are compared by identity (the address of the shared allocation),
/// so the same `Arc` can be added once and removed later, while two distinct
/// listeners that happen to be equal in value are kept apart.
pub struct Broadcaster<T: ?Sized> {
    listeners: Vec<Arc<T>>,
}

impl<T: ?Sized> Broadcaster<T> {
    pub fn new() -> Self {
        Self {
            listeners: Vec::new(),
        }
    }

    /// Registers `listener`.  Adding a listener that is already registered is
    /// a no-op.
    pub fn add_listener(&mut self, listener: Arc<T>) {
        if !self.contains(&listener) {
            self.listeners.push(listener);
        }
    }

    /// Unregisters `listener`.  Returns `true` if it was registered.
    pub fn remove_listener(&mut self, listener: &Arc<T>) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|l| !same_listener(l, listener));
        self.listeners.len() != before
    }

    pub fn contains(&self, listener: &Arc<T>) -> bool {
        self.listeners.iter().any(|l| same_listener(l, listener))
    }

    /// Calls `f` for every listener in registration order.
    pub fn for_each(&self, mut f: impl FnMut(&T)) {
        for listener in &self.listeners {
            f(listener);
        }
    }

    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }
}

impl<T: ?Sized> Default for Broadcaster<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Compares data pointers only; vtable pointers of `dyn` listeners are not
/// guaranteed to be unique.
fn same_listener<T: ?Sized>(a: &Arc<T>, b: &Arc<T>) -> bool {
    Arc::as_ptr(a) as *const () == Arc::as_ptr(b) as *const ()
}

// ── Notices ───────────────────────────────────────────────────────────────────

/// Receives user-visible status lines.
pub trait NoticeListener: Send + Sync {
    fn on_notice(&self, notice: &Notice);
}

impl Broadcaster<dyn NoticeListener> {
    /// Delivers `notice` to every registered listener.
    pub fn publish(&self, notice: Notice) {
        self.for_each(|listener| listener.on_notice(&notice));
    }
}

/// One user-visible status line (or small group of lines).
///
/// The `Display` form is the exact text shown on the console.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    /// The persisted snapshot is about to be read.
    ReadingStore,
    /// No snapshot has been persisted yet.
    NoStore,
    /// The snapshot exists but could not be parsed.
    StoreCorrupted,
    /// The snapshot was loaded (or the corruption prompt was answered).
    StoreReady,
    /// The snapshot could not be written at the end of a scan cycle.
    StoreWriteFailed(String),
    /// The main menu is showing.
    MainMenu { known_services: usize },
    /// Device discovery is being started.
    DeviceDiscoveryStarted,
    /// A discovery start call was refused by the platform.
    StartFailed(i32),
    /// Device discovery reported a device.
    DeviceFound {
        ordinal: usize,
        name: String,
        address: BtAddress,
    },
    /// A discovery phase finished with `status`.
    PhaseFinished { status: i32, elapsed: Duration },
    /// Service discovery is about to walk `count` devices.
    ScanningDevices(usize),
    /// Service discovery is being started for one device.
    ServiceDiscoveryStarted(BtAddress),
    /// Service discovery reported a service.
    ServiceFound {
        ordinal: usize,
        port: u32,
        name: String,
    },
    /// Every device of the cycle has been scanned.
    CycleFinished { elapsed: Duration },
    /// The cycle was given up and its devices discarded.
    ScanAborted(AbortReason),
    /// One row of the selection list; `selected` marks the cursor row.
    ListRow { label: String, selected: bool },
    /// A stream connection is being opened.
    Connecting(Endpoint),
    /// The connect call was refused by the platform.
    ConnectError(i32),
    /// The connection attempt completed with `status`.
    ConnectFinished(i32),
    /// Text received over the connection.
    Received(String),
    /// A receive failed or the remote end closed the stream.
    RecvFailed(i32),
}

/// Why a scan cycle was abandoned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AbortReason {
    /// Device discovery finished with a negative status.
    DeviceDiscoveryFailed(i32),
    /// The cycle outlived the configured watchdog.
    WatchdogExpired,
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Notice::ReadingStore => write!(f, "reading store..."),
            Notice::NoStore => write!(f, "No store."),
            Notice::StoreCorrupted => write!(f, "Store corrupted.\n(5)ignore (9)delete"),
            Notice::StoreReady => write!(f, "done"),
            Notice::StoreWriteFailed(reason) => write!(f, "writeStore error {reason}"),
            Notice::MainMenu { known_services } => {
                writeln!(f, "{known_services} known services")?;
                if *known_services > 0 {
                    write!(f, "(F)select (5)scan (0)exit")
                } else {
                    write!(f, "(5)scan (0)exit")
                }
            }
            Notice::DeviceDiscoveryStarted => write!(f, "DevDisc..."),
            Notice::StartFailed(code) => write!(f, "failed: {code}"),
            Notice::DeviceFound {
                ordinal,
                name,
                address,
            } => write!(f, "d{ordinal}: {name}\n{address}"),
            Notice::PhaseFinished { status, elapsed } => {
                write!(f, "done({status}) in {} ms", elapsed.as_millis())
            }
            Notice::ScanningDevices(count) => write!(f, "Scanning {count} devices..."),
            Notice::ServiceDiscoveryStarted(address) => write!(f, "ServDisc {address}..."),
            Notice::ServiceFound {
                ordinal,
                port,
                name,
            } => write!(f, "s{ordinal}: {port} {name}"),
            Notice::CycleFinished { elapsed } => {
                write!(f, "Done, total {} ms", elapsed.as_millis())
            }
            Notice::ScanAborted(AbortReason::DeviceDiscoveryFailed(code)) => {
                write!(f, "scan aborted: device discovery failed ({code})")
            }
            Notice::ScanAborted(AbortReason::WatchdogExpired) => {
                write!(f, "scan aborted: timed out")
            }
            Notice::ListRow { label, selected } => {
                let marker = if *selected { '>' } else { ' ' };
                write!(f, "{marker}{label}")
            }
            Notice::Connecting(endpoint) => write!(f, "{endpoint}"),
            Notice::ConnectError(code) => write!(f, "Error: {code}"),
            Notice::ConnectFinished(code) => write!(f, "connect {code}"),
            Notice::Received(text) => write!(f, "{text}"),
            Notice::RecvFailed(code) => write!(f, "recv {code}"),
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    struct Counter {
        hits: Mutex<Vec<String>>,
    }

    impl NoticeListener for Counter {
        fn on_notice(&self, notice: &Notice) {
            self.hits.lock().unwrap().push(notice.to_string());
        }
    }

    fn counter() -> Arc<Counter> {
        Arc::new(Counter {
            hits: Mutex::new(Vec::new()),
        })
    }

    #[test]
    fn test_broadcaster_delivers_in_registration_order() {
        // Arrange
        let mut broadcaster: Broadcaster<Mutex<Vec<u8>>> = Broadcaster::new();
        let order = Arc::new(Mutex::new(Vec::new()));
        broadcaster.add_listener(Arc::new(Mutex::new(vec![1])));
        broadcaster.add_listener(Arc::new(Mutex::new(vec![2])));
        broadcaster.add_listener(Arc::new(Mutex::new(vec![3])));

        // Act
        broadcaster.for_each(|l| order.lock().unwrap().push(l.lock().unwrap()[0]));

        // Assert
        assert_eq!(*order.lock().unwrap(), vec![1, 2, 3]);
    }

    #[test]
    fn test_broadcaster_ignores_duplicate_registration() {
        let mut broadcaster: Broadcaster<dyn NoticeListener> = Broadcaster::new();
        let listener: Arc<dyn NoticeListener> = counter();
        broadcaster.add_listener(Arc::clone(&listener));
        broadcaster.add_listener(Arc::clone(&listener));
        assert_eq!(broadcaster.len(), 1);
    }

    #[test]
    fn test_broadcaster_removes_by_identity() {
        // Arrange: two listeners with identical contents
        let mut broadcaster: Broadcaster<dyn NoticeListener> = Broadcaster::new();
        let first = counter();
        let second = counter();
        let first_dyn: Arc<dyn NoticeListener> = first.clone();
        let second_dyn: Arc<dyn NoticeListener> = second.clone();
        broadcaster.add_listener(Arc::clone(&first_dyn));
        broadcaster.add_listener(Arc::clone(&second_dyn));

        // Act
        let removed = broadcaster.remove_listener(&first_dyn);
        broadcaster.publish(Notice::NoStore);

        // Assert
        assert!(removed);
        assert!(!broadcaster.contains(&first_dyn));
        assert!(first.hits.lock().unwrap().is_empty());
        assert_eq!(*second.hits.lock().unwrap(), vec!["No store."]);
    }

    #[test]
    fn test_remove_unknown_listener_returns_false() {
        let mut broadcaster: Broadcaster<dyn NoticeListener> = Broadcaster::new();
        let stranger: Arc<dyn NoticeListener> = counter();
        assert!(!broadcaster.remove_listener(&stranger));
        assert!(broadcaster.is_empty());
    }

    #[test]
    fn test_main_menu_notice_offers_select_only_with_services() {
        assert_eq!(
            Notice::MainMenu { known_services: 0 }.to_string(),
            "0 known services\n(5)scan (0)exit"
        );
        assert_eq!(
            Notice::MainMenu { known_services: 3 }.to_string(),
            "3 known services\n(F)select (5)scan (0)exit"
        );
    }

    #[test]
    fn test_phase_finished_notice_reports_status_and_millis() {
        let notice = Notice::PhaseFinished {
            status: -1,
            elapsed: Duration::from_millis(1520),
        };
        assert_eq!(notice.to_string(), "done(-1) in 1520 ms");
    }

    #[test]
    fn test_connecting_notice_is_stream_url() {
        let endpoint = Endpoint {
            address: BtAddress::new([0x00, 0x50, 0xC0, 0x00, 0x32, 0x1B]),
            port: 4,
        };
        assert_eq!(
            Notice::Connecting(endpoint).to_string(),
            "btspp://0050C000321B:4"
        );
    }
}
