//! Simulated Bluetooth radio driven by the `[simulation]` config section.
//!
//! The simulated engine behaves like a real asynchronous stack: every start
//! call returns at once, and the results are posted into the application's
//! event channel from a Tokio task after the configured latency.  Nothing is
//! ever delivered synchronously from inside a start call.
//!
//! Device discovery reports every configured device.  Service discovery
//! reports the services of one device whose class or protocol matches the
//! filter; an address that is not configured finishes with
//! [`NOT_FOUND`].  Stream connections serve the configured greeting lines one
//! receive at a time and then report [`CLOSED`].

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use bt_browser_core::{BtAddress, DeviceInfo, Service};
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tracing::{debug, trace};
use uuid::Uuid;

use crate::application::connection::{ConnectionEvent, Endpoint, StreamConnector};
use crate::application::discovery::{DiscoveryEngine, DiscoveryEvent};
use crate::application::events::{AppEvent, PlatformError};
use crate::infrastructure::storage::config::{SimulatedDeviceConfig, SimulationConfig};

/// A discovery is already running.
pub const BUSY: i32 = -2;
/// The target device did not answer.
pub const NOT_FOUND: i32 = -3;
/// The device has no service on the requested port.
pub const NO_SUCH_SERVICE: i32 = -4;
/// The remote end closed the stream.
pub const CLOSED: i32 = -6;

/// Both halves of the simulated radio, sharing one device list.
pub struct SimulatedRadio {
    pub discovery: Arc<SimulatedDiscovery>,
    pub stream: Arc<SimulatedStream>,
}

impl SimulatedRadio {
    /// Builds the radio from config.  Callbacks are posted to `events`.
    ///
    /// # Panics
    ///
    /// Panics if called outside a Tokio runtime.
    pub fn new(config: &SimulationConfig, events: mpsc::Sender<AppEvent>) -> Self {
        let devices = Arc::new(config.devices.clone());
        let latency = Duration::from_millis(config.latency_ms);
        let runtime = Handle::current();
        Self {
            discovery: Arc::new(SimulatedDiscovery {
                devices: Arc::clone(&devices),
                latency,
                events: events.clone(),
                busy: Arc::new(AtomicBool::new(false)),
                runtime: runtime.clone(),
            }),
            stream: Arc::new(SimulatedStream {
                devices,
                greeting: config.greeting.clone(),
                latency,
                events,
                generation: Arc::new(AtomicU64::new(0)),
                pending: Mutex::new(VecDeque::new()),
                runtime,
            }),
        }
    }
}

// ── Discovery ─────────────────────────────────────────────────────────────────

pub struct SimulatedDiscovery {
    devices: Arc<Vec<SimulatedDeviceConfig>>,
    latency: Duration,
    events: mpsc::Sender<AppEvent>,
    busy: Arc<AtomicBool>,
    runtime: Handle,
}

impl SimulatedDiscovery {
    fn acquire(&self) -> Result<(), PlatformError> {
        if self.busy.swap(true, Ordering::SeqCst) {
            return Err(PlatformError::new(BUSY));
        }
        Ok(())
    }

    /// Posts `found` one by one, then `finished`, each after the latency.
    fn run_phase(&self, found: Vec<DiscoveryEvent>, finished: DiscoveryEvent) {
        let events = self.events.clone();
        let busy = Arc::clone(&self.busy);
        let latency = self.latency;
        self.runtime.spawn(async move {
            for event in found {
                tokio::time::sleep(latency).await;
                trace!(?event, "simulated discovery callback");
                if events.send(AppEvent::Discovery(event)).await.is_err() {
                    busy.store(false, Ordering::SeqCst);
                    return;
                }
            }
            tokio::time::sleep(latency).await;
            // Free the engine before the finished callback so the receiver
            // can start the next discovery from it.
            busy.store(false, Ordering::SeqCst);
            let _ = events.send(AppEvent::Discovery(finished)).await;
        });
    }
}

impl DiscoveryEngine for SimulatedDiscovery {
    fn start_device_discovery(&self, include_names: bool) -> Result<(), PlatformError> {
        self.acquire()?;
        debug!(devices = self.devices.len(), "simulated device discovery");
        let found = self
            .devices
            .iter()
            .map(|d| {
                DiscoveryEvent::DeviceFound(DeviceInfo {
                    address: d.address,
                    name: if include_names {
                        d.name.clone()
                    } else {
                        String::new()
                    },
                })
            })
            .collect();
        self.run_phase(found, DiscoveryEvent::DeviceDiscoveryFinished(0));
        Ok(())
    }

    fn start_service_discovery(
        &self,
        address: BtAddress,
        filter: Uuid,
    ) -> Result<(), PlatformError> {
        self.acquire()?;
        let Some(device) = self.devices.iter().find(|d| d.address == address) else {
            debug!(%address, "simulated device out of range");
            self.run_phase(Vec::new(), DiscoveryEvent::ServiceDiscoveryFinished(NOT_FOUND));
            return Ok(());
        };

        let found = device
            .services
            .iter()
            .filter(|s| s.uuid == filter || s.protocol == filter)
            .map(|s| {
                DiscoveryEvent::ServiceFound(Service {
                    port: s.port,
                    name: s.name.clone(),
                    uuid: s.uuid,
                })
            })
            .collect();
        self.run_phase(found, DiscoveryEvent::ServiceDiscoveryFinished(0));
        Ok(())
    }
}

// ── Stream ────────────────────────────────────────────────────────────────────

pub struct SimulatedStream {
    devices: Arc<Vec<SimulatedDeviceConfig>>,
    greeting: Vec<String>,
    latency: Duration,
    events: mpsc::Sender<AppEvent>,
    /// Bumped by every connect and close; callbacks of older connections are
    /// dropped.
    generation: Arc<AtomicU64>,
    pending: Mutex<VecDeque<Vec<u8>>>,
    runtime: Handle,
}

impl SimulatedStream {
    fn post(&self, event: ConnectionEvent) {
        let generation = Arc::clone(&self.generation);
        let expected = generation.load(Ordering::SeqCst);
        let events = self.events.clone();
        let latency = self.latency;
        self.runtime.spawn(async move {
            tokio::time::sleep(latency).await;
            if generation.load(Ordering::SeqCst) != expected {
                trace!(?event, "callback for closed simulated stream dropped");
                return;
            }
            let _ = events.send(AppEvent::Connection(event)).await;
        });
    }

    fn pending(&self) -> std::sync::MutexGuard<'_, VecDeque<Vec<u8>>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl StreamConnector for SimulatedStream {
    fn connect(&self, endpoint: &Endpoint) -> Result<(), PlatformError> {
        self.generation.fetch_add(1, Ordering::SeqCst);
        let reachable = self.devices.iter().any(|d| {
            d.address == endpoint.address && d.services.iter().any(|s| s.port == endpoint.port)
        });

        let mut pending = self.pending();
        pending.clear();
        if reachable {
            pending.extend(self.greeting.iter().map(|line| line.as_bytes().to_vec()));
        }
        drop(pending);

        debug!(%endpoint, reachable, "simulated connect");
        self.post(ConnectionEvent::ConnectFinished(if reachable {
            0
        } else {
            NO_SUCH_SERVICE
        }));
        Ok(())
    }

    fn recv(&self, max_len: usize) -> Result<(), PlatformError> {
        let mut pending = self.pending();
        let result = match pending.pop_front() {
            Some(mut chunk) => {
                if chunk.len() > max_len {
                    let rest = chunk.split_off(max_len);
                    pending.push_front(rest);
                }
                Ok(chunk)
            }
            None => Err(PlatformError::new(CLOSED)),
        };
        drop(pending);

        self.post(ConnectionEvent::RecvFinished(result));
        Ok(())
    }

    fn close(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        self.pending().clear();
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
