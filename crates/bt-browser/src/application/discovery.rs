//! DiscoveryOrchestrator: runs one full two-phase scan cycle.
//!
//! A cycle first asks the engine for nearby devices, then walks every device
//! in the registry, in order, and asks the engine for each device's
//! services.  Devices known from earlier cycles are scanned again and their
//! services appended again.  The engine is reentrant but never runs two discoveries at once,
//! so the next service discovery is only started from the previous one's
//! finished callback.
//!
//! # Sequencing
//!
//! ```text
//! begin_cycle ──► record_device* ──► finish_devices
//!                                        │
//!                   ┌────────────────────┘
//!                   ▼
//!        start services(i) ──► record_service* ──► finish_services ──┐
//!                   ▲                                                │
//!                   └──────────────────── i + 1 ◄────────────────────┘
//! ```
//!
//! The orchestrator keeps no per-cycle state of its own: the scan position is
//! an explicit [`ScanProgress`] value owned by the caller's state machine, and
//! every step returns a [`ScanStep`] telling the caller which state to enter.

use std::sync::Arc;
use std::time::Instant;

use bt_browser_core::{BtAddress, DeviceInfo, Registry, Service};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::events::PlatformError;
use super::notify::{AbortReason, Broadcaster, Notice, NoticeListener};

/// The platform's device and service discovery engine.
///
/// Start calls return immediately; results arrive later as
/// [`DiscoveryEvent`]s.  A start call that fails produces no callbacks.
#[cfg_attr(test, mockall::automock)]
pub trait DiscoveryEngine: Send + Sync {
    /// Starts searching for nearby devices.
    fn start_device_discovery(&self, include_names: bool) -> Result<(), PlatformError>;

    /// Starts searching one device for services matching `filter`.
    fn start_service_discovery(&self, address: BtAddress, filter: Uuid)
        -> Result<(), PlatformError>;
}

/// Callbacks produced by a [`DiscoveryEngine`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiscoveryEvent {
    DeviceFound(DeviceInfo),
    DeviceDiscoveryFinished(i32),
    ServiceFound(Service),
    ServiceDiscoveryFinished(i32),
}

/// Position of an in-progress scan cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanProgress {
    /// Monotonic cycle number, used to match watchdog expiries.
    pub cycle: u64,
    /// Registry length when the cycle began.  A failed device phase drops
    /// the devices at or after this index.
    pub first_device: usize,
    /// Device whose services are being discovered.
    pub device_index: usize,
    /// Entities reported in the current phase.
    pub found: usize,
    /// Whether a discovery started by this cycle has not yet finished.
    pub in_flight: bool,
    pub cycle_started: Instant,
    pub phase_started: Instant,
}

impl ScanProgress {
    fn new(cycle: u64, first_device: usize) -> Self {
        let now = Instant::now();
        Self {
            cycle,
            first_device,
            device_index: 0,
            found: 0,
            in_flight: true,
            cycle_started: now,
            phase_started: now,
        }
    }
}

/// What the state machine should do after an orchestrator step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanStep {
    /// Service discovery is running for the device at this index.
    ServicesStarted(usize),
    /// The engine refused to start the next service discovery.
    StartFailed(PlatformError),
    /// Every device of the cycle has been scanned.
    CycleComplete,
    /// The registry holds no devices to scan.
    NothingFound,
    /// Device discovery failed and this cycle's devices were discarded.
    Aborted(i32),
}

/// Drives the two discovery phases against a [`DiscoveryEngine`].
pub struct DiscoveryOrchestrator {
    engine: Arc<dyn DiscoveryEngine>,
    include_names: bool,
    service_filter: Uuid,
    next_cycle: u64,
}

impl DiscoveryOrchestrator {
    pub fn new(
        engine: Arc<dyn DiscoveryEngine>,
        include_names: bool,
        service_filter: Uuid,
    ) -> Self {
        Self {
            engine,
            include_names,
            service_filter,
            next_cycle: 1,
        }
    }

    pub fn service_filter(&self) -> Uuid {
        self.service_filter
    }

    /// Starts device discovery for a new cycle.
    ///
    /// # Errors
    ///
    /// Returns the engine's [`PlatformError`] if discovery could not be
    /// started.  A [`Notice::StartFailed`] has already been published.
    pub fn begin_cycle(
        &mut self,
        registry: &Registry,
        notices: &Broadcaster<dyn NoticeListener>,
    ) -> Result<ScanProgress, PlatformError> {
        notices.publish(Notice::DeviceDiscoveryStarted);
        if let Err(e) = self.engine.start_device_discovery(self.include_names) {
            warn!("device discovery failed to start: {e}");
            notices.publish(Notice::StartFailed(e.code));
            return Err(e);
        }

        let cycle = self.next_cycle;
        self.next_cycle += 1;
        info!(cycle, "scan cycle started");
        Ok(ScanProgress::new(cycle, registry.len()))
    }

    /// Appends a device reported during the device phase.
    pub fn record_device(
        &self,
        progress: &mut ScanProgress,
        registry: &mut Registry,
        device: DeviceInfo,
        notices: &Broadcaster<dyn NoticeListener>,
    ) {
        progress.found += 1;
        debug!(address = %device.address, name = %device.name, "device found");
        notices.publish(Notice::DeviceFound {
            ordinal: progress.found,
            name: device.name.clone(),
            address: device.address,
        });
        registry.add_device(device);
    }

    /// Handles the end of the device phase and starts the service phase.
    pub fn finish_devices(
        &self,
        progress: &mut ScanProgress,
        status: i32,
        registry: &mut Registry,
        notices: &Broadcaster<dyn NoticeListener>,
    ) -> ScanStep {
        progress.in_flight = false;
        let elapsed = progress.phase_started.elapsed();
        info!(status, elapsed_ms = elapsed.as_millis() as u64, "device discovery finished");
        notices.publish(Notice::PhaseFinished { status, elapsed });

        if status < 0 {
            self.roll_back(progress, registry);
            notices.publish(Notice::ScanAborted(AbortReason::DeviceDiscoveryFailed(status)));
            return ScanStep::Aborted(status);
        }

        if registry.is_empty() {
            info!("no devices to scan");
            return ScanStep::NothingFound;
        }

        notices.publish(Notice::ScanningDevices(registry.len()));
        progress.device_index = 0;
        self.start_current(progress, registry, notices)
    }

    /// Appends a service reported for the current device.
    ///
    /// # Panics
    ///
    /// Panics if the current device index is not in the registry, which
    /// would mean the registry was mutated during the service phase.
    pub fn record_service(
        &self,
        progress: &mut ScanProgress,
        registry: &mut Registry,
        service: Service,
        notices: &Broadcaster<dyn NoticeListener>,
    ) {
        progress.found += 1;
        debug!(device = progress.device_index, port = service.port, "service found");
        notices.publish(Notice::ServiceFound {
            ordinal: progress.found,
            port: service.port,
            name: service.name.clone(),
        });
        if let Err(e) = registry.add_service(progress.device_index, service) {
            panic!("service reported outside the scanned device range: {e}");
        }
    }

    /// Handles the end of one device's service phase and moves to the next
    /// device.  A negative status counts as "no services" for that device.
    pub fn finish_services(
        &self,
        progress: &mut ScanProgress,
        status: i32,
        registry: &Registry,
        notices: &Broadcaster<dyn NoticeListener>,
    ) -> ScanStep {
        progress.in_flight = false;
        let elapsed = progress.phase_started.elapsed();
        debug!(device = progress.device_index, status, "service discovery finished");
        notices.publish(Notice::PhaseFinished { status, elapsed });

        progress.device_index += 1;
        self.start_current(progress, registry, notices)
    }

    /// Abandons the cycle: discards the devices it appended.
    pub fn abort(
        &self,
        progress: &ScanProgress,
        registry: &mut Registry,
        reason: AbortReason,
        notices: &Broadcaster<dyn NoticeListener>,
    ) {
        self.roll_back(progress, registry);
        notices.publish(Notice::ScanAborted(reason));
    }

    fn roll_back(&self, progress: &ScanProgress, registry: &mut Registry) {
        let dropped = registry.len().saturating_sub(progress.first_device);
        registry.truncate(progress.first_device);
        warn!(cycle = progress.cycle, dropped, "scan cycle aborted");
    }

    fn start_current(
        &self,
        progress: &mut ScanProgress,
        registry: &Registry,
        notices: &Broadcaster<dyn NoticeListener>,
    ) -> ScanStep {
        let Some(device) = registry.device(progress.device_index) else {
            let elapsed = progress.cycle_started.elapsed();
            info!(
                cycle = progress.cycle,
                elapsed_ms = elapsed.as_millis() as u64,
                "scan cycle complete"
            );
            notices.publish(Notice::CycleFinished { elapsed });
            return ScanStep::CycleComplete;
        };

        notices.publish(Notice::ServiceDiscoveryStarted(device.address));
        match self
            .engine
            .start_service_discovery(device.address, self.service_filter)
        {
            Ok(()) => {
                progress.found = 0;
                progress.in_flight = true;
                progress.phase_started = Instant::now();
                ScanStep::ServicesStarted(progress.device_index)
            }
            Err(e) => {
                warn!(address = %device.address, "service discovery failed to start: {e}");
                notices.publish(Notice::StartFailed(e.code));
                ScanStep::StartFailed(e)
            }
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use bt_browser_core::service_class;
    use mockall::predicate::eq;

    use super::*;
    use crate::infrastructure::platform::mock::RecordingNoticeListener;

    fn notices() -> (Broadcaster<dyn NoticeListener>, Arc<RecordingNoticeListener>) {
        let recorder = Arc::new(RecordingNoticeListener::new());
        let mut broadcaster: Broadcaster<dyn NoticeListener> = Broadcaster::new();
        broadcaster.add_listener(recorder.clone());
        (broadcaster, recorder)
    }

    fn info(last: u8, name: &str) -> DeviceInfo {
        DeviceInfo {
            address: BtAddress::new([0, 0, 0, 0, 0, last]),
            name: name.to_string(),
        }
    }

    fn spp(port: u32) -> Service {
        Service {
            port,
            name: "Serial".to_string(),
            uuid: service_class::SERIAL_PORT,
        }
    }

    #[test]
    fn test_begin_cycle_requests_names_and_numbers_cycles() {
        // Arrange
        let mut engine = MockDiscoveryEngine::new();
        engine
            .expect_start_device_discovery()
            .with(eq(true))
            .times(2)
            .returning(|_| Ok(()));
        let mut orchestrator =
            DiscoveryOrchestrator::new(Arc::new(engine), true, service_class::RFCOMM_PROTOCOL);
        let (notices, _) = notices();
        let registry = Registry::new();

        // Act
        let first = orchestrator.begin_cycle(&registry, &notices).unwrap();
        let second = orchestrator.begin_cycle(&registry, &notices).unwrap();

        // Assert
        assert_eq!(first.cycle, 1);
        assert_eq!(second.cycle, 2);
        assert!(first.in_flight);
    }

    #[test]
    fn test_begin_cycle_start_failure_is_reported() {
        let mut engine = MockDiscoveryEngine::new();
        engine
            .expect_start_device_discovery()
            .returning(|_| Err(PlatformError::new(-1)));
        let mut orchestrator =
            DiscoveryOrchestrator::new(Arc::new(engine), true, service_class::RFCOMM_PROTOCOL);
        let (notices, recorder) = notices();

        let result = orchestrator.begin_cycle(&Registry::new(), &notices);

        assert_eq!(result, Err(PlatformError::new(-1)));
        assert_eq!(recorder.lines(), vec!["DevDisc...", "failed: -1"]);
    }

    #[test]
    fn test_finish_devices_starts_with_first_registry_device() {
        // Arrange: one device from an earlier scan is already in the registry
        let mut registry = Registry::new();
        registry.add_device(info(1, "old"));
        let mut engine = MockDiscoveryEngine::new();
        engine.expect_start_device_discovery().returning(|_| Ok(()));
        engine
            .expect_start_service_discovery()
            .with(eq(info(1, "").address), eq(service_class::RFCOMM_PROTOCOL))
            .times(1)
            .returning(|_, _| Ok(()));
        let mut orchestrator =
            DiscoveryOrchestrator::new(Arc::new(engine), true, service_class::RFCOMM_PROTOCOL);
        let (notices, _) = notices();
        let mut progress = orchestrator.begin_cycle(&registry, &notices).unwrap();
        orchestrator.record_device(&mut progress, &mut registry, info(2, "new"), &notices);

        // Act
        let step = orchestrator.finish_devices(&mut progress, 0, &mut registry, &notices);

        // Assert
        assert_eq!(step, ScanStep::ServicesStarted(0));
        assert_eq!(progress.device_index, 0);
        assert_eq!(progress.first_device, 1);
    }

    #[test]
    fn test_finish_devices_without_new_devices_rescans_registry() {
        // Arrange
        let mut registry = Registry::new();
        registry.add_device(info(1, "known"));
        let mut engine = MockDiscoveryEngine::new();
        engine.expect_start_device_discovery().returning(|_| Ok(()));
        engine
            .expect_start_service_discovery()
            .with(eq(info(1, "").address), eq(service_class::RFCOMM_PROTOCOL))
            .times(1)
            .returning(|_, _| Ok(()));
        let mut orchestrator =
            DiscoveryOrchestrator::new(Arc::new(engine), true, service_class::RFCOMM_PROTOCOL);
        let (notices, recorder) = notices();
        let mut progress = orchestrator.begin_cycle(&registry, &notices).unwrap();

        // Act
        let step = orchestrator.finish_devices(&mut progress, 0, &mut registry, &notices);

        // Assert
        assert_eq!(step, ScanStep::ServicesStarted(0));
        assert!(recorder.lines().contains(&"Scanning 1 devices...".to_string()));
    }

    #[test]
    fn test_finish_devices_with_no_devices_reports_nothing_found() {
        let mut engine = MockDiscoveryEngine::new();
        engine.expect_start_device_discovery().returning(|_| Ok(()));
        engine.expect_start_service_discovery().never();
        let mut orchestrator =
            DiscoveryOrchestrator::new(Arc::new(engine), false, service_class::RFCOMM_PROTOCOL);
        let (notices, _) = notices();
        let mut registry = Registry::new();
        let mut progress = orchestrator.begin_cycle(&registry, &notices).unwrap();

        let step = orchestrator.finish_devices(&mut progress, 0, &mut registry, &notices);

        assert_eq!(step, ScanStep::NothingFound);
    }

    #[test]
    fn test_failed_device_phase_rolls_back_this_cycle_only() {
        // Arrange
        let mut registry = Registry::new();
        registry.add_device(info(1, "kept"));
        let mut engine = MockDiscoveryEngine::new();
        engine.expect_start_device_discovery().returning(|_| Ok(()));
        engine.expect_start_service_discovery().never();
        let mut orchestrator =
            DiscoveryOrchestrator::new(Arc::new(engine), true, service_class::RFCOMM_PROTOCOL);
        let (notices, recorder) = notices();
        let mut progress = orchestrator.begin_cycle(&registry, &notices).unwrap();
        orchestrator.record_device(&mut progress, &mut registry, info(2, "dropped"), &notices);

        // Act
        let step = orchestrator.finish_devices(&mut progress, -3, &mut registry, &notices);

        // Assert
        assert_eq!(step, ScanStep::Aborted(-3));
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.device(0).unwrap().name, "kept");
        assert!(recorder
            .lines()
            .contains(&"scan aborted: device discovery failed (-3)".to_string()));
    }

    #[test]
    fn test_service_phase_advances_past_failed_device() {
        // Arrange: two devices, the first device's discovery ends with an error
        let mut engine = MockDiscoveryEngine::new();
        engine.expect_start_device_discovery().returning(|_| Ok(()));
        engine
            .expect_start_service_discovery()
            .times(2)
            .returning(|_, _| Ok(()));
        let mut orchestrator =
            DiscoveryOrchestrator::new(Arc::new(engine), true, service_class::RFCOMM_PROTOCOL);
        let (notices, _) = notices();
        let mut registry = Registry::new();
        let mut progress = orchestrator.begin_cycle(&registry, &notices).unwrap();
        orchestrator.record_device(&mut progress, &mut registry, info(1, "a"), &notices);
        orchestrator.record_device(&mut progress, &mut registry, info(2, "b"), &notices);
        orchestrator.finish_devices(&mut progress, 0, &mut registry, &notices);

        // Act
        let after_first = orchestrator.finish_services(&mut progress, -5, &registry, &notices);
        orchestrator.record_service(&mut progress, &mut registry, spp(3), &notices);
        let after_second = orchestrator.finish_services(&mut progress, 0, &registry, &notices);

        // Assert
        assert_eq!(after_first, ScanStep::ServicesStarted(1));
        assert_eq!(after_second, ScanStep::CycleComplete);
        assert!(registry.device(0).unwrap().services.is_empty());
        assert_eq!(registry.device(1).unwrap().services, vec![spp(3)]);
    }

    #[test]
    fn test_service_start_failure_is_reported_without_advancing() {
        let mut engine = MockDiscoveryEngine::new();
        engine.expect_start_device_discovery().returning(|_| Ok(()));
        engine
            .expect_start_service_discovery()
            .times(1)
            .returning(|_, _| Err(PlatformError::new(-2)));
        let mut orchestrator =
            DiscoveryOrchestrator::new(Arc::new(engine), true, service_class::RFCOMM_PROTOCOL);
        let (notices, _) = notices();
        let mut registry = Registry::new();
        let mut progress = orchestrator.begin_cycle(&registry, &notices).unwrap();
        orchestrator.record_device(&mut progress, &mut registry, info(1, "a"), &notices);

        let step = orchestrator.finish_devices(&mut progress, 0, &mut registry, &notices);

        assert_eq!(step, ScanStep::StartFailed(PlatformError::new(-2)));
        assert_eq!(progress.device_index, 0);
        assert!(!progress.in_flight);
    }

    #[test]
    fn test_service_ordinals_restart_for_each_device() {
        let mut engine = MockDiscoveryEngine::new();
        engine.expect_start_device_discovery().returning(|_| Ok(()));
        engine
            .expect_start_service_discovery()
            .returning(|_, _| Ok(()));
        let mut orchestrator =
            DiscoveryOrchestrator::new(Arc::new(engine), true, service_class::RFCOMM_PROTOCOL);
        let (notices, recorder) = notices();
        let mut registry = Registry::new();
        let mut progress = orchestrator.begin_cycle(&registry, &notices).unwrap();
        orchestrator.record_device(&mut progress, &mut registry, info(1, "a"), &notices);
        orchestrator.record_device(&mut progress, &mut registry, info(2, "b"), &notices);
        orchestrator.finish_devices(&mut progress, 0, &mut registry, &notices);

        orchestrator.record_service(&mut progress, &mut registry, spp(1), &notices);
        orchestrator.finish_services(&mut progress, 0, &registry, &notices);
        orchestrator.record_service(&mut progress, &mut registry, spp(2), &notices);

        let lines = recorder.lines();
        assert!(lines.contains(&"s1: 1 Serial".to_string()));
        assert!(lines.contains(&"s1: 2 Serial".to_string()));
    }
}
