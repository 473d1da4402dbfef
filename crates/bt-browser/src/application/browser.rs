//! Browser: the application state machine.
//!
//! The browser owns the device registry and every controller, receives all
//! events from the single event loop, and decides which of them are valid in
//! the current state.
//!
//! # States (menu view)
//!
//! ```text
//!            ┌──────────── corrupted ───────────► StoreCorrupted
//!            │                                      │ ignore / delete
//! Bootup ────┴── loaded / absent ──► MainMenu ◄─────┘
//!                                     │   ▲
//!                                scan │   │ nothing found / failed / cycle complete
//!                                     ▼   │
//!                         ScanningDevices ──► ScanningServices
//! ```
//!
//! Besides the menu there are two more views: the listbox that selects a
//! service, and the connection view that shows what the service sends.
//!
//! Discovery callbacks are only valid in the matching scanning state.  A
//! callback in any other state is a broken engine contract and panics, with
//! one exception: once the watchdog abandons a cycle, callbacks from the
//! discovery that was still running are expected and dropped.

use std::sync::Arc;

use bt_browser_core::Registry;
use tracing::{debug, error, info, warn};

use super::connection::{ConnectionController, ConnectionEvent, ConnectionPhase, Endpoint};
use super::discovery::{DiscoveryEvent, DiscoveryOrchestrator, ScanProgress, ScanStep};
use super::events::AppEvent;
use super::listbox::Listbox;
use super::notify::{AbortReason, Broadcaster, Notice, NoticeListener};
use crate::infrastructure::input::{KeyMap, RawKeyEvent};
use crate::infrastructure::storage::snapshot_store::{LoadError, SnapshotRepository};

/// Symbolic keys the browser reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Key {
    /// `0`: leave the current view or the application.
    Exit,
    /// `5`: scan in the main menu, ignore in the corruption prompt.
    Primary,
    /// `9`: delete the corrupted store.
    Delete,
    Fire,
    SoftLeft,
    Up,
    Down,
}

/// What a key means in the current menu state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuAction {
    Exit,
    /// Keep going with whatever the corrupted store left behind.
    Ignore,
    /// Erase the corrupted store.
    Delete,
    Scan,
    Select,
}

/// Which screen has the keyboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum View {
    Menu,
    Listbox,
    Connection,
}

/// Tells the event loop whether to keep running.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Control {
    Continue,
    Exit,
}

/// State of the menu view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BrowserState {
    Bootup,
    MainMenu,
    StoreCorrupted,
    ScanningDevices(ScanProgress),
    ScanningServices(ScanProgress),
}

impl BrowserState {
    pub fn name(&self) -> &'static str {
        match self {
            BrowserState::Bootup => "Bootup",
            BrowserState::MainMenu => "MainMenu",
            BrowserState::StoreCorrupted => "StoreCorrupted",
            BrowserState::ScanningDevices(_) => "ScanningDevices",
            BrowserState::ScanningServices(_) => "ScanningServices",
        }
    }

    /// Maps a key to the action it triggers in this state.
    pub fn menu_action(&self, key: Key) -> Option<MenuAction> {
        match (self, key) {
            (_, Key::Exit) => Some(MenuAction::Exit),
            (BrowserState::StoreCorrupted, Key::Primary) => Some(MenuAction::Ignore),
            (BrowserState::StoreCorrupted, Key::Delete) => Some(MenuAction::Delete),
            (BrowserState::MainMenu, Key::Primary) => Some(MenuAction::Scan),
            (BrowserState::MainMenu, Key::Fire) => Some(MenuAction::Select),
            _ => None,
        }
    }

    /// The scan progress, if a cycle is running.
    pub fn progress(&self) -> Option<&ScanProgress> {
        match self {
            BrowserState::ScanningDevices(p) | BrowserState::ScanningServices(p) => Some(p),
            _ => None,
        }
    }
}

/// Discovery phase left running by an abandoned cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Devices,
    Services,
}

impl Phase {
    fn of(event: &DiscoveryEvent) -> Self {
        match event {
            DiscoveryEvent::DeviceFound(_) | DiscoveryEvent::DeviceDiscoveryFinished(_) => {
                Phase::Devices
            }
            DiscoveryEvent::ServiceFound(_) | DiscoveryEvent::ServiceDiscoveryFinished(_) => {
                Phase::Services
            }
        }
    }
}

pub struct Browser {
    state: BrowserState,
    view: View,
    registry: Registry,
    snapshots: SnapshotRepository,
    orchestrator: DiscoveryOrchestrator,
    connection: ConnectionController,
    listbox: Listbox,
    keymap: KeyMap,
    notices: Broadcaster<dyn NoticeListener>,
    abandoned: Option<Phase>,
}

impl Browser {
    pub fn new(
        orchestrator: DiscoveryOrchestrator,
        connection: ConnectionController,
        snapshots: SnapshotRepository,
        keymap: KeyMap,
    ) -> Self {
        Self {
            state: BrowserState::Bootup,
            view: View::Menu,
            registry: Registry::new(),
            snapshots,
            orchestrator,
            connection,
            listbox: Listbox::new(),
            keymap,
            notices: Broadcaster::new(),
            abandoned: None,
        }
    }

    pub fn add_listener(&mut self, listener: Arc<dyn NoticeListener>) {
        self.notices.add_listener(listener);
    }

    pub fn remove_listener(&mut self, listener: &Arc<dyn NoticeListener>) -> bool {
        self.notices.remove_listener(listener)
    }

    pub fn state(&self) -> &BrowserState {
        &self.state
    }

    pub fn view(&self) -> View {
        self.view
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn listbox(&self) -> &Listbox {
        &self.listbox
    }

    pub fn connection_phase(&self) -> ConnectionPhase {
        self.connection.phase()
    }

    /// The running scan cycle, used by the event loop to arm the watchdog.
    pub fn active_cycle(&self) -> Option<u64> {
        self.state.progress().map(|p| p.cycle)
    }

    /// Whether a scan cycle or a connection is still waiting on callbacks.
    pub fn is_busy(&self) -> bool {
        self.active_cycle().is_some()
            || matches!(
                self.connection.phase(),
                ConnectionPhase::Connecting | ConnectionPhase::Receiving
            )
    }

    /// Shows the menu view for the first time, which reads the store.
    pub fn start(&mut self) {
        self.show_menu();
    }

    /// Releases the connection before the process exits.
    pub fn shutdown(&mut self) {
        self.connection.close();
    }

    /// Dispatches one event from the event loop.
    pub fn handle(&mut self, event: AppEvent) -> Control {
        match event {
            AppEvent::Key(raw) => self.on_raw_key(raw),
            AppEvent::Discovery(event) => {
                self.on_discovery(event);
                Control::Continue
            }
            AppEvent::Connection(event) => {
                self.on_connection(event);
                Control::Continue
            }
            AppEvent::Watchdog(cycle) => {
                self.on_watchdog(cycle);
                Control::Continue
            }
        }
    }

    pub fn on_raw_key(&mut self, event: RawKeyEvent) -> Control {
        match self.keymap.translate(event) {
            Some(key) => self.on_key(key),
            None => Control::Continue,
        }
    }

    pub fn on_key(&mut self, key: Key) -> Control {
        debug!(?key, view = ?self.view, state = self.state.name(), "key");
        match self.view {
            View::Menu => self.menu_key(key),
            View::Listbox => self.listbox_key(key),
            View::Connection => self.connection_key(key),
        }
    }

    /// Applies a discovery callback.
    ///
    /// # Panics
    ///
    /// Panics if the callback does not belong to the running cycle or to a
    /// cycle abandoned by the watchdog.
    pub fn on_discovery(&mut self, event: DiscoveryEvent) {
        if self.absorb_abandoned(&event) {
            return;
        }

        match (std::mem::replace(&mut self.state, BrowserState::Bootup), event) {
            (BrowserState::ScanningDevices(mut progress), DiscoveryEvent::DeviceFound(device)) => {
                self.orchestrator
                    .record_device(&mut progress, &mut self.registry, device, &self.notices);
                self.state = BrowserState::ScanningDevices(progress);
            }
            (
                BrowserState::ScanningDevices(mut progress),
                DiscoveryEvent::DeviceDiscoveryFinished(status),
            ) => {
                let step = self.orchestrator.finish_devices(
                    &mut progress,
                    status,
                    &mut self.registry,
                    &self.notices,
                );
                self.apply_step(progress, step);
            }
            (BrowserState::ScanningServices(mut progress), DiscoveryEvent::ServiceFound(service))
                if progress.in_flight =>
            {
                self.orchestrator
                    .record_service(&mut progress, &mut self.registry, service, &self.notices);
                self.state = BrowserState::ScanningServices(progress);
            }
            (
                BrowserState::ScanningServices(mut progress),
                DiscoveryEvent::ServiceDiscoveryFinished(status),
            ) if progress.in_flight => {
                let step =
                    self.orchestrator
                        .finish_services(&mut progress, status, &self.registry, &self.notices);
                self.apply_step(progress, step);
            }
            (state, event) => {
                panic!("discovery callback {event:?} is invalid in state {}", state.name());
            }
        }
    }

    pub fn on_connection(&mut self, event: ConnectionEvent) {
        self.connection.on_event(event, &self.notices);
    }

    /// Abandons scan cycle `cycle` if it is still running.
    pub fn on_watchdog(&mut self, cycle: u64) {
        let (progress, phase) = match std::mem::replace(&mut self.state, BrowserState::Bootup) {
            BrowserState::ScanningDevices(p) if p.cycle == cycle => (p, Phase::Devices),
            BrowserState::ScanningServices(p) if p.cycle == cycle => (p, Phase::Services),
            other => {
                self.state = other;
                debug!(cycle, "watchdog for finished cycle ignored");
                return;
            }
        };

        warn!(cycle, ?phase, "scan watchdog expired");
        if progress.in_flight {
            self.abandoned = Some(phase);
        }
        self.orchestrator.abort(
            &progress,
            &mut self.registry,
            AbortReason::WatchdogExpired,
            &self.notices,
        );
        self.enter_main_menu();
    }

    // ── Menu view ─────────────────────────────────────────────────────────────

    fn menu_key(&mut self, key: Key) -> Control {
        let Some(action) = self.state.menu_action(key) else {
            return Control::Continue;
        };
        match action {
            MenuAction::Exit => {
                info!("exit requested");
                return Control::Exit;
            }
            MenuAction::Ignore => self.finish_read_store(),
            MenuAction::Delete => {
                self.delete_store();
                self.finish_read_store();
            }
            MenuAction::Scan => self.start_scan(),
            MenuAction::Select => {
                if self.registry.total_service_count() == 0 {
                    debug!("no services to select");
                } else {
                    self.show_listbox();
                }
            }
        }
        Control::Continue
    }

    fn show_menu(&mut self) {
        self.view = View::Menu;
        match self.state {
            BrowserState::Bootup => self.read_store(),
            BrowserState::MainMenu => self.enter_main_menu(),
            _ => {}
        }
    }

    fn enter_main_menu(&mut self) {
        self.state = BrowserState::MainMenu;
        self.notices.publish(Notice::MainMenu {
            known_services: self.registry.total_service_count(),
        });
    }

    fn start_scan(&mut self) {
        // On failure the orchestrator has already reported it and the state
        // stays MainMenu.
        if let Ok(progress) = self.orchestrator.begin_cycle(&self.registry, &self.notices) {
            // The engine accepted a new discovery, so the abandoned one is over.
            if let Some(phase) = self.abandoned.take() {
                debug!(?phase, "abandoned discovery superseded");
            }
            self.state = BrowserState::ScanningDevices(progress);
        }
    }

    fn apply_step(&mut self, progress: ScanProgress, step: ScanStep) {
        match step {
            ScanStep::ServicesStarted(_) | ScanStep::StartFailed(_) => {
                self.state = BrowserState::ScanningServices(progress);
            }
            ScanStep::CycleComplete => self.complete_cycle(),
            ScanStep::NothingFound | ScanStep::Aborted(_) => self.enter_main_menu(),
        }
    }

    fn complete_cycle(&mut self) {
        if let Err(e) = self.snapshots.save(&self.registry) {
            error!("could not write snapshot: {e}");
            self.notices.publish(Notice::StoreWriteFailed(e.to_string()));
        }
        self.listbox.rebuild(&self.registry);
        self.enter_main_menu();
    }

    // ── Store ─────────────────────────────────────────────────────────────────

    fn read_store(&mut self) {
        self.notices.publish(Notice::ReadingStore);
        match self.snapshots.load() {
            Ok(Some(registry)) => {
                self.registry = registry;
                self.listbox.rebuild(&self.registry);
                self.finish_read_store();
            }
            Ok(None) => {
                self.notices.publish(Notice::NoStore);
                self.enter_main_menu();
            }
            Err(LoadError::Corrupted(e)) => {
                warn!("snapshot corrupted: {e}");
                self.registry.clear();
                self.listbox.rebuild(&self.registry);
                self.notices.publish(Notice::StoreCorrupted);
                self.state = BrowserState::StoreCorrupted;
            }
            Err(LoadError::Store(e)) => {
                error!("could not read snapshot: {e}");
                self.notices.publish(Notice::NoStore);
                self.enter_main_menu();
            }
        }
    }

    fn finish_read_store(&mut self) {
        self.notices.publish(Notice::StoreReady);
        self.enter_main_menu();
    }

    fn delete_store(&mut self) {
        if let Err(e) = self.snapshots.delete() {
            warn!("could not delete snapshot: {e}");
        }
        self.registry.clear();
        self.listbox.rebuild(&self.registry);
    }

    // ── Listbox view ──────────────────────────────────────────────────────────

    fn show_listbox(&mut self) {
        self.view = View::Listbox;
        let cursor = self.listbox.cursor();
        for (i, row) in self.listbox.rows().iter().enumerate() {
            self.notices.publish(Notice::ListRow {
                label: row.label.clone(),
                selected: i == cursor,
            });
        }
    }

    fn listbox_key(&mut self, key: Key) -> Control {
        match key {
            Key::Exit => {
                info!("exit requested");
                return Control::Exit;
            }
            Key::Fire | Key::SoftLeft => self.connect_selected(),
            Key::Up | Key::Down => {
                let moved = if key == Key::Up {
                    self.listbox.move_up()
                } else {
                    self.listbox.move_down()
                };
                if let (true, Some(row)) = (moved, self.listbox.selected()) {
                    self.notices.publish(Notice::ListRow {
                        label: row.label.clone(),
                        selected: true,
                    });
                }
            }
            Key::Primary | Key::Delete => {}
        }
        Control::Continue
    }

    fn connect_selected(&mut self) {
        let Some((device_index, service_index)) = self.listbox.selected_service() else {
            debug!("cursor is on a device row");
            return;
        };
        let Some((device, service)) = self.registry.service(device_index, service_index) else {
            warn!(device_index, service_index, "selection no longer in registry");
            return;
        };
        let endpoint = Endpoint::for_service(device, service);
        self.view = View::Connection;
        self.connection.connect(endpoint, &self.notices);
    }

    // ── Connection view ───────────────────────────────────────────────────────

    fn connection_key(&mut self, key: Key) -> Control {
        if key == Key::Exit {
            self.connection.close();
            self.show_menu();
        }
        Control::Continue
    }

    fn absorb_abandoned(&mut self, event: &DiscoveryEvent) -> bool {
        if self.abandoned != Some(Phase::of(event)) {
            return false;
        }
        if matches!(
            event,
            DiscoveryEvent::DeviceDiscoveryFinished(_) | DiscoveryEvent::ServiceDiscoveryFinished(_)
        ) {
            self.abandoned = None;
        }
        debug!(?event, "callback from abandoned scan ignored");
        true
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
