//! Bluetooth browser entry point.
//!
//! Wires the configuration, the record store, the simulated radio, and the
//! console together, then runs the single event loop that owns the
//! [`Browser`].
//!
//! # Usage
//!
//! ```text
//! bt-browser [OPTIONS]
//!
//! Options:
//!   --config <PATH>          Config file [default: platform config dir]
//!   --store-dir <DIR>        Directory of the snapshot record store
//!   --log-level <LEVEL>      Log level when RUST_LOG is unset
//!   --write-default-config   Write the default config file and exit
//! ```
//!
//! Keys are typed on stdin, one line at a time: `0`-`9`, `f` (fire),
//! `s` (soft-left), `u` (up), `d` (down).  At end of input the browser
//! finishes the running scan or connection and exits, so a scan can be
//! scripted with `printf '5\n' | bt-browser`.
//!
//! # Architecture
//!
//! ```text
//! stdin task ──┐
//! radio tasks ─┼─► mpsc<AppEvent> ──► event loop ──► Browser ──► console
//! watchdogs ───┘
//! ```

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use bt_browser::application::browser::{Browser, Control};
use bt_browser::application::connection::ConnectionController;
use bt_browser::application::discovery::DiscoveryOrchestrator;
use bt_browser::application::events::AppEvent;
use bt_browser::infrastructure::console::ConsoleNoticeListener;
use bt_browser::infrastructure::input::{parse_console_line, KeyMap};
use bt_browser::infrastructure::platform::simulated::SimulatedRadio;
use bt_browser::infrastructure::storage::config::{self, AppConfig};
use bt_browser::infrastructure::storage::record_store::FileRecordStore;
use bt_browser::infrastructure::storage::snapshot_store::SnapshotRepository;
use bt_browser_core::service_class::parse_service_filter;

/// Capacity of the event channel.
const EVENT_QUEUE_DEPTH: usize = 64;

// ── CLI argument definitions ──────────────────────────────────────────────────

/// Menu-driven Bluetooth device and service browser.
#[derive(Debug, Parser)]
#[command(name = "bt-browser", version)]
struct Cli {
    /// Path of the TOML config file.
    #[arg(long, env = "BTBROWSER_CONFIG")]
    config: Option<PathBuf>,

    /// Directory holding the snapshot record.  Overrides `browser.store_dir`.
    #[arg(long, env = "BTBROWSER_STORE_DIR")]
    store_dir: Option<PathBuf>,

    /// Log level used when `RUST_LOG` is not set.  Overrides
    /// `browser.log_level`.
    #[arg(long, env = "BTBROWSER_LOG_LEVEL")]
    log_level: Option<String>,

    /// Write the default config to the config path and exit.
    #[arg(long)]
    write_default_config: bool,
}

impl Cli {
    fn config_path(&self) -> anyhow::Result<PathBuf> {
        match &self.config {
            Some(path) => Ok(path.clone()),
            None => config::config_file_path()
                .context("no config path given and no platform config directory"),
        }
    }
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config_path = cli.config_path()?;

    if cli.write_default_config {
        config::save_config_to(&config_path, &AppConfig::default())
            .with_context(|| format!("writing {}", config_path.display()))?;
        println!("wrote {}", config_path.display());
        return Ok(());
    }

    let cfg = config::load_config_from(&config_path)
        .with_context(|| format!("loading {}", config_path.display()))?;

    // Level is overridden by `RUST_LOG`.  Logs go to stderr; stdout is the
    // browser's console.
    let level = cli
        .log_level
        .clone()
        .unwrap_or_else(|| cfg.browser.log_level.clone());
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)),
        )
        .with_writer(std::io::stderr)
        .init();

    info!(config = %config_path.display(), "bt-browser starting");

    let filter = parse_service_filter(&cfg.browser.service_filter).with_context(|| {
        format!("invalid browser.service_filter {:?}", cfg.browser.service_filter)
    })?;
    let store_dir = match cli.store_dir.clone().or_else(|| cfg.browser.store_dir.clone()) {
        Some(dir) => dir,
        None => config::config_dir().context("no store directory configured")?,
    };
    info!(store = %store_dir.display(), record = %cfg.browser.store_name, "record store");

    let (tx, mut rx) = mpsc::channel::<AppEvent>(EVENT_QUEUE_DEPTH);
    let radio = SimulatedRadio::new(&cfg.simulation, tx.clone());
    let keymap = KeyMap::new(cfg.keys);

    let mut browser = Browser::new(
        DiscoveryOrchestrator::new(radio.discovery.clone(), cfg.browser.include_names, filter),
        ConnectionController::new(radio.stream.clone()),
        SnapshotRepository::new(
            Arc::new(FileRecordStore::new(store_dir)),
            cfg.browser.store_name.clone(),
        ),
        keymap,
    );
    browser.add_listener(Arc::new(ConsoleNoticeListener::stdout()));

    // ── Key input ─────────────────────────────────────────────────────────────
    let input_tx = tx.clone();
    let mut input = tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            let parsed = parse_console_line(&keymap, &line);
            if !parsed.unknown.is_empty() {
                warn!(unknown = ?parsed.unknown, "ignoring unknown keys");
            }
            for event in parsed.events {
                if input_tx.send(AppEvent::Key(event)).await.is_err() {
                    return;
                }
            }
        }
    });

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    let watchdog = cfg.browser.scan_watchdog_secs.map(Duration::from_secs);
    let mut armed_cycle = None;
    let mut input_open = true;

    browser.start();

    // ── Event loop ────────────────────────────────────────────────────────────
    loop {
        tokio::select! {
            event = rx.recv() => {
                let Some(event) = event else { break };
                if browser.handle(event) == Control::Exit {
                    break;
                }
            }
            _ = &mut input, if input_open => {
                info!("input closed");
                input_open = false;
            }
            _ = &mut ctrl_c => {
                info!("shutdown signal received");
                break;
            }
        }

        // Without input nothing new can start: leave once the queued keys are
        // handled and the last scan or connection has run to its end.
        if !input_open && rx.is_empty() && !browser.is_busy() {
            break;
        }

        if let (Some(timeout), Some(cycle)) = (watchdog, browser.active_cycle()) {
            if armed_cycle != Some(cycle) {
                armed_cycle = Some(cycle);
                debug!(cycle, ?timeout, "arming scan watchdog");
                let watchdog_tx = tx.clone();
                tokio::spawn(async move {
                    tokio::time::sleep(timeout).await;
                    let _ = watchdog_tx.send(AppEvent::Watchdog(cycle)).await;
                });
            }
        }
    }

    browser.shutdown();
    info!("bt-browser stopped");
    Ok(())
}
