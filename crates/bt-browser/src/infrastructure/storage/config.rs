//! TOML-based configuration for the browser.
//!
//! Reads `AppConfig` from the platform-appropriate config file:
//! - Windows:  `%APPDATA%\BtBrowser\config.toml`
//! - Linux:    `$XDG_CONFIG_HOME/btbrowser/config.toml` or `~/.config/btbrowser/config.toml`
//! - macOS:    `~/Library/Application Support/BtBrowser/config.toml`
//!
//! Example:
//!
//! ```toml
//! [browser]
//! store_name = "btbrowser.db"
//! include_names = true
//! service_filter = "rfcomm"
//! scan_watchdog_secs = 60
//!
//! [keys]
//! fire = 284
//!
//! [simulation]
//! latency_ms = 150
//! greeting = ["hello"]
//!
//! [[simulation.devices]]
//! name = "headset"
//! address = "00:1A:7D:DA:71:13"
//!
//! [[simulation.devices.services]]
//! port = 1
//! name = "Serial Port"
//! uuid = "00001101-0000-1000-8000-00805f9b34fb"
//! ```
//!
//! # Serde default values
//!
//! Every field carries a `#[serde(default = ...)]`, so a missing file, a
//! missing section, or a missing key all fall back to the defaults below.

use std::path::{Path, PathBuf};

use bt_browser_core::{service_class, BtAddress};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Error type for configuration file operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The platform config directory could not be determined.
    #[error("could not determine platform config directory")]
    NoPlatformConfigDir,

    /// A file system I/O error occurred.
    #[error("I/O error accessing config at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The TOML content could not be parsed.
    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    /// The config could not be serialized to TOML.
    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
}

// ── Config schema types ───────────────────────────────────────────────────────

/// Top-level configuration stored on disk.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct AppConfig {
    #[serde(default)]
    pub browser: BrowserConfig,
    #[serde(default)]
    pub keys: KeyConfig,
    #[serde(default)]
    pub simulation: SimulationConfig,
}

/// Scan, persistence, and logging settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BrowserConfig {
    /// Name of the snapshot record inside the store directory.
    #[serde(default = "default_store_name")]
    pub store_name: String,
    /// Directory holding the record store.  Defaults to the config directory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub store_dir: Option<PathBuf>,
    /// Whether device discovery asks for friendly names.
    #[serde(default = "default_true")]
    pub include_names: bool,
    /// Protocol or service class searched for on each device: a well-known
    /// name such as `"rfcomm"` or a full UUID.
    #[serde(default = "default_service_filter")]
    pub service_filter: String,
    /// `tracing` level used when `RUST_LOG` is not set.
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Abandon a scan cycle that has not completed after this many seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scan_watchdog_secs: Option<u64>,
}

/// Raw key codes mapped to the browser's keys.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct KeyConfig {
    #[serde(default = "default_key_exit")]
    pub exit: u32,
    #[serde(default = "default_key_primary")]
    pub primary: u32,
    #[serde(default = "default_key_delete")]
    pub delete: u32,
    #[serde(default = "default_key_fire")]
    pub fire: u32,
    #[serde(default = "default_key_soft_left")]
    pub soft_left: u32,
    #[serde(default = "default_key_up")]
    pub up: u32,
    #[serde(default = "default_key_down")]
    pub down: u32,
}

/// Devices and behaviour of the simulated radio.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SimulationConfig {
    /// Delay before each simulated callback.
    #[serde(default = "default_latency_ms")]
    pub latency_ms: u64,
    #[serde(default = "default_sim_devices")]
    pub devices: Vec<SimulatedDeviceConfig>,
    /// Lines served, in order, to every simulated stream connection.
    #[serde(default = "default_greeting")]
    pub greeting: Vec<String>,
}

/// A device the simulated radio reports.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SimulatedDeviceConfig {
    #[serde(default)]
    pub name: String,
    pub address: BtAddress,
    #[serde(default)]
    pub services: Vec<SimulatedServiceConfig>,
}

/// A service offered by a simulated device.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SimulatedServiceConfig {
    pub port: u32,
    #[serde(default)]
    pub name: String,
    /// Service class.
    pub uuid: Uuid,
    /// Transport protocol the service is reached over.
    #[serde(default = "default_protocol")]
    pub protocol: Uuid,
}

// ── Default helpers ───────────────────────────────────────────────────────────

fn default_store_name() -> String {
    "btbrowser.db".to_string()
}
fn default_true() -> bool {
    true
}
fn default_service_filter() -> String {
    "rfcomm".to_string()
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_key_exit() -> u32 {
    u32::from(b'0')
}
fn default_key_primary() -> u32 {
    u32::from(b'5')
}
fn default_key_delete() -> u32 {
    u32::from(b'9')
}
fn default_key_fire() -> u32 {
    284
}
fn default_key_soft_left() -> u32 {
    285
}
fn default_key_up() -> u32 {
    273
}
fn default_key_down() -> u32 {
    274
}
fn default_latency_ms() -> u64 {
    150
}
fn default_protocol() -> Uuid {
    service_class::RFCOMM_PROTOCOL
}
fn default_greeting() -> Vec<String> {
    vec![
        "Hello from the simulated device.".to_string(),
        "Bye.".to_string(),
    ]
}
fn default_sim_devices() -> Vec<SimulatedDeviceConfig> {
    vec![
        SimulatedDeviceConfig {
            name: "Nokia 6600".to_string(),
            address: BtAddress::new([0x00, 0x60, 0x57, 0x1C, 0x33, 0x21]),
            services: vec![
                SimulatedServiceConfig {
                    port: 1,
                    name: "Dial-up Networking".to_string(),
                    uuid: service_class::DIALUP_NETWORKING,
                    protocol: service_class::RFCOMM_PROTOCOL,
                },
                SimulatedServiceConfig {
                    port: 9,
                    name: "OBEX Object Push".to_string(),
                    uuid: service_class::OBEX_OBJECT_PUSH,
                    protocol: service_class::RFCOMM_PROTOCOL,
                },
            ],
        },
        SimulatedDeviceConfig {
            name: String::new(),
            address: BtAddress::new([0x00, 0x50, 0xC0, 0x00, 0x32, 0x1B]),
            services: Vec::new(),
        },
    ]
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            store_name: default_store_name(),
            store_dir: None,
            include_names: default_true(),
            service_filter: default_service_filter(),
            log_level: default_log_level(),
            scan_watchdog_secs: None,
        }
    }
}

impl Default for KeyConfig {
    fn default() -> Self {
        Self {
            exit: default_key_exit(),
            primary: default_key_primary(),
            delete: default_key_delete(),
            fire: default_key_fire(),
            soft_left: default_key_soft_left(),
            up: default_key_up(),
            down: default_key_down(),
        }
    }
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            latency_ms: default_latency_ms(),
            devices: default_sim_devices(),
            greeting: default_greeting(),
        }
    }
}

// ── Config repository ─────────────────────────────────────────────────────────

/// Determines the platform-appropriate directory for the config file.
///
/// # Errors
///
/// Returns [`ConfigError::NoPlatformConfigDir`] when the platform config base
/// directory cannot be determined from the environment.
pub fn config_dir() -> Result<PathBuf, ConfigError> {
    platform_config_dir().ok_or(ConfigError::NoPlatformConfigDir)
}

/// Resolves the full path to the default config file.
///
/// # Errors
///
/// Returns [`ConfigError::NoPlatformConfigDir`] if the base directory cannot be
/// determined.
pub fn config_file_path() -> Result<PathBuf, ConfigError> {
    Ok(config_dir()?.join("config.toml"))
}

/// Loads `AppConfig` from `path`, returning `AppConfig::default()` if the file
/// does not exist.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] for file-system errors other than "not found",
/// and [`ConfigError::Parse`] if the TOML is malformed.
pub fn load_config_from(path: &Path) -> Result<AppConfig, ConfigError> {
    match std::fs::read_to_string(path) {
        Ok(content) => {
            let cfg: AppConfig = toml::from_str(&content)?;
            Ok(cfg)
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(AppConfig::default()),
        Err(e) => Err(ConfigError::Io {
            path: path.to_path_buf(),
            source: e,
        }),
    }
}

/// Writes `config` to `path`, creating the parent directory if needed.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] for file-system failures or
/// [`ConfigError::Serialize`] if serialization fails.
pub fn save_config_to(path: &Path, config: &AppConfig) -> Result<(), ConfigError> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir).map_err(|source| ConfigError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
    }

    let content = toml::to_string_pretty(config)?;
    std::fs::write(path, content).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(())
}

/// Resolves the platform config base directory including the `BtBrowser`
/// subdirectory.
fn platform_config_dir() -> Option<PathBuf> {
    #[cfg(target_os = "windows")]
    {
        std::env::var_os("APPDATA").map(|p| PathBuf::from(p).join("BtBrowser"))
    }

    #[cfg(target_os = "linux")]
    {
        let base = std::env::var_os("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .or_else(|| std::env::var_os("HOME").map(|h| PathBuf::from(h).join(".config")))?;
        Some(base.join("btbrowser"))
    }

    #[cfg(target_os = "macos")]
    {
        std::env::var_os("HOME").map(|h| {
            PathBuf::from(h)
                .join("Library")
                .join("Application Support")
                .join("BtBrowser")
        })
    }

    #[cfg(not(any(target_os = "windows", target_os = "linux", target_os = "macos")))]
    {
        None
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_browser_config_defaults() {
        // Arrange / Act
        let cfg = BrowserConfig::default();

        // Assert
        assert_eq!(cfg.store_name, "btbrowser.db");
        assert!(cfg.include_names);
        assert_eq!(cfg.service_filter, "rfcomm");
        assert_eq!(cfg.log_level, "info");
        assert_eq!(cfg.scan_watchdog_secs, None);
        assert_eq!(cfg.store_dir, None);
    }

    #[test]
    fn test_key_config_defaults_match_digit_codes() {
        let keys = KeyConfig::default();
        assert_eq!(keys.exit, 48);
        assert_eq!(keys.primary, 53);
        assert_eq!(keys.delete, 57);
    }

    #[test]
    fn test_empty_toml_uses_defaults() {
        let cfg: AppConfig = toml::from_str("").expect("deserialize empty");
        assert_eq!(cfg, AppConfig::default());
    }

    #[test]
    fn test_partial_browser_section_overrides_defaults() {
        // Arrange
        let toml_str = r#"
[browser]
store_name = "other.db"
scan_watchdog_secs = 30
"#;

        // Act
        let cfg: AppConfig = toml::from_str(toml_str).expect("deserialize partial");

        // Assert
        assert_eq!(cfg.browser.store_name, "other.db");
        assert_eq!(cfg.browser.scan_watchdog_secs, Some(30));
        assert!(cfg.browser.include_names);
        assert_eq!(cfg.keys, KeyConfig::default());
    }

    #[test]
    fn test_simulated_devices_parse_addresses_and_default_protocol() {
        let toml_str = r#"
[simulation]
latency_ms = 0

[[simulation.devices]]
name = "gps"
address = "00:0B:0D:11:22:33"

[[simulation.devices.services]]
port = 1
name = "NMEA"
uuid = "00001101-0000-1000-8000-00805f9b34fb"
"#;

        let cfg: AppConfig = toml::from_str(toml_str).expect("deserialize simulation");

        let device = &cfg.simulation.devices[0];
        assert_eq!(device.address.to_string(), "000B0D112233");
        assert_eq!(device.services[0].uuid, service_class::SERIAL_PORT);
        assert_eq!(device.services[0].protocol, service_class::RFCOMM_PROTOCOL);
        assert_eq!(cfg.simulation.greeting, default_greeting());
    }

    #[test]
    fn test_invalid_address_is_parse_error() {
        let toml_str = r#"
[[simulation.devices]]
address = "nope"
"#;
        let result: Result<AppConfig, toml::de::Error> = toml::from_str(toml_str);
        assert!(result.is_err());
    }

    #[test]
    fn test_config_round_trips_through_toml() {
        // Arrange
        let mut cfg = AppConfig::default();
        cfg.browser.scan_watchdog_secs = Some(45);
        cfg.browser.store_dir = Some(PathBuf::from("/var/lib/btbrowser"));
        cfg.keys.fire = 13;

        // Act
        let toml_str = toml::to_string_pretty(&cfg).expect("serialize");
        let restored: AppConfig = toml::from_str(&toml_str).expect("deserialize");

        // Assert
        assert_eq!(cfg, restored);
    }

    #[test]
    fn test_load_config_from_missing_file_returns_default() {
        let path = PathBuf::from("/nonexistent/path/that/cannot/exist/config.toml");
        assert_eq!(load_config_from(&path).unwrap(), AppConfig::default());
    }

    #[test]
    fn test_save_and_load_config_round_trip_via_temp_dir() {
        // Arrange
        let dir = std::env::temp_dir().join(format!("btbrowser_cfg_{}", Uuid::new_v4()));
        let path = dir.join("config.toml");
        let mut cfg = AppConfig::default();
        cfg.browser.log_level = "debug".to_string();

        // Act
        save_config_to(&path, &cfg).unwrap();
        let loaded = load_config_from(&path).unwrap();

        // Assert
        assert_eq!(loaded.browser.log_level, "debug");

        // Cleanup
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_config_file_path_ends_with_config_toml() {
        if let Ok(path) = config_file_path() {
            assert!(path.ends_with("config.toml"), "got {path:?}");
        }
    }
}
