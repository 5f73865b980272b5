//! TOML-based configuration persistence for the daemon.
//!
//! Reads and writes [`AppConfig`].  Without `--config` the file lives at
//! `$XDG_CONFIG_HOME/vhid/config.toml`, falling back to
//! `~/.config/vhid/config.toml`.
//!
//! # File layout
//!
//! ```toml
//! [daemon]
//! log_level = "info"
//! event_log = "/tmp/vhid-events.jsonl"
//!
//! [keyboard]
//! repeat_delay_ms = 250
//! repeat_rate_ms = 33
//!
//! [pointer]
//! dpi_percent = 100
//! intellimouse = true
//!
//! [touch]
//! max_x = 4095
//! max_y = 4095
//! max_pressure = 255
//! ```
//!
//! # Serde default values
//!
//! Every field carries `#[serde(default = "some_fn")]`, so a missing file, a
//! missing section and a missing key all fall back to the same defaults the
//! devices use when built without a config.  Values are range-checked after
//! parsing; a file holding `dpi_percent = 5` is rejected rather than clamped.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use vhid_core::config::{DEFAULT_DPI_PERCENT, DEFAULT_REPEAT_DELAY_MS, DEFAULT_REPEAT_RATE_MS};
use vhid_core::{ConfigError, DeviceSettings, PacketFraming, TouchBounds};

/// Error type for configuration file operations.
#[derive(Debug, Error)]
pub enum StorageError {
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

    /// A device setting is outside its accepted range.
    #[error("invalid device setting: {0}")]
    Invalid(#[from] ConfigError),

    /// A touch bound is zero or negative.
    #[error("touch bound {field} must be positive, got {value}")]
    InvalidTouchBound { field: &'static str, value: i32 },
}

// ── Config schema types ───────────────────────────────────────────────────────

/// Top-level daemon configuration stored on disk.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct AppConfig {
    #[serde(default)]
    pub daemon: DaemonConfig,
    #[serde(default)]
    pub keyboard: KeyboardConfig,
    #[serde(default)]
    pub pointer: PointerConfig,
    #[serde(default)]
    pub touch: TouchConfig,
}

/// Process-level settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DaemonConfig {
    /// `tracing` level used when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// JSON-lines event log.  No log is written when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_log: Option<PathBuf>,
}

/// Keyboard repeat timing, forwarded to the downstream consumer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct KeyboardConfig {
    #[serde(default = "default_repeat_delay")]
    pub repeat_delay_ms: u32,
    #[serde(default = "default_repeat_rate")]
    pub repeat_rate_ms: u32,
}

/// Pointer scaling and packet framing.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PointerConfig {
    #[serde(default = "default_dpi")]
    pub dpi_percent: u32,
    /// 4-byte packets with a scroll wheel when true, 3-byte packets when false.
    #[serde(default = "default_true")]
    pub intellimouse: bool,
}

/// Inclusive upper bounds of the touch surface.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TouchConfig {
    #[serde(default = "default_touch_max_x")]
    pub max_x: i32,
    #[serde(default = "default_touch_max_y")]
    pub max_y: i32,
    #[serde(default = "default_touch_max_pressure")]
    pub max_pressure: i32,
}

// ── Default helpers ───────────────────────────────────────────────────────────

fn default_log_level() -> String {
    "info".to_string()
}
fn default_repeat_delay() -> u32 {
    DEFAULT_REPEAT_DELAY_MS
}
fn default_repeat_rate() -> u32 {
    DEFAULT_REPEAT_RATE_MS
}
fn default_dpi() -> u32 {
    DEFAULT_DPI_PERCENT
}
fn default_true() -> bool {
    true
}
fn default_touch_max_x() -> i32 {
    TouchBounds::default().max_x
}
fn default_touch_max_y() -> i32 {
    TouchBounds::default().max_y
}
fn default_touch_max_pressure() -> i32 {
    TouchBounds::default().max_pressure
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            event_log: None,
        }
    }
}

impl Default for KeyboardConfig {
    fn default() -> Self {
        Self {
            repeat_delay_ms: default_repeat_delay(),
            repeat_rate_ms: default_repeat_rate(),
        }
    }
}

impl Default for PointerConfig {
    fn default() -> Self {
        Self {
            dpi_percent: default_dpi(),
            intellimouse: default_true(),
        }
    }
}

impl Default for TouchConfig {
    fn default() -> Self {
        Self {
            max_x: default_touch_max_x(),
            max_y: default_touch_max_y(),
            max_pressure: default_touch_max_pressure(),
        }
    }
}

impl AppConfig {
    /// The tunables for the shared [`vhid_core::ConfigurationStore`].
    pub fn device_settings(&self) -> DeviceSettings {
        DeviceSettings {
            repeat_delay_ms: self.keyboard.repeat_delay_ms,
            repeat_rate_ms: self.keyboard.repeat_rate_ms,
            dpi_percent: self.pointer.dpi_percent,
            packet_framing: if self.pointer.intellimouse {
                PacketFraming::IntelliMouse
            } else {
                PacketFraming::Standard
            },
        }
    }

    pub fn touch_bounds(&self) -> TouchBounds {
        TouchBounds {
            max_x: self.touch.max_x,
            max_y: self.touch.max_y,
            max_pressure: self.touch.max_pressure,
        }
    }

    /// Copies live tunables back into the file form, e.g. before saving.
    pub fn apply_device_settings(&mut self, settings: &DeviceSettings) {
        self.keyboard.repeat_delay_ms = settings.repeat_delay_ms;
        self.keyboard.repeat_rate_ms = settings.repeat_rate_ms;
        self.pointer.dpi_percent = settings.dpi_percent;
        self.pointer.intellimouse = settings.packet_framing == PacketFraming::IntelliMouse;
    }

    /// Range-checks every value.
    ///
    /// # Errors
    ///
    /// [`StorageError::Invalid`] for an out-of-range device tunable and
    /// [`StorageError::InvalidTouchBound`] for a non-positive touch bound.
    pub fn validate(&self) -> Result<(), StorageError> {
        self.device_settings().validate()?;
        for (field, value) in [
            ("max_x", self.touch.max_x),
            ("max_y", self.touch.max_y),
            ("max_pressure", self.touch.max_pressure),
        ] {
            if value <= 0 {
                return Err(StorageError::InvalidTouchBound { field, value });
            }
        }
        Ok(())
    }
}

// ── Config repository ─────────────────────────────────────────────────────────

/// Resolves the default config file path.
///
/// # Errors
///
/// Returns [`StorageError::NoPlatformConfigDir`] when neither
/// `XDG_CONFIG_HOME` nor `HOME` is set.
pub fn config_file_path() -> Result<PathBuf, StorageError> {
    platform_config_dir()
        .map(|dir| dir.join("config.toml"))
        .ok_or(StorageError::NoPlatformConfigDir)
}

/// Loads and validates `AppConfig`, returning defaults if the file does not
/// exist yet.
///
/// # Errors
///
/// Returns [`StorageError::Io`] for file-system errors other than "not found",
/// [`StorageError::Parse`] if the TOML is malformed, and a validation error
/// for out-of-range values.
pub fn load_config(path: &Path) -> Result<AppConfig, StorageError> {
    let cfg = match std::fs::read_to_string(path) {
        Ok(content) => toml::from_str::<AppConfig>(&content)?,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => AppConfig::default(),
        Err(source) => {
            return Err(StorageError::Io {
                path: path.to_path_buf(),
                source,
            })
        }
    };
    cfg.validate()?;
    Ok(cfg)
}

/// Persists `config` to `path`, creating the parent directory if needed.
///
/// # Errors
///
/// Returns [`StorageError::Io`] for file-system failures or
/// [`StorageError::Serialize`] if serialization fails.
pub fn save_config(path: &Path, config: &AppConfig) -> Result<(), StorageError> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir).map_err(|source| StorageError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
    }

    let content = toml::to_string_pretty(config)?;
    std::fs::write(path, content).map_err(|source| StorageError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn platform_config_dir() -> Option<PathBuf> {
    let base = std::env::var_os("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .or_else(|| std::env::var_os("HOME").map(|h| PathBuf::from(h).join(".config")))?;
    Some(base.join("vhid"))
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_dir(tag: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "vhid_cfg_{tag}_{}_{:?}",
            std::process::id(),
            std::thread::current().id()
        ));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn test_default_config_matches_device_defaults() {
        // Arrange / Act
        let cfg = AppConfig::default();

        // Assert
        assert_eq!(cfg.device_settings(), DeviceSettings::default());
        assert_eq!(cfg.touch_bounds(), TouchBounds::default());
        assert_eq!(cfg.daemon.log_level, "info");
        assert!(cfg.daemon.event_log.is_none());
    }

    #[test]
    fn test_empty_toml_uses_defaults() {
        let cfg: AppConfig = toml::from_str("").unwrap();

        assert_eq!(cfg, AppConfig::default());
    }

    #[test]
    fn test_partial_section_keeps_other_defaults() {
        // Arrange
        let toml_str = r#"
[pointer]
dpi_percent = 150
"#;

        // Act
        let cfg: AppConfig = toml::from_str(toml_str).unwrap();

        // Assert
        assert_eq!(cfg.pointer.dpi_percent, 150);
        assert!(cfg.pointer.intellimouse);
        assert_eq!(cfg.keyboard.repeat_delay_ms, 250);
    }

    #[test]
    fn test_standard_framing_when_intellimouse_disabled() {
        let cfg: AppConfig = toml::from_str("[pointer]\nintellimouse = false\n").unwrap();

        assert_eq!(cfg.device_settings().packet_framing, PacketFraming::Standard);
    }

    #[test]
    fn test_out_of_range_dpi_fails_validation() {
        let mut cfg = AppConfig::default();
        cfg.pointer.dpi_percent = 5;

        assert!(matches!(cfg.validate(), Err(StorageError::Invalid(_))));
    }

    #[test]
    fn test_zero_touch_bound_fails_validation() {
        let mut cfg = AppConfig::default();
        cfg.touch.max_pressure = 0;

        assert!(matches!(
            cfg.validate(),
            Err(StorageError::InvalidTouchBound { field: "max_pressure", value: 0 })
        ));
    }

    #[test]
    fn test_load_missing_file_returns_defaults() {
        let path = PathBuf::from("/nonexistent/path/that/cannot/exist/config.toml");

        let cfg = load_config(&path).unwrap();

        assert_eq!(cfg, AppConfig::default());
    }

    #[test]
    fn test_save_then_load_preserves_values() {
        // Arrange
        let dir = temp_dir("roundtrip");
        let path = dir.join("nested").join("config.toml");
        let mut cfg = AppConfig::default();
        cfg.daemon.event_log = Some(PathBuf::from("/tmp/events.jsonl"));
        cfg.touch.max_x = 1023;
        cfg.apply_device_settings(&DeviceSettings {
            dpi_percent: 200,
            packet_framing: PacketFraming::Standard,
            ..DeviceSettings::default()
        });

        // Act
        save_config(&path, &cfg).unwrap();
        let loaded = load_config(&path).unwrap();

        // Assert
        assert_eq!(loaded, cfg);
        assert!(!loaded.pointer.intellimouse);

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_load_rejects_invalid_file_contents() {
        // Arrange
        let dir = temp_dir("invalid");
        let path = dir.join("config.toml");
        std::fs::write(&path, "[keyboard]\nrepeat_rate_ms = 1\n").unwrap();

        // Act
        let result = load_config(&path);

        // Assert
        assert!(matches!(result, Err(StorageError::Invalid(_))));
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_malformed_toml_is_a_parse_error() {
        let dir = temp_dir("malformed");
        let path = dir.join("config.toml");
        std::fs::write(&path, "[[[ not valid toml").unwrap();

        assert!(matches!(load_config(&path), Err(StorageError::Parse(_))));
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_config_file_path_ends_with_config_toml() {
        if let Ok(path) = config_file_path() {
            assert!(path.ends_with("vhid/config.toml"), "got {path:?}");
        }
    }
}
