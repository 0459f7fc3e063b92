//! ==============================================================================
//! config.rs - Runtime Configuration Loader
//! ==============================================================================
//!
//! purpose:
//!     defines the schema for `watchface.toml`.
//!     loads configuration from file or falls back to defaults.
//!
//! structure:
//!     - PollingConfig: mailbox poll, clock redraw and housekeeping periods.
//!     - HistoryConfig: retention window and glucose throttling.
//!     - StoreConfig: where the key-value store lives, how many event slots.
//!     - BridgeConfig: the phone app's local HTTP endpoint.
//!     - DialogConfig: how long a confirmation prompt stays open.
//!     - LoggingConfig: log level and format.
//!
//! ==============================================================================

use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::domain::Timestamp;
use crate::history::RetentionPolicy;

/// one week
pub const MAX_RETENTION_MINUTES: u64 = 7 * 24 * 60;
/// one day, for every setting given in seconds
pub const MAX_SECONDS: u64 = 24 * 60 * 60;

/// Root configuration structure
#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct WatchConfig {
    pub polling: PollingConfig,
    pub history: HistoryConfig,
    pub store: StoreConfig,
    pub bridge: BridgeConfig,
    pub dialog: DialogConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct PollingConfig {
    pub interval_seconds: u64,
    pub clock_seconds: u64,
    pub housekeeping_seconds: u64,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            interval_seconds: 5,
            clock_seconds: 60,
            housekeeping_seconds: 60,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct HistoryConfig {
    pub retention_minutes: u64,
    pub glucose_min_gap_seconds: u64,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            retention_minutes: 90,
            glucose_min_gap_seconds: 270,
        }
    }
}

impl HistoryConfig {
    pub fn retention(&self) -> RetentionPolicy {
        RetentionPolicy {
            window_ms: (self.retention_minutes.min(MAX_RETENTION_MINUTES) * 60 * 1000) as Timestamp,
            glucose_min_gap_ms: seconds_to_ms(self.glucose_min_gap_seconds),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct StoreConfig {
    pub root_dir: PathBuf,
    /// number of `aaps.events.NN` slots the phone rotates through
    pub event_slots: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            root_dir: PathBuf::from("storage"),
            event_slots: 5,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct BridgeConfig {
    pub base_url: String,
    pub timeout_ms: u64,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:28891".to_string(),
            timeout_ms: 5000,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct DialogConfig {
    pub confirm_timeout_seconds: u64,
}

impl Default for DialogConfig {
    fn default() -> Self {
        Self { confirm_timeout_seconds: 120 }
    }
}

impl DialogConfig {
    pub fn confirm_timeout_ms(&self) -> Timestamp {
        seconds_to_ms(self.confirm_timeout_seconds)
    }
}

fn seconds_to_ms(seconds: u64) -> Timestamp {
    (seconds.min(MAX_SECONDS) * 1000) as Timestamp
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    /// emit JSON lines instead of human-readable logs
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

impl WatchConfig {
    /// Load configuration from file
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| anyhow::anyhow!("Failed to read config file: {}", e))?;

        let config: WatchConfig = toml::from_str(&content)
            .map_err(|e| anyhow::anyhow!("Failed to parse config: {}", e))?;

        config.validate()?;
        Ok(config)
    }

    /// Load with default fallback
    pub fn load_or_default() -> Self {
        let paths = [
            PathBuf::from("config").join("watchface.toml"),
            PathBuf::from("..").join("config").join("watchface.toml"),
        ];

        for path in &paths {
            if path.exists() {
                match Self::load(path) {
                    Ok(config) => {
                        println!("[CONFIG] Loaded from {}", path.display());
                        return config;
                    }
                    Err(e) => {
                        println!("[CONFIG] Warning: Failed to load {}: {}", path.display(), e);
                    }
                }
            }
        }

        println!("[CONFIG] Warning: No config file found - using defaults");
        Self::default()
    }

    fn validate(&self) -> anyhow::Result<()> {
        if self.polling.interval_seconds == 0 {
            anyhow::bail!("polling.interval_seconds must be positive");
        }
        if self.history.retention_minutes == 0 {
            anyhow::bail!("history.retention_minutes must be positive");
        }
        if self.history.retention_minutes > MAX_RETENTION_MINUTES {
            anyhow::bail!("history.retention_minutes must be at most {}", MAX_RETENTION_MINUTES);
        }
        let seconds = [
            ("polling.interval_seconds", self.polling.interval_seconds),
            ("polling.clock_seconds", self.polling.clock_seconds),
            ("polling.housekeeping_seconds", self.polling.housekeeping_seconds),
            ("history.glucose_min_gap_seconds", self.history.glucose_min_gap_seconds),
            ("dialog.confirm_timeout_seconds", self.dialog.confirm_timeout_seconds),
        ];
        for (name, value) in seconds {
            if value > MAX_SECONDS {
                anyhow::bail!("{} must be at most {}", name, MAX_SECONDS);
            }
        }
        Ok(())
    }

    /// Print configuration summary
    pub fn print_summary(&self) {
        println!("┌─────────────────────────────────────────┐");
        println!("│          WATCH FACE CONFIGURATION       │");
        println!("├─────────────────────────────────────────┤");
        println!("│ Store: {}", self.store.root_dir.display());
        println!("│ Bridge: {}", self.bridge.base_url);
        println!("│ Poll Interval: {}s", self.polling.interval_seconds);
        println!("│ Retention: {} min", self.history.retention_minutes);
        println!("│ Log Level: {}", self.logging.level);
        println!("└─────────────────────────────────────────┘");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_file_keeps_defaults() {
        let config: WatchConfig = toml::from_str(
            r#"
            [history]
            retention_minutes = 120

            [bridge]
            base_url = "http://10.0.0.2:28891"
            "#,
        )
        .unwrap();
        assert_eq!(config.history.retention_minutes, 120);
        assert_eq!(config.history.glucose_min_gap_seconds, 270);
        assert_eq!(config.polling.interval_seconds, 5);
        assert_eq!(config.bridge.timeout_ms, 5000);
        assert_eq!(config.history.retention().window_ms, 120 * 60 * 1000);
    }

    #[test]
    fn load_rejects_zero_poll_interval() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("watchface.toml");
        std::fs::write(&path, "[polling]\ninterval_seconds = 0\n").unwrap();
        assert!(WatchConfig::load(&path).is_err());
    }

    #[test]
    fn load_rejects_oversized_durations() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("watchface.toml");
        std::fs::write(&path, "[history]\nretention_minutes = 9223372036854775807\n").unwrap();
        assert!(WatchConfig::load(&path).is_err());
        std::fs::write(&path, "[dialog]\nconfirm_timeout_seconds = 10000000000000000\n").unwrap();
        assert!(WatchConfig::load(&path).is_err());
    }

    #[test]
    fn oversized_durations_are_capped_when_not_validated() {
        let config: WatchConfig = toml::from_str(
            "[history]\nretention_minutes = 9223372036854775807\n[dialog]\nconfirm_timeout_seconds = 9223372036854775807\n",
        )
        .unwrap();
        let window = config.history.retention().window_ms;
        assert_eq!(window, MAX_RETENTION_MINUTES as Timestamp * 60 * 1000);
        assert_eq!(config.dialog.confirm_timeout_ms(), MAX_SECONDS as Timestamp * 1000);
    }

    #[test]
    fn load_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("watchface.toml");
        std::fs::write(&path, "[store]\nroot_dir = \"/tmp/aaps\"\nevent_slots = 3\n").unwrap();
        let config = WatchConfig::load(&path).unwrap();
        assert_eq!(config.store.event_slots, 3);
        assert_eq!(config.store.root_dir, PathBuf::from("/tmp/aaps"));
    }
}
