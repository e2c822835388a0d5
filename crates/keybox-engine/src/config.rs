//! Device configuration.
//!
//! Loaded once at startup from a TOML file. Every section has production
//! defaults, so a file only needs the values that differ per device:
//!
//! ```toml
//! [device]
//! serial = "SK-0042"
//! compartments = 16
//! large_compartments = [5]
//!
//! [access]
//! maintenance_prefix = "480193"
//!
//! [backend]
//! url = "https://backend.example/api/v1/keybox"
//! device_id = "sk-0042"
//! api_key = "..."
//! ```
//!
//! A configuration that fails [`KeyboxConfig::validate`] is the one fault the
//! device refuses to start with.

use keybox_core::constants::{
    COMMAND_POLL_TIMEOUT_MS, DEFAULT_BACKEND_TIMEOUT_MS, FAST_TIER_ITERATIONS,
    LARGE_COMPARTMENT_ROW_OFFSET, LOOP_PERIOD_MS, MAINTENANCE_PREFIX_LENGTH, MAX_COMPARTMENT_ID,
    REJECT_NOTICE_MS, SLOTS_PER_ROW, WATCHDOG_TIMEOUT_SECS,
};
use keybox_core::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Complete device configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KeyboxConfig {
    pub device: DeviceConfig,
    pub access: AccessConfig,
    pub backend: BackendConfig,
    pub commands: CommandsConfig,
    pub logging: LoggingConfig,
    pub watchdog: WatchdogConfig,
}

/// Identity and physical layout of the locker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    pub serial: String,
    pub hardware_revision: String,

    /// Number of compartments the locker is built with.
    pub compartments: usize,

    /// Slot positions where a large compartment starts.
    pub large_compartments: Vec<usize>,

    /// Ask the user about content after each opening.
    pub content_tracking: bool,

    /// Initial state of the tamper alarm flag.
    pub tamper_alarm: bool,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            serial: "unknown".to_string(),
            hardware_revision: "1".to_string(),
            compartments: SLOTS_PER_ROW,
            large_compartments: Vec::new(),
            content_tracking: true,
            tamper_alarm: false,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AccessConfig {
    /// Secret six-digit part of every maintenance code.
    pub maintenance_prefix: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    pub url: String,
    pub device_id: String,
    pub api_key: String,

    /// Per-call timeout in milliseconds.
    pub timeout_ms: u64,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            device_id: String::new(),
            api_key: String::new(),
            timeout_ms: DEFAULT_BACKEND_TIMEOUT_MS,
        }
    }
}

impl BackendConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CommandsConfig {
    /// `host:port` of the command broker. No channel when unset.
    pub broker: Option<String>,

    pub poll_timeout_ms: u64,
}

impl Default for CommandsConfig {
    fn default() -> Self {
        Self {
            broker: None,
            poll_timeout_ms: COMMAND_POLL_TIMEOUT_MS,
        }
    }
}

impl CommandsConfig {
    pub fn poll_timeout(&self) -> Duration {
        Duration::from_millis(self.poll_timeout_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive, e.g. `info` or `keybox_engine=debug,info`.
    pub level: String,

    /// Directory for per-boot log files.
    pub directory: PathBuf,

    /// Log files kept; older ones are deleted at startup.
    pub max_files: usize,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            directory: PathBuf::from("logs"),
            max_files: 30,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WatchdogConfig {
    pub timeout_secs: u64,
}

impl Default for WatchdogConfig {
    fn default() -> Self {
        Self {
            timeout_secs: WATCHDOG_TIMEOUT_SECS,
        }
    }
}

impl WatchdogConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl KeyboxConfig {
    /// Read and validate a configuration file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, is not valid TOML for
    /// this schema, or fails validation.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)?;
        let config = Self::from_toml(&contents)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;
        Ok(config)
    }

    /// Parse and validate configuration text.
    ///
    /// # Errors
    ///
    /// Returns an error if the text does not parse or fails validation.
    pub fn from_toml(text: &str) -> Result<Self> {
        let config: KeyboxConfig =
            toml::from_str(text).map_err(|e| Error::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Check every value the device depends on.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] naming the first offending value.
    pub fn validate(&self) -> Result<()> {
        let prefix = &self.access.maintenance_prefix;
        if prefix.len() != MAINTENANCE_PREFIX_LENGTH || !prefix.bytes().all(|b| b.is_ascii_digit())
        {
            return Err(Error::Config(format!(
                "access.maintenance_prefix must be exactly {MAINTENANCE_PREFIX_LENGTH} digits"
            )));
        }

        let count = self.device.compartments;
        if count == 0 || count > usize::from(MAX_COMPARTMENT_ID) {
            return Err(Error::Config(format!(
                "device.compartments must be 1-{MAX_COMPARTMENT_ID}, got {count}"
            )));
        }

        let mut claimed: Vec<usize> = Vec::new();
        for &start in &self.device.large_compartments {
            if start == 0 {
                return Err(Error::Config(
                    "device.large_compartments positions start at 1".to_string(),
                ));
            }
            if start % SLOTS_PER_ROW == 0 {
                return Err(Error::Config(format!(
                    "large compartment at {start} has no neighbour on its row"
                )));
            }
            for position in large_compartment_span(start) {
                if claimed.contains(&position) {
                    return Err(Error::Config(format!(
                        "large compartment at {start} overlaps slot {position}"
                    )));
                }
                claimed.push(position);
            }
        }

        if self.backend.url.is_empty() || self.backend.device_id.is_empty() {
            return Err(Error::MissingConfig(
                "backend.url and backend.device_id".to_string(),
            ));
        }
        if self.backend.timeout_ms == 0 {
            return Err(Error::Config("backend.timeout_ms must be positive".to_string()));
        }

        let budget = self.watchdog_budget();
        if self.watchdog.timeout() <= budget {
            return Err(Error::Config(format!(
                "watchdog.timeout_secs must exceed {}ms for backend.timeout_ms = {}",
                budget.as_millis(),
                self.backend.timeout_ms
            )));
        }

        Ok(())
    }

    /// Longest stretch the loop can go without feeding the watchdog.
    ///
    /// A rejected code runs the reject notice and the audit push back to
    /// back; the fast tier may then be a full period away, and a keepalive
    /// or error drain can share that period.
    pub fn watchdog_budget(&self) -> Duration {
        2 * self.backend.timeout()
            + Duration::from_millis(REJECT_NOTICE_MS)
            + Duration::from_millis(FAST_TIER_ITERATIONS * LOOP_PERIOD_MS)
    }

    pub fn with_serial(mut self, serial: impl Into<String>) -> Self {
        self.device.serial = serial.into();
        self
    }

    pub fn with_compartments(mut self, count: usize) -> Self {
        self.device.compartments = count;
        self
    }

    pub fn with_large_compartments(mut self, positions: Vec<usize>) -> Self {
        self.device.large_compartments = positions;
        self
    }

    pub fn with_maintenance_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.access.maintenance_prefix = prefix.into();
        self
    }

    pub fn with_content_tracking(mut self, enabled: bool) -> Self {
        self.device.content_tracking = enabled;
        self
    }

    pub fn with_backend(mut self, url: impl Into<String>, device_id: impl Into<String>) -> Self {
        self.backend.url = url.into();
        self.backend.device_id = device_id.into();
        self
    }
}

/// Slot positions covered by a large compartment starting at `start`:
/// the slot, its right neighbour, and the two slots below them.
pub fn large_compartment_span(start: usize) -> [usize; 4] {
    [
        start,
        start + 1,
        start + LARGE_COMPARTMENT_ROW_OFFSET,
        start + LARGE_COMPARTMENT_ROW_OFFSET + 1,
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn valid() -> KeyboxConfig {
        KeyboxConfig::default()
            .with_maintenance_prefix("000001")
            .with_backend("https://backend.example", "box-1")
    }

    #[test]
    fn test_defaults_need_secrets() {
        assert!(KeyboxConfig::default().validate().is_err());
        assert!(valid().validate().is_ok());
    }

    #[rstest]
    #[case("")]
    #[case("12345")]
    #[case("1234567")]
    #[case("12a456")]
    fn test_rejects_bad_prefix(#[case] prefix: &str) {
        let config = valid().with_maintenance_prefix(prefix);
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[rstest]
    #[case(vec![8])]
    #[case(vec![0])]
    #[case(vec![1, 2])]
    #[case(vec![1, 9])]
    fn test_rejects_bad_large_layout(#[case] positions: Vec<usize>) {
        let config = valid().with_large_compartments(positions);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_accepts_several_large_compartments() {
        let config = valid().with_large_compartments(vec![1, 5, 17]);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_rejects_compartment_count() {
        assert!(valid().with_compartments(0).validate().is_err());
        assert!(valid().with_compartments(99).validate().is_err());
    }

    #[rstest]
    #[case(5_000, true)]
    #[case(10_000, true)]
    #[case(12_000, false)]
    #[case(14_000, false)]
    fn test_watchdog_covers_backend_calls(#[case] backend_ms: u64, #[case] accepted: bool) {
        let mut config = valid();
        config.backend.timeout_ms = backend_ms;
        config.watchdog.timeout_secs = 30;

        assert_eq!(config.validate().is_ok(), accepted);
    }

    #[test]
    fn test_span() {
        assert_eq!(large_compartment_span(5), [5, 6, 13, 14]);
    }

    #[test]
    fn test_parse_partial_file() {
        let config = KeyboxConfig::from_toml(
            r#"
            [device]
            serial = "SK-0042"
            compartments = 14
            large_compartments = [5]

            [access]
            maintenance_prefix = "480193"

            [backend]
            url = "https://backend.example/api"
            device_id = "sk-0042"
            api_key = "k"
            "#,
        )
        .unwrap();

        assert_eq!(config.device.serial, "SK-0042");
        assert_eq!(config.device.compartments, 14);
        assert!(config.device.content_tracking);
        assert_eq!(config.backend.timeout(), Duration::from_secs(5));
        assert_eq!(config.logging.level, "info");
        assert!(config.commands.broker.is_none());
    }

    #[test]
    fn test_parse_rejects_unknown_shape() {
        let result = KeyboxConfig::from_toml("[device]\ncompartments = \"many\"\n");
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("keybox.toml");
        std::fs::write(
            &path,
            "[access]\nmaintenance_prefix = \"000001\"\n[backend]\nurl = \"http://b\"\ndevice_id = \"d\"\n",
        )
        .unwrap();

        let config = KeyboxConfig::from_file(&path).unwrap();
        assert_eq!(config.access.maintenance_prefix, "000001");

        assert!(KeyboxConfig::from_file(dir.path().join("missing.toml")).is_err());
    }

    #[test]
    fn test_example_file_is_valid() {
        let config = KeyboxConfig::from_toml(include_str!("../../../keybox.example.toml")).unwrap();
        assert_eq!(config.device.compartments, 16);
        assert_eq!(config.device.large_compartments, vec![5]);
        assert_eq!(config.logging.max_files, 30);
    }
}
