use crate::domain::command::{AckFormat, CommandAlias, CommandTable};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogSettings {
    #[serde(default = "default_level")]
    pub level: String, // "trace", "debug", "info", "warn", "error"
    #[serde(default = "default_true")]
    pub file_logging_enabled: bool,
    #[serde(default = "default_true")]
    pub console_logging_enabled: bool,
    #[serde(default = "default_log_dir")]
    pub log_dir: String,
    #[serde(default = "default_prefix")]
    pub file_name_prefix: String,
    #[serde(default = "default_true")]
    pub show_file_line: bool,
    #[serde(default = "default_false")]
    pub show_thread_ids: bool,
    #[serde(default = "default_true")]
    pub show_target: bool,
    #[serde(default = "default_true")]
    pub ansi_colors: bool,
    #[serde(default = "default_rotation")]
    pub rotation: String, // "daily", "hourly", "minutely", "never"
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            level: default_level(),
            file_logging_enabled: default_true(),
            console_logging_enabled: default_true(),
            log_dir: default_log_dir(),
            file_name_prefix: default_prefix(),
            show_file_line: default_true(),
            show_thread_ids: default_false(),
            show_target: default_true(),
            ansi_colors: default_true(),
            rotation: default_rotation(),
        }
    }
}

/// Serial link to the Arduino.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SerialSettings {
    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,
    #[serde(default = "default_read_timeout_ms")]
    pub read_timeout_ms: u64,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    #[serde(default)]
    pub last_port: Option<String>,
    /// Consecutive read errors tolerated before listening stops.
    /// `None` keeps retrying forever.
    #[serde(default = "default_max_consecutive_errors")]
    pub max_consecutive_errors: Option<u32>,
    /// Decouple reading from BLE writes through a FIFO queue.
    #[serde(default = "default_false")]
    pub dispatch_queue: bool,
}

impl Default for SerialSettings {
    fn default() -> Self {
        Self {
            baud_rate: default_baud_rate(),
            read_timeout_ms: default_read_timeout_ms(),
            poll_interval_ms: default_poll_interval_ms(),
            last_port: None,
            max_consecutive_errors: default_max_consecutive_errors(),
            dispatch_queue: false,
        }
    }
}

impl SerialSettings {
    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

/// Arduino text protocol.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProtocolSettings {
    #[serde(default = "default_true")]
    pub case_insensitive: bool,
    #[serde(default)]
    pub ack_format: AckFormat,
    #[serde(default)]
    pub aliases: Vec<CommandAlias>,
}

impl Default for ProtocolSettings {
    fn default() -> Self {
        Self {
            case_insensitive: true,
            ack_format: AckFormat::default(),
            aliases: Vec::new(),
        }
    }
}

impl ProtocolSettings {
    pub fn command_table(&self) -> CommandTable {
        CommandTable::standard()
            .with_case_insensitive(self.case_insensitive)
            .with_aliases(&self.aliases)
    }
}

/// LED controller over BLE.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BleSettings {
    /// Only devices whose name starts with this are listed. Empty shows all.
    #[serde(default = "default_name_prefix")]
    pub name_prefix: String,
    #[serde(default = "default_scan_timeout_secs")]
    pub scan_timeout_secs: u64,
    #[serde(default = "default_write_char_uuid")]
    pub write_char_uuid: String,
    #[serde(default = "default_mode_speed")]
    pub mode_speed: u8,
}

impl Default for BleSettings {
    fn default() -> Self {
        Self {
            name_prefix: default_name_prefix(),
            scan_timeout_secs: default_scan_timeout_secs(),
            write_char_uuid: default_write_char_uuid(),
            mode_speed: default_mode_speed(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub serial: SerialSettings,
    #[serde(default)]
    pub protocol: ProtocolSettings,
    #[serde(default)]
    pub ble: BleSettings,

    // Logging Settings
    #[serde(default)]
    pub log_settings: LogSettings,
}

fn default_level() -> String {
    "info".to_string()
}
fn default_true() -> bool {
    true
}
fn default_false() -> bool {
    false
}
fn default_log_dir() -> String {
    "logs".to_string()
}
fn default_prefix() -> String {
    "arduino_led_bridge".to_string()
}
fn default_rotation() -> String {
    "daily".to_string()
}
fn default_baud_rate() -> u32 {
    9600
}
fn default_read_timeout_ms() -> u64 {
    100
}
fn default_poll_interval_ms() -> u64 {
    100
}
fn default_max_consecutive_errors() -> Option<u32> {
    Some(10)
}
fn default_name_prefix() -> String {
    "QHM".to_string()
}
fn default_scan_timeout_secs() -> u64 {
    8
}
fn default_write_char_uuid() -> String {
    crate::infrastructure::bluetooth::protocol::WRITE_CHAR_UUID.to_string()
}
fn default_mode_speed() -> u8 {
    0x10
}

pub struct SettingsService {
    settings: Settings,
    settings_path: PathBuf,
}

impl SettingsService {
    pub fn new() -> anyhow::Result<Self> {
        let settings_path = Self::get_settings_path()?;
        let settings = Self::load_from_file(&settings_path).unwrap_or_default();

        Ok(Self {
            settings,
            settings_path,
        })
    }

    #[cfg(test)]
    pub fn with_path(settings: Settings, settings_path: PathBuf) -> Self {
        Self {
            settings,
            settings_path,
        }
    }

    fn get_settings_path() -> anyhow::Result<PathBuf> {
        let mut path = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?;
        path.push("ArduinoLedBridge");
        fs::create_dir_all(&path)?;
        path.push("settings.json");
        Ok(path)
    }

    fn load_from_file(path: &PathBuf) -> anyhow::Result<Settings> {
        let contents = fs::read_to_string(path)?;
        let settings = serde_json::from_str(&contents)?;
        Ok(settings)
    }

    pub fn save(&self) -> anyhow::Result<()> {
        let json = serde_json::to_string_pretty(&self.settings)?;
        fs::write(&self.settings_path, json)?;
        Ok(())
    }

    pub fn get(&self) -> &Settings {
        &self.settings
    }

    pub fn get_mut(&mut self) -> &mut Settings {
        &mut self.settings
    }

    pub fn remember_port(&mut self, port: &str) -> anyhow::Result<()> {
        if self.settings.serial.last_port.as_deref() != Some(port) {
            self.settings.serial.last_port = Some(port.to_string());
            self.save()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_fill_missing_fields() {
        let settings: Settings =
            serde_json::from_str(r#"{ "serial": { "baud_rate": 115200 } }"#).unwrap();
        assert_eq!(settings.serial.baud_rate, 115200);
        assert_eq!(settings.serial.poll_interval_ms, 100);
        assert_eq!(settings.serial.max_consecutive_errors, Some(10));
        assert_eq!(settings.protocol.ack_format, AckFormat::Long);
        assert!(settings.protocol.case_insensitive);
        assert_eq!(settings.ble.name_prefix, "QHM");
    }

    #[test]
    fn test_protocol_settings_build_table() {
        let settings: ProtocolSettings = serde_json::from_str(
            r#"{
                "case_insensitive": false,
                "ack_format": "short",
                "aliases": [{ "pattern": "GO", "action": "power_on" }]
            }"#,
        )
        .unwrap();
        assert_eq!(settings.ack_format, AckFormat::Short);

        let table = settings.command_table();
        assert!(!table.is_case_insensitive());
        assert_eq!(
            table.parse("GO").unwrap(),
            crate::domain::command::Command::Power(crate::domain::led::PowerState::On)
        );
    }

    #[test]
    fn test_retry_forever_round_trips_as_null() {
        let mut settings = Settings::default();
        settings.serial.max_consecutive_errors = None;
        let json = serde_json::to_string(&settings).unwrap();
        let back: Settings = serde_json::from_str(&json).unwrap();
        assert_eq!(back.serial.max_consecutive_errors, None);
    }
}
