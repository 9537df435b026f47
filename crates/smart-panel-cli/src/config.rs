//! Configuration management.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use smart_panel_hw::peripherals::{
    DEFAULT_ALARM_PATH, DEFAULT_AP3216C_PATH, DEFAULT_BEEP_PATH, DEFAULT_LED_PATH,
};
use smart_panel_hw::{PeripheralPaths, PortConfig};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Main configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Serial link configuration
    #[serde(default)]
    pub serial: SerialConfig,

    /// Peripheral sysfs paths
    #[serde(default)]
    pub peripherals: PeripheralConfig,
}

/// Serial link configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SerialConfig {
    /// Serial device path
    #[serde(default = "default_device")]
    pub device: String,

    /// Baud rate
    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,

    /// Data bits (5-8)
    #[serde(default = "default_data_bits")]
    pub data_bits: u8,

    /// Parity: none, even, odd, mark, space
    #[serde(default = "default_none")]
    pub parity: String,

    /// Stop bits: 1, 1.5, 2
    #[serde(default = "default_stop_bits")]
    pub stop_bits: String,

    /// Flow control: none, hardware, software
    #[serde(default = "default_none")]
    pub flow_control: String,

    /// Assert DTR after opening
    #[serde(default)]
    pub dtr: bool,

    /// Assert RTS after opening
    #[serde(default)]
    pub rts: bool,

    /// Show received data as hex instead of text
    #[serde(default)]
    pub hex_mode: bool,
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            device: default_device(),
            baud_rate: default_baud_rate(),
            data_bits: default_data_bits(),
            parity: default_none(),
            stop_bits: default_stop_bits(),
            flow_control: default_none(),
            dtr: false,
            rts: false,
            hex_mode: false,
        }
    }
}

/// Peripheral sysfs paths.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PeripheralConfig {
    #[serde(default = "default_led_path")]
    pub led: String,

    #[serde(default = "default_beep_path")]
    pub beep: String,

    #[serde(default = "default_alarm_path")]
    pub alarm: String,

    /// AP3216C sensor directory
    #[serde(default = "default_ap3216c_path")]
    pub ap3216c: String,
}

impl Default for PeripheralConfig {
    fn default() -> Self {
        Self {
            led: default_led_path(),
            beep: default_beep_path(),
            alarm: default_alarm_path(),
            ap3216c: default_ap3216c_path(),
        }
    }
}

// Default value functions
fn default_device() -> String {
    "/dev/ttymxc2".to_string()
}

fn default_baud_rate() -> u32 {
    smart_panel_hw::serial::DEFAULT_BAUD_RATE
}

fn default_data_bits() -> u8 {
    8
}

fn default_none() -> String {
    "none".to_string()
}

fn default_stop_bits() -> String {
    "1".to_string()
}

fn default_led_path() -> String {
    DEFAULT_LED_PATH.to_string()
}

fn default_beep_path() -> String {
    DEFAULT_BEEP_PATH.to_string()
}

fn default_alarm_path() -> String {
    DEFAULT_ALARM_PATH.to_string()
}

fn default_ap3216c_path() -> String {
    DEFAULT_AP3216C_PATH.to_string()
}

impl SerialConfig {
    /// Builds the port configuration, validating every setting.
    pub fn port_config(&self) -> Result<PortConfig> {
        Ok(PortConfig {
            baud_rate: self.baud_rate,
            data_bits: smart_panel_hw::serial::DataBits::from_count(self.data_bits)?,
            parity: self.parity.parse()?,
            stop_bits: self.stop_bits.parse()?,
            flow_control: self.flow_control.parse()?,
            dtr: self.dtr,
            rts: self.rts,
        })
    }
}

impl PeripheralConfig {
    /// Returns the LED/beeper/alarm directories.
    pub fn paths(&self) -> PeripheralPaths {
        PeripheralPaths {
            led: PathBuf::from(&self.led),
            beep: PathBuf::from(&self.beep),
            alarm: PathBuf::from(&self.alarm),
        }
    }
}

impl Config {
    /// Loads configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content =
            std::fs::read_to_string(path.as_ref()).context("Failed to read configuration file")?;
        let config: Config = toml::from_str(&content).context("Failed to parse configuration")?;
        Ok(config)
    }

    /// Loads configuration, falling back to defaults if the file does not exist.
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self> {
        if path.as_ref().exists() {
            Self::load(path)
        } else {
            debug!(
                "No configuration at {}, using defaults",
                path.as_ref().display()
            );
            Ok(Self::default())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use smart_panel_hw::serial::{FlowControl, Parity, StopBits};

    #[test]
    fn test_defaults_from_empty_file() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.serial.device, "/dev/ttymxc2");
        assert_eq!(config.serial.port_config().unwrap(), PortConfig::default());
        assert_eq!(config.peripherals.paths(), PeripheralPaths::default());
    }

    #[test]
    fn test_parse_serial_section() {
        let config: Config = toml::from_str(
            r#"
            [serial]
            device = "/dev/ttyUSB0"
            baud_rate = 9600
            parity = "even"
            stop_bits = "2"
            flow_control = "hardware"
            dtr = true
            "#,
        )
        .unwrap();

        let port = config.serial.port_config().unwrap();
        assert_eq!(config.serial.device, "/dev/ttyUSB0");
        assert_eq!(port.baud_rate, 9600);
        assert_eq!(port.parity, Parity::Even);
        assert_eq!(port.stop_bits, StopBits::Two);
        assert_eq!(port.flow_control, FlowControl::Hardware);
        assert!(port.dtr);
        assert!(!port.rts);
    }

    #[test]
    fn test_invalid_setting() {
        let config: Config = toml::from_str("[serial]\ndata_bits = 9\n").unwrap();
        assert!(config.serial.port_config().is_err());
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let config = Config::load_or_default("/nonexistent/smart-panel/config.toml").unwrap();
        assert_eq!(config.serial.baud_rate, 115_200);
    }
}
