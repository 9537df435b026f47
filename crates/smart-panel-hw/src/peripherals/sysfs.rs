//! LED, beeper and alarm control through sysfs attributes.

use crate::{Error, Result};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

/// Default LED class directory.
pub const DEFAULT_LED_PATH: &str = "/sys/class/leds/sys-led";

/// Default beeper class directory.
pub const DEFAULT_BEEP_PATH: &str = "/sys/class/leds/beep";

/// Default alarm class directory.
pub const DEFAULT_ALARM_PATH: &str = "/sys/class/alarm/alarm0";

/// sysfs directories of the board peripherals.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeripheralPaths {
    pub led: PathBuf,
    pub beep: PathBuf,
    pub alarm: PathBuf,
}

impl Default for PeripheralPaths {
    fn default() -> Self {
        Self {
            led: PathBuf::from(DEFAULT_LED_PATH),
            beep: PathBuf::from(DEFAULT_BEEP_PATH),
            alarm: PathBuf::from(DEFAULT_ALARM_PATH),
        }
    }
}

/// Board peripheral controller.
#[derive(Debug, Clone, Default)]
pub struct Peripherals {
    paths: PeripheralPaths,
}

impl Peripherals {
    /// Creates a controller for the given sysfs directories.
    pub fn new(paths: PeripheralPaths) -> Self {
        Self { paths }
    }

    /// Sets the LED trigger, e.g. "none" for manual control or "heartbeat".
    pub fn set_led_trigger(&self, mode: &str) -> Result<()> {
        write_attr(&self.paths.led.join("trigger"), mode)?;
        info!("LED trigger set to {}", mode);
        Ok(())
    }

    /// Turns the LED on.
    pub fn led_on(&self) -> Result<()> {
        write_attr(&self.paths.led.join("brightness"), "1")
    }

    /// Turns the LED off.
    pub fn led_off(&self) -> Result<()> {
        write_attr(&self.paths.led.join("brightness"), "0")
    }

    /// Starts the beeper.
    pub fn beep_on(&self) -> Result<()> {
        write_attr(&self.paths.beep.join("brightness"), "1")
    }

    /// Stops the beeper.
    pub fn beep_off(&self) -> Result<()> {
        write_attr(&self.paths.beep.join("brightness"), "0")
    }

    /// Enables the alarm device.
    pub fn alarm_on(&self) -> Result<()> {
        write_attr(&self.paths.alarm.join("enable"), "1")
    }

    /// Disables the alarm device.
    pub fn alarm_off(&self) -> Result<()> {
        write_attr(&self.paths.alarm.join("enable"), "0")
    }

    /// Beeps `times` times, switching state every `interval`.
    ///
    /// The beeper is always left off on return. If the future is dropped
    /// early the caller must call [`beep_off`](Self::beep_off).
    pub async fn sound_alarm(&self, times: u32, interval: Duration) -> Result<()> {
        if times == 0 {
            return Ok(());
        }

        info!("Sounding alarm: {} beeps every {:?}", times, interval);
        for toggle in 0..times.saturating_mul(2) {
            tokio::time::sleep(interval).await;
            if toggle % 2 == 0 {
                self.beep_on()?;
            } else {
                self.beep_off()?;
            }
        }

        self.beep_off()?;
        info!("Alarm finished");
        Ok(())
    }

    /// Switches every peripheral off.
    pub fn all_off(&self) -> Result<()> {
        self.led_off()?;
        self.alarm_off()?;
        self.beep_off()
    }
}

fn write_attr(path: &Path, value: &str) -> Result<()> {
    debug!("Writing {:?} to {}", value, path.display());
    fs::write(path, value).map_err(|source| Error::Sysfs {
        path: path.to_path_buf(),
        source,
    })
}
