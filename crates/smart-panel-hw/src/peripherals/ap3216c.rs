//! AP3216C ambient light / proximity / IR sensor.
//!
//! The driver exposes one decimal value per attribute:
//! - `als`: ambient light, 0-65535 ADC counts
//! - `ps`: proximity, 0-1023 (higher is closer)
//! - `ir`: infrared intensity, 0-1023

use crate::{Error, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Default misc device directory.
pub const DEFAULT_AP3216C_PATH: &str = "/sys/class/misc/ap3216c";

/// One sample of all three channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Ap3216cReading {
    pub als: u32,
    pub ps: u32,
    pub ir: u32,
}

/// AP3216C reader.
#[derive(Debug, Clone)]
pub struct Ap3216c {
    base: PathBuf,
}

impl Default for Ap3216c {
    fn default() -> Self {
        Self::new(DEFAULT_AP3216C_PATH)
    }
}

impl Ap3216c {
    /// Creates a reader for the sensor at `base`.
    pub fn new<P: AsRef<Path>>(base: P) -> Self {
        Self {
            base: base.as_ref().to_path_buf(),
        }
    }

    /// Reads all three channels.
    pub fn read(&self) -> Result<Ap3216cReading> {
        let reading = Ap3216cReading {
            als: self.read_channel("als")?,
            ps: self.read_channel("ps")?,
            ir: self.read_channel("ir")?,
        };
        debug!("AP3216C: {:?}", reading);
        Ok(reading)
    }

    fn read_channel(&self, name: &str) -> Result<u32> {
        let path = self.base.join(name);
        let content = fs::read_to_string(&path).map_err(|source| Error::Sysfs {
            path: path.clone(),
            source,
        })?;
        let value = content.trim();
        value.parse().map_err(|_| Error::SensorValue {
            path,
            value: value.to_string(),
        })
    }
}

impl std::fmt::Display for Ap3216cReading {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ALS: {}  PS: {}  IR: {}", self.als, self.ps, self.ir)
    }
}
