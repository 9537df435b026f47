//! Board peripherals exposed through sysfs.
//!
//! Independent of the serial transport: plain attribute reads and writes.

mod ap3216c;
mod sysfs;

pub use ap3216c::{Ap3216c, Ap3216cReading, DEFAULT_AP3216C_PATH};
pub use sysfs::{
    PeripheralPaths, Peripherals, DEFAULT_ALARM_PATH, DEFAULT_BEEP_PATH, DEFAULT_LED_PATH,
};
