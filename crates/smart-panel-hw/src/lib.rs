//! Smart Panel Hardware Library
//!
//! Serial command transport and board peripheral access for the embedded
//! touchscreen control panel: CRC16-checked command frames over a UART,
//! sysfs LED/beeper/alarm control and AP3216C sensor readout.

pub mod crc;
pub mod error;
pub mod frame;
pub mod peripherals;
pub mod serial;

pub use crc::crc16;
pub use error::{Error, Result};
pub use frame::{check_crc, pack_command, Frame, FrameDecoder};
pub use peripherals::{Ap3216c, Ap3216cReading, PeripheralPaths, Peripherals};
pub use serial::{available_ports, PortConfig, PortSession, TransportEvent};
