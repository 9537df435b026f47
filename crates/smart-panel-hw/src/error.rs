//! Error types for the smart panel hardware library.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur when talking to the board.
#[derive(Error, Debug)]
pub enum Error {
    /// Serial device not present on the host.
    #[error("Serial device not found: {0}")]
    PortNotFound(String),

    /// Serial port communication error.
    #[error("Serial port error: {0}")]
    Serial(#[from] tokio_serial::Error),

    /// Serial I/O error.
    #[error("Serial I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The link task has stopped after a runtime fault.
    #[error("Serial link is down")]
    LinkDown,

    /// `reconnect` called on a session that was never opened.
    #[error("No device has been opened on this session")]
    NotConfigured,

    /// Payload does not fit the 16-bit length field.
    #[error("Payload too large ({size} bytes, max {max})")]
    PayloadTooLarge { size: usize, max: usize },

    /// Buffer is shorter than the smallest possible frame.
    #[error("Frame too short ({0} bytes)")]
    FrameTooShort(usize),

    /// Frame does not start with 0xAA 0xAA.
    #[error("Invalid frame header: {0:02X} {1:02X}")]
    InvalidHeader(u8, u8),

    /// Declared length does not match the buffer size.
    #[error("Frame length mismatch: declared {declared}, buffer {actual} bytes")]
    LengthMismatch { declared: u16, actual: usize },

    /// CRC16 over the frame body does not match the trailer.
    #[error("CRC mismatch: expected {expected:04X}, got {actual:04X}")]
    CrcMismatch { expected: u16, actual: u16 },

    /// Unparseable port setting.
    #[error("Invalid {field}: {value}")]
    InvalidConfig { field: &'static str, value: String },

    /// Setting the serial driver cannot express.
    #[error("Unsupported setting: {0}")]
    Unsupported(String),

    /// sysfs attribute could not be read or written.
    #[error("Sysfs access failed for {path}: {source}")]
    Sysfs {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Sensor attribute held something other than a number.
    #[error("Invalid sensor value in {path}: {value:?}")]
    SensorValue { path: PathBuf, value: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        assert_eq!(Error::LinkDown.to_string(), "Serial link is down");
        assert_eq!(
            Error::PayloadTooLarge {
                size: 70000,
                max: 65533
            }
            .to_string(),
            "Payload too large (70000 bytes, max 65533)"
        );
        assert_eq!(
            Error::CrcMismatch {
                expected: 0x77A0,
                actual: 0x0000
            }
            .to_string(),
            "CRC mismatch: expected 77A0, got 0000"
        );
    }
}
