//! Operating system access for serial devices.
//!
//! [`PortSession`](super::PortSession) talks to the OS only through
//! [`SerialBackend`], so tests can substitute an in-memory link.

use super::config::PortConfig;
use crate::{Error, Result};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_serial::{ClearBuffer, SerialPort, SerialPortBuilderExt, SerialStream};
use tracing::debug;

/// An open, bidirectional serial handle.
pub trait SerialLink: AsyncRead + AsyncWrite + Send + Unpin + 'static {
    /// Discards pending bytes in both the OS input and output buffers.
    fn clear_buffers(&self) -> Result<()>;
}

/// Opens serial devices and lists the ones present.
pub trait SerialBackend: Send + Sync {
    type Link: SerialLink;

    /// Opens `device` and applies every setting in `config`.
    fn open(&self, device: &str, config: &PortConfig) -> Result<Self::Link>;

    /// Names of the serial devices present, in OS order.
    fn available_ports(&self) -> Result<Vec<String>>;
}

/// Backend for the host's real serial devices.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemSerial;

impl SerialLink for SerialStream {
    fn clear_buffers(&self) -> Result<()> {
        SerialPort::clear(self, ClearBuffer::All)?;
        Ok(())
    }
}

impl SerialBackend for SystemSerial {
    type Link = SerialStream;

    fn open(&self, device: &str, config: &PortConfig) -> Result<SerialStream> {
        let parity = config.parity.to_driver()?;
        let stop_bits = config.stop_bits.to_driver()?;

        let mut port = tokio_serial::new(device, config.baud_rate)
            .data_bits(config.data_bits.to_driver())
            .parity(parity)
            .stop_bits(stop_bits)
            .flow_control(config.flow_control.to_driver())
            .open_native_async()
            .map_err(|e| {
                let missing = match &e.kind {
                    tokio_serial::ErrorKind::NoDevice => true,
                    tokio_serial::ErrorKind::Io(kind) => {
                        *kind == std::io::ErrorKind::NotFound
                    }
                    _ => false,
                };
                if missing && !std::path::Path::new(device).exists() {
                    return Error::PortNotFound(device.to_string());
                }
                Error::Serial(e)
            })?;

        port.write_data_terminal_ready(config.dtr)?;
        port.write_request_to_send(config.rts)?;

        debug!("Opened {} at {} (dtr={}, rts={})", device, config, config.dtr, config.rts);
        Ok(port)
    }

    fn available_ports(&self) -> Result<Vec<String>> {
        let ports = tokio_serial::available_ports()?;
        Ok(ports.into_iter().map(|info| info.port_name).collect())
    }
}

/// Lists the serial devices present on the host.
///
/// An empty list is a normal result, not an error.
pub fn available_ports() -> Result<Vec<String>> {
    SystemSerial.available_ports()
}

#[cfg(test)]
mod tests {
    use super::*;

    // Hardware tests are skipped by default
    #[test]
    #[ignore]
    fn test_enumerate_host_ports() {
        assert!(available_ports().is_ok());
    }

    #[tokio::test]
    async fn test_open_missing_device() {
        let result = SystemSerial.open("/dev/does-not-exist-smart-panel", &PortConfig::default());
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_open_unsupported_parity() {
        let config = PortConfig {
            parity: crate::serial::Parity::Space,
            ..PortConfig::default()
        };
        assert!(matches!(
            SystemSerial.open("/dev/null", &config),
            Err(Error::Unsupported(_))
        ));
    }
}
