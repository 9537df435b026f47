//! Serial port transport.
//!
//! Owns the UART link to the board's peer controller and publishes
//! everything that happens on it as events.

mod backend;
mod config;
mod events;
mod session;

pub use backend::{available_ports, SerialBackend, SerialLink, SystemSerial};
pub use config::{DataBits, FlowControl, Parity, PortConfig, StopBits, DEFAULT_BAUD_RATE};
pub use events::{to_hex_string, TransportEvent, EVENT_CAPACITY};
pub use session::PortSession;
