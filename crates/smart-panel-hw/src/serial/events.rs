//! Notifications published by a port session.

/// Capacity of the event broadcast channel.
///
/// Slow subscribers lag and skip events rather than blocking the link.
pub const EVENT_CAPACITY: usize = 256;

/// Event emitted by a [`PortSession`](super::PortSession).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// Raw bytes from one read.
    DataReceived(Vec<u8>),
    /// Same bytes as `DataReceived`, emitted while hex mode is on.
    DataReceivedHex(Vec<u8>),
    /// Lossy UTF-8 decoding of `DataReceived`, emitted while hex mode is off.
    DataReceivedText(String),
    /// Open failure or runtime fault, with a human-readable description.
    ErrorOccurred(String),
    /// Informational status line.
    StatusMessage(String),
    /// A device was opened.
    PortOpened { device: String },
    /// The open device was closed.
    PortClosed,
    /// Byte count of one completed write.
    BytesSent(u64),
    /// Byte count of one completed read.
    BytesReceived(u64),
    /// Bytes just written, with the hex mode flag at write time.
    DataSent { data: Vec<u8>, hex_mode: bool },
}

/// Formats bytes as space-separated uppercase hex, e.g. `AA AA 00 04`.
pub fn to_hex_string(data: &[u8]) -> String {
    data.iter()
        .map(|b| format!("{:02X}", b))
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_hex_string() {
        assert_eq!(to_hex_string(&[0xAA, 0xAA, 0x00, 0x04]), "AA AA 00 04");
        assert_eq!(to_hex_string(&[]), "");
    }
}
