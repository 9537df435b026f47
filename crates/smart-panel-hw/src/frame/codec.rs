//! Command frame encoding and validation.
//!
//! Frame structure:
//! - Header: 0xAA 0xAA
//! - Length (u16, big-endian): command bytes (2) + payload bytes
//! - Command (u16, big-endian)
//! - Payload: 0..=65533 bytes
//! - CRC16/MODBUS (u16, little-endian) over length field, command and payload

use crate::crc::crc16;
use crate::{Error, Result};

/// Fixed frame header.
pub const FRAME_HEADER: [u8; 2] = [0xAA, 0xAA];

/// Header size.
pub const HEADER_SIZE: usize = 2;

/// Length field size.
pub const LENGTH_SIZE: usize = 2;

/// Command field size.
pub const COMMAND_SIZE: usize = 2;

/// CRC trailer size.
pub const CRC_SIZE: usize = 2;

/// Bytes outside the span counted by the length field.
pub const FRAME_OVERHEAD: usize = HEADER_SIZE + LENGTH_SIZE + CRC_SIZE;

/// Smallest valid frame: empty payload.
pub const MIN_FRAME_SIZE: usize = FRAME_OVERHEAD + COMMAND_SIZE;

/// Largest payload whose length still fits the 16-bit length field.
pub const MAX_PAYLOAD_SIZE: usize = u16::MAX as usize - COMMAND_SIZE;

/// Well-known command codes used by the device-control consumers.
pub mod commands {
    /// LED on.
    pub const LED_ON: u16 = 0x0101;
    /// LED off.
    pub const LED_OFF: u16 = 0x0102;
    /// Beeper on.
    pub const BEEP_ON: u16 = 0x0601;
    /// Beeper off.
    pub const BEEP_OFF: u16 = 0x0602;
}

/// A decoded command frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Command code.
    pub command: u16,
    /// Opaque payload bytes.
    pub payload: Vec<u8>,
}

impl Frame {
    /// Creates a frame from a command code and payload.
    pub fn new(command: u16, payload: &[u8]) -> Self {
        Self {
            command,
            payload: payload.to_vec(),
        }
    }

    /// Encodes the frame to wire bytes.
    pub fn encode(&self) -> Result<Vec<u8>> {
        pack_command(self.command, &self.payload)
    }

    /// Validates `buf` as exactly one frame and extracts its fields.
    pub fn decode(buf: &[u8]) -> Result<Self> {
        if buf.len() < MIN_FRAME_SIZE {
            return Err(Error::FrameTooShort(buf.len()));
        }
        if buf[..HEADER_SIZE] != FRAME_HEADER {
            return Err(Error::InvalidHeader(buf[0], buf[1]));
        }

        let declared = u16::from_be_bytes([buf[2], buf[3]]);
        let body_len = declared as usize;
        if body_len < COMMAND_SIZE || body_len + FRAME_OVERHEAD != buf.len() {
            return Err(Error::LengthMismatch {
                declared,
                actual: buf.len(),
            });
        }

        let crc_start = buf.len() - CRC_SIZE;
        let expected = crc16(&buf[HEADER_SIZE..crc_start]);
        let actual = u16::from_le_bytes([buf[crc_start], buf[crc_start + 1]]);
        if expected != actual {
            return Err(Error::CrcMismatch { expected, actual });
        }

        let body = HEADER_SIZE + LENGTH_SIZE;
        Ok(Self {
            command: u16::from_be_bytes([buf[body], buf[body + 1]]),
            payload: buf[body + COMMAND_SIZE..crc_start].to_vec(),
        })
    }
}

/// Builds a complete frame for `command` carrying `payload`.
///
/// Payloads longer than [`MAX_PAYLOAD_SIZE`] are rejected rather than
/// truncated, since the length field cannot describe them.
pub fn pack_command(command: u16, payload: &[u8]) -> Result<Vec<u8>> {
    if payload.len() > MAX_PAYLOAD_SIZE {
        return Err(Error::PayloadTooLarge {
            size: payload.len(),
            max: MAX_PAYLOAD_SIZE,
        });
    }

    let length = (COMMAND_SIZE + payload.len()) as u16;
    let mut packet = Vec::with_capacity(length as usize + FRAME_OVERHEAD);
    packet.extend_from_slice(&FRAME_HEADER);
    packet.extend_from_slice(&length.to_be_bytes());
    packet.extend_from_slice(&command.to_be_bytes());
    packet.extend_from_slice(payload);

    let crc = crc16(&packet[HEADER_SIZE..]);
    packet.extend_from_slice(&crc.to_le_bytes());

    Ok(packet)
}

/// Returns true if `frame` is exactly one well-formed frame with a valid CRC.
pub fn check_crc(frame: &[u8]) -> bool {
    Frame::decode(frame).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_pack_led_on() {
        let packet = pack_command(commands::LED_ON, &[0x01, 0x00]).unwrap();
        let crc = crc16(&[0x00, 0x04, 0x01, 0x01, 0x01, 0x00]);
        assert_eq!(crc, 0x77A0);
        assert_eq!(
            packet,
            vec![0xAA, 0xAA, 0x00, 0x04, 0x01, 0x01, 0x01, 0x00, 0xA0, 0x77]
        );
    }

    #[test]
    fn test_pack_empty_payload() {
        let packet = pack_command(commands::BEEP_ON, &[]).unwrap();
        assert_eq!(packet.len(), MIN_FRAME_SIZE);
        assert_eq!(&packet[..6], &[0xAA, 0xAA, 0x00, 0x02, 0x06, 0x01]);
        assert!(check_crc(&packet));
    }

    #[test]
    fn test_payload_too_large() {
        let payload = vec![0u8; MAX_PAYLOAD_SIZE + 1];
        assert!(matches!(
            pack_command(0x0101, &payload),
            Err(Error::PayloadTooLarge { size, max }) if size == MAX_PAYLOAD_SIZE + 1 && max == MAX_PAYLOAD_SIZE
        ));
    }

    #[test]
    fn test_max_payload_accepted() {
        let payload = vec![0x5A; MAX_PAYLOAD_SIZE];
        let packet = pack_command(0xFFFF, &payload).unwrap();
        assert_eq!(&packet[2..4], &[0xFF, 0xFF]);
        assert!(check_crc(&packet));
    }

    #[test]
    fn test_check_crc_short_buffers() {
        for len in 0..MIN_FRAME_SIZE {
            let buf = vec![0xAA; len];
            assert!(!check_crc(&buf));
        }
        assert!(matches!(
            Frame::decode(&[0xAA, 0xAA, 0x00]),
            Err(Error::FrameTooShort(3))
        ));
    }

    #[test]
    fn test_check_crc_bad_header() {
        let mut packet = pack_command(0x0102, &[0x00]).unwrap();
        packet[0] = 0x55;
        assert!(matches!(
            Frame::decode(&packet),
            Err(Error::InvalidHeader(0x55, 0xAA))
        ));
    }

    #[test]
    fn test_check_crc_length_mismatch() {
        let mut packet = pack_command(0x0601, &[0x01, 0x02]).unwrap();
        packet.push(0x00);
        assert!(matches!(
            Frame::decode(&packet),
            Err(Error::LengthMismatch { declared: 4, .. })
        ));

        // Declared length smaller than the command field
        let mut packet = pack_command(0x0601, &[]).unwrap();
        packet[3] = 0x00;
        assert!(!check_crc(&packet));
    }

    #[test]
    fn test_check_crc_corrupted_trailer() {
        let mut packet = pack_command(0x0602, &[0x10, 0x20]).unwrap();
        let last = packet.len() - 1;
        packet[last] ^= 0xFF;
        assert!(matches!(
            Frame::decode(&packet),
            Err(Error::CrcMismatch { .. })
        ));
    }

    #[test]
    fn test_decode_fields() {
        let packet = Frame::new(0x0601, &[0xDE, 0xAD]).encode().unwrap();
        let frame = Frame::decode(&packet).unwrap();
        assert_eq!(frame.command, 0x0601);
        assert_eq!(frame.payload, vec![0xDE, 0xAD]);
    }

    proptest! {
        #[test]
        fn prop_packed_frames_validate(
            command in any::<u16>(),
            payload in proptest::collection::vec(any::<u8>(), 0..512),
        ) {
            let packet = pack_command(command, &payload).unwrap();
            prop_assert!(check_crc(&packet));

            let declared = u16::from_be_bytes([packet[2], packet[3]]) as usize;
            prop_assert_eq!(declared, payload.len() + COMMAND_SIZE);
            prop_assert_eq!(packet.len(), HEADER_SIZE + LENGTH_SIZE + declared + CRC_SIZE);
        }

        #[test]
        fn prop_single_bit_flip_detected(
            command in any::<u16>(),
            payload in proptest::collection::vec(any::<u8>(), 0..64),
            index in any::<proptest::sample::Index>(),
            bit in 0u8..8,
        ) {
            let mut packet = pack_command(command, &payload).unwrap();
            // Command and payload bytes only
            let start = HEADER_SIZE + LENGTH_SIZE;
            let end = packet.len() - CRC_SIZE;
            let target = start + index.index(end - start);
            packet[target] ^= 1 << bit;
            prop_assert!(!check_crc(&packet));
        }
    }
}
