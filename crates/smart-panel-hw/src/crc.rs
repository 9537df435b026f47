//! CRC-16/MODBUS checksum.
//!
//! Reflected polynomial 0xA001, initial value 0xFFFF, no final XOR.

/// Initial accumulator value.
const CRC_INIT: u16 = 0xFFFF;

/// Reflected form of polynomial 0x8005.
const CRC_POLY: u16 = 0xA001;

/// Computes the CRC-16/MODBUS checksum of `data`.
pub fn crc16(data: &[u8]) -> u16 {
    let mut crc = CRC_INIT;
    for &byte in data {
        crc ^= byte as u16;
        for _ in 0..8 {
            if crc & 0x0001 != 0 {
                crc = (crc >> 1) ^ CRC_POLY;
            } else {
                crc >>= 1;
            }
        }
    }
    crc
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_value() {
        // Standard catalogue check value for CRC-16/MODBUS
        assert_eq!(crc16(b"123456789"), 0x4B37);
    }

    #[test]
    fn test_empty_input() {
        assert_eq!(crc16(&[]), 0xFFFF);
    }

    #[test]
    fn test_modbus_request() {
        // Read holding registers, slave 1, addr 0, qty 1 -> CRC bytes 84 0A on the wire
        let crc = crc16(&[0x01, 0x03, 0x00, 0x00, 0x00, 0x01]);
        assert_eq!(crc.to_le_bytes(), [0x84, 0x0A]);
    }

    #[test]
    fn test_deterministic() {
        let data = [0x00, 0x04, 0x01, 0x01, 0x01, 0x00];
        assert_eq!(crc16(&data), crc16(&data));
    }
}
