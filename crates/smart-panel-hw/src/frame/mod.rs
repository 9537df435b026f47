//! Command frame protocol.
//!
//! Length-prefixed binary frames with a CRC16/MODBUS trailer, exchanged with
//! the board's peer controller over the serial line.

mod codec;
mod decoder;

pub use codec::{
    check_crc, commands, pack_command, Frame, COMMAND_SIZE, CRC_SIZE, FRAME_HEADER,
    FRAME_OVERHEAD, HEADER_SIZE, LENGTH_SIZE, MAX_PAYLOAD_SIZE, MIN_FRAME_SIZE,
};
pub use decoder::FrameDecoder;
