//! Reassembles frames from a received byte stream.
//!
//! Serial reads arrive in arbitrary chunks, so a frame may be split across
//! several reads or several frames may share one. The decoder buffers bytes,
//! hunts for the 0xAA 0xAA header and yields each complete frame once its
//! declared length has arrived.

use super::codec::{
    Frame, COMMAND_SIZE, FRAME_HEADER, FRAME_OVERHEAD, HEADER_SIZE, LENGTH_SIZE,
    MAX_PAYLOAD_SIZE, MIN_FRAME_SIZE,
};
use crate::{Error, Result};
use tracing::debug;

/// Streaming frame decoder.
#[derive(Debug, Clone)]
pub struct FrameDecoder {
    buffer: Vec<u8>,
    max_payload: usize,
}

impl Default for FrameDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameDecoder {
    /// Creates a decoder accepting any payload the length field can describe.
    pub fn new() -> Self {
        Self::with_max_payload(MAX_PAYLOAD_SIZE)
    }

    /// Creates a decoder that rejects declared payloads above `max_payload`.
    pub fn with_max_payload(max_payload: usize) -> Self {
        Self {
            buffer: Vec::new(),
            max_payload: max_payload.min(MAX_PAYLOAD_SIZE),
        }
    }

    /// Appends received bytes.
    pub fn push(&mut self, bytes: &[u8]) {
        self.buffer.extend_from_slice(bytes);
    }

    /// Number of bytes waiting for a complete frame.
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Drops all buffered bytes.
    pub fn reset(&mut self) {
        self.buffer.clear();
    }

    /// Returns the next frame, an error for a rejected candidate, or `None`
    /// when more bytes are needed.
    ///
    /// After an error the decoder skips one byte and resumes the header hunt,
    /// so callers should keep calling until `None`.
    pub fn next_frame(&mut self) -> Option<Result<Frame>> {
        let header_at = self.buffer.windows(HEADER_SIZE).position(|w| w == FRAME_HEADER);
        match header_at {
            Some(0) => {}
            Some(start) => {
                debug!("Discarding {} bytes before frame header", start);
                self.buffer.drain(..start);
            }
            None => {
                // Keep a trailing 0xAA, it may be the first half of a header
                let keep = usize::from(self.buffer.last() == Some(&FRAME_HEADER[0]));
                let discard = self.buffer.len() - keep;
                self.buffer.drain(..discard);
                return None;
            }
        }

        if self.buffer.len() < HEADER_SIZE + LENGTH_SIZE {
            return None;
        }

        let declared = u16::from_be_bytes([self.buffer[2], self.buffer[3]]);
        let body_len = declared as usize;
        if body_len < COMMAND_SIZE || body_len - COMMAND_SIZE > self.max_payload {
            let actual = self.buffer.len();
            self.buffer.drain(..1);
            return Some(Err(Error::LengthMismatch { declared, actual }));
        }

        let total = body_len + FRAME_OVERHEAD;
        if self.buffer.len() < total {
            // A complete frame behind an unfinished candidate means the
            // candidate was a false header
            let start = self.complete_frame_after_start()?;
            debug!(
                "Abandoning candidate declaring {} bytes, frame found at offset {}",
                declared, start
            );
            let actual = self.buffer.len();
            self.buffer.drain(..start);
            return Some(Err(Error::LengthMismatch { declared, actual }));
        }

        match Frame::decode(&self.buffer[..total]) {
            Ok(frame) => {
                self.buffer.drain(..total);
                Some(Ok(frame))
            }
            Err(e) => {
                self.buffer.drain(..1);
                Some(Err(e))
            }
        }
    }

    /// Offset of the first header after position 0 that starts a complete,
    /// valid frame.
    fn complete_frame_after_start(&self) -> Option<usize> {
        (1..self.buffer.len().saturating_sub(MIN_FRAME_SIZE - 1)).find(|&start| {
            let candidate = &self.buffer[start..];
            if candidate[..HEADER_SIZE] != FRAME_HEADER {
                return false;
            }
            let body_len = u16::from_be_bytes([candidate[2], candidate[3]]) as usize;
            let total = body_len + FRAME_OVERHEAD;
            body_len >= COMMAND_SIZE
                && candidate.len() >= total
                && Frame::decode(&candidate[..total]).is_ok()
        })
    }

    /// Pushes `bytes` and collects every frame that is now complete.
    ///
    /// Rejected candidates are logged and skipped.
    pub fn decode_all(&mut self, bytes: &[u8]) -> Vec<Frame> {
        self.push(bytes);
        let mut frames = Vec::new();
        while let Some(result) = self.next_frame() {
            match result {
                Ok(frame) => frames.push(frame),
                Err(e) => debug!("Rejected frame candidate: {}", e),
            }
        }
        frames
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::pack_command;

    #[test]
    fn test_split_across_chunks() {
        let packet = pack_command(0x0101, &[0x01, 0x00]).unwrap();
        let mut decoder = FrameDecoder::new();

        decoder.push(&packet[..3]);
        assert!(decoder.next_frame().is_none());
        decoder.push(&packet[3..7]);
        assert!(decoder.next_frame().is_none());
        decoder.push(&packet[7..]);

        let frame = decoder.next_frame().unwrap().unwrap();
        assert_eq!(frame.command, 0x0101);
        assert_eq!(frame.payload, vec![0x01, 0x00]);
        assert_eq!(decoder.buffered(), 0);
    }

    #[test]
    fn test_two_frames_one_chunk() {
        let mut data = pack_command(0x0601, &[]).unwrap();
        data.extend(pack_command(0x0602, &[0x07]).unwrap());

        let frames = FrameDecoder::new().decode_all(&data);
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0].command, 0x0601);
        assert_eq!(frames[1].command, 0x0602);
        assert_eq!(frames[1].payload, vec![0x07]);
    }

    #[test]
    fn test_resync_after_garbage() {
        let mut data = vec![0x00, 0xFF, 0x12, 0xAA, 0x34];
        data.extend(pack_command(0x0102, &[0x00]).unwrap());

        let frames = FrameDecoder::new().decode_all(&data);
        assert_eq!(frames, vec![Frame::new(0x0102, &[0x00])]);
    }

    #[test]
    fn test_corrupted_frame_reported_then_skipped() {
        let mut bad = pack_command(0x0101, &[0x01]).unwrap();
        let last = bad.len() - 1;
        bad[last] ^= 0x01;
        let good = pack_command(0x0102, &[0x02]).unwrap();

        let mut decoder = FrameDecoder::new();
        decoder.push(&bad);
        decoder.push(&good);

        assert!(matches!(
            decoder.next_frame(),
            Some(Err(Error::CrcMismatch { .. }))
        ));
        let mut frames = Vec::new();
        while let Some(result) = decoder.next_frame() {
            if let Ok(frame) = result {
                frames.push(frame);
            }
        }
        assert_eq!(frames, vec![Frame::new(0x0102, &[0x02])]);
    }

    #[test]
    fn test_oversized_length_rejected() {
        let mut decoder = FrameDecoder::with_max_payload(16);
        decoder.push(&[0xAA, 0xAA, 0x10, 0x00, 0x01, 0x01]);
        assert!(matches!(
            decoder.next_frame(),
            Some(Err(Error::LengthMismatch { declared: 0x1000, .. }))
        ));
    }

    #[test]
    fn test_false_header_does_not_block_frames() {
        let mut decoder = FrameDecoder::new();
        decoder.push(&[0xAA, 0xAA, 0xFF, 0xF0]);
        assert!(decoder.next_frame().is_none());

        let packet = pack_command(0x0101, &[0x01, 0x00]).unwrap();
        let mut decoded = 0;
        for _ in 0..50 {
            decoder.push(&packet);
            while let Some(result) = decoder.next_frame() {
                if let Ok(frame) = result {
                    assert_eq!(frame, Frame::new(0x0101, &[0x01, 0x00]));
                    decoded += 1;
                }
            }
        }
        assert_eq!(decoded, 50);
        assert_eq!(decoder.buffered(), 0);
    }

    #[test]
    fn test_incomplete_frame_waits_for_rest() {
        let packet = pack_command(0x0602, &[0x10; 32]).unwrap();
        let mut decoder = FrameDecoder::new();
        decoder.push(&packet[..20]);
        assert!(decoder.next_frame().is_none());
        assert_eq!(decoder.buffered(), 20);

        decoder.push(&packet[20..]);
        assert_eq!(decoder.next_frame().unwrap().unwrap().payload, vec![0x10; 32]);
    }

    #[test]
    fn test_keeps_partial_header() {
        let mut decoder = FrameDecoder::new();
        decoder.push(&[0x01, 0x02, 0xAA]);
        assert!(decoder.next_frame().is_none());
        assert_eq!(decoder.buffered(), 1);

        let packet = pack_command(0x0601, &[]).unwrap();
        decoder.push(&packet[1..]);
        assert_eq!(decoder.next_frame().unwrap().unwrap().command, 0x0601);
    }

    #[test]
    fn test_reset() {
        let mut decoder = FrameDecoder::new();
        decoder.push(&[0xAA, 0xAA, 0x00]);
        decoder.reset();
        assert_eq!(decoder.buffered(), 0);
    }
}
