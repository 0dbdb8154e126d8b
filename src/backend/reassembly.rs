//! Byte-stream reassembly
//!
//! Splits the raw serial byte stream into frames on `0x00` and decodes them.
//! Before binary mode is active the board prints ASCII lines; those come out
//! as [`StreamItem::Text`]. A buffer that grows past its limit with neither
//! delimiter present is dropped as desynchronized.

use crate::error::EegError;
use crate::protocol::{decode_frame, DecodedPacket, FRAME_DELIMITER};

/// One unit extracted from the byte stream
#[derive(Debug)]
pub enum StreamItem {
    /// A frame that decoded cleanly
    Packet(DecodedPacket),
    /// A firmware text line, trimmed and non-empty
    Text(String),
    /// A frame that failed to decode
    Invalid(EegError),
    /// Bytes discarded after exceeding the buffer limit without a delimiter
    Overflow(usize),
}

/// Incremental frame extractor
#[derive(Debug)]
pub struct FrameAssembler {
    buffer: Vec<u8>,
    limit: usize,
}

impl FrameAssembler {
    pub fn new(limit: usize) -> Self {
        Self {
            buffer: Vec::with_capacity(limit.min(64 * 1024)),
            limit,
        }
    }

    /// Bytes held back waiting for a delimiter
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }

    pub fn clear(&mut self) {
        self.buffer.clear();
    }

    /// Append `bytes` and extract every complete item, in stream order
    pub fn push(&mut self, bytes: &[u8]) -> Vec<StreamItem> {
        self.buffer.extend_from_slice(bytes);

        let mut items = Vec::new();
        let mut cursor = 0;
        loop {
            let rest = &self.buffer[cursor..];
            match rest.iter().position(|&b| b == FRAME_DELIMITER) {
                Some(0) => {
                    cursor += 1;
                }
                Some(end) => {
                    let item = match decode_frame(&rest[..end]) {
                        Ok(packet) => StreamItem::Packet(packet),
                        Err(e) => StreamItem::Invalid(e),
                    };
                    items.push(item);
                    cursor += end + 1;
                }
                None => match rest.iter().position(|&b| b == b'\n') {
                    Some(end) => {
                        let line = String::from_utf8_lossy(&rest[..end]).trim().to_string();
                        cursor += end + 1;
                        if !line.is_empty() {
                            items.push(StreamItem::Text(line));
                        }
                    }
                    None => {
                        if rest.len() > self.limit {
                            items.push(StreamItem::Overflow(rest.len()));
                            cursor = self.buffer.len();
                        }
                        break;
                    }
                },
            }
        }

        self.buffer.drain(..cursor);
        items
    }
}
