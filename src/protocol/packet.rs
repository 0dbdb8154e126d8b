//! Typed packets carried inside a decoded frame
//!
//! Decoded frame layout: `[type:u8][version:u8][payload][crc16:u16 LE]`, the
//! CRC covering every byte before it. All payload fields are little-endian.

use serde::{Deserialize, Serialize};

use super::crc::crc16_ccitt;
use super::{PKT_ERROR, PKT_EVENT, PKT_SAMPLE};
use crate::error::{EegError, Result};

/// Size of the SAMPLE payload (ten 32-bit fields)
pub const SAMPLE_PAYLOAD_LEN: usize = 40;
/// Size of the EVENT payload (code + three u32)
pub const EVENT_PAYLOAD_LEN: usize = 13;
/// Size of the ERROR payload (code + two u32)
pub const ERROR_PAYLOAD_LEN: usize = 9;
/// Smallest raw packet: type, version and CRC
pub const MIN_RAW_PACKET_LEN: usize = 4;

/// One ADS1299 conversion as streamed by the board
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SamplePacket {
    pub version: u8,
    /// Monotonic sample counter maintained by the firmware
    pub sample_index: u32,
    /// Device clock at DRDY, microseconds
    pub t_us: u32,
    /// Raw 24-bit status word read ahead of the channel data
    pub status24: u32,
    pub ch1: i32,
    pub ch2: i32,
    pub ch3: i32,
    pub ch4: i32,
    /// See [`super::SampleFlags`]
    pub flags: u32,
    pub missed_drdy_frame: u32,
    pub recoveries_total: u32,
}

/// Informational firmware event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventPacket {
    pub version: u8,
    pub event_code: u8,
    pub a: u32,
    pub b: u32,
    pub c: u32,
}

/// Fault condition reported by the firmware
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorPacket {
    pub version: u8,
    pub error_code: u8,
    pub a: u32,
    pub b: u32,
}

/// A successfully decoded frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DecodedPacket {
    Sample(SamplePacket),
    Event(EventPacket),
    Error(ErrorPacket),
}

impl DecodedPacket {
    /// Wire type byte of this packet
    pub fn packet_type(&self) -> u8 {
        match self {
            DecodedPacket::Sample(_) => PKT_SAMPLE,
            DecodedPacket::Event(_) => PKT_EVENT,
            DecodedPacket::Error(_) => PKT_ERROR,
        }
    }

    /// Protocol version byte captured from the frame
    pub fn version(&self) -> u8 {
        match self {
            DecodedPacket::Sample(p) => p.version,
            DecodedPacket::Event(p) => p.version,
            DecodedPacket::Error(p) => p.version,
        }
    }

    /// Serialize to the raw (pre-COBS) layout, CRC included
    pub fn to_raw(&self) -> Vec<u8> {
        let mut raw = Vec::with_capacity(2 + SAMPLE_PAYLOAD_LEN + 2);
        raw.push(self.packet_type());
        raw.push(self.version());

        match self {
            DecodedPacket::Sample(p) => {
                for word in [p.sample_index, p.t_us, p.status24] {
                    raw.extend_from_slice(&word.to_le_bytes());
                }
                for ch in [p.ch1, p.ch2, p.ch3, p.ch4] {
                    raw.extend_from_slice(&ch.to_le_bytes());
                }
                for word in [p.flags, p.missed_drdy_frame, p.recoveries_total] {
                    raw.extend_from_slice(&word.to_le_bytes());
                }
            }
            DecodedPacket::Event(p) => {
                raw.push(p.event_code);
                for word in [p.a, p.b, p.c] {
                    raw.extend_from_slice(&word.to_le_bytes());
                }
            }
            DecodedPacket::Error(p) => {
                raw.push(p.error_code);
                for word in [p.a, p.b] {
                    raw.extend_from_slice(&word.to_le_bytes());
                }
            }
        }

        let crc = crc16_ccitt(&raw);
        raw.extend_from_slice(&crc.to_le_bytes());
        raw
    }
}

impl From<SamplePacket> for DecodedPacket {
    fn from(packet: SamplePacket) -> Self {
        DecodedPacket::Sample(packet)
    }
}

impl From<EventPacket> for DecodedPacket {
    fn from(packet: EventPacket) -> Self {
        DecodedPacket::Event(packet)
    }
}

impl From<ErrorPacket> for DecodedPacket {
    fn from(packet: ErrorPacket) -> Self {
        DecodedPacket::Error(packet)
    }
}

#[inline]
fn u32_at(buf: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes([
        buf[offset],
        buf[offset + 1],
        buf[offset + 2],
        buf[offset + 3],
    ])
}

#[inline]
fn i32_at(buf: &[u8], offset: usize) -> i32 {
    i32::from_le_bytes([
        buf[offset],
        buf[offset + 1],
        buf[offset + 2],
        buf[offset + 3],
    ])
}

fn check_payload_len(packet: &'static str, payload: &[u8], expected: usize) -> Result<()> {
    if payload.len() != expected {
        return Err(EegError::PayloadSize {
            packet,
            actual: payload.len(),
            expected,
        });
    }
    Ok(())
}

/// Validate and decode an unescaped frame into a typed packet
///
/// The CRC is checked before the packet type, so a corrupted type byte is
/// reported as a CRC error rather than an unknown type.
pub fn parse_raw_packet(raw: &[u8]) -> Result<DecodedPacket> {
    if raw.len() < MIN_RAW_PACKET_LEN {
        return Err(EegError::Framing(
            "Raw packet is smaller than minimum size.".to_string(),
        ));
    }

    let packet_type = raw[0];
    let version = raw[1];
    let crc_at = raw.len() - 2;
    let payload = &raw[2..crc_at];
    let received = u16::from_le_bytes([raw[crc_at], raw[crc_at + 1]]);
    let expected = crc16_ccitt(&raw[..crc_at]);

    if received != expected {
        return Err(EegError::Crc { expected, received });
    }

    match packet_type {
        PKT_SAMPLE => {
            check_payload_len("SAMPLE", payload, SAMPLE_PAYLOAD_LEN)?;
            Ok(DecodedPacket::Sample(SamplePacket {
                version,
                sample_index: u32_at(payload, 0),
                t_us: u32_at(payload, 4),
                status24: u32_at(payload, 8),
                ch1: i32_at(payload, 12),
                ch2: i32_at(payload, 16),
                ch3: i32_at(payload, 20),
                ch4: i32_at(payload, 24),
                flags: u32_at(payload, 28),
                missed_drdy_frame: u32_at(payload, 32),
                recoveries_total: u32_at(payload, 36),
            }))
        }
        PKT_EVENT => {
            check_payload_len("EVENT", payload, EVENT_PAYLOAD_LEN)?;
            Ok(DecodedPacket::Event(EventPacket {
                version,
                event_code: payload[0],
                a: u32_at(payload, 1),
                b: u32_at(payload, 5),
                c: u32_at(payload, 9),
            }))
        }
        PKT_ERROR => {
            check_payload_len("ERROR", payload, ERROR_PAYLOAD_LEN)?;
            Ok(DecodedPacket::Error(ErrorPacket {
                version,
                error_code: payload[0],
                a: u32_at(payload, 1),
                b: u32_at(payload, 5),
            }))
        }
        other => Err(EegError::UnknownPacketType(other)),
    }
}
