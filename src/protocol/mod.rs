//! Wire protocol for the Pendulum acquisition board
//!
//! The board streams COBS-encoded frames separated by a single `0x00` byte.
//! Before the host switches it to binary mode it may also print plain ASCII
//! lines terminated by `\n`; those are handled by the stream reassembler, not
//! here. Everything in this module is a pure function: no I/O, no shared state.
//!
//! # Frame pipeline
//!
//! ```text
//! bytes between delimiters --cobs_decode--> raw packet --parse_raw_packet--> DecodedPacket
//! ```
//!
//! [`decode_frame`] composes both steps. [`encode_frame`] is the inverse used by
//! the firmware, reproduced here for loopback links, tests and benchmarks.
//!
//! # Packet types
//!
//! | Type   | Name   | Payload                                             |
//! |--------|--------|-----------------------------------------------------|
//! | `0x01` | SAMPLE | index, t_us, status24, ch1..ch4, flags, missed, rec |
//! | `0x02` | EVENT  | code u8, a/b/c u32                                  |
//! | `0x7F` | ERROR  | code u8, a/b u32                                    |

pub mod cobs;
pub mod crc;
pub mod packet;

pub use cobs::{cobs_decode, cobs_encode};
pub use crc::crc16_ccitt;
pub use packet::{
    parse_raw_packet, DecodedPacket, ErrorPacket, EventPacket, SamplePacket, ERROR_PAYLOAD_LEN,
    EVENT_PAYLOAD_LEN, SAMPLE_PAYLOAD_LEN,
};

use crate::error::Result;

/// Packet type byte for samples
pub const PKT_SAMPLE: u8 = 0x01;
/// Packet type byte for firmware events
pub const PKT_EVENT: u8 = 0x02;
/// Packet type byte for firmware errors
pub const PKT_ERROR: u8 = 0x7F;
/// Protocol version emitted by the current firmware
pub const PROTO_VER: u8 = 0x01;

/// Frame delimiter on the wire
pub const FRAME_DELIMITER: u8 = 0x00;

/// Largest positive code of the 24-bit ADC (2^23 - 1)
pub const FULL_SCALE_CODE: i64 = 8_388_607;
/// Default ADC reference voltage, microvolts
pub const VREF_UV_DEFAULT: u32 = 4_500_000;
/// Default PGA gain
pub const GAIN_DEFAULT: u32 = 24;

/// Mask for the fixed header nibble of the ADS1299 status word
pub const ADS_STATUS_HEADER_MASK: u32 = 0xF0_0000;
/// Expected header nibble of a valid status word
pub const ADS_STATUS_HEADER_OK: u32 = 0xC0_0000;

/// Firmware event: stream started or stopped (`a` = 1 when streaming)
pub const EVT_STREAM_STATE: u8 = 0x01;
/// Firmware event: ADS1299 initialised
pub const EVT_ADS_INIT_OK: u8 = 0x10;
/// Firmware event: self-test result
pub const EVT_SELFTEST: u8 = 0x30;

/// Firmware error: ADS1299 initialisation failed
pub const ERR_ADS_INIT_FAIL: u8 = 0xE1;
/// Firmware error: frame read from the ADC failed
pub const ERR_FRAME_READ_FAIL: u8 = 0xE2;
/// Firmware error: DRDY timed out and the ADC was recovered
pub const ERR_DRDY_TIMEOUT_RECOVER: u8 = 0xE3;

/// Display label of a firmware event code, `EVENT` when unknown
pub fn event_code_name(code: u8) -> &'static str {
    match code {
        EVT_STREAM_STATE => "STREAM_STATE",
        EVT_ADS_INIT_OK => "ADS_INIT_OK",
        EVT_SELFTEST => "SELFTEST",
        _ => "EVENT",
    }
}

/// Display label of a firmware error code, `ERROR` when unknown
pub fn error_code_name(code: u8) -> &'static str {
    match code {
        ERR_ADS_INIT_FAIL => "ADS_INIT_FAIL",
        ERR_FRAME_READ_FAIL => "FRAME_READ_FAIL",
        ERR_DRDY_TIMEOUT_RECOVER => "DRDY_TIMEOUT_RECOVER",
        _ => "ERROR",
    }
}

/// Bit flags carried in [`SamplePacket::flags`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SampleFlags(pub u32);

impl SampleFlags {
    pub const STREAMING: u32 = 1 << 0;
    pub const RECOVERED: u32 = 1 << 1;
    pub const BUTTON_TOGGLED: u32 = 1 << 2;
    pub const DRDY_MISSED: u32 = 1 << 3;
    pub const STATUS_INVALID: u32 = 1 << 4;
    pub const LEAD_OFF: u32 = 1 << 5;
    pub const TX_OVERFLOW: u32 = 1 << 6;

    const NAMES: [(u32, &'static str); 7] = [
        (Self::STREAMING, "streaming"),
        (Self::RECOVERED, "recovered"),
        (Self::BUTTON_TOGGLED, "button_toggled"),
        (Self::DRDY_MISSED, "drdy_missed"),
        (Self::STATUS_INVALID, "status_invalid"),
        (Self::LEAD_OFF, "lead_off"),
        (Self::TX_OVERFLOW, "tx_overflow"),
    ];

    /// Check whether every bit of `flag` is set
    pub fn contains(&self, flag: u32) -> bool {
        self.0 & flag == flag
    }

    /// Names of the set bits, lowest bit first
    pub fn names(&self) -> Vec<&'static str> {
        Self::NAMES
            .iter()
            .filter(|(bit, _)| self.contains(*bit))
            .map(|(_, name)| *name)
            .collect()
    }
}

/// Whether the ADS1299 status word carries its fixed `0xC` header
pub fn status_header_ok(status24: u32) -> bool {
    status24 & ADS_STATUS_HEADER_MASK == ADS_STATUS_HEADER_OK
}

/// Convert raw ADC counts to microvolts
///
/// `counts * vref_uv / (gain * FULL_SCALE_CODE)`. A zero gain yields `0.0`.
pub fn counts_to_microvolts(counts: i32, vref_uv: u32, gain: u32) -> f64 {
    if gain == 0 {
        return 0.0;
    }
    (f64::from(counts) * f64::from(vref_uv)) / (f64::from(gain) * FULL_SCALE_CODE as f64)
}

/// Inverse of [`counts_to_microvolts`], truncating toward zero like the ADC model
pub fn microvolts_to_counts(microvolts: f64, vref_uv: u32, gain: u32) -> i32 {
    if vref_uv == 0 {
        return 0;
    }
    let scale = (f64::from(gain) * FULL_SCALE_CODE as f64) / f64::from(vref_uv);
    (microvolts * scale) as i32
}

/// Decode one frame taken from between two delimiters
pub fn decode_frame(encoded_without_delimiter: &[u8]) -> Result<DecodedPacket> {
    let raw = cobs_decode(encoded_without_delimiter)?;
    parse_raw_packet(&raw)
}

/// Serialize a packet to its raw layout, CRC included, before COBS
pub fn encode_packet(packet: &DecodedPacket) -> Vec<u8> {
    packet.to_raw()
}

/// Encode a packet the way the firmware puts it on the wire, delimiter included
pub fn encode_frame(packet: &DecodedPacket) -> Vec<u8> {
    let mut frame = cobs_encode(&encode_packet(packet));
    frame.push(FRAME_DELIMITER);
    frame
}
