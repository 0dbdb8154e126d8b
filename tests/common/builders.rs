//! Test data builders for wire frames

use pendulum_eeg::protocol::{
    encode_frame, DecodedPacket, ErrorPacket, EventPacket, SamplePacket, PROTO_VER,
};

/// Builder for sample packets
pub struct SampleBuilder {
    packet: SamplePacket,
}

impl SampleBuilder {
    pub fn new(sample_index: u32) -> Self {
        Self {
            packet: SamplePacket {
                version: PROTO_VER,
                sample_index,
                t_us: sample_index.wrapping_mul(4_000),
                status24: 0xC0_0000,
                ch1: 0,
                ch2: 0,
                ch3: 0,
                ch4: 0,
                flags: 1,
                missed_drdy_frame: 0,
                recoveries_total: 0,
            },
        }
    }

    pub fn channels(mut self, counts: [i32; 4]) -> Self {
        let [ch1, ch2, ch3, ch4] = counts;
        self.packet.ch1 = ch1;
        self.packet.ch2 = ch2;
        self.packet.ch3 = ch3;
        self.packet.ch4 = ch4;
        self
    }

    pub fn flags(mut self, flags: u32) -> Self {
        self.packet.flags = flags;
        self
    }

    pub fn build(self) -> DecodedPacket {
        DecodedPacket::Sample(self.packet)
    }

    /// Wire bytes, delimiter included
    pub fn frame(self) -> Vec<u8> {
        encode_frame(&self.build())
    }
}

pub fn event(event_code: u8, a: u32, b: u32, c: u32) -> DecodedPacket {
    DecodedPacket::Event(EventPacket {
        version: PROTO_VER,
        event_code,
        a,
        b,
        c,
    })
}

pub fn error(error_code: u8, a: u32, b: u32) -> DecodedPacket {
    DecodedPacket::Error(ErrorPacket {
        version: PROTO_VER,
        error_code,
        a,
        b,
    })
}

/// Wire bytes of a sample frame with one body byte altered
///
/// The replacement is never zero, so the damage stays inside one frame.
pub fn corrupt_sample_frame(sample_index: u32) -> Vec<u8> {
    let mut frame = SampleBuilder::new(sample_index)
        .channels([1_000, 2_000, 3_000, 4_000])
        .frame();
    let target = 8;
    frame[target] = if frame[target] == 0x55 { 0x56 } else { 0x55 };
    frame
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_builder() {
        match SampleBuilder::new(9).channels([1, 2, 3, 4]).flags(3).build() {
            DecodedPacket::Sample(p) => {
                assert_eq!(p.sample_index, 9);
                assert_eq!(p.ch4, 4);
                assert_eq!(p.flags, 3);
            }
            other => panic!("unexpected packet {:?}", other),
        }
    }
}
