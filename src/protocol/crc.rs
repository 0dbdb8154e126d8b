//! CRC-16/CCITT-FALSE as computed by the board firmware

use ::crc::{Crc, CRC_16_IBM_3740};

/// CRC-16/CCITT-FALSE: poly `0x1021`, init `0xFFFF`, unreflected, no final XOR
const CRC16: Crc<u16> = Crc::<u16>::new(&CRC_16_IBM_3740);

/// Compute the CRC-16/CCITT-FALSE of `data`
///
/// This must stay bit-exact with `crc16_ccitt()` in the firmware.
pub fn crc16_ccitt(data: &[u8]) -> u16 {
    CRC16.checksum(data)
}
