//! Consistent Overhead Byte Stuffing
//!
//! Every frame on the wire is COBS-encoded so that `0x00` never appears inside
//! it and can serve as the frame delimiter. Each block starts with a code byte:
//! `code - 1` literal bytes follow, and unless the code is `0xFF` the block
//! stands for a zero byte that was removed by the encoder.

use crate::error::{EegError, Result};

/// Longest literal run a single block can carry
const MAX_BLOCK_CODE: u8 = 0xFF;

/// Decode a COBS-encoded frame (without its trailing `0x00` delimiter)
///
/// An empty input decodes to an empty output. A code byte of zero, or a block
/// whose declared length runs past the end of the buffer, is a framing error.
pub fn cobs_decode(encoded: &[u8]) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(encoded.len());
    let size = encoded.len();
    let mut idx = 0;

    while idx < size {
        let code = encoded[idx];
        idx += 1;
        if code == 0 {
            return Err(EegError::Framing(
                "COBS code 0 found in encoded frame.".to_string(),
            ));
        }

        let block_len = usize::from(code) - 1;
        if idx + block_len > size {
            return Err(EegError::Framing("Truncated COBS frame.".to_string()));
        }

        out.extend_from_slice(&encoded[idx..idx + block_len]);
        idx += block_len;

        // The final block never implies a zero: it ends the frame.
        if code != MAX_BLOCK_CODE && idx < size {
            out.push(0);
        }
    }

    Ok(out)
}

/// Encode bytes with COBS, exactly as the board firmware does
///
/// The result never contains `0x00`; the caller appends the delimiter.
pub fn cobs_encode(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len() + data.len() / 254 + 2);
    let mut code_idx = 0;
    let mut code: u8 = 1;
    out.push(0);

    for &byte in data {
        if byte == 0 {
            out[code_idx] = code;
            code_idx = out.len();
            out.push(0);
            code = 1;
        } else {
            out.push(byte);
            code += 1;
            if code == MAX_BLOCK_CODE {
                out[code_idx] = code;
                code_idx = out.len();
                out.push(0);
                code = 1;
            }
        }
    }

    out[code_idx] = code;
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_empty() {
        assert_eq!(cobs_decode(&[]).unwrap(), Vec::<u8>::new());
    }

    #[test]
    fn test_decode_known_vectors() {
        assert_eq!(cobs_decode(&[0x01, 0x01]).unwrap(), vec![0x00]);
        assert_eq!(
            cobs_decode(&[0x02, 0x01, 0x02, 0x05]).unwrap(),
            vec![0x01, 0x00, 0x05]
        );
        assert_eq!(
            cobs_decode(&[0x03, 0x11, 0x22, 0x02, 0x33]).unwrap(),
            vec![0x11, 0x22, 0x00, 0x33]
        );
    }

    #[test]
    fn test_decode_rejects_zero_code() {
        let err = cobs_decode(&[0x02, 0x01, 0x00, 0x05]).unwrap_err();
        assert!(matches!(err, EegError::Framing(_)));
    }

    #[test]
    fn test_decode_rejects_truncated_block() {
        let err = cobs_decode(&[0x05, 0x01, 0x02]).unwrap_err();
        assert!(matches!(err, EegError::Framing(ref m) if m.contains("Truncated")));
    }

    #[test]
    fn test_encode_known_vectors() {
        assert_eq!(cobs_encode(&[]), vec![0x01]);
        assert_eq!(cobs_encode(&[0x00]), vec![0x01, 0x01]);
        assert_eq!(cobs_encode(&[0x01, 0x00, 0x05]), vec![0x02, 0x01, 0x02, 0x05]);
    }

    #[test]
    fn test_long_run_splits_at_254_bytes() {
        let data: Vec<u8> = (0..300).map(|i| (i % 255 + 1) as u8).collect();
        let encoded = cobs_encode(&data);
        assert_eq!(encoded[0], 0xFF);
        assert!(!encoded.contains(&0));
        assert_eq!(cobs_decode(&encoded).unwrap(), data);
    }

    #[test]
    fn test_trailing_zero_survives() {
        let data = [0x10, 0x20, 0x00];
        assert_eq!(cobs_decode(&cobs_encode(&data)).unwrap(), data.to_vec());
    }
}
