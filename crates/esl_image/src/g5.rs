//! The "G5" row compression used by OpenEPaperLink access points.
//!
//! A G5 stream is a sequence of commands, each introduced by one byte:
//!
//! ```text
//! 1 c x x n n n n   run:     emit n+1 bytes of 0xFF (c=1) or 0x00 (c=0)
//! 0 n n n n n n n   literal: copy the next n+1 input bytes verbatim
//! ```
//!
//! Decoding is bounded by the number of bytes the block header promises, so
//! trailing input is ignored and a short stream simply yields fewer bytes.

use crate::{EslError, Result, MAX_FRAME_BYTES};

const RUN_FLAG: u8 = 0x80;
const RUN_WHITE: u8 = 0x40;
const RUN_LEN_MASK: u8 = 0x0F;
const LITERAL_LEN_MASK: u8 = 0x7F;

/// Decodes a G5 stream, producing at most `expected` bytes.
///
/// Malformed or truncated input is not an error: decoding stops when the
/// input runs out and the output is shorter than `expected`. The only
/// failure is an `expected` length beyond the decoder's allocation limit.
///
/// # Example
///
/// ```rust
/// use esl_image::decode_g5;
///
/// // A white run of 3, then a literal of 2 bytes
/// let rows = decode_g5(&[0xC2, 0x01, 0x12, 0x34], 5)?;
/// assert_eq!(rows, [0xFF, 0xFF, 0xFF, 0x12, 0x34]);
/// # Ok::<(), esl_image::EslError>(())
/// ```
pub fn decode_g5(data: &[u8], expected: usize) -> Result<Vec<u8>> {
    if expected > MAX_FRAME_BYTES {
        return Err(EslError::FrameTooLarge {
            bytes: expected,
            limit: MAX_FRAME_BYTES,
        });
    }

    // A run command expands one input byte to at most 16 output bytes.
    let mut out = Vec::with_capacity(expected.min(data.len().saturating_mul(16)));
    let mut idx = 0usize;
    while idx < data.len() && out.len() < expected {
        let cmd = data[idx];
        idx += 1;
        let room = expected - out.len();
        if cmd & RUN_FLAG != 0 {
            let count = (cmd & RUN_LEN_MASK) as usize + 1;
            let color = if cmd & RUN_WHITE != 0 { 0xFF } else { 0x00 };
            out.resize(out.len() + count.min(room), color);
        } else {
            let count = (cmd & LITERAL_LEN_MASK) as usize + 1;
            let end = (idx + count).min(data.len());
            let chunk = &data[idx..end];
            out.extend_from_slice(&chunk[..chunk.len().min(room)]);
            // The cursor moves by the declared length even if the chunk was short.
            idx += count;
        }
    }
    Ok(out)
}
