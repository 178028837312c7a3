//! Block framing and per-block decompression.
//!
//! The transport stream is a sequence of blocks, each a 4-byte little-endian
//! length followed by that many payload bytes:
//!
//! ```text
//! +--------+-----------------+--------+-----------------+--
//! | len LE | payload (len B) | len LE | payload (len B) | ...
//! +--------+-----------------+--------+-----------------+--
//! ```
//!
//! A payload is either a zlib stream, or starts with the 6-byte
//! [`BlockHeader`] directly. Once decompressed every block is
//! `header ++ rows`, with `row_count * bytes_per_row` bytes of rows.

use std::io::Read;

use flate2::read::ZlibDecoder;

use crate::{decode_g5, EslError, Result, MAX_FRAME_BYTES};

/// Size of the header at the start of every decompressed block.
pub const HEADER_LEN: usize = 6;

const LENGTH_PREFIX_LEN: usize = 4;
const ZLIB_MAGIC: u8 = 0x78;
const FORMAT_G5: u8 = 0x01;

/// Header of a decompressed block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockHeader {
    /// First display row covered by the block
    pub start_row: u16,
    /// Number of rows that follow the header
    pub row_count: u16,
    /// Bit 0 selects G5 coding of the rows
    pub format: u8,
    /// Bit 0 selects the destination plane on 2 bpp displays
    pub flags: u8,
}

impl BlockHeader {
    /// Parses the header from the first six bytes, or returns `None` if there
    /// are fewer.
    pub fn parse(bytes: &[u8]) -> Option<Self> {
        let header = bytes.get(..HEADER_LEN)?;
        Some(Self {
            start_row: u16::from_le_bytes([header[0], header[1]]),
            row_count: u16::from_le_bytes([header[2], header[3]]),
            format: header[4],
            flags: header[5],
        })
    }

    #[inline]
    pub fn is_g5(&self) -> bool {
        self.format & FORMAT_G5 != 0
    }

    /// Serializes the header back into its wire form.
    pub fn to_bytes(&self) -> [u8; HEADER_LEN] {
        let start = self.start_row.to_le_bytes();
        let rows = self.row_count.to_le_bytes();
        [start[0], start[1], rows[0], rows[1], self.format, self.flags]
    }
}

/// How a block payload was encoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Codec {
    Raw,
    Zlib,
    G5,
}

impl Codec {
    pub fn as_str(self) -> &'static str {
        match self {
            Codec::Raw => "raw",
            Codec::Zlib => "zlib",
            Codec::G5 => "g5",
        }
    }
}

impl std::fmt::Display for Codec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One block after decompression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedBlock {
    /// Position of the block in the stream, counting skipped blocks
    pub index: usize,
    pub codec: Codec,
    /// Size of the payload as framed, before decompression
    pub payload_len: usize,
    header: BlockHeader,
    bytes: Vec<u8>,
}

impl DecodedBlock {
    #[inline]
    pub fn header(&self) -> BlockHeader {
        self.header
    }

    /// Row data following the header.
    #[inline]
    pub fn rows(&self) -> &[u8] {
        &self.bytes[HEADER_LEN..]
    }

    /// Header and row data as one buffer.
    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }
}

fn is_zlib(payload: &[u8]) -> bool {
    payload.len() >= 2 && payload[0] == ZLIB_MAGIC && matches!(payload[1], 0x01 | 0x9C | 0xDA)
}

/// Decompresses one block payload.
///
/// Returns `Ok(None)` for a payload too short to carry a header. A zlib
/// payload that fails to inflate is an error; a G5 payload that cannot be
/// decoded falls back to being treated as raw bytes.
pub fn resolve_payload(
    payload: &[u8],
    bytes_per_row: usize,
    index: usize,
) -> Result<Option<(Codec, Vec<u8>)>> {
    if is_zlib(payload) {
        let mut bytes = Vec::new();
        ZlibDecoder::new(payload)
            .take(MAX_FRAME_BYTES as u64)
            .read_to_end(&mut bytes)
            .map_err(|source| EslError::Inflate {
                block: index,
                source,
            })?;
        return Ok(Some((Codec::Zlib, bytes)));
    }

    let Some(header) = BlockHeader::parse(payload) else {
        return Ok(None);
    };

    if !header.is_g5() {
        return Ok(Some((Codec::Raw, payload.to_vec())));
    }

    let expected = (header.row_count as usize).saturating_mul(bytes_per_row);
    match decode_g5(&payload[HEADER_LEN..], expected) {
        Ok(rows) => {
            let mut bytes = Vec::with_capacity(HEADER_LEN + rows.len());
            bytes.extend_from_slice(&payload[..HEADER_LEN]);
            bytes.extend_from_slice(&rows);
            Ok(Some((Codec::G5, bytes)))
        }
        Err(err) => {
            log::debug!("Block {index}: G5 decode failed ({err}), using payload as raw");
            Ok(Some((Codec::Raw, payload.to_vec())))
        }
    }
}

/// Iterator over the decompressed blocks of a transport stream.
///
/// Framing stops once fewer than four bytes remain for a length prefix. A
/// declared length larger than the rest of the stream is clamped. Blocks too
/// short to carry a header are skipped; blocks that fail to inflate are
/// yielded as errors and framing continues with the next block.
///
/// # Example
///
/// ```rust
/// use esl_image::{Blocks, Codec};
///
/// let mut stream = 8u32.to_le_bytes().to_vec();
/// stream.extend_from_slice(&[0, 0, 2, 0, 0, 0, 0x0F, 0xF0]);
///
/// let blocks: Vec<_> = Blocks::new(&stream, 1).collect::<Result<_, _>>()?;
/// assert_eq!(blocks.len(), 1);
/// assert_eq!(blocks[0].codec, Codec::Raw);
/// assert_eq!(blocks[0].rows(), &[0x0F, 0xF0]);
/// # Ok::<(), esl_image::EslError>(())
/// ```
pub struct Blocks<'a> {
    data: &'a [u8],
    offset: usize,
    index: usize,
    bytes_per_row: usize,
}

impl<'a> Blocks<'a> {
    /// `bytes_per_row` is the rotation-adjusted row size, needed to bound G5
    /// decoding.
    pub fn new(data: &'a [u8], bytes_per_row: usize) -> Self {
        Self {
            data,
            offset: 0,
            index: 0,
            bytes_per_row,
        }
    }

    /// Frames the next payload, or returns `None` at the end of the stream.
    fn next_payload(&mut self) -> Option<(usize, &'a [u8])> {
        let data = self.data;
        let prefix = data.get(self.offset..self.offset + LENGTH_PREFIX_LEN)?;
        let declared = u32::from_le_bytes([prefix[0], prefix[1], prefix[2], prefix[3]]) as usize;
        self.offset += LENGTH_PREFIX_LEN;

        let remaining = data.len() - self.offset;
        let index = self.index;
        self.index += 1;

        let size = if declared > remaining {
            log::debug!(
                "Block {index}: size {declared} exceeds remaining {remaining}, clamping"
            );
            remaining
        } else {
            declared
        };

        let payload = &data[self.offset..self.offset + size];
        self.offset += size;
        log::debug!("Block {index}: payload size {size} bytes");
        Some((index, payload))
    }
}

impl Iterator for Blocks<'_> {
    type Item = Result<DecodedBlock>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let (index, payload) = self.next_payload()?;
            let (codec, bytes) = match resolve_payload(payload, self.bytes_per_row, index) {
                Ok(Some(resolved)) => resolved,
                Ok(None) => {
                    log::debug!("Block {index}: too small");
                    continue;
                }
                Err(err) => return Some(Err(err)),
            };

            log::debug!(
                "Block {index}: codec {codec}, decompressed to {} bytes",
                bytes.len()
            );

            let Some(header) = BlockHeader::parse(&bytes) else {
                log::debug!("Block {index}: too small after decompression");
                continue;
            };

            log::debug!(
                "Block {index}: y0={} nrows={} fmt={} flags=0x{:02X}",
                header.start_row,
                header.row_count,
                header.format,
                header.flags
            );

            return Some(Ok(DecodedBlock {
                index,
                codec,
                payload_len: payload.len(),
                header,
                bytes,
            }));
        }
    }
}
