//! # esl_image
//!
//! A 100% Rust decoder for the raw image format that OpenEPaperLink access
//! points hand out for electronic shelf labels.
//!
//! ## Features
//!
//! - **Framing**: walks the size-prefixed block stream, tolerating truncation
//! - **Codecs**: raw, zlib/deflate and the run-length "G5" scheme
//! - **Assembly**: partial row updates into one or two bit-planes
//! - **Rendering**: color-table mapping, rotation and JPEG/PNG output
//!
//! ## Quick Start
//!
//! ### Assembling the raw bitmap
//!
//! ```rust
//! use esl_image::{decode_raw, ColorTable, DisplayDescriptor};
//!
//! let display = DisplayDescriptor::new(8, 8, 1).with_color_table(ColorTable::black_white());
//!
//! // One uncompressed block: 4-byte length, 6-byte header, 8 rows of 1 byte
//! let mut stream = 14u32.to_le_bytes().to_vec();
//! stream.extend_from_slice(&[0, 0, 8, 0, 0, 0]);
//! stream.extend_from_slice(&[0xAA; 8]);
//!
//! let bitmap = decode_raw(&stream, &display)?;
//! assert_eq!(bitmap, vec![0xAA; 8]);
//! # Ok::<(), esl_image::EslError>(())
//! ```
//!
//! ### Rendering to a JPEG
//!
//! ```rust
//! use esl_image::{to_image, ColorTable, DisplayDescriptor, Rotation};
//!
//! let display = DisplayDescriptor::new(16, 8, 1)
//!     .with_rotation(Rotation::Rotate90)
//!     .with_color_table(ColorTable::black_white());
//!
//! let jpeg = to_image(&[], &display)?;
//! assert_eq!(&jpeg[..2], &[0xFF, 0xD8]);
//! # Ok::<(), esl_image::EslError>(())
//! ```

use thiserror::Error;

pub mod block;
pub mod descriptor;
pub mod frame;
pub mod g5;
pub mod render;

pub use block::{BlockHeader, Blocks, Codec, DecodedBlock};
pub use descriptor::{ColorTable, DisplayDescriptor, Rgb, Rotation};
pub use frame::{AssemblyStats, FrameAssembler};
pub use g5::decode_g5;
pub use render::{
    classify_pixel, encode_image, extract_index, render_rgb, EncodeOptions, OutputFormat,
    PlaneColor,
};

/// Errors that can occur while decoding or rendering an image.
#[derive(Debug, Error)]
pub enum EslError {
    /// Display width or height is zero
    #[error("invalid dimensions: {width}x{height}")]
    InvalidDimensions { width: usize, height: usize },

    /// Bits per pixel outside the supported 1..=8 range
    #[error("unsupported bits per pixel: {0}")]
    UnsupportedBitsPerPixel(u8),

    /// Rotation code outside 0..=3
    #[error("invalid rotation code: {0}")]
    InvalidRotation(u8),

    /// A frame or block would need more memory than the decoder allows
    #[error("frame too large: {bytes} bytes exceeds limit of {limit}")]
    FrameTooLarge { bytes: usize, limit: usize },

    /// A zlib-compressed block could not be inflated
    #[error("block {block}: zlib decompression failed: {source}")]
    Inflate {
        block: usize,
        #[source]
        source: std::io::Error,
    },

    /// Still-image encoding failed
    #[error("image encoding error: {0}")]
    Image(#[from] image::ImageError),
}

/// Result type for decoding operations.
pub type Result<T> = core::result::Result<T, EslError>;

// 64 million RGBA pixels worth of bytes; nothing on an e-paper panel comes close.
pub(crate) const MAX_FRAME_BYTES: usize = 256 * 1024 * 1024;

/// Decodes a raw transport stream into the assembled bitmap.
///
/// The result holds plane 0 followed, for 2 bpp displays, by plane 1. Each
/// plane is `bytes_per_row * height` bytes using the rotation-adjusted
/// dimensions. For displays with 3 or more bits per pixel the single buffer
/// holds packed color indices.
///
/// Decoding is best-effort: truncated blocks are clamped, undersized blocks
/// are skipped and blocks that fail to inflate are logged and dropped. Only an
/// invalid descriptor is reported as an error.
pub fn decode_raw(data: &[u8], display: &DisplayDescriptor) -> Result<Vec<u8>> {
    decode_raw_with_stats(data, display).map(|(bitmap, _)| bitmap)
}

/// Like [`decode_raw`], additionally returning how many blocks were applied,
/// skipped or failed.
pub fn decode_raw_with_stats(
    data: &[u8],
    display: &DisplayDescriptor,
) -> Result<(Vec<u8>, AssemblyStats)> {
    display.validate()?;

    log::debug!("Input size: {} bytes", data.len());
    log::debug!("Tag type: {}", display.name);
    log::debug!("Dimensions: {}x{}", display.width, display.height);
    log::debug!("BPP: {}", display.bits_per_pixel);
    log::debug!("Rotate buffer: {}", display.rotation.code());

    let mut assembler = FrameAssembler::new(display)?;
    for block in Blocks::new(data, display.bytes_per_row()) {
        match block {
            Ok(block) => assembler.apply(&block),
            Err(err) => {
                log::warn!("{err}");
                assembler.record_failure();
            }
        }
    }

    let stats = assembler.stats();
    Ok((assembler.into_bitmap(), stats))
}

/// Decodes a raw transport stream and renders it as a quality 95 JPEG.
#[must_use = "this returns the encoded image bytes"]
pub fn to_image(data: &[u8], display: &DisplayDescriptor) -> Result<Vec<u8>> {
    to_image_with_options(data, display, &EncodeOptions::default())
}

/// Decodes a raw transport stream and renders it with the given options.
#[must_use = "this returns the encoded image bytes"]
pub fn to_image_with_options(
    data: &[u8],
    display: &DisplayDescriptor,
    opts: &EncodeOptions,
) -> Result<Vec<u8>> {
    let bitmap = decode_raw(data, display)?;
    let image = render_rgb(&bitmap, display)?;
    encode_image(&image, opts)
}
