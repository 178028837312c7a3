//! Turning an assembled bitmap into pixels and encoded images.

use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::{imageops, RgbImage};

use crate::{ColorTable, DisplayDescriptor, EslError, Result, Rgb, Rotation};

/// Encoded image container.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OutputFormat {
    #[default]
    Jpeg,
    Png,
}

/// Options for encoding a rendered image.
#[derive(Clone, Debug)]
pub struct EncodeOptions {
    pub format: OutputFormat,
    /// JPEG quality (1-100). Ignored for PNG.
    pub quality: u8,
}

impl Default for EncodeOptions {
    fn default() -> Self {
        Self {
            format: OutputFormat::Jpeg,
            quality: 95,
        }
    }
}

/// Color of one pixel on a bit-plane display.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PlaneColor {
    Black,
    /// The display's extra color (red, yellow, ...)
    Accent,
    White,
}

impl PlaneColor {
    pub fn resolve(self, table: &ColorTable) -> Rgb {
        match self {
            PlaneColor::Black => table.black(),
            PlaneColor::Accent => table.accent(),
            PlaneColor::White => table.white(),
        }
    }
}

/// Combines the black-plane and color-plane bits of one pixel.
///
/// Black wins when both bits are set.
#[inline]
pub fn classify_pixel(black: bool, color: bool) -> PlaneColor {
    match (black, color) {
        (true, _) => PlaneColor::Black,
        (false, true) => PlaneColor::Accent,
        (false, false) => PlaneColor::White,
    }
}

/// Reads a `bits`-wide index starting `bit_offset` bits into `data`,
/// most significant bit first.
///
/// Returns `None` if the first byte is past the end of `data`. When the index
/// spans two bytes and the second is missing, its bits read as zero.
///
/// # Example
///
/// ```rust
/// use esl_image::extract_index;
///
/// // 3-bit indices 5, 2, 7 packed as 101 010 11|1.....
/// let data = [0b1010_1011, 0b1000_0000];
/// assert_eq!(extract_index(&data, 0, 3), Some(5));
/// assert_eq!(extract_index(&data, 3, 3), Some(2));
/// assert_eq!(extract_index(&data, 6, 3), Some(7));
/// assert_eq!(extract_index(&data, 16, 3), None);
/// ```
pub fn extract_index(data: &[u8], bit_offset: usize, bits: u8) -> Option<u8> {
    let byte_offset = bit_offset / 8;
    let first = *data.get(byte_offset)?;
    let bit_position = bit_offset % 8;
    let bits = bits.clamp(1, 8) as usize;
    let mask = ((1u16 << bits) - 1) as u8;

    if bit_position + bits <= 8 {
        return Some((first >> (8 - bit_position - bits)) & mask);
    }

    let from_first = 8 - bit_position;
    let from_second = bits - from_first;
    let high = first & ((1u16 << from_first) - 1) as u8;
    let low = data
        .get(byte_offset + 1)
        .map_or(0, |&next| next >> (8 - from_second));
    Some((high << from_second) | low)
}

/// Maps an assembled bitmap to RGB pixels and rotates it into the display's
/// mounted orientation.
///
/// The returned image is `width x height` as given by the descriptor. Bytes
/// missing from a short bitmap read as zero.
pub fn render_rgb(bitmap: &[u8], display: &DisplayDescriptor) -> Result<RgbImage> {
    display.validate()?;
    let (width, height) = display.effective_dimensions();
    let (img_width, img_height) = match (u32::try_from(width), u32::try_from(height)) {
        (Ok(w), Ok(h)) => (w, h),
        _ => return Err(EslError::InvalidDimensions { width, height }),
    };

    log::debug!("Color table contents: {:?}", display.color_table);

    let mut img = RgbImage::from_pixel(img_width, img_height, image::Rgb([255, 255, 255]));
    if display.is_planar() {
        fill_planes(&mut img, bitmap, display);
    } else {
        fill_indexed(&mut img, bitmap, display);
    }

    Ok(match display.rotation {
        Rotation::None => img,
        Rotation::Rotate90 => imageops::rotate90(&img),
        Rotation::Rotate180 => imageops::rotate180(&img),
        Rotation::Rotate270 => imageops::rotate270(&img),
    })
}

fn fill_planes(img: &mut RgbImage, bitmap: &[u8], display: &DisplayDescriptor) {
    let bytes_per_row = display.bytes_per_row();
    let plane_len = display.plane_len();
    let black_plane = plane_slice(bitmap, 0, plane_len);
    let color_plane = if display.bits_per_pixel == 2 {
        plane_slice(bitmap, plane_len, plane_len)
    } else {
        &[]
    };

    let table = &display.color_table;
    let palette = [
        PlaneColor::Black.resolve(table),
        PlaneColor::Accent.resolve(table),
        PlaneColor::White.resolve(table),
    ];

    for (y, row) in img.rows_mut().enumerate() {
        let row_offset = y * bytes_per_row;
        for (x, pixel) in row.enumerate() {
            let byte_offset = row_offset + x / 8;
            let mask = 0x80u8 >> (x % 8);
            let black = black_plane.get(byte_offset).is_some_and(|b| b & mask != 0);
            let color = color_plane.get(byte_offset).is_some_and(|b| b & mask != 0);
            let rgb = match classify_pixel(black, color) {
                PlaneColor::Black => palette[0],
                PlaneColor::Accent => palette[1],
                PlaneColor::White => palette[2],
            };
            *pixel = image::Rgb(rgb.into());
        }
    }
}

fn fill_indexed(img: &mut RgbImage, bitmap: &[u8], display: &DisplayDescriptor) {
    let bits = display.bits_per_pixel;
    let bytes_per_row = display.bytes_per_row();
    let table = &display.color_table;

    for (y, row) in img.rows_mut().enumerate() {
        let row_bits = y * bytes_per_row * 8;
        for (x, pixel) in row.enumerate() {
            let Some(index) = extract_index(bitmap, row_bits + x * bits as usize, bits) else {
                continue;
            };
            // Indices past the end of the table leave the pixel white.
            if let Some(rgb) = table.by_index(index as usize) {
                *pixel = image::Rgb(rgb.into());
            }
        }
    }
}

fn plane_slice(bitmap: &[u8], start: usize, len: usize) -> &[u8] {
    let start = start.min(bitmap.len());
    let end = (start + len).min(bitmap.len());
    &bitmap[start..end]
}

/// Encodes a rendered image as JPEG or PNG.
#[must_use = "this returns the encoded image bytes"]
pub fn encode_image(img: &RgbImage, opts: &EncodeOptions) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    match opts.format {
        OutputFormat::Jpeg => {
            let encoder = JpegEncoder::new_with_quality(&mut out, opts.quality.clamp(1, 100));
            img.write_with_encoder(encoder)?;
        }
        OutputFormat::Png => {
            img.write_with_encoder(PngEncoder::new(&mut out))?;
        }
    }
    Ok(out)
}
