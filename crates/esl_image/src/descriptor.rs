//! Display geometry, rotation and color tables.

use crate::{EslError, Result, MAX_FRAME_BYTES};

/// An RGB color triple.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const BLACK: Rgb = Rgb::new(0, 0, 0);
    pub const WHITE: Rgb = Rgb::new(255, 255, 255);

    #[inline]
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }
}

impl From<[u8; 3]> for Rgb {
    fn from(c: [u8; 3]) -> Self {
        Rgb::new(c[0], c[1], c[2])
    }
}

impl From<Rgb> for [u8; 3] {
    fn from(c: Rgb) -> Self {
        [c.r, c.g, c.b]
    }
}

/// Buffer rotation of a display.
///
/// The transport encodes rows in the panel's native orientation, so for
/// 90° and 270° the row arithmetic runs on swapped dimensions and the
/// rendered image is rotated back afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Rotation {
    #[default]
    None,
    Rotate90,
    Rotate180,
    Rotate270,
}

impl Rotation {
    /// The access point's `rotatebuffer` code for this rotation.
    pub fn code(self) -> u8 {
        match self {
            Rotation::None => 0,
            Rotation::Rotate90 => 1,
            Rotation::Rotate180 => 2,
            Rotation::Rotate270 => 3,
        }
    }

    /// Returns true if width and height are swapped in the transport.
    #[inline]
    pub fn swaps_dimensions(self) -> bool {
        matches!(self, Rotation::Rotate90 | Rotation::Rotate270)
    }
}

impl TryFrom<u8> for Rotation {
    type Error = EslError;

    fn try_from(code: u8) -> Result<Self> {
        match code {
            0 => Ok(Rotation::None),
            1 => Ok(Rotation::Rotate90),
            2 => Ok(Rotation::Rotate180),
            3 => Ok(Rotation::Rotate270),
            other => Err(EslError::InvalidRotation(other)),
        }
    }
}

/// Named display colors in insertion order.
///
/// Order matters: for packed-index displays entry `n` is the color of
/// index `n`, and for plane displays the first entry that is neither
/// `black` nor `white` is the accent color.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ColorTable {
    entries: Vec<(String, Rgb)>,
}

impl ColorTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// A table holding only `white` and `black`.
    pub fn black_white() -> Self {
        let mut table = Self::new();
        table.insert("white", Rgb::WHITE);
        table.insert("black", Rgb::BLACK);
        table
    }

    /// Adds a color, or replaces it in place if the name is already present.
    pub fn insert(&mut self, name: impl Into<String>, color: Rgb) {
        let name = name.into();
        match self.entries.iter_mut().find(|(key, _)| *key == name) {
            Some(entry) => entry.1 = color,
            None => self.entries.push((name, color)),
        }
    }

    pub fn get(&self, name: &str) -> Option<Rgb> {
        self.entries
            .iter()
            .find(|(key, _)| key == name)
            .map(|&(_, color)| color)
    }

    /// Color at position `index` in insertion order.
    pub fn by_index(&self, index: usize) -> Option<Rgb> {
        self.entries.get(index).map(|&(_, color)| color)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Rgb)> {
        self.entries.iter().map(|(key, color)| (key.as_str(), *color))
    }

    /// The `black` entry, or pure black if the table has none.
    pub fn black(&self) -> Rgb {
        self.get("black").unwrap_or(Rgb::BLACK)
    }

    /// The `white` entry, or pure white if the table has none.
    pub fn white(&self) -> Rgb {
        self.get("white").unwrap_or(Rgb::WHITE)
    }

    /// The first color that is neither black nor white, falling back to white.
    pub fn accent(&self) -> Rgb {
        self.entries
            .iter()
            .find(|(key, _)| key != "black" && key != "white")
            .map(|&(_, color)| color)
            .unwrap_or_else(|| self.white())
    }
}

impl<S: Into<String>> FromIterator<(S, Rgb)> for ColorTable {
    fn from_iter<I: IntoIterator<Item = (S, Rgb)>>(iter: I) -> Self {
        let mut table = ColorTable::new();
        for (name, color) in iter {
            table.insert(name, color);
        }
        table
    }
}

/// Display capabilities of one tag type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayDescriptor {
    /// Hardware name, only used in log output
    pub name: String,
    /// Width in pixels, as mounted
    pub width: usize,
    /// Height in pixels, as mounted
    pub height: usize,
    /// 1 or 2 for bit-plane displays, 3..=8 for packed color indices
    pub bits_per_pixel: u8,
    pub rotation: Rotation,
    pub color_table: ColorTable,
}

impl DisplayDescriptor {
    /// Creates a descriptor with no rotation and an empty color table.
    pub fn new(width: usize, height: usize, bits_per_pixel: u8) -> Self {
        Self {
            name: String::new(),
            width,
            height,
            bits_per_pixel,
            rotation: Rotation::None,
            color_table: ColorTable::new(),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_rotation(mut self, rotation: Rotation) -> Self {
        self.rotation = rotation;
        self
    }

    pub fn with_color_table(mut self, color_table: ColorTable) -> Self {
        self.color_table = color_table;
        self
    }

    /// Checks dimensions, depth and the resulting frame size.
    pub fn validate(&self) -> Result<()> {
        if self.width == 0 || self.height == 0 {
            return Err(EslError::InvalidDimensions {
                width: self.width,
                height: self.height,
            });
        }
        if !(1..=8).contains(&self.bits_per_pixel) {
            return Err(EslError::UnsupportedBitsPerPixel(self.bits_per_pixel));
        }
        let bytes = self
            .bytes_per_row()
            .checked_mul(self.effective_dimensions().1)
            .and_then(|plane| plane.checked_mul(self.plane_count()))
            .unwrap_or(usize::MAX);
        if bytes > MAX_FRAME_BYTES {
            return Err(EslError::FrameTooLarge {
                bytes,
                limit: MAX_FRAME_BYTES,
            });
        }
        Ok(())
    }

    /// Width and height in transport orientation.
    pub fn effective_dimensions(&self) -> (usize, usize) {
        if self.rotation.swaps_dimensions() {
            (self.height, self.width)
        } else {
            (self.width, self.height)
        }
    }

    /// Returns true for 1 and 2 bpp displays, which use separate bit-planes.
    #[inline]
    pub fn is_planar(&self) -> bool {
        self.bits_per_pixel <= 2
    }

    /// Bytes in one transport row.
    pub fn bytes_per_row(&self) -> usize {
        let (width, _) = self.effective_dimensions();
        if self.is_planar() {
            width.div_ceil(8)
        } else {
            width
                .saturating_mul(self.bits_per_pixel as usize)
                .div_ceil(8)
        }
    }

    /// Number of plane buffers: two for 2 bpp, one otherwise.
    pub fn plane_count(&self) -> usize {
        if self.bits_per_pixel == 2 {
            2
        } else {
            1
        }
    }

    /// Size of one plane buffer in bytes.
    pub fn plane_len(&self) -> usize {
        self.bytes_per_row() * self.effective_dimensions().1
    }

    /// Size of the assembled bitmap in bytes.
    pub fn frame_len(&self) -> usize {
        self.plane_len() * self.plane_count()
    }
}
