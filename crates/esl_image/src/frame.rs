//! Frame assembly: placing decoded block rows into plane buffers.

use crate::{DecodedBlock, DisplayDescriptor, Result};

/// Counters collected while assembling a frame.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AssemblyStats {
    /// Blocks that wrote at least one byte
    pub applied: usize,
    /// Blocks whose rows fell entirely outside the display or were empty
    pub skipped: usize,
    /// Blocks that could not be decompressed
    pub failed: usize,
}

/// Owns the plane buffers of one decode and applies blocks to them.
///
/// 1 bpp displays have one plane, 2 bpp displays a black plane and a color
/// plane, and 3..=8 bpp displays a single buffer of packed indices. All
/// buffers start zeroed; bytes no block touches stay zero.
#[derive(Debug, Clone)]
pub struct FrameAssembler {
    planes: Vec<Vec<u8>>,
    bytes_per_row: usize,
    height: usize,
    bits_per_pixel: u8,
    next_plane: usize,
    stats: AssemblyStats,
}

impl FrameAssembler {
    pub fn new(display: &DisplayDescriptor) -> Result<Self> {
        display.validate()?;
        let (width, height) = display.effective_dimensions();
        let bytes_per_row = display.bytes_per_row();

        log::debug!("Effective dimensions: {width}x{height}");
        log::debug!("Bytes per row: {bytes_per_row}");

        Ok(Self {
            planes: vec![vec![0u8; display.plane_len()]; display.plane_count()],
            bytes_per_row,
            height,
            bits_per_pixel: display.bits_per_pixel,
            next_plane: 0,
            stats: AssemblyStats::default(),
        })
    }

    /// Picks the destination plane for a block and advances the alternation.
    fn select_plane(&mut self, flags: u8) -> usize {
        if self.bits_per_pixel != 2 {
            return 0;
        }
        let explicit = (flags & 0x1) as usize;
        // `flags & 1` is always a valid plane index, so the alternating
        // fallback below is currently unreachable.
        let plane = if explicit < self.planes.len() {
            explicit
        } else {
            self.next_plane
        };
        self.next_plane = 1 - plane;
        plane
    }

    /// Writes the rows of one block into its plane, clamped to the display
    /// height and to the bytes the block actually carries.
    pub fn apply(&mut self, block: &DecodedBlock) {
        let header = block.header();
        let plane = self.select_plane(header.flags);

        let start_row = header.start_row as usize;
        let end_row = (start_row + header.row_count as usize).min(self.height);
        let start = start_row.min(self.height) * self.bytes_per_row;

        let rows = block.rows();
        let declared = end_row.saturating_sub(start_row) * self.bytes_per_row;
        let len = if rows.len() < declared {
            log::debug!(
                "Block {}: payload shorter than expected ({} < {declared}), clamping",
                block.index,
                rows.len()
            );
            rows.len()
        } else {
            declared
        };

        if len == 0 {
            log::debug!("Block {}: nothing to place", block.index);
            self.stats.skipped += 1;
            return;
        }

        let end = start + len;
        log::debug!(
            "Block {}: placing {len} bytes into plane {plane} at {start}-{end}",
            block.index
        );
        self.planes[plane][start..end].copy_from_slice(&rows[..len]);
        self.stats.applied += 1;
    }

    /// Counts a block that failed before it could be applied.
    pub fn record_failure(&mut self) {
        self.stats.failed += 1;
    }

    pub fn stats(&self) -> AssemblyStats {
        self.stats
    }

    /// The plane buffers, plane 0 first.
    pub fn planes(&self) -> &[Vec<u8>] {
        &self.planes
    }

    /// Consumes the assembler, returning all planes concatenated.
    pub fn into_bitmap(self) -> Vec<u8> {
        self.planes.concat()
    }
}
