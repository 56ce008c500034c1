//! Pixel grids: one contiguous RGB buffer indexed by `(row * width + col) * 3 + channel`.

pub mod compare;
pub mod ppm;

pub use compare::{Mismatch, first_interior_mismatch};
pub use ppm::{read_ppm, write_ppm};

use crate::utils::config::{CHANNELS, MIN_GRID_SIDE};

/// A width x height image of 3-channel byte pixels.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Grid {
    width: usize,
    height: usize,
    pixels: Vec<u8>,
}

impl Grid {
    /// Grid with every pixel set to `rgb`.
    pub fn filled(width: usize, height: usize, rgb: [u8; 3]) -> Self {
        let mut pixels = Vec::with_capacity(width * height * CHANNELS);
        for _ in 0..width * height {
            pixels.extend_from_slice(&rgb);
        }
        Self {
            width,
            height,
            pixels,
        }
    }

    /// Grid whose pixel at (row, col) is `f(row, col)`.
    pub fn from_fn(
        width: usize,
        height: usize,
        mut f: impl FnMut(usize, usize) -> [u8; 3],
    ) -> Self {
        let mut pixels = Vec::with_capacity(width * height * CHANNELS);
        for row in 0..height {
            for col in 0..width {
                pixels.extend_from_slice(&f(row, col));
            }
        }
        Self {
            width,
            height,
            pixels,
        }
    }

    /// Wrap an existing buffer. Returns `None` when the length does not match the dimensions.
    pub fn from_raw(width: usize, height: usize, pixels: Vec<u8>) -> Option<Self> {
        (pixels.len() == width * height * CHANNELS).then_some(Self {
            width,
            height,
            pixels,
        })
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    /// Raw RGB bytes, row-major.
    pub fn as_bytes(&self) -> &[u8] {
        &self.pixels
    }

    /// True when the grid has at least one interior pixel for a 3x3 neighborhood.
    pub fn has_interior(&self) -> bool {
        self.width >= MIN_GRID_SIDE && self.height >= MIN_GRID_SIDE
    }

    /// Interior columns per row (`width - 2`), 0 for degenerate grids.
    pub fn interior_cols(&self) -> usize {
        self.width.saturating_sub(2)
    }

    /// Interior rows (`height - 2`), 0 for degenerate grids.
    pub fn interior_rows(&self) -> usize {
        self.height.saturating_sub(2)
    }

    #[inline]
    fn offset(&self, row: usize, col: usize) -> usize {
        (row * self.width + col) * CHANNELS
    }

    #[inline]
    pub fn channel(&self, row: usize, col: usize, ch: usize) -> u8 {
        self.pixels[self.offset(row, col) + ch]
    }

    pub fn pixel(&self, row: usize, col: usize) -> [u8; 3] {
        let i = self.offset(row, col);
        [self.pixels[i], self.pixels[i + 1], self.pixels[i + 2]]
    }

    pub fn set_pixel(&mut self, row: usize, col: usize, rgb: [u8; 3]) {
        let i = self.offset(row, col);
        self.pixels[i..i + CHANNELS].copy_from_slice(&rgb);
    }

    /// Interior pixels of `row` (columns 1..width-1) as one mutable slice.
    pub fn interior_row_mut(&mut self, row: usize) -> &mut [u8] {
        let start = self.offset(row, 1);
        let len = self.interior_cols() * CHANNELS;
        &mut self.pixels[start..start + len]
    }
}
