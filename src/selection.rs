//! Similarity ("magic wand") and rectangle selection.
//!
//! The similarity predicate is global: every pixel whose RGB colour lies
//! within the threshold of the seed colour is selected, whether or not it is
//! connected to the seed.

use image::RgbaImage;

use crate::buffer::{ColorSample, Point, PixelBuffer};
use crate::error::{Error, Result};

/// Default similarity threshold, in RGB distance units.
pub const DEFAULT_THRESHOLD: f32 = 30.0;

/// A boolean selection grid with the same dimensions as its source buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectionMask {
    width: u32,
    height: u32,
    cells: Vec<bool>,
}

impl SelectionMask {
    /// A mask with nothing selected.
    #[must_use]
    pub fn empty(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            cells: vec![false; width as usize * height as usize],
        }
    }

    /// A mask covering `rect` after normalization, clipped to the grid.
    #[must_use]
    pub fn from_rectangle(width: u32, height: u32, rect: Rectangle) -> Self {
        let mut mask = Self::empty(width, height);
        if let Some((x0, y0, x1, y1)) = rect.clip(width, height) {
            for y in y0..y1 {
                let row = y as usize * width as usize;
                mask.cells[row + x0 as usize..row + x1 as usize].fill(true);
            }
        }
        mask
    }

    /// Mask width in pixels.
    #[must_use]
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Mask height in pixels.
    #[must_use]
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Whether the pixel at `(x, y)` is selected. Out-of-range is `false`.
    #[must_use]
    pub fn is_selected(&self, x: u32, y: u32) -> bool {
        x < self.width && y < self.height && self.cells[self.index(x, y)]
    }

    /// Number of selected pixels.
    #[must_use]
    pub fn count(&self) -> usize {
        self.cells.iter().filter(|&&c| c).count()
    }

    /// Row-major view of the selection cells.
    #[must_use]
    pub fn as_slice(&self) -> &[bool] {
        &self.cells
    }

    /// Whether every pixel selected here is also selected in `other`.
    #[must_use]
    pub fn is_subset_of(&self, other: &Self) -> bool {
        self.width == other.width
            && self.height == other.height
            && self
                .cells
                .iter()
                .zip(&other.cells)
                .all(|(&a, &b)| !a || b)
    }

    /// Bounding box `(x, y, width, height)` of the selected pixels.
    #[must_use]
    pub fn bounds(&self) -> Option<(u32, u32, u32, u32)> {
        let w = self.width as usize;
        let mut min = (u32::MAX, u32::MAX);
        let mut max = (0u32, 0u32);
        let mut any = false;
        for (i, _) in self.cells.iter().enumerate().filter(|&(_, &c)| c) {
            #[allow(clippy::cast_possible_truncation)]
            let (x, y) = ((i % w) as u32, (i / w) as u32);
            min = (min.0.min(x), min.1.min(y));
            max = (max.0.max(x), max.1.max(y));
            any = true;
        }
        any.then(|| (min.0, min.1, max.0 - min.0 + 1, max.1 - min.1 + 1))
    }

    fn index(&self, x: u32, y: u32) -> usize {
        y as usize * self.width as usize + x as usize
    }
}

/// A rectangle in buffer coordinates. Extents may be negative mid-drag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Rectangle {
    /// Anchor column.
    pub x: i32,
    /// Anchor row.
    pub y: i32,
    /// Signed width.
    pub width: i32,
    /// Signed height.
    pub height: i32,
}

impl Rectangle {
    /// Create a rectangle.
    #[must_use]
    pub const fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Top-left anchored copy with non-negative extents.
    ///
    /// Extents saturate at `i32::MAX`, so a width or height of `i32::MIN`
    /// comes out one pixel short. [`clip`](Self::clip) works in `i64` and is
    /// exact.
    #[must_use]
    pub fn normalized(self) -> Self {
        Self {
            x: self.x.min(self.x.saturating_add(self.width)),
            y: self.y.min(self.y.saturating_add(self.height)),
            width: self.width.saturating_abs(),
            height: self.height.saturating_abs(),
        }
    }

    /// Whether the rectangle covers no pixels.
    #[must_use]
    pub fn is_empty(self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Normalize and intersect with `[0, width) x [0, height)`.
    ///
    /// Returns half-open pixel bounds `(x0, y0, x1, y1)`, or `None` when the
    /// intersection is empty.
    #[must_use]
    pub fn clip(self, width: u32, height: u32) -> Option<(u32, u32, u32, u32)> {
        let span = |origin: i32, extent: i32| {
            let (a, b) = (i64::from(origin), i64::from(origin) + i64::from(extent));
            (a.min(b), a.max(b))
        };
        let (left, right) = span(self.x, self.width);
        let (top, bottom) = span(self.y, self.height);
        let x0 = left.max(0);
        let y0 = top.max(0);
        let x1 = right.min(i64::from(width));
        let y1 = bottom.min(i64::from(height));
        if x0 >= x1 || y0 >= y1 {
            return None;
        }
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        Some((x0 as u32, y0 as u32, x1 as u32, y1 as u32))
    }
}

/// Select every pixel whose colour is within `threshold` of the seed colour.
///
/// Distance is Euclidean over RGB; alpha is ignored. The whole buffer is
/// scanned, so disconnected regions of the same colour are selected too.
///
/// # Errors
///
/// Returns [`Error::OutOfBounds`] if `seed` is outside the buffer and
/// [`Error::InvalidThreshold`] if `threshold` is negative or NaN.
pub fn select_by_similarity(
    buffer: &PixelBuffer,
    seed: Point,
    threshold: f32,
) -> Result<SelectionMask> {
    if threshold.is_nan() || threshold < 0.0 {
        return Err(Error::InvalidThreshold(threshold));
    }
    let target = buffer.sample(seed)?;
    let limit = f64::from(threshold);
    let (width, height) = buffer.dimensions();

    // The seed sample succeeded, so both dimensions are non-zero.
    #[cfg(feature = "parallel")]
    let cells = scan_parallel(buffer.as_image(), target, limit);
    #[cfg(not(feature = "parallel"))]
    let cells = scan_serial(buffer.as_image(), target, limit);

    let mask = SelectionMask {
        width,
        height,
        cells,
    };
    log::debug!(
        "similarity selection at ({}, {}) threshold {threshold}: {} of {} pixels",
        seed.x,
        seed.y,
        mask.count(),
        mask.cells.len()
    );
    Ok(mask)
}

/// Fill one mask row: `cell = dist(pixel, target) <= limit`.
fn scan_row(image: &RgbaImage, target: ColorSample, limit: f64, y: usize, row: &mut [bool]) {
    #[allow(clippy::cast_possible_truncation)]
    let y = y as u32;
    for (x, cell) in row.iter_mut().enumerate() {
        #[allow(clippy::cast_possible_truncation)]
        let px = *image.get_pixel(x as u32, y);
        *cell = target.distance(px.into()) <= limit;
    }
}

#[cfg_attr(feature = "parallel", allow(dead_code))]
fn scan_serial(image: &RgbaImage, target: ColorSample, limit: f64) -> Vec<bool> {
    let row_len = image.width() as usize;
    let mut cells = vec![false; row_len * image.height() as usize];
    for (y, row) in cells.chunks_mut(row_len).enumerate() {
        scan_row(image, target, limit, y, row);
    }
    cells
}

#[cfg(feature = "parallel")]
fn scan_parallel(image: &RgbaImage, target: ColorSample, limit: f64) -> Vec<bool> {
    use rayon::prelude::*;

    let row_len = image.width() as usize;
    let mut cells = vec![false; row_len * image.height() as usize];
    cells
        .par_chunks_mut(row_len)
        .enumerate()
        .for_each(|(y, row)| scan_row(image, target, limit, y, row));
    cells
}

/// The rectangle spanned by a drag from `start` to `current`.
///
/// Extents are signed and left un-normalized so the live drag can be drawn
/// in any direction.
#[must_use]
pub fn select_by_rectangle(start: Point, current: Point) -> Rectangle {
    Rectangle {
        x: start.x,
        y: start.y,
        width: current.x.saturating_sub(start.x),
        height: current.y.saturating_sub(start.y),
    }
}
