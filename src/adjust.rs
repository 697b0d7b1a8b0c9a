//! Brightness / contrast adjustments with CSS filter semantics.

use image::RgbaImage;

use crate::error::{Error, Result};

/// Per-version display adjustments.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Adjustments {
    /// Brightness in percent; 100 leaves the image unchanged.
    pub brightness: f32,
    /// Contrast in percent; 100 leaves the image unchanged.
    pub contrast: f32,
    /// Pan offset applied by the move tool, in canvas pixels.
    pub offset: (i32, i32),
}

impl Default for Adjustments {
    fn default() -> Self {
        Self {
            brightness: 100.0,
            contrast: 100.0,
            offset: (0, 0),
        }
    }
}

impl Adjustments {
    /// Check that a brightness or contrast percentage is usable.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidAdjustment`] for negative or non-finite values.
    pub fn validate_percent(value: f32) -> Result<f32> {
        if value.is_finite() && value >= 0.0 {
            Ok(value)
        } else {
            Err(Error::InvalidAdjustment(value))
        }
    }

    /// Whether applying these adjustments would change any pixel value.
    #[must_use]
    pub fn is_identity(&self) -> bool {
        #[allow(clippy::float_cmp)]
        {
            self.brightness == 100.0 && self.contrast == 100.0
        }
    }
}

/// Apply brightness then contrast to the RGB channels in place.
///
/// Brightness scales each channel by `brightness / 100`. Contrast maps a
/// channel `c` to `(c - 127.5) * contrast / 100 + 127.5`. Each step clamps to
/// `[0, 255]` before the next one runs, as chained CSS filters do; alpha is
/// untouched. The pan offset does not alter pixels.
pub fn apply_adjustments(image: &mut RgbaImage, adjustments: &Adjustments) {
    if adjustments.is_identity() {
        return;
    }
    let brightness = adjustments.brightness.max(0.0) / 100.0;
    let contrast = adjustments.contrast.max(0.0) / 100.0;

    // Every channel value maps the same way, so precompute the table.
    let mut lut = [0u8; 256];
    for (value, out) in lut.iter_mut().enumerate() {
        #[allow(clippy::cast_precision_loss)]
        let c = (value as f32 * brightness).clamp(0.0, 255.0);
        let c = (c - 127.5) * contrast + 127.5;
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        {
            *out = c.round().clamp(0.0, 255.0) as u8;
        }
    }

    for px in image.pixels_mut() {
        for ch in 0..3 {
            px[ch] = lut[px[ch] as usize];
        }
    }
}
