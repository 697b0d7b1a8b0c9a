//! Binary inpainting masks.
//!
//! A mask is an opaque two-colour image: black where the source must be kept,
//! white where the inpainting model may repaint. Masks are always encoded as
//! PNG so the two colours survive exactly.

use std::io::Cursor;

use image::{ImageFormat, Rgba, RgbaImage};

use crate::buffer::{png_data_url, PixelBuffer};
use crate::error::{Error, Result};
use crate::selection::{Rectangle, SelectionMask};

/// Unmasked (keep) colour.
pub const MASK_BLACK: Rgba<u8> = Rgba([0, 0, 0, 255]);

/// Masked (repaint) colour.
pub const MASK_WHITE: Rgba<u8> = Rgba([255, 255, 255, 255]);

/// Largest mask side accepted by [`generate_mask`].
pub const MAX_MASK_DIMENSION: u32 = 16_384;

/// Alpha added to selected pixels when previewing a similarity selection.
const HIGHLIGHT_ALPHA_BOOST: u8 = 100;

/// An encoded mask ready to attach to an inpainting request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MaskArtifact {
    /// PNG-encoded mask bytes.
    pub png: Vec<u8>,
    /// Mask width in pixels.
    pub width: u32,
    /// Mask height in pixels.
    pub height: u32,
}

impl MaskArtifact {
    /// The mask as a `data:image/png;base64,...` URL.
    #[must_use]
    pub fn to_data_url(&self) -> String {
        png_data_url(&self.png)
    }

    /// Decode the PNG back into pixels.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Image`] if the bytes are not a valid PNG.
    pub fn decode(&self) -> Result<RgbaImage> {
        Ok(image::load_from_memory_with_format(&self.png, ImageFormat::Png)?.to_rgba8())
    }
}

/// Render the rectangle mask for a `width` x `height` target.
///
/// The whole surface starts black; the normalized rectangle, clipped to the
/// surface, is painted white. An empty rectangle yields an all-black mask.
///
/// # Errors
///
/// Returns [`Error::EncodingFailure`] if a surface of the requested size
/// cannot be created: a zero side, a side above [`MAX_MASK_DIMENSION`], or a
/// failed allocation.
pub fn generate_mask(width: u32, height: u32, rect: Rectangle) -> Result<RgbaImage> {
    if width == 0 || height == 0 || width > MAX_MASK_DIMENSION || height > MAX_MASK_DIMENSION {
        return Err(Error::EncodingFailure(format!(
            "cannot create a {width}x{height} mask surface"
        )));
    }
    let len = (width as usize)
        .checked_mul(height as usize)
        .and_then(|n| n.checked_mul(4))
        .ok_or_else(|| {
            Error::EncodingFailure(format!("mask surface {width}x{height} is too large"))
        })?;

    let mut data: Vec<u8> = Vec::new();
    data.try_reserve_exact(len).map_err(|e| {
        Error::EncodingFailure(format!("cannot allocate {width}x{height} mask surface: {e}"))
    })?;
    data.resize(len, 0);
    let mut surface = RgbaImage::from_raw(width, height, data).ok_or_else(|| {
        Error::EncodingFailure(format!("mask surface {width}x{height} has the wrong size"))
    })?;
    for px in surface.pixels_mut() {
        *px = MASK_BLACK;
    }

    if let Some((x0, y0, x1, y1)) = rect.clip(width, height) {
        for y in y0..y1 {
            for x in x0..x1 {
                surface.put_pixel(x, y, MASK_WHITE);
            }
        }
    }
    Ok(surface)
}

/// Encode a mask surface as PNG.
///
/// # Errors
///
/// Returns [`Error::EncodingFailure`] if the PNG encoder fails.
pub fn encode_mask(surface: &RgbaImage) -> Result<MaskArtifact> {
    let mut png = Vec::new();
    surface
        .write_to(&mut Cursor::new(&mut png), ImageFormat::Png)
        .map_err(|e| Error::EncodingFailure(e.to_string()))?;
    Ok(MaskArtifact {
        png,
        width: surface.width(),
        height: surface.height(),
    })
}

/// Generate and encode the rectangle mask in one step.
///
/// Callers must not submit an edit when this fails.
///
/// # Errors
///
/// Returns [`Error::EncodingFailure`] if the surface cannot be created or
/// encoded.
pub fn render_mask(width: u32, height: u32, rect: Rectangle) -> Result<MaskArtifact> {
    let surface = generate_mask(width, height, rect)?;
    let artifact = encode_mask(&surface)?;
    log::debug!(
        "rendered {width}x{height} mask for {:?} ({} bytes)",
        rect.normalized(),
        artifact.png.len()
    );
    Ok(artifact)
}

/// Preview a similarity selection by raising the alpha of selected pixels.
///
/// # Errors
///
/// Returns [`Error::DimensionMismatch`] if the mask and buffer sizes differ.
pub fn highlight_selection(buffer: &PixelBuffer, mask: &SelectionMask) -> Result<RgbaImage> {
    let expected = buffer.dimensions();
    let actual = (mask.width(), mask.height());
    if expected != actual {
        return Err(Error::DimensionMismatch { expected, actual });
    }
    let mut out = buffer.as_image().clone();
    for (px, &selected) in out.pixels_mut().zip(mask.as_slice()) {
        if selected {
            px[3] = px[3].saturating_add(HIGHLIGHT_ALPHA_BOOST);
        }
    }
    Ok(out)
}
