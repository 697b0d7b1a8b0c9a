//! Pixel buffers at canvas resolution.
//!
//! Every image the editor works on is first fitted to a fixed 1280x720
//! canvas. Selection and masking then operate on that RGBA snapshot.

use std::io::Cursor;
use std::path::Path;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use image::imageops::FilterType;
use image::{DynamicImage, ImageFormat, Rgba, RgbaImage};

use crate::error::{Error, Result};

/// Canvas width in pixels (YouTube thumbnail width).
pub const CANVAS_WIDTH: u32 = 1280;

/// Canvas height in pixels (YouTube thumbnail height).
pub const CANVAS_HEIGHT: u32 = 720;

/// An integer pixel coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Point {
    /// Column, growing to the right.
    pub x: i32,
    /// Row, growing downwards.
    pub y: i32,
}

impl Point {
    /// Create a point.
    #[must_use]
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

/// An RGB triple read from the buffer. Alpha is not part of the sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColorSample {
    /// Red channel.
    pub r: u8,
    /// Green channel.
    pub g: u8,
    /// Blue channel.
    pub b: u8,
}

impl ColorSample {
    /// Squared Euclidean distance in RGB space.
    #[must_use]
    pub fn distance_squared(self, other: Self) -> u32 {
        let dr = i32::from(self.r) - i32::from(other.r);
        let dg = i32::from(self.g) - i32::from(other.g);
        let db = i32::from(self.b) - i32::from(other.b);
        dr.unsigned_abs().pow(2) + dg.unsigned_abs().pow(2) + db.unsigned_abs().pow(2)
    }

    /// Euclidean distance in RGB space.
    #[must_use]
    pub fn distance(self, other: Self) -> f64 {
        f64::from(self.distance_squared(other)).sqrt()
    }
}

impl From<Rgba<u8>> for ColorSample {
    fn from(px: Rgba<u8>) -> Self {
        Self {
            r: px[0],
            g: px[1],
            b: px[2],
        }
    }
}

/// An immutable RGBA8 raster.
#[derive(Debug, Clone, PartialEq)]
pub struct PixelBuffer {
    image: RgbaImage,
}

impl PixelBuffer {
    /// Wrap an existing RGBA image without resizing it.
    #[must_use]
    pub fn new(image: RgbaImage) -> Self {
        Self { image }
    }

    /// A buffer of the given size filled with one colour.
    #[must_use]
    pub fn filled(width: u32, height: u32, color: [u8; 4]) -> Self {
        Self::new(RgbaImage::from_pixel(width, height, Rgba(color)))
    }

    /// Cover-fit an image onto the canvas.
    ///
    /// The image is scaled until it fills 1280x720 on both axes and the
    /// overflow is cropped evenly from both sides, so the aspect ratio is
    /// preserved and no letterboxing appears. The canvas starts opaque black,
    /// which shows through wherever the source is transparent.
    #[must_use]
    pub fn fit_to_canvas(image: &DynamicImage) -> Self {
        let fitted = image
            .resize_to_fill(CANVAS_WIDTH, CANVAS_HEIGHT, FilterType::Triangle)
            .to_rgba8();
        let mut canvas = RgbaImage::from_pixel(CANVAS_WIDTH, CANVAS_HEIGHT, Rgba([0, 0, 0, 255]));
        image::imageops::overlay(&mut canvas, &fitted, 0, 0);
        log::debug!(
            "fitted {}x{} source onto {CANVAS_WIDTH}x{CANVAS_HEIGHT} canvas",
            image.width(),
            image.height()
        );
        Self::new(canvas)
    }

    /// Load an image file and fit it to the canvas.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or decoded.
    pub fn open(path: &Path) -> Result<Self> {
        let img = image::open(path)?;
        Ok(Self::fit_to_canvas(&img))
    }

    /// Decode an in-memory image and fit it to the canvas.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Image`] if the bytes are not a decodable image.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let img = image::load_from_memory(bytes)?;
        Ok(Self::fit_to_canvas(&img))
    }

    /// Decode a base64 `data:` URL, as stored for uploaded versions, and fit
    /// it to the canvas.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidDataUrl`] if the URL is not a base64 `data:`
    /// URL, or [`Error::Image`] if the payload is not a decodable image.
    pub fn from_data_url(url: &str) -> Result<Self> {
        let rest = url
            .strip_prefix("data:")
            .ok_or_else(|| Error::InvalidDataUrl("missing data: scheme".to_string()))?;
        let (meta, payload) = rest
            .split_once(',')
            .ok_or_else(|| Error::InvalidDataUrl("missing ',' separator".to_string()))?;
        if !meta.ends_with(";base64") {
            return Err(Error::InvalidDataUrl(format!("unsupported encoding {meta:?}")));
        }
        let bytes = STANDARD
            .decode(payload.trim())
            .map_err(|e| Error::InvalidDataUrl(e.to_string()))?;
        Self::from_bytes(&bytes)
    }

    /// Buffer width in pixels.
    #[must_use]
    pub fn width(&self) -> u32 {
        self.image.width()
    }

    /// Buffer height in pixels.
    #[must_use]
    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// `(width, height)` of the buffer.
    #[must_use]
    pub fn dimensions(&self) -> (u32, u32) {
        self.image.dimensions()
    }

    /// Whether `point` lies inside `[0, width) x [0, height)`.
    #[must_use]
    pub fn contains(&self, point: Point) -> bool {
        u32::try_from(point.x).is_ok_and(|x| x < self.width())
            && u32::try_from(point.y).is_ok_and(|y| y < self.height())
    }

    /// Read the colour at `point`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::OutOfBounds`] if the point is outside the buffer.
    pub fn sample(&self, point: Point) -> Result<ColorSample> {
        if !self.contains(point) {
            return Err(Error::OutOfBounds {
                x: point.x,
                y: point.y,
                width: self.width(),
                height: self.height(),
            });
        }
        #[allow(clippy::cast_sign_loss)]
        let px = *self.image.get_pixel(point.x as u32, point.y as u32);
        Ok(ColorSample::from(px))
    }

    /// Borrow the underlying image.
    #[must_use]
    pub fn as_image(&self) -> &RgbaImage {
        &self.image
    }

    /// Consume the buffer and return the underlying image.
    #[must_use]
    pub fn into_image(self) -> RgbaImage {
        self.image
    }

    /// Encode the buffer as a PNG `data:` URL.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Image`] if PNG encoding fails.
    pub fn to_data_url(&self) -> Result<String> {
        let mut bytes = Vec::new();
        self.image
            .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)?;
        Ok(png_data_url(&bytes))
    }
}

/// Wrap PNG bytes in a base64 `data:` URL.
#[must_use]
pub fn png_data_url(png: &[u8]) -> String {
    format!("data:image/png;base64,{}", STANDARD.encode(png))
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::Engine as _;

    #[test]
    fn distance_ignores_alpha_and_is_euclidean() {
        let a = ColorSample::from(Rgba([0, 0, 0, 0]));
        let b = ColorSample::from(Rgba([3, 4, 0, 255]));
        assert_eq!(a.distance_squared(b), 25);
        assert!((a.distance(b) - 5.0).abs() < f64::EPSILON);
    }

    #[test]
    fn contains_rejects_negative_and_edge_coordinates() {
        let buf = PixelBuffer::filled(4, 3, [0, 0, 0, 255]);
        assert!(buf.contains(Point::new(0, 0)));
        assert!(buf.contains(Point::new(3, 2)));
        assert!(!buf.contains(Point::new(4, 0)));
        assert!(!buf.contains(Point::new(0, 3)));
        assert!(!buf.contains(Point::new(-1, 0)));
    }

    #[test]
    fn sample_out_of_bounds_is_an_error() {
        let buf = PixelBuffer::filled(4, 3, [9, 8, 7, 255]);
        assert_eq!(
            buf.sample(Point::new(1, 1)).unwrap(),
            ColorSample { r: 9, g: 8, b: 7 }
        );
        assert!(matches!(
            buf.sample(Point::new(4, 1)),
            Err(Error::OutOfBounds { x: 4, y: 1, .. })
        ));
    }

    #[test]
    fn fit_to_canvas_produces_canvas_dimensions() {
        let wide = DynamicImage::ImageRgba8(RgbaImage::from_pixel(400, 100, Rgba([10, 20, 30, 255])));
        let fitted = PixelBuffer::fit_to_canvas(&wide);
        assert_eq!(fitted.dimensions(), (CANVAS_WIDTH, CANVAS_HEIGHT));

        let tall = DynamicImage::ImageRgba8(RgbaImage::from_pixel(90, 300, Rgba([10, 20, 30, 255])));
        let fitted = PixelBuffer::fit_to_canvas(&tall);
        assert_eq!(fitted.dimensions(), (CANVAS_WIDTH, CANVAS_HEIGHT));
        // A uniform source stays uniform after cover-fitting.
        assert_eq!(
            fitted.sample(Point::new(640, 360)).unwrap(),
            ColorSample { r: 10, g: 20, b: 30 }
        );
    }

    #[test]
    fn transparent_source_shows_black_canvas() {
        let clear = DynamicImage::ImageRgba8(RgbaImage::from_pixel(16, 9, Rgba([200, 200, 200, 0])));
        let fitted = PixelBuffer::fit_to_canvas(&clear);
        let px = fitted.as_image().get_pixel(10, 10);
        assert_eq!(px.0, [0, 0, 0, 255]);
    }

    #[test]
    fn data_url_round_trips_through_png() {
        let buf = PixelBuffer::filled(8, 8, [1, 2, 3, 255]);
        let url = buf.to_data_url().unwrap();
        let payload = url.strip_prefix("data:image/png;base64,").unwrap();
        let bytes = STANDARD.decode(payload).unwrap();
        let decoded = image::load_from_memory(&bytes).unwrap().to_rgba8();
        assert_eq!(&decoded, buf.as_image());
    }

    #[test]
    fn data_url_loads_back_onto_canvas() {
        let url = PixelBuffer::filled(8, 8, [1, 2, 3, 255]).to_data_url().unwrap();
        let loaded = PixelBuffer::from_data_url(&url).unwrap();
        assert_eq!(loaded.dimensions(), (CANVAS_WIDTH, CANVAS_HEIGHT));
        assert_eq!(
            loaded.sample(Point::new(0, 0)).unwrap(),
            ColorSample { r: 1, g: 2, b: 3 }
        );
    }

    #[test]
    fn malformed_data_urls_are_rejected() {
        for url in [
            "https://example.com/a.png",
            "data:image/png;base64",
            "data:image/png,plain",
            "data:image/png;base64,@@@",
        ] {
            assert!(
                matches!(PixelBuffer::from_data_url(url), Err(Error::InvalidDataUrl(_))),
                "{url}"
            );
        }
    }
}
