//! Loading version images back into pixel buffers.

use crate::buffer::PixelBuffer;
use crate::client::config::ClientConfig;
use crate::client::http;
use crate::error::Result;

/// Largest image body accepted from a provider URL.
pub const MAX_IMAGE_BYTES: u64 = 32 * 1024 * 1024;

/// Fetch the image behind a version URL and fit it to the canvas.
///
/// `data:` URLs (uploads) are decoded locally; anything else is downloaded
/// with the configured agent.
///
/// # Errors
///
/// Returns [`Error::InvalidDataUrl`](crate::Error::InvalidDataUrl) for a bad
/// `data:` URL, [`Error::Http`](crate::Error::Http) or
/// [`Error::Transport`](crate::Error::Transport) if the download fails, and
/// [`Error::Image`](crate::Error::Image) if the bytes do not decode.
pub fn fetch_image(config: &ClientConfig, url: &str) -> Result<PixelBuffer> {
    if url.starts_with("data:") {
        return PixelBuffer::from_data_url(url);
    }
    let bytes = http::fetch_bytes(config.agent().get(url), MAX_IMAGE_BYTES)?;
    log::info!("fetched {} byte image", bytes.len());
    PixelBuffer::from_bytes(&bytes)
}
