//! Error types for the thumbwand crate.

/// Errors that can occur while selecting, masking, or talking to providers.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A seed point lies outside the pixel buffer.
    #[error("point ({x}, {y}) is outside the {width}x{height} buffer")]
    OutOfBounds {
        /// Requested x coordinate.
        x: i32,
        /// Requested y coordinate.
        y: i32,
        /// Buffer width in pixels.
        width: u32,
        /// Buffer height in pixels.
        height: u32,
    },

    /// The similarity threshold was negative or not a number.
    #[error("invalid similarity threshold: {0}")]
    InvalidThreshold(f32),

    /// A brightness or contrast percentage was negative or not a number.
    #[error("invalid adjustment: {0}")]
    InvalidAdjustment(f32),

    /// The mask surface could not be created or the PNG could not be encoded.
    #[error("mask encoding failed: {0}")]
    EncodingFailure(String),

    /// Two images that must share dimensions do not.
    #[error("dimension mismatch: expected {expected:?}, got {actual:?}")]
    DimensionMismatch {
        /// Expected `(width, height)`.
        expected: (u32, u32),
        /// Actual `(width, height)`.
        actual: (u32, u32),
    },

    /// The editor received an event that is not valid in its current state.
    #[error("cannot handle {event} while {state}")]
    InvalidTransition {
        /// Name of the current state.
        state: &'static str,
        /// Name of the rejected event.
        event: &'static str,
    },

    /// A response arrived for a request that has since been superseded.
    #[error("discarding stale response for request #{0}")]
    StaleResponse(u64),

    /// The editor's pixels belong to a different version than the current
    /// one; the current version has to be fetched and loaded first.
    #[error("version #{0} is not loaded")]
    StaleImage(u64),

    /// A `data:` URL could not be decoded.
    #[error("malformed data URL: {0}")]
    InvalidDataUrl(String),

    /// No image has been loaded into the editor.
    #[error("no image loaded")]
    NoImage,

    /// An edit was requested without an active rectangle selection.
    #[error("no rectangle selection to build a mask from")]
    NoSelection,

    /// A prompt was empty after trimming.
    #[error("prompt is required")]
    EmptyPrompt,

    /// A search query was empty after trimming.
    #[error("search query is required")]
    EmptyQuery,

    /// The API key for a provider is not configured.
    #[error("{0} is not set")]
    MissingApiKey(&'static str),

    /// A provider answered with a non-success HTTP status.
    #[error("HTTP {status}: {body}")]
    Http {
        /// HTTP status code.
        status: u16,
        /// Response body, possibly empty.
        body: String,
    },

    /// The request could not reach the provider.
    #[error("transport error: {0}")]
    Transport(String),

    /// The provider refused the content on safety grounds.
    #[error("content rejected by safety filter: {0}")]
    ContentRejected(String),

    /// The provider reported a failure or returned an unusable payload.
    #[error("provider error: {0}")]
    Provider(String),

    /// Model output did not match the expected prompt list schema.
    #[error("failed to parse enhanced prompts: {0}")]
    PromptParse(String),

    /// The configuration file could not be read or parsed.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// An I/O error occurred while reading or writing files.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// An error occurred while decoding or encoding an image.
    #[error("image processing error: {0}")]
    Image(#[from] image::ImageError),

    /// A JSON payload could not be (de)serialized.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// A specialized `Result` type for this crate.
pub type Result<T> = std::result::Result<T, Error>;
