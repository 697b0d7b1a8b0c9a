//! Region selection and inpainting masks for 1280x720 thumbnails.
//!
//! Images are cover-fitted to a fixed canvas, selected either with a
//! similarity ("magic wand") predicate or a dragged rectangle, and turned
//! into a two-colour PNG mask for an inpainting model. Blocking clients for
//! the generation, prompt-enhancement and video-search services round out
//! the editing loop.
//!
//! # Quick Start
//!
//! ```no_run
//! use thumbwand::{render_mask, select_by_similarity, PixelBuffer, Point, Rectangle};
//!
//! let buffer = PixelBuffer::open("photo.jpg".as_ref()).expect("failed to load");
//! let wand = select_by_similarity(&buffer, Point::new(640, 360), 30.0).unwrap();
//! println!("{} pixels match the seed colour", wand.count());
//!
//! let mask = render_mask(buffer.width(), buffer.height(), Rectangle::new(100, 100, 200, 120))
//!     .unwrap();
//! std::fs::write("mask.png", &mask.png).unwrap();
//! ```
//!
//! # Editing session
//!
//! [`Editor`] turns pointer events into selections and prepares edit
//! requests. Only the rectangle selection is ever submitted as a mask; the
//! magic wand selection is for display.
//!
//! ```no_run
//! use thumbwand::client::{ClientConfig, EditConfig, ReplicateClient};
//! use thumbwand::{Editor, PixelBuffer, Point};
//!
//! let mut editor = Editor::new();
//! editor.open(PixelBuffer::open("photo.jpg".as_ref()).unwrap()).unwrap();
//! editor.pointer_down(Point::new(100, 100)).unwrap();
//! editor.pointer_move(Point::new(400, 300)).unwrap();
//! editor.pointer_up().unwrap();
//!
//! let config = ClientConfig::from_env();
//! let client = ReplicateClient::new(config.clone());
//! let (token, request) = editor.begin_edit("a red balloon").unwrap();
//! let result = client.edit(&request, &EditConfig::from_client(&config));
//! let version = editor.finish(token, result).unwrap();
//! println!("new version at {}", version.image_url);
//! ```

#![deny(missing_docs)]

pub mod adjust;
pub mod buffer;
pub mod client;
mod editor;
pub mod error;
pub mod history;
pub mod mask;
pub mod request;
pub mod selection;
pub mod state;

pub use adjust::{apply_adjustments, Adjustments};
pub use buffer::{ColorSample, PixelBuffer, Point, CANVAS_HEIGHT, CANVAS_WIDTH};
pub use editor::Editor;
pub use error::{Error, Result};
pub use history::{Version, VersionHistory};
pub use mask::{
    encode_mask, generate_mask, highlight_selection, render_mask, MaskArtifact, MAX_MASK_DIMENSION,
};
pub use request::{RequestKind, RequestToken, RequestTracker};
pub use selection::{
    select_by_rectangle, select_by_similarity, Rectangle, SelectionMask, DEFAULT_THRESHOLD,
};
pub use state::{EditorState, Event, StateMachine, Tool};
