//! Blocking clients for the external image, text and search services.
//!
//! Request payloads and response parsing are plain functions so they can be
//! exercised without a network; the client structs only add transport.

pub mod config;
pub mod fetch;
pub mod gemini;
mod http;
pub mod replicate;
pub mod serpapi;

pub use config::ClientConfig;
pub use fetch::fetch_image;
pub use gemini::{parse_enhanced_prompts, EnhanceResponse, EnhancedPrompt, GeminiClient};
pub use replicate::{EditConfig, EditRequest, GenerationResponse, ReplicateClient};
pub use serpapi::{SearchClient, SearchResponse, Video};
