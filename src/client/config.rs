//! Provider configuration.
//!
//! Values come from built-in defaults, then an optional JSON file, then the
//! environment. API keys are only checked when a client actually needs one.

use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::buffer::{CANVAS_HEIGHT, CANVAS_WIDTH};
use crate::error::{Error, Result};

/// Environment variable holding the Replicate token.
pub const REPLICATE_KEY_VAR: &str = "REPLICATE_API_KEY";
/// Environment variable holding the Gemini key.
pub const GEMINI_KEY_VAR: &str = "GEMINI_API_KEY";
/// Environment variable holding the SerpAPI key.
pub const SERPAPI_KEY_VAR: &str = "SERPAPI_KEY";

/// Settings shared by all provider clients.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Replicate API token.
    pub replicate_api_key: Option<String>,
    /// Gemini API key.
    pub gemini_api_key: Option<String>,
    /// SerpAPI key.
    pub serpapi_key: Option<String>,
    /// Replicate API root.
    pub replicate_base_url: String,
    /// Replicate model used for both generation and inpainting.
    pub replicate_model: String,
    /// Gemini `generateContent` endpoint.
    pub gemini_url: String,
    /// SerpAPI search endpoint.
    pub serpapi_url: String,
    /// Output width requested from the image model.
    pub output_width: u32,
    /// Output height requested from the image model.
    pub output_height: u32,
    /// TCP connect timeout in seconds.
    pub connect_timeout_secs: u64,
    /// Response read timeout in seconds.
    pub read_timeout_secs: u64,
    /// Request write timeout in seconds.
    pub write_timeout_secs: u64,
    /// Delay between prediction status polls, in milliseconds.
    pub poll_interval_ms: u64,
    /// Maximum number of prediction status polls.
    pub max_polls: u32,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            replicate_api_key: None,
            gemini_api_key: None,
            serpapi_key: None,
            replicate_base_url: "https://api.replicate.com/v1".to_string(),
            replicate_model: "black-forest-labs/flux-1.1-pro".to_string(),
            gemini_url: "https://generativelanguage.googleapis.com/v1beta/models/gemini-1.5-flash:generateContent"
                .to_string(),
            serpapi_url: "https://serpapi.com/search.json".to_string(),
            output_width: CANVAS_WIDTH,
            output_height: CANVAS_HEIGHT,
            connect_timeout_secs: 10,
            read_timeout_secs: 120,
            write_timeout_secs: 45,
            poll_interval_ms: 1000,
            max_polls: 120,
        }
    }
}

impl ClientConfig {
    /// Read a JSON configuration file. Missing fields keep their defaults.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        let data = fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("failed to read {}: {e}", path.display())))?;
        serde_json::from_str(&data)
            .map_err(|e| Error::Config(format!("failed to parse {}: {e}", path.display())))
    }

    /// Defaults overlaid with the environment.
    #[must_use]
    pub fn from_env() -> Self {
        Self::default().with_env()
    }

    /// Overlay API keys found in the environment.
    #[must_use]
    pub fn with_env(self) -> Self {
        self.with_env_from(|name| std::env::var(name).ok())
    }

    /// Overlay API keys using `lookup` as the environment.
    #[must_use]
    pub fn with_env_from(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        if let Some(key) = get(REPLICATE_KEY_VAR) {
            self.replicate_api_key = Some(key);
        }
        if let Some(key) = get(GEMINI_KEY_VAR) {
            self.gemini_api_key = Some(key);
        }
        if let Some(key) = get(SERPAPI_KEY_VAR) {
            self.serpapi_key = Some(key);
        }
        self
    }

    /// Build a `ureq` agent with the configured timeouts.
    #[must_use]
    pub fn agent(&self) -> ureq::Agent {
        ureq::AgentBuilder::new()
            .timeout_connect(Duration::from_secs(self.connect_timeout_secs))
            .timeout_read(Duration::from_secs(self.read_timeout_secs))
            .timeout_write(Duration::from_secs(self.write_timeout_secs))
            .build()
    }
}

/// Return the key or a [`Error::MissingApiKey`] naming its variable.
pub(crate) fn require_key<'a>(key: Option<&'a str>, var: &'static str) -> Result<&'a str> {
    key.filter(|k| !k.trim().is_empty())
        .ok_or(Error::MissingApiKey(var))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_keeps_defaults() {
        let cfg: ClientConfig =
            serde_json::from_str(r#"{ "max_polls": 5, "serpapi_key": "abc" }"#).unwrap();
        assert_eq!(cfg.max_polls, 5);
        assert_eq!(cfg.serpapi_key.as_deref(), Some("abc"));
        assert_eq!(cfg.output_width, 1280);
        assert_eq!(cfg.replicate_model, "black-forest-labs/flux-1.1-pro");
    }

    #[test]
    fn environment_overrides_file_values() {
        let cfg = ClientConfig {
            gemini_api_key: Some("from-file".to_string()),
            ..ClientConfig::default()
        }
        .with_env_from(|name| match name {
            GEMINI_KEY_VAR => Some("from-env".to_string()),
            REPLICATE_KEY_VAR => Some("   ".to_string()),
            _ => None,
        });
        assert_eq!(cfg.gemini_api_key.as_deref(), Some("from-env"));
        assert!(cfg.replicate_api_key.is_none());
    }

    #[test]
    fn missing_key_names_the_variable() {
        let err = require_key(None, REPLICATE_KEY_VAR).unwrap_err();
        assert_eq!(err.to_string(), "REPLICATE_API_KEY is not set");
        assert!(require_key(Some(""), GEMINI_KEY_VAR).is_err());
        assert_eq!(require_key(Some("k"), GEMINI_KEY_VAR).unwrap(), "k");
    }

    #[test]
    fn load_reports_unreadable_file() {
        let err = ClientConfig::load(Path::new("/nonexistent/thumbwand.json")).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }
}
