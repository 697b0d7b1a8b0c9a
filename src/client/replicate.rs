//! Text-to-image generation and masked inpainting via Replicate.

use std::thread;
use std::time::Duration;

use serde::Serialize;
use serde_json::{json, Value};

use super::config::{require_key, ClientConfig, REPLICATE_KEY_VAR};
use super::http::send_json;
use crate::error::{Error, Result};
use crate::mask::MaskArtifact;

/// Words stripped from prompts before submission (whole words, any case).
const BLOCKED_WORDS: [&str; 4] = ["nsfw", "nude", "naked", "explicit"];

/// Prefix steering the model towards safe output.
const SAFE_PREFIX: &str = "safe for work, family friendly, ";

/// Message shown when the provider's safety filter rejects a request.
pub const CONTENT_REJECTED_MESSAGE: &str = "The requested image couldn't be generated due to content safety restrictions. Please try a different prompt.";

/// Inputs for a masked edit.
#[derive(Debug, Clone)]
pub struct EditRequest {
    /// The source image, as a provider URL or `data:` URL.
    pub image_url: String,
    /// What to paint into the masked region.
    pub prompt: String,
    /// White-on-black mask of the region to repaint.
    pub mask: MaskArtifact,
}

/// Tuning knobs for inpainting.
#[derive(Debug, Clone, PartialEq)]
pub struct EditConfig {
    /// Output width.
    pub width: u32,
    /// Output height.
    pub height: u32,
    /// How strongly the masked region is repainted (0.0-1.0).
    pub inpaint_strength: f32,
    /// Diffusion steps.
    pub num_inference_steps: u32,
    /// Classifier-free guidance scale.
    pub guidance_scale: f32,
    /// Provider safety tolerance (1 is strictest).
    pub safety_tolerance: u8,
}

impl EditConfig {
    /// Defaults sized from `config`.
    #[must_use]
    pub fn from_client(config: &ClientConfig) -> Self {
        Self {
            width: config.output_width,
            height: config.output_height,
            ..Self::default()
        }
    }
}

impl Default for EditConfig {
    fn default() -> Self {
        Self {
            width: crate::buffer::CANVAS_WIDTH,
            height: crate::buffer::CANVAS_HEIGHT,
            inpaint_strength: 0.8,
            num_inference_steps: 50,
            guidance_scale: 7.5,
            safety_tolerance: 1,
        }
    }
}

/// Response body handed back to a front end after a generation or edit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GenerationResponse {
    /// Whether an image was produced.
    pub success: bool,
    /// URL of the produced image.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
    /// User-facing failure message.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl GenerationResponse {
    /// Map a client result to an HTTP status and body.
    ///
    /// Safety rejections are a 400 with a fixed message; every other failure
    /// is a 500 carrying the error text.
    #[must_use]
    pub fn from_result(result: &Result<String>) -> (u16, Self) {
        match result {
            Ok(url) => (
                200,
                Self {
                    success: true,
                    output: Some(url.clone()),
                    error: None,
                },
            ),
            Err(Error::ContentRejected(_)) => (
                400,
                Self {
                    success: false,
                    output: None,
                    error: Some(CONTENT_REJECTED_MESSAGE.to_string()),
                },
            ),
            Err(e) => (
                500,
                Self {
                    success: false,
                    output: None,
                    error: Some(e.to_string()),
                },
            ),
        }
    }
}

/// Remove blocked words from a prompt.
///
/// Words are runs of ASCII letters, digits and underscores; only exact
/// (case-insensitive) matches are removed, surrounding text is kept as is.
#[must_use]
pub fn sanitize_prompt(prompt: &str) -> String {
    let is_word = |c: char| c.is_ascii_alphanumeric() || c == '_';
    let mut out = String::with_capacity(prompt.len());
    let mut rest = prompt;
    while let Some(first) = rest.chars().next() {
        let in_word = is_word(first);
        let end = rest.find(|c| is_word(c) != in_word).unwrap_or(rest.len());
        let (run, tail) = rest.split_at(end);
        if !(in_word && BLOCKED_WORDS.iter().any(|w| run.eq_ignore_ascii_case(w))) {
            out.push_str(run);
        }
        rest = tail;
    }
    out
}

/// The prompt actually sent to the model.
#[must_use]
pub fn safe_prompt(prompt: &str) -> String {
    format!("{SAFE_PREFIX}{}", sanitize_prompt(prompt))
}

/// Model input for text-to-image generation.
#[must_use]
pub fn generation_input(prompt: &str, width: u32, height: u32) -> Value {
    json!({
        "prompt": safe_prompt(prompt),
        "aspect_ratio": "custom",
        "width": width,
        "height": height,
        "output_format": "png",
        "output_quality": 100,
        "safety_tolerance": 1,
        "prompt_upsampling": true,
    })
}

/// Model input for a masked inpainting edit.
#[must_use]
pub fn edit_input(request: &EditRequest, config: &EditConfig) -> Value {
    json!({
        "prompt": safe_prompt(&request.prompt),
        "image_prompt": request.image_url,
        "mask": request.mask.to_data_url(),
        "aspect_ratio": "custom",
        "width": config.width,
        "height": config.height,
        "output_format": "png",
        "output_quality": 100,
        "safety_tolerance": config.safety_tolerance,
        "prompt_upsampling": true,
        "mode": "inpaint",
        "inpaint_strength": config.inpaint_strength,
        "num_inference_steps": config.num_inference_steps,
        "guidance_scale": config.guidance_scale,
        "seed": -1,
    })
}

/// Interpret a prediction object.
///
/// Returns `Ok(Some(url))` once succeeded, `Ok(None)` while still running.
///
/// # Errors
///
/// Failed or canceled predictions, and successful ones without usable
/// output, are errors. Safety rejections become [`Error::ContentRejected`].
pub fn prediction_output(prediction: &Value) -> Result<Option<String>> {
    let status = prediction
        .get("status")
        .and_then(Value::as_str)
        .unwrap_or("succeeded");
    match status {
        "starting" | "processing" => Ok(None),
        "succeeded" => extract_output(prediction.get("output")).map(Some),
        other => {
            let message = prediction
                .get("error")
                .and_then(Value::as_str)
                .map_or_else(|| format!("prediction {other}"), str::to_string);
            Err(classify(Error::Provider(message)))
        }
    }
}

/// First image URL from a prediction `output`, which may be a string or an
/// array of strings.
fn extract_output(output: Option<&Value>) -> Result<String> {
    let url = match output {
        Some(Value::String(s)) => Some(s.as_str()),
        Some(Value::Array(items)) => items.first().and_then(Value::as_str),
        _ => None,
    };
    url.filter(|u| !u.is_empty())
        .map(str::to_string)
        .ok_or_else(|| Error::Provider("No output received from the model".to_string()))
}

/// Turn provider errors that mention NSFW content into safety rejections.
fn classify(err: Error) -> Error {
    let flagged = match &err {
        Error::Provider(m) | Error::Http { body: m, .. } => m.to_lowercase().contains("nsfw"),
        _ => false,
    };
    match err {
        Error::Provider(m) | Error::Http { body: m, .. } if flagged => Error::ContentRejected(m),
        other => other,
    }
}

/// Blocking Replicate client.
pub struct ReplicateClient {
    config: ClientConfig,
    agent: ureq::Agent,
}

impl ReplicateClient {
    /// Create a client; the API key is checked on first use.
    #[must_use]
    pub fn new(config: ClientConfig) -> Self {
        let agent = config.agent();
        Self { config, agent }
    }

    /// Generate a new image from `prompt` and return its URL.
    ///
    /// # Errors
    ///
    /// Returns [`Error::EmptyPrompt`], [`Error::MissingApiKey`], transport
    /// and provider errors, or [`Error::ContentRejected`].
    pub fn generate(&self, prompt: &str) -> Result<String> {
        if prompt.trim().is_empty() {
            return Err(Error::EmptyPrompt);
        }
        log::info!("generating image for prompt {prompt:?}");
        let input = generation_input(prompt, self.config.output_width, self.config.output_height);
        self.run(&input)
    }

    /// Repaint the masked region of an image and return the new image URL.
    ///
    /// # Errors
    ///
    /// Same as [`generate`](Self::generate).
    pub fn edit(&self, request: &EditRequest, config: &EditConfig) -> Result<String> {
        if request.prompt.trim().is_empty() {
            return Err(Error::EmptyPrompt);
        }
        log::info!(
            "editing image with {}x{} mask, prompt {:?}",
            request.mask.width,
            request.mask.height,
            request.prompt
        );
        self.run(&edit_input(request, config))
    }

    /// Create a prediction and wait for it to finish.
    fn run(&self, input: &Value) -> Result<String> {
        let key = require_key(self.config.replicate_api_key.as_deref(), REPLICATE_KEY_VAR)?;
        let auth = format!("Bearer {key}");
        let url = format!(
            "{}/models/{}/predictions",
            self.config.replicate_base_url.trim_end_matches('/'),
            self.config.replicate_model
        );

        let request = self
            .agent
            .post(&url)
            .set("Authorization", &auth)
            .set("Prefer", "wait");
        let mut prediction =
            send_json(request, Some(&json!({ "input": input }))).map_err(classify)?;

        for attempt in 0..=self.config.max_polls {
            if let Some(output) = prediction_output(&prediction)? {
                log::info!("prediction finished: {output}");
                return Ok(output);
            }
            if attempt == self.config.max_polls {
                break;
            }
            let Some(poll_url) = prediction
                .pointer("/urls/get")
                .and_then(Value::as_str)
                .map(str::to_string)
            else {
                return Err(Error::Provider(
                    "pending prediction has no status URL".to_string(),
                ));
            };
            thread::sleep(Duration::from_millis(self.config.poll_interval_ms));
            log::debug!("polling prediction (attempt {})", attempt + 1);
            let request = self.agent.get(&poll_url).set("Authorization", &auth);
            prediction = send_json(request, None).map_err(classify)?;
        }

        Err(Error::Provider(format!(
            "prediction did not finish after {} polls",
            self.config.max_polls
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mask::render_mask;
    use crate::selection::Rectangle;

    #[test]
    fn sanitize_removes_whole_blocked_words_only() {
        assert_eq!(sanitize_prompt("a NSFW cat, Nude-ish"), "a  cat, -ish");
        assert_eq!(sanitize_prompt("explicitly nudes"), "explicitly nudes");
        assert_eq!(sanitize_prompt("naked_truth naked"), "naked_truth ");
        assert_eq!(sanitize_prompt("café naked!"), "café !");
        assert_eq!(sanitize_prompt(""), "");
    }

    #[test]
    fn safe_prompt_adds_prefix() {
        assert_eq!(
            safe_prompt("a red car"),
            "safe for work, family friendly, a red car"
        );
    }

    #[test]
    fn generation_input_requests_canvas_sized_png() {
        let input = generation_input("sunset", 1280, 720);
        assert_eq!(input["width"], 1280);
        assert_eq!(input["height"], 720);
        assert_eq!(input["aspect_ratio"], "custom");
        assert_eq!(input["output_format"], "png");
        assert!(input.get("mode").is_none());
    }

    #[test]
    fn edit_input_carries_mask_and_inpaint_settings() {
        let request = EditRequest {
            image_url: "https://example.com/in.png".to_string(),
            prompt: "add a hat".to_string(),
            mask: render_mask(8, 8, Rectangle::new(1, 1, 2, 2)).unwrap(),
        };
        let input = edit_input(&request, &EditConfig::default());
        assert_eq!(input["mode"], "inpaint");
        assert_eq!(input["image_prompt"], "https://example.com/in.png");
        assert_eq!(input["num_inference_steps"], 50);
        assert_eq!(input["seed"], -1);
        assert!(input["mask"]
            .as_str()
            .unwrap()
            .starts_with("data:image/png;base64,"));
        assert_eq!(input["prompt"], "safe for work, family friendly, add a hat");
    }

    #[test]
    fn prediction_output_handles_each_status() {
        let running = json!({ "status": "processing", "output": null });
        assert_eq!(prediction_output(&running).unwrap(), None);

        let single = json!({ "status": "succeeded", "output": "https://x/1.png" });
        assert_eq!(prediction_output(&single).unwrap().as_deref(), Some("https://x/1.png"));

        let list = json!({ "status": "succeeded", "output": ["https://x/a.png", "https://x/b.png"] });
        assert_eq!(prediction_output(&list).unwrap().as_deref(), Some("https://x/a.png"));

        let empty = json!({ "status": "succeeded", "output": [] });
        assert!(matches!(prediction_output(&empty), Err(Error::Provider(_))));

        let failed = json!({ "status": "failed", "error": "CUDA out of memory" });
        assert!(matches!(prediction_output(&failed), Err(Error::Provider(m)) if m.contains("CUDA")));
    }

    #[test]
    fn nsfw_failures_become_content_rejections() {
        let flagged = json!({ "status": "failed", "error": "NSFW content detected" });
        assert!(matches!(prediction_output(&flagged), Err(Error::ContentRejected(_))));

        let http = classify(Error::Http {
            status: 422,
            body: "nsfw".to_string(),
        });
        assert!(matches!(http, Error::ContentRejected(_)));
    }

    #[test]
    fn response_body_maps_errors_to_statuses() {
        let (status, body) = GenerationResponse::from_result(&Ok("https://x/1.png".to_string()));
        assert_eq!(status, 200);
        assert_eq!(
            serde_json::to_value(&body).unwrap(),
            json!({ "success": true, "output": "https://x/1.png" })
        );

        let (status, body) =
            GenerationResponse::from_result(&Err(Error::ContentRejected("nsfw".to_string())));
        assert_eq!(status, 400);
        assert_eq!(body.error.as_deref(), Some(CONTENT_REJECTED_MESSAGE));

        let (status, body) = GenerationResponse::from_result(&Err(Error::MissingApiKey(REPLICATE_KEY_VAR)));
        assert_eq!(status, 500);
        assert!(!body.success);
        assert_eq!(body.error.as_deref(), Some("REPLICATE_API_KEY is not set"));
    }

    #[test]
    fn generate_without_key_fails_before_network() {
        let client = ReplicateClient::new(ClientConfig::default());
        assert!(matches!(
            client.generate("a castle"),
            Err(Error::MissingApiKey(REPLICATE_KEY_VAR))
        ));
        assert!(matches!(client.generate("   "), Err(Error::EmptyPrompt)));
    }
}
