//! Prompt enhancement via Gemini.
//!
//! The model is asked for a JSON array of `{title, prompt}` objects. Its
//! reply is free text, so the first array literal in it is deserialized
//! against that schema; anything that does not fit is rejected outright.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::config::{require_key, ClientConfig, GEMINI_KEY_VAR};
use super::http::send_json;
use crate::error::{Error, Result};

/// One suggested prompt variation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnhancedPrompt {
    /// What this variation emphasizes.
    pub title: String,
    /// The prompt text itself.
    pub prompt: String,
}

/// Response body handed back to a front end.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EnhanceResponse {
    /// Suggested variations.
    pub enhanced_prompts: Vec<EnhancedPrompt>,
}

/// The instruction sent to the model for `prompt`.
#[must_use]
pub fn enhancement_instruction(prompt: &str) -> String {
    format!(
        "As an AI image editing expert, enhance and expand the following prompt to create 3 \
         different variations. Format your response as a JSON array with each option containing \
         a description and the actual prompt. Example format:\n\
         [\n  {{\n    \"title\": \"Description of what this variation emphasizes\",\n    \
         \"prompt\": \"The actual prompt text\"\n  }}\n]\n\n\
         Original prompt: \"{prompt}\""
    )
}

/// The `generateContent` request body for `prompt`.
#[must_use]
pub fn enhancement_request(prompt: &str) -> Value {
    json!({
        "contents": [{
            "parts": [{ "text": enhancement_instruction(prompt) }]
        }]
    })
}

/// Text of the first candidate in a `generateContent` response.
///
/// # Errors
///
/// Returns [`Error::Provider`] if the response has no candidate text.
pub fn reply_text(response: &Value) -> Result<&str> {
    response
        .pointer("/candidates/0/content/parts/0/text")
        .and_then(Value::as_str)
        .ok_or_else(|| Error::Provider("Gemini response has no candidate text".to_string()))
}

/// Parse the first JSON array in `text` as a list of prompt variations.
///
/// Exactly one array value is read starting at the first `[`; trailing prose
/// is ignored. Every element must be an object with non-blank string `title`
/// and `prompt` fields.
///
/// # Errors
///
/// Returns [`Error::PromptParse`] when there is no array, the array is
/// malformed or empty, or an element does not match the schema.
pub fn parse_enhanced_prompts(text: &str) -> Result<Vec<EnhancedPrompt>> {
    let start = text
        .find('[')
        .ok_or_else(|| Error::PromptParse("no JSON array in model output".to_string()))?;

    let mut stream =
        serde_json::Deserializer::from_str(&text[start..]).into_iter::<Vec<EnhancedPrompt>>();
    let prompts = match stream.next() {
        Some(Ok(prompts)) => prompts,
        Some(Err(e)) => return Err(Error::PromptParse(e.to_string())),
        None => return Err(Error::PromptParse("empty model output".to_string())),
    };

    if prompts.is_empty() {
        return Err(Error::PromptParse("model returned no variations".to_string()));
    }
    if let Some(i) = prompts
        .iter()
        .position(|p| p.title.trim().is_empty() || p.prompt.trim().is_empty())
    {
        return Err(Error::PromptParse(format!("variation {i} has a blank field")));
    }
    Ok(prompts)
}

/// Blocking Gemini client.
pub struct GeminiClient {
    config: ClientConfig,
    agent: ureq::Agent,
}

impl GeminiClient {
    /// Create a client; the API key is checked on first use.
    #[must_use]
    pub fn new(config: ClientConfig) -> Self {
        let agent = config.agent();
        Self { config, agent }
    }

    /// Ask the model for variations of `prompt`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::EmptyPrompt`], [`Error::MissingApiKey`], transport
    /// and provider errors, or [`Error::PromptParse`].
    pub fn enhance(&self, prompt: &str) -> Result<Vec<EnhancedPrompt>> {
        if prompt.trim().is_empty() {
            return Err(Error::EmptyPrompt);
        }
        let key = require_key(self.config.gemini_api_key.as_deref(), GEMINI_KEY_VAR)?;
        log::info!("enhancing prompt {prompt:?}");

        let request = self.agent.post(&self.config.gemini_url).query("key", key);
        let response = send_json(request, Some(&enhancement_request(prompt)))?;
        let prompts = parse_enhanced_prompts(reply_text(&response)?)?;
        log::debug!("received {} prompt variations", prompts.len());
        Ok(prompts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_array_surrounded_by_prose() {
        let text = "Sure! Here are some options:\n```json\n[\n  {\"title\": \"Moody\", \"prompt\": \"a dark forest\"},\n  {\"title\": \"Bright\", \"prompt\": \"a sunny meadow\"}\n]\n```\nEnjoy [and good luck].";
        let prompts = parse_enhanced_prompts(text).unwrap();
        assert_eq!(prompts.len(), 2);
        assert_eq!(prompts[1].title, "Bright");
    }

    #[test]
    fn ignores_extra_fields() {
        let text = r#"[{"title":"A","prompt":"b","score":3}]"#;
        assert_eq!(parse_enhanced_prompts(text).unwrap()[0].prompt, "b");
    }

    #[test]
    fn fails_closed_on_bad_output() {
        for text in [
            "no array here",
            "[",
            "[{\"title\": \"A\"}]",
            "[1, 2, 3]",
            "[]",
            "[{\"title\": \" \", \"prompt\": \"x\"}]",
        ] {
            assert!(
                matches!(parse_enhanced_prompts(text), Err(Error::PromptParse(_))),
                "accepted {text:?}"
            );
        }
    }

    #[test]
    fn reply_text_reads_first_candidate() {
        let response = json!({
            "candidates": [{ "content": { "parts": [{ "text": "[]" }] } }]
        });
        assert_eq!(reply_text(&response).unwrap(), "[]");
        assert!(matches!(reply_text(&json!({})), Err(Error::Provider(_))));
    }

    #[test]
    fn request_embeds_original_prompt() {
        let body = enhancement_request("a cat on a roof");
        let text = body["contents"][0]["parts"][0]["text"].as_str().unwrap();
        assert!(text.contains("Original prompt: \"a cat on a roof\""));
        assert!(text.contains("\"title\""));
    }

    #[test]
    fn response_uses_camel_case() {
        let body = EnhanceResponse {
            enhanced_prompts: vec![EnhancedPrompt {
                title: "t".to_string(),
                prompt: "p".to_string(),
            }],
        };
        assert_eq!(
            serde_json::to_value(&body).unwrap(),
            json!({ "enhancedPrompts": [{ "title": "t", "prompt": "p" }] })
        );
    }

    #[test]
    fn enhance_requires_prompt_and_key() {
        let client = GeminiClient::new(ClientConfig::default());
        assert!(matches!(client.enhance(""), Err(Error::EmptyPrompt)));
        assert!(matches!(
            client.enhance("x"),
            Err(Error::MissingApiKey(GEMINI_KEY_VAR))
        ));
    }
}
