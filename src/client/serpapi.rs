//! YouTube search via SerpAPI, used to find reference thumbnails.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::config::{require_key, ClientConfig, SERPAPI_KEY_VAR};
use super::http::send_json;
use crate::error::{Error, Result};

/// One video search hit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Video {
    /// Video title.
    pub title: String,
    /// Watch page URL.
    pub link: String,
    /// Static thumbnail URL.
    pub thumbnail: String,
    /// View count as reported by the provider.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub views: Option<String>,
    /// Like count as reported by the provider.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub likes: Option<String>,
}

/// Response body handed back to a front end.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SearchResponse {
    /// Search hits in provider order.
    pub videos: Vec<Video>,
}

#[derive(Deserialize)]
struct RawResults {
    #[serde(default)]
    video_results: Vec<RawVideo>,
}

#[derive(Deserialize)]
struct RawVideo {
    #[serde(default)]
    title: String,
    #[serde(default)]
    link: String,
    thumbnail: Option<RawThumbnail>,
    views: Option<Value>,
    number_of_likes: Option<Value>,
}

#[derive(Deserialize)]
struct RawThumbnail {
    #[serde(rename = "static")]
    static_url: Option<String>,
}

/// Counts arrive as numbers or preformatted strings.
fn count_text(value: Option<Value>) -> Option<String> {
    match value? {
        Value::String(s) => Some(s),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Convert a SerpAPI YouTube response into videos.
///
/// A response without `video_results` is an empty result, not an error.
///
/// # Errors
///
/// Returns [`Error::Provider`] if the payload does not have the expected
/// shape or reports an error.
pub fn parse_search_results(response: Value) -> Result<Vec<Video>> {
    if let Some(message) = response.get("error").and_then(Value::as_str) {
        return Err(Error::Provider(message.to_string()));
    }
    let raw: RawResults = serde_json::from_value(response)
        .map_err(|e| Error::Provider(format!("unexpected search response: {e}")))?;
    Ok(raw
        .video_results
        .into_iter()
        .map(|v| Video {
            title: v.title,
            link: v.link,
            thumbnail: v
                .thumbnail
                .and_then(|t| t.static_url)
                .unwrap_or_default(),
            views: count_text(v.views),
            likes: count_text(v.number_of_likes),
        })
        .collect())
}

/// Blocking SerpAPI client.
pub struct SearchClient {
    config: ClientConfig,
    agent: ureq::Agent,
}

impl SearchClient {
    /// Create a client; the API key is checked on first use.
    #[must_use]
    pub fn new(config: ClientConfig) -> Self {
        let agent = config.agent();
        Self { config, agent }
    }

    /// Search YouTube for `query`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::EmptyQuery`], [`Error::MissingApiKey`], transport
    /// and provider errors.
    pub fn search(&self, query: &str) -> Result<Vec<Video>> {
        let query = query.trim();
        if query.is_empty() {
            return Err(Error::EmptyQuery);
        }
        let key = require_key(self.config.serpapi_key.as_deref(), SERPAPI_KEY_VAR)?;
        log::info!("searching videos for {query:?}");

        let request = self
            .agent
            .get(&self.config.serpapi_url)
            .query("api_key", key)
            .query("engine", "youtube")
            .query("search_query", query);
        let videos = parse_search_results(send_json(request, None)?)?;
        log::debug!("search returned {} videos", videos.len());
        Ok(videos)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn maps_provider_fields() {
        let response = json!({
            "search_metadata": { "status": "Success" },
            "video_results": [
                {
                    "title": "Thumbnail tips",
                    "link": "https://www.youtube.com/watch?v=abc",
                    "thumbnail": { "static": "https://i.ytimg.com/vi/abc/hq720.jpg", "rich": "x.webp" },
                    "views": 12345,
                    "number_of_likes": "1.2K"
                },
                {
                    "title": "No extras",
                    "link": "https://www.youtube.com/watch?v=def",
                    "thumbnail": { "static": "https://i.ytimg.com/vi/def/hq720.jpg" }
                }
            ]
        });
        let videos = parse_search_results(response).unwrap();
        assert_eq!(videos.len(), 2);
        assert_eq!(videos[0].thumbnail, "https://i.ytimg.com/vi/abc/hq720.jpg");
        assert_eq!(videos[0].views.as_deref(), Some("12345"));
        assert_eq!(videos[0].likes.as_deref(), Some("1.2K"));
        assert_eq!(videos[1].views, None);

        let body = serde_json::to_value(SearchResponse { videos }).unwrap();
        assert!(body["videos"][1].get("likes").is_none());
    }

    #[test]
    fn missing_results_is_empty() {
        assert!(parse_search_results(json!({})).unwrap().is_empty());
    }

    #[test]
    fn provider_error_is_surfaced() {
        let err = parse_search_results(json!({ "error": "Invalid API key." })).unwrap_err();
        assert_eq!(err.to_string(), "provider error: Invalid API key.");
    }

    #[test]
    fn search_validates_before_network() {
        let client = SearchClient::new(ClientConfig::default());
        assert!(matches!(client.search("  "), Err(Error::EmptyQuery)));
        assert!(matches!(
            client.search("thumbnails"),
            Err(Error::MissingApiKey(SERPAPI_KEY_VAR))
        ));
    }
}
