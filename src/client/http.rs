//! Blocking JSON-over-HTTP plumbing shared by the provider clients.

use std::io::Read;

use serde_json::Value;

use crate::error::{Error, Result};

/// Send `request`, with `body` as a JSON payload if given, and parse the
/// JSON response.
///
/// Non-2xx answers become [`Error::Http`] carrying the response body;
/// connection failures become [`Error::Transport`].
pub(crate) fn send_json(request: ureq::Request, body: Option<&Value>) -> Result<Value> {
    let method = request.method().to_string();
    let url = request.url().to_string();
    log::debug!("{method} {}", redact(&url));

    let response = match body {
        Some(payload) => request
            .set("Content-Type", "application/json")
            .set("Accept", "application/json")
            .send_string(&payload.to_string()),
        None => request.set("Accept", "application/json").call(),
    };

    let text = match response {
        Ok(resp) => resp.into_string()?,
        Err(err) => return Err(request_error(err, &method, &url)),
    };

    serde_json::from_str(&text)
        .map_err(|e| Error::Provider(format!("invalid JSON from {}: {e}", redact(&url))))
}

/// GET `request` and return at most `limit` bytes of the body.
///
/// Bodies larger than `limit` are an [`Error::Provider`].
pub(crate) fn fetch_bytes(request: ureq::Request, limit: u64) -> Result<Vec<u8>> {
    let url = request.url().to_string();
    log::debug!("GET {}", redact(&url));

    let response = request.call().map_err(|err| request_error(err, "GET", &url))?;
    let mut bytes = Vec::new();
    response
        .into_reader()
        .take(limit.saturating_add(1))
        .read_to_end(&mut bytes)?;
    if bytes.len() as u64 > limit {
        return Err(Error::Provider(format!(
            "body from {} exceeds {limit} bytes",
            redact(&url)
        )));
    }
    Ok(bytes)
}

fn request_error(err: ureq::Error, method: &str, url: &str) -> Error {
    match err {
        ureq::Error::Status(status, resp) => {
            let body = resp.into_string().unwrap_or_default();
            log::warn!("{method} {} answered {status}", redact(url));
            Error::Http {
                status,
                body: error_message(&body),
            }
        }
        err => Error::Transport(err.to_string()),
    }
}

/// Pull a human-readable message out of a provider error body.
///
/// Looks for `error` (string or `{message}`) and `detail`; falls back to the
/// raw body.
pub(crate) fn error_message(body: &str) -> String {
    let Ok(value) = serde_json::from_str::<Value>(body) else {
        return body.trim().to_string();
    };
    let found = value
        .get("error")
        .and_then(|e| e.as_str().or_else(|| e.get("message").and_then(Value::as_str)))
        .or_else(|| value.get("detail").and_then(Value::as_str));
    found.map_or_else(|| body.trim().to_string(), str::to_string)
}

/// Strip query-string secrets from a URL before logging it.
fn redact(url: &str) -> &str {
    url.split_once('?').map_or(url, |(base, _)| base)
}
