//! Remote synthesis service client
//!
//! One `GET {base}/{language}/{text}?voice=..&speed=..` per sentence. The
//! success body is encoded audio; a failure body is JSON
//! `{"error": "...", "message": "..."}` when the service produced it.

use crate::audio::{decode_bytes, AudioBuffer};
use crate::error::{Error, Result};
use reqwest::{Client, StatusCode, Url};
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};

#[derive(Debug, Deserialize)]
struct ServiceError {
    error: String,
    #[serde(default)]
    message: Option<String>,
}

pub struct RemoteSynthesizer {
    client: Client,
    base_url: Url,
}

impl RemoteSynthesizer {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let base_url = Url::parse(base_url)
            .map_err(|e| Error::remote("InvalidUrl", format!("Invalid remote API URL '{}': {}", base_url, e)))?;
        if base_url.cannot_be_a_base() {
            return Err(Error::remote("InvalidUrl", format!("Remote API URL '{}' cannot be a base", base_url)));
        }

        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("voicepack-speak/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Error::remote("NetworkError", format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { client, base_url })
    }

    /// Request URL for one sentence; the text becomes a single escaped
    /// path segment
    pub fn request_url(&self, language: &str, voice: &str, speed: f32, text: &str) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().push(language).push(text);
        }
        url.query_pairs_mut()
            .append_pair("voice", voice)
            .append_pair("speed", &speed.to_string());
        url
    }

    pub async fn synthesize(&self, language: &str, voice: &str, speed: f32, text: &str) -> Result<AudioBuffer> {
        let url = self.request_url(language, voice, speed, text);
        debug!("Remote synthesis request: {}", url);

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| Error::remote("NetworkError", e.to_string()))?;

        let status = response.status();
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        let body = response
            .bytes()
            .await
            .map_err(|e| Error::remote("NetworkError", e.to_string()))?;

        if !status.is_success() {
            let error = parse_error_body(status, &body);
            warn!("Remote synthesis failed: {}", error);
            return Err(error);
        }

        decode_bytes(&body, content_type.as_deref().and_then(extension_hint))
    }
}

/// Error for a non-success response
///
/// The service's `error` field becomes the code; any other body yields
/// `HTTP_<status>`.
pub fn parse_error_body(status: StatusCode, body: &[u8]) -> Error {
    match serde_json::from_slice::<ServiceError>(body) {
        Ok(parsed) => {
            let message = parsed.message.unwrap_or_else(|| parsed.error.clone());
            Error::remote(parsed.error, message)
        }
        Err(_) => {
            let text = String::from_utf8_lossy(body);
            let message = if text.trim().is_empty() {
                status.to_string()
            } else {
                text.trim().to_string()
            };
            Error::remote(format!("HTTP_{}", status.as_u16()), message)
        }
    }
}

fn extension_hint(content_type: &str) -> Option<&'static str> {
    let mime = content_type.split(';').next().unwrap_or_default().trim();
    match mime {
        "audio/mpeg" | "audio/mp3" => Some("mp3"),
        "audio/wav" | "audio/wave" | "audio/x-wav" => Some("wav"),
        "audio/ogg" | "audio/vorbis" => Some("ogg"),
        "audio/flac" | "audio/x-flac" => Some("flac"),
        "audio/mp4" | "audio/aac" => Some("m4a"),
        _ => None,
    }
}
