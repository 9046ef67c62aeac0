//! Gemini `generateContent` client.
//!
//! The only stage with network I/O. It sends the instruction prompt and the
//! base64 JPEG as `inline_data`, and hands back the model's free text. Every
//! failure (network, auth, non-2xx, malformed JSON, timeout) comes back as an
//! [`InferenceError`]; nothing here panics or retries.

use crate::config::AppConfig;
use crate::error::InferenceError;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Longest slice of a response body written to the debug log.
const LOG_PREVIEW_CHARS: usize = 500;

/// Thin wrapper over a `reqwest::Client` bound to one model endpoint.
#[derive(Clone)]
pub struct GeminiClient {
    http: reqwest::Client,
    url: String,
    model: String,
    timeout: Duration,
}

impl GeminiClient {
    pub fn new(config: &AppConfig) -> Result<Self, InferenceError> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| InferenceError::Client(e.to_string()))?;

        Ok(Self {
            http,
            url: config.generate_url(),
            model: config.model.clone(),
            timeout: config.request_timeout,
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Send one prompt + image and return the model's reply text.
    pub async fn diagnose(&self, prompt: &str, image_base64: &str) -> Result<String, InferenceError> {
        let payload = request_body(prompt, image_base64);

        info!("📤 Sending request to Gemini ({})", self.model);

        let response = self
            .http
            .post(&self.url)
            .header("Content-Type", "application/json")
            .json(&payload)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = response.status().as_u16();
        let response_text = response
            .text()
            .await
            .map_err(|e| self.transport_error(e))?;

        debug!(
            "Gemini response: status={} body={}",
            status,
            preview(&response_text)
        );

        let text = parse_generate_response(status, &response_text)?;
        info!("✅ Gemini replied with {} chars", text.len());
        Ok(text)
    }

    fn transport_error(&self, e: reqwest::Error) -> InferenceError {
        if e.is_timeout() {
            warn!("Gemini call timed out after {:?}", self.timeout);
            InferenceError::Timeout {
                secs: self.timeout.as_secs(),
            }
        } else {
            // reqwest errors embed the URL, which carries the key.
            InferenceError::Transport(e.without_url().to_string())
        }
    }
}

/// Build the `generateContent` request body.
pub fn request_body(prompt: &str, image_base64: &str) -> Value {
    serde_json::json!({
        "contents": [{
            "parts": [
                { "text": prompt },
                {
                    "inline_data": {
                        "mime_type": "image/jpeg",
                        "data": image_base64
                    }
                }
            ]
        }]
    })
}

/// Interpret a `generateContent` response.
///
/// Success is `candidates[0].content.parts[0].text`; failures carry
/// `error.message` when the API provides one.
pub fn parse_generate_response(status: u16, body: &str) -> Result<String, InferenceError> {
    let success = (200..300).contains(&status);

    let result: Value = match serde_json::from_str(body) {
        Ok(v) => v,
        Err(_) if !success => return Err(InferenceError::Status { status }),
        Err(e) => return Err(InferenceError::MalformedJson(e.to_string())),
    };

    if success {
        if let Some(text) = result["candidates"][0]["content"]["parts"][0]["text"].as_str() {
            return Ok(text.to_string());
        }
    }

    if let Some(message) = result["error"]["message"].as_str() {
        return Err(InferenceError::Api {
            status,
            message: message.to_string(),
        });
    }

    if !success {
        return Err(InferenceError::Status { status });
    }
    Err(InferenceError::NoCandidates)
}

fn preview(body: &str) -> String {
    body.chars().take(LOG_PREVIEW_CHARS).collect()
}
