//! Gemini vision provider.
//!
//! Sends the image inline (base64) together with the configured instruction
//! prompt and asks for a low-temperature JSON answer. Models do not always
//! honour the JSON response type, so the reply text is parsed permissively:
//!
//! 1. the whole text as JSON
//! 2. the body of a fenced code block (```` ```json ... ``` ````)
//! 3. the substring from the first `{` to the last `}`
//!
//! Only when all three fail is the reply rejected.

use super::{VisionError, VisionProvider};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use regex::Regex;
use reqwest::blocking::Client;
use serde_json::{Value, json};
use std::sync::LazyLock;
use std::time::Duration;

const API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta/models";
const TEMPERATURE: f64 = 0.2;

static FENCED_BLOCK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)```(?:json|JSON)?\s*(.*?)```").expect("fenced block pattern is valid")
});

pub struct GeminiVisionProvider {
    client: Client,
    api_key: String,
    model: String,
    prompt: String,
}

impl GeminiVisionProvider {
    pub fn new(
        api_key: impl Into<String>,
        model: impl Into<String>,
        prompt: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, VisionError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            api_key: api_key.into(),
            model: model.into(),
            prompt: prompt.into(),
        })
    }
}

/// Build the `generateContent` request body.
pub(crate) fn request_body(prompt: &str, mime_type: &str, bytes: &[u8]) -> Value {
    json!({
        "contents": [{
            "role": "user",
            "parts": [
                {"text": prompt},
                {"inline_data": {"mime_type": mime_type, "data": STANDARD.encode(bytes)}}
            ]
        }],
        "generationConfig": {
            "temperature": TEMPERATURE,
            "responseMimeType": "application/json"
        }
    })
}

/// Concatenate the text parts of the first candidate.
pub(crate) fn response_text(body: &Value) -> Result<String, VisionError> {
    if let Some(message) = body.pointer("/error/message").and_then(Value::as_str) {
        return Err(VisionError::Api(message.to_string()));
    }
    let parts = body
        .pointer("/candidates/0/content/parts")
        .and_then(Value::as_array)
        .ok_or_else(|| VisionError::Api("response has no candidates".into()))?;
    let text: String = parts
        .iter()
        .filter_map(|part| part.get("text").and_then(Value::as_str))
        .collect();
    if text.trim().is_empty() {
        return Err(VisionError::Api("response has no text".into()));
    }
    Ok(text)
}

/// Parse model output that should be, or should contain, a JSON object.
pub fn parse_json_loose(text: &str) -> Result<Value, VisionError> {
    let trimmed = text.trim();
    if let Ok(value) = serde_json::from_str::<Value>(trimmed) {
        return Ok(value);
    }

    if let Some(block) = FENCED_BLOCK.captures(trimmed).and_then(|c| c.get(1)) {
        if let Ok(value) = serde_json::from_str::<Value>(block.as_str().trim()) {
            return Ok(value);
        }
    }

    if let (Some(start), Some(end)) = (trimmed.find('{'), trimmed.rfind('}')) {
        if start < end {
            if let Ok(value) = serde_json::from_str::<Value>(&trimmed[start..=end]) {
                return Ok(value);
            }
        }
    }

    let preview: String = trimmed.chars().take(120).collect();
    Err(VisionError::Parse(preview))
}

impl VisionProvider for GeminiVisionProvider {
    fn analyze_image(
        &self,
        _file_id: &str,
        name: &str,
        mime_type: &str,
        bytes: Option<&[u8]>,
    ) -> Result<Value, VisionError> {
        let bytes = bytes.ok_or_else(|| VisionError::BytesUnavailable(name.to_string()))?;

        let url = format!("{API_BASE}/{}:generateContent", self.model);
        let body: Value = self
            .client
            .post(url)
            .header("x-goog-api-key", &self.api_key)
            .json(&request_body(&self.prompt, mime_type, bytes))
            .send()?
            .json()?;

        parse_json_loose(&response_text(&body)?)
    }
}
