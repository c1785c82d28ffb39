//! Per-image scene analysis.
//!
//! Stage 3 of the review pipeline. Every image in a manifest is sent to a
//! [`VisionProvider`] and the loosely typed answer is normalized into a
//! [`VisionAnalysis`]. A failure on one image never aborts the batch: the
//! result for that image carries a diagnostic string instead of an analysis.
//!
//! ## Normalization
//!
//! | Field | Rule |
//! |-------|------|
//! | `scene_type` | lowercased, must be one of [`SceneType`], else `other` |
//! | list fields | arrays keep non-blank scalars as strings; a lone scalar becomes a one-item list; missing → empty |
//! | `warnings` | if still empty, a fallback warning naming the image is added |

pub mod fixture;
pub mod gemini;

pub use fixture::FixtureVisionProvider;
pub use gemini::GeminiVisionProvider;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum VisionError {
    #[error("vision provider not configured")]
    NotConfigured,
    #[error("image bytes unavailable for {0}")]
    BytesUnavailable(String),
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("vision API error: {0}")]
    Api(String),
    #[error("could not parse vision response as JSON: {0}")]
    Parse(String),
}

/// An image-analysis service.
pub trait VisionProvider {
    /// Analyze one image. `bytes` is `None` when the download failed.
    fn analyze_image(
        &self,
        file_id: &str,
        name: &str,
        mime_type: &str,
        bytes: Option<&[u8]>,
    ) -> Result<Value, VisionError>;
}

/// Provider used when no vision source is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoVision;

impl VisionProvider for NoVision {
    fn analyze_image(
        &self,
        _file_id: &str,
        _name: &str,
        _mime_type: &str,
        _bytes: Option<&[u8]>,
    ) -> Result<Value, VisionError> {
        Err(VisionError::NotConfigured)
    }
}

/// What an image depicts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SceneType {
    Food,
    Menu,
    Interior,
    Exterior,
    Receipt,
    Other,
}

impl SceneType {
    pub fn as_str(self) -> &'static str {
        match self {
            SceneType::Food => "food",
            SceneType::Menu => "menu",
            SceneType::Interior => "interior",
            SceneType::Exterior => "exterior",
            SceneType::Receipt => "receipt",
            SceneType::Other => "other",
        }
    }

    /// Parse a provider label; anything unrecognized is [`SceneType::Other`].
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_lowercase().as_str() {
            "food" => SceneType::Food,
            "menu" => SceneType::Menu,
            "interior" => SceneType::Interior,
            "exterior" => SceneType::Exterior,
            "receipt" => SceneType::Receipt,
            _ => SceneType::Other,
        }
    }
}

impl fmt::Display for SceneType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VisionAnalysis {
    pub scene_type: SceneType,
    pub observations: Vec<String>,
    pub food_guess: Vec<String>,
    pub ambience_hints: Vec<String>,
    pub bloggable_details: Vec<String>,
    pub warnings: Vec<String>,
}

/// Stage 3 output for one image.
///
/// `analysis` is set on success; `raw` holds the diagnostic otherwise.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VisionImageResult {
    pub file_id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub analysis: Option<VisionAnalysis>,
    #[serde(default, rename = "_raw", skip_serializing_if = "Option::is_none")]
    pub raw: Option<String>,
}

/// Analyze one image, absorbing every provider failure into the result.
pub fn analyze_image(
    provider: &dyn VisionProvider,
    file_id: &str,
    name: &str,
    mime_type: &str,
    bytes: Option<&[u8]>,
) -> VisionImageResult {
    let degraded = |raw: String| VisionImageResult {
        file_id: file_id.to_string(),
        name: name.to_string(),
        analysis: None,
        raw: Some(raw),
    };

    match provider.analyze_image(file_id, name, mime_type, bytes) {
        Ok(payload) => VisionImageResult {
            file_id: file_id.to_string(),
            name: name.to_string(),
            analysis: Some(normalize_analysis(&payload, name)),
            raw: None,
        },
        Err(VisionError::NotConfigured) => degraded(VisionError::NotConfigured.to_string()),
        Err(e) => {
            tracing::warn!(image = name, error = %e, "vision analysis failed");
            degraded(format!("vision analyze failed: {e}"))
        }
    }
}

/// Normalize a provider payload into a [`VisionAnalysis`].
pub fn normalize_analysis(payload: &Value, image_name: &str) -> VisionAnalysis {
    let list = |key: &str| payload.get(key).map(string_list).unwrap_or_default();

    let scene_type = payload
        .get("scene_type")
        .and_then(Value::as_str)
        .map(SceneType::from_label)
        .unwrap_or(SceneType::Other);

    let mut warnings = list("warnings");
    if warnings.is_empty() {
        warnings.push(format!("no warnings reported for {image_name}"));
    }

    VisionAnalysis {
        scene_type,
        observations: list("observations"),
        food_guess: list("food_guess"),
        ambience_hints: list("ambience_hints"),
        bloggable_details: list("bloggable_details"),
        warnings,
    }
}

fn scalar_text(value: &Value) -> Option<String> {
    let text = match value {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        _ => return None,
    };
    (!text.is_empty()).then_some(text)
}

fn string_list(value: &Value) -> Vec<String> {
    match value {
        Value::Array(items) => items.iter().filter_map(scalar_text).collect(),
        other => scalar_text(other).into_iter().collect(),
    }
}
