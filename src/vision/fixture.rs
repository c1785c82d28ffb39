//! JSON-file vision provider for local runs and tests.
//!
//! Lookups try the file id, then the exact image name, then the lowercase
//! name. Images missing from the fixture get an `other` record with a
//! warning instead of an error, so a partial fixture still renders.

use super::{VisionError, VisionProvider};
use crate::places::fixture::{FixtureError, read_object};
use serde_json::{Map, Value, json};
use std::path::Path;

#[derive(Debug, Default)]
pub struct FixtureVisionProvider {
    images: Map<String, Value>,
}

impl FixtureVisionProvider {
    pub fn from_file(path: &Path) -> Result<Self, FixtureError> {
        let payload = read_object(path)?;
        Self::from_value(&payload)
            .ok_or_else(|| FixtureError::NotAnObject(format!("{} (images)", path.display())))
    }

    /// Build from an in-memory payload, with or without an `images` wrapper.
    pub fn from_value(payload: &Value) -> Option<Self> {
        let images = payload.get("images").unwrap_or(payload).as_object()?;
        Some(Self {
            images: images.clone(),
        })
    }
}

impl VisionProvider for FixtureVisionProvider {
    fn analyze_image(
        &self,
        file_id: &str,
        name: &str,
        _mime_type: &str,
        _bytes: Option<&[u8]>,
    ) -> Result<Value, VisionError> {
        let lowered = name.to_lowercase();
        let hit = [file_id, name, lowered.as_str()]
            .iter()
            .filter_map(|key| self.images.get(*key))
            .find(|entry| entry.is_object());

        Ok(hit.cloned().unwrap_or_else(|| {
            json!({
                "scene_type": "other",
                "observations": [],
                "food_guess": [],
                "ambience_hints": [],
                "bloggable_details": [],
                "warnings": [format!("no vision data for {name}")],
            })
        }))
    }
}
