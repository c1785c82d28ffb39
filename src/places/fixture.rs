//! JSON-file places provider for local runs and tests.
//!
//! ```json
//! {
//!   "restaurants": {
//!     "스시로쿠": {
//!       "place_id": "p-001",
//!       "address": "서울 강남구 ...",
//!       "opening_hours": ["월: 11:30-21:00"],
//!       "rating": 4.6,
//!       "reviews": [{"time": 1771000000, "rating": 5, "text": "..."}]
//!     }
//!   }
//! }
//! ```
//!
//! The top-level `restaurants` wrapper is optional. Names match
//! case-insensitively after trimming; entries without a `place_id` are
//! ignored.

use super::{PlacesError, PlacesProvider};
use serde_json::{Value, json};
use std::collections::HashMap;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FixtureError {
    #[error("IO error reading {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("JSON error in {path}: {source}")]
    Json {
        path: String,
        source: serde_json::Error,
    },
    #[error("{0} must contain a JSON object")]
    NotAnObject(String),
}

/// Read a fixture file that must hold a JSON object.
pub(crate) fn read_object(path: &Path) -> Result<Value, FixtureError> {
    let display = path.display().to_string();
    let content = std::fs::read_to_string(path).map_err(|source| FixtureError::Io {
        path: display.clone(),
        source,
    })?;
    let payload: Value = serde_json::from_str(&content).map_err(|source| FixtureError::Json {
        path: display.clone(),
        source,
    })?;
    if !payload.is_object() {
        return Err(FixtureError::NotAnObject(display));
    }
    Ok(payload)
}

#[derive(Debug, Default)]
pub struct FixturePlacesProvider {
    by_name: HashMap<String, Value>,
    by_place_id: HashMap<String, Value>,
}

impl FixturePlacesProvider {
    pub fn from_file(path: &Path) -> Result<Self, FixtureError> {
        let payload = read_object(path)?;
        Self::from_value(&payload).ok_or_else(|| {
            FixtureError::NotAnObject(format!("{} (restaurants)", path.display()))
        })
    }

    /// Build from an in-memory payload. `None` if the restaurant map is not an object.
    pub fn from_value(payload: &Value) -> Option<Self> {
        let restaurants = payload.get("restaurants").unwrap_or(payload).as_object()?;

        let mut provider = Self::default();
        for (name, details) in restaurants {
            if !details.is_object() {
                continue;
            }
            let place_id = details
                .get("place_id")
                .and_then(Value::as_str)
                .map(str::trim)
                .unwrap_or_default();
            let key = name.trim().to_lowercase();
            if place_id.is_empty() || key.is_empty() {
                continue;
            }
            provider.by_name.insert(key, details.clone());
            provider
                .by_place_id
                .insert(place_id.to_string(), details.clone());
        }
        Some(provider)
    }
}

impl PlacesProvider for FixturePlacesProvider {
    fn search_by_name(&self, restaurant_name: &str) -> Result<Option<Value>, PlacesError> {
        Ok(self
            .by_name
            .get(&restaurant_name.trim().to_lowercase())
            .and_then(|details| details.get("place_id"))
            .map(|place_id| json!({ "place_id": place_id })))
    }

    fn get_details(&self, place_id: &str) -> Result<Option<Value>, PlacesError> {
        Ok(self.by_place_id.get(place_id).cloned())
    }
}
