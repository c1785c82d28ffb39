//! Restaurant lookup and normalization.
//!
//! Stage 2 of the review pipeline. Given the restaurant name parsed from a
//! visit folder, asks a [`PlacesProvider`] for the place and turns whatever
//! it returns into a [`RestaurantInfo`] record.
//!
//! ## Lookup protocol
//!
//! 1. `search_by_name` → a payload carrying `place_id` (or `placeId`).
//! 2. `get_details(place_id)` → name, address, hours, rating, reviews, ...
//! 3. Numeric fields are coerced permissively: `"4.5"` and `4.5` both become
//!    `Some(4.5)`, anything unparsable becomes `None`.
//! 4. Reviews older than the recency window are dropped.
//!
//! Any provider failure at step 1 or 2 yields `found: false`. A successful
//! search followed by a failed details call is *not* reported as partial
//! data; the place is simply treated as not found. Errors never leave
//! [`resolve_restaurant_info`].

pub mod fixture;
pub mod google;

pub use fixture::FixturePlacesProvider;
pub use google::GooglePlacesProvider;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Seconds in a day, used by the recency window.
const DAY_SECONDS: i64 = 24 * 60 * 60;

#[derive(Error, Debug)]
pub enum PlacesError {
    #[error("places provider not configured")]
    NotConfigured,
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Places API error: {0}")]
    Api(String),
}

/// A place-lookup service.
///
/// Payloads are loosely typed JSON so the resolver can apply one set of
/// coercion rules regardless of where the data came from.
pub trait PlacesProvider {
    /// Find a place by name. `Ok(None)` means no match.
    fn search_by_name(&self, restaurant_name: &str) -> Result<Option<Value>, PlacesError>;

    /// Fetch details for a place id found by [`Self::search_by_name`].
    fn get_details(&self, place_id: &str) -> Result<Option<Value>, PlacesError>;
}

/// Provider used when no places source is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoPlaces;

impl PlacesProvider for NoPlaces {
    fn search_by_name(&self, _restaurant_name: &str) -> Result<Option<Value>, PlacesError> {
        Err(PlacesError::NotConfigured)
    }

    fn get_details(&self, _place_id: &str) -> Result<Option<Value>, PlacesError> {
        Err(PlacesError::NotConfigured)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RestaurantReview {
    /// Unix seconds.
    pub time: i64,
    pub rating: f64,
    pub text: String,
    pub relative_time: String,
}

/// Stage 2 output for one visit folder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RestaurantInfo {
    pub found: bool,
    pub place_id: String,
    pub name: String,
    pub address: String,
    pub opening_hours: Vec<String>,
    pub rating: Option<f64>,
    pub user_ratings_total: Option<i64>,
    pub maps_url: String,
    pub website: String,
    /// Provider order, restricted to the recency window.
    pub recent_reviews: Vec<RestaurantReview>,
    pub recent_reviews_cutoff_days: i64,
}

impl RestaurantInfo {
    /// A `found: false` record with every optional field empty.
    pub fn not_found(cutoff_days: i64) -> Self {
        Self {
            found: false,
            place_id: String::new(),
            name: String::new(),
            address: String::new(),
            opening_hours: Vec::new(),
            rating: None,
            user_ratings_total: None,
            maps_url: String::new(),
            website: String::new(),
            recent_reviews: Vec::new(),
            recent_reviews_cutoff_days: cutoff_days,
        }
    }
}

/// Look up a restaurant and normalize the result.
///
/// `now` is the run's wall-clock time in Unix seconds; reviews are kept iff
/// `time >= now - cutoff_days * 86400`.
pub fn resolve_restaurant_info(
    provider: &dyn PlacesProvider,
    restaurant_name: &str,
    cutoff_days: i64,
    now: i64,
) -> RestaurantInfo {
    let found = match provider.search_by_name(restaurant_name) {
        Ok(Some(found)) => found,
        Ok(None) => {
            tracing::debug!(restaurant = restaurant_name, "place not found");
            return RestaurantInfo::not_found(cutoff_days);
        }
        Err(PlacesError::NotConfigured) => return RestaurantInfo::not_found(cutoff_days),
        Err(e) => {
            tracing::warn!(restaurant = restaurant_name, error = %e, "place search failed");
            return RestaurantInfo::not_found(cutoff_days);
        }
    };

    let place_id = ["place_id", "placeId"]
        .iter()
        .find_map(|key| found.get(*key).and_then(as_text))
        .unwrap_or_default();
    if place_id.is_empty() {
        return RestaurantInfo::not_found(cutoff_days);
    }

    let details = match provider.get_details(&place_id) {
        Ok(details) => details.unwrap_or(Value::Null),
        Err(e) => {
            tracing::warn!(
                restaurant = restaurant_name,
                %place_id,
                error = %e,
                "place details failed"
            );
            return RestaurantInfo::not_found(cutoff_days);
        }
    };

    let text_field = |key: &str| details.get(key).and_then(as_text).unwrap_or_default();
    let name = details
        .get("name")
        .and_then(as_text)
        .filter(|n| !n.is_empty())
        .unwrap_or_else(|| restaurant_name.to_string());

    RestaurantInfo {
        found: true,
        place_id,
        name,
        address: text_field("address"),
        opening_hours: details
            .get("opening_hours")
            .map(string_list)
            .unwrap_or_default(),
        rating: details.get("rating").and_then(as_f64),
        user_ratings_total: details.get("user_ratings_total").and_then(as_i64),
        maps_url: text_field("maps_url"),
        website: text_field("website"),
        recent_reviews: filter_recent_reviews(details.get("reviews"), cutoff_days, now),
        recent_reviews_cutoff_days: cutoff_days,
    }
}

/// Keep reviews inside the recency window, preserving provider order.
///
/// The boundary is inclusive. A window shorter than one day keeps nothing.
/// Reviews whose timestamp cannot be read are dropped.
pub fn filter_recent_reviews(
    reviews: Option<&Value>,
    cutoff_days: i64,
    now: i64,
) -> Vec<RestaurantReview> {
    if cutoff_days < 1 {
        return Vec::new();
    }
    let Some(Value::Array(reviews)) = reviews else {
        return Vec::new();
    };

    // Saturates, so an oversized window keeps every review.
    let cutoff = now.saturating_sub(cutoff_days.saturating_mul(DAY_SECONDS));
    reviews
        .iter()
        .filter_map(|review| {
            let time = review.get("time").and_then(as_i64)?;
            if time < cutoff {
                return None;
            }
            Some(RestaurantReview {
                time,
                rating: review.get("rating").and_then(as_f64).unwrap_or(0.0),
                text: review.get("text").and_then(as_text).unwrap_or_default(),
                relative_time: review
                    .get("relative_time")
                    .and_then(as_text)
                    .unwrap_or_default(),
            })
        })
        .collect()
}

/// Scalar JSON value as text. `null`, arrays and objects have no text form.
fn as_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn as_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn as_i64(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => {
            let s = s.trim();
            s.parse::<i64>()
                .ok()
                .or_else(|| s.parse::<f64>().ok().map(|f| f as i64))
        }
        _ => None,
    }
}

fn string_list(value: &Value) -> Vec<String> {
    match value {
        Value::Array(items) => items
            .iter()
            .filter_map(as_text)
            .filter(|s| !s.is_empty())
            .collect(),
        other => as_text(other).into_iter().filter(|s| !s.is_empty()).collect(),
    }
}
