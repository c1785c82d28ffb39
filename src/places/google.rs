//! Google Places (legacy web service) provider.
//!
//! Uses two endpoints: *Find Place* to resolve a name to a place id, and
//! *Place Details* for the rest. Details responses are reshaped into the
//! field names the resolver expects, so the resolver never sees
//! Google-specific keys.

use super::{PlacesError, PlacesProvider};
use reqwest::blocking::Client;
use serde_json::{Map, Value, json};
use std::time::Duration;

const FIND_PLACE_URL: &str = "https://maps.googleapis.com/maps/api/place/findplacefromtext/json";
const DETAILS_URL: &str = "https://maps.googleapis.com/maps/api/place/details/json";
const DETAIL_FIELDS: &str =
    "place_id,name,formatted_address,opening_hours,rating,user_ratings_total,url,website,reviews";
const LANGUAGE: &str = "ko";

pub struct GooglePlacesProvider {
    client: Client,
    api_key: String,
}

impl GooglePlacesProvider {
    pub fn new(api_key: impl Into<String>, timeout: Duration) -> Result<Self, PlacesError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            api_key: api_key.into(),
        })
    }

    fn get(&self, url: &str, params: &[(&str, &str)]) -> Result<Value, PlacesError> {
        let response = self
            .client
            .get(url)
            .query(params)
            .query(&[("key", self.api_key.as_str())])
            .send()?
            .error_for_status()?;
        Ok(response.json()?)
    }
}

/// Fail on any status other than `OK` / `ZERO_RESULTS`.
fn check_status(body: &Value) -> Result<bool, PlacesError> {
    match body.get("status").and_then(Value::as_str).unwrap_or("") {
        "OK" => Ok(true),
        "ZERO_RESULTS" | "NOT_FOUND" => Ok(false),
        other => {
            let message = body
                .get("error_message")
                .and_then(Value::as_str)
                .unwrap_or("");
            Err(PlacesError::Api(format!("status {other} {message}").trim().to_string()))
        }
    }
}

/// Extract the first candidate's place id from a Find Place response.
pub(crate) fn parse_search_response(body: &Value) -> Result<Option<Value>, PlacesError> {
    if !check_status(body)? {
        return Ok(None);
    }
    Ok(body
        .get("candidates")
        .and_then(Value::as_array)
        .and_then(|candidates| candidates.first())
        .and_then(|first| first.get("place_id"))
        .map(|place_id| json!({ "place_id": place_id })))
}

/// Reshape a Place Details response into the resolver's field names.
pub(crate) fn parse_details_response(body: &Value) -> Result<Option<Value>, PlacesError> {
    if !check_status(body)? {
        return Ok(None);
    }
    let Some(result) = body.get("result") else {
        return Ok(None);
    };

    let mut details = Map::new();
    let mut copy = |from: &str, to: &str| {
        if let Some(value) = result.get(from) {
            details.insert(to.to_string(), value.clone());
        }
    };
    copy("name", "name");
    copy("formatted_address", "address");
    copy("rating", "rating");
    copy("user_ratings_total", "user_ratings_total");
    copy("url", "maps_url");
    copy("website", "website");

    if let Some(hours) = result.pointer("/opening_hours/weekday_text") {
        details.insert("opening_hours".into(), hours.clone());
    }

    let reviews: Vec<Value> = result
        .get("reviews")
        .and_then(Value::as_array)
        .map(|reviews| {
            reviews
                .iter()
                .map(|r| {
                    json!({
                        "time": r.get("time").cloned().unwrap_or(Value::Null),
                        "rating": r.get("rating").cloned().unwrap_or(Value::Null),
                        "text": r.get("text").cloned().unwrap_or(Value::Null),
                        "relative_time": r
                            .get("relative_time_description")
                            .cloned()
                            .unwrap_or(Value::Null),
                    })
                })
                .collect()
        })
        .unwrap_or_default();
    details.insert("reviews".into(), Value::Array(reviews));

    Ok(Some(Value::Object(details)))
}

impl PlacesProvider for GooglePlacesProvider {
    fn search_by_name(&self, restaurant_name: &str) -> Result<Option<Value>, PlacesError> {
        let body = self.get(
            FIND_PLACE_URL,
            &[
                ("input", restaurant_name),
                ("inputtype", "textquery"),
                ("fields", "place_id"),
                ("language", LANGUAGE),
            ],
        )?;
        parse_search_response(&body)
    }

    fn get_details(&self, place_id: &str) -> Result<Option<Value>, PlacesError> {
        let body = self.get(
            DETAILS_URL,
            &[
                ("place_id", place_id),
                ("fields", DETAIL_FIELDS),
                ("language", LANGUAGE),
                ("reviews_sort", "newest"),
            ],
        )?;
        parse_details_response(&body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn search_takes_first_candidate() {
        let body = json!({
            "status": "OK",
            "candidates": [{"place_id": "first"}, {"place_id": "second"}]
        });
        assert_eq!(
            parse_search_response(&body).unwrap(),
            Some(json!({"place_id": "first"}))
        );
    }

    #[test]
    fn zero_results_is_none() {
        let body = json!({"status": "ZERO_RESULTS", "candidates": []});
        assert_eq!(parse_search_response(&body).unwrap(), None);
    }

    #[test]
    fn denied_request_is_error() {
        let body = json!({"status": "REQUEST_DENIED", "error_message": "bad key"});
        let err = parse_search_response(&body).unwrap_err();
        assert_eq!(err.to_string(), "Places API error: status REQUEST_DENIED bad key");
    }

    #[test]
    fn details_are_reshaped() {
        let body = json!({
            "status": "OK",
            "result": {
                "name": "스시로쿠",
                "formatted_address": "서울 강남구",
                "opening_hours": {"weekday_text": ["월요일: 11:00~21:00"]},
                "rating": 4.4,
                "user_ratings_total": 88,
                "url": "https://maps.google.com/?cid=1",
                "reviews": [{
                    "time": 1771000000,
                    "rating": 5,
                    "text": "맛있어요",
                    "relative_time_description": "1주 전"
                }]
            }
        });
        let details = parse_details_response(&body).unwrap().unwrap();
        assert_eq!(details["address"], "서울 강남구");
        assert_eq!(details["opening_hours"][0], "월요일: 11:00~21:00");
        assert_eq!(details["maps_url"], "https://maps.google.com/?cid=1");
        assert_eq!(details["reviews"][0]["relative_time"], "1주 전");
        assert!(details.get("website").is_none());
    }

    #[test]
    fn details_without_reviews_has_empty_list() {
        let body = json!({"status": "OK", "result": {"name": "X"}});
        let details = parse_details_response(&body).unwrap().unwrap();
        assert_eq!(details["reviews"], json!([]));
    }
}
