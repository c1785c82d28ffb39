//! Prompt and template strings.
//!
//! Every piece of fixed wording the pipeline emits lives in one [`PromptSet`]:
//! the instruction sent to the vision model and the templates the composer
//! fills in. The set is loaded once at startup and passed explicitly to the
//! stages that need it.
//!
//! A prompt file is a flat TOML table that overrides individual strings:
//!
//! ```toml
//! title_template = "{restaurant_name} visit notes"
//! fallback_paragraph = "Written from the photos only."
//! ```
//!
//! Blank values are ignored so an emptied line in the file falls back to the
//! stock wording. Unknown keys are rejected.

use crate::config::merge_toml;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PromptError {
    #[error("IO error reading prompt file {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("prompt file {path}: {source}")]
    Toml {
        path: String,
        source: toml::de::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PromptSet {
    /// Instruction sent with every image to the vision model.
    pub vision_prompt: String,
    /// Document title. Placeholder: `{restaurant_name}`.
    pub title_template: String,
    /// First paragraph. Placeholders: `{visit_date}`, `{image_count}`, `{restaurant_name}`.
    pub intro_template: String,
    /// Scene frequency paragraph. Placeholder: `{scene_text}`.
    pub scene_summary_template: String,
    pub observations_prefix: String,
    pub food_guess_prefix: String,
    /// Placeholders: `{review_count}`, `{summary}`, `{cutoff_days}`, `{restaurant_name}`.
    pub recent_review_template: String,
    /// Appended when nothing but the intro could be written.
    pub fallback_paragraph: String,
    /// Sole info line when the restaurant was not found.
    pub missing_info_line: String,
    pub info_heading: String,
}

impl Default for PromptSet {
    fn default() -> Self {
        Self {
            vision_prompt: concat!(
                "Analyze this restaurant-related image and return ONLY JSON with this schema: ",
                r#"{"scene_type":"food|menu|interior|exterior|receipt|other","#,
                r#""observations":["..."],"food_guess":["... (estimated)"],"#,
                r#""ambience_hints":["..."],"bloggable_details":["..."],"warnings":["..."]}. "#,
                "Keep each list short and factual. ",
                "If uncertain, mention uncertainty in warnings."
            )
            .to_string(),
            title_template: "{restaurant_name} 방문 기록".to_string(),
            intro_template: "{visit_date} 방문 사진 {image_count}장을 기준으로 정리했습니다."
                .to_string(),
            scene_summary_template: "사진에서 확인된 장면은 {scene_text}입니다.".to_string(),
            observations_prefix: "사진 관찰 포인트: ".to_string(),
            food_guess_prefix: "음식 추정: ".to_string(),
            recent_review_template: concat!(
                "최근 {cutoff_days}일 기준 공개 의견 {review_count}건이 확인되며, ",
                "예시로 {summary} 같은 반응이 보입니다."
            )
            .to_string(),
            fallback_paragraph: "사진에서 확인 가능한 범위 안에서만 내용을 구성했습니다."
                .to_string(),
            missing_info_line: "식당 기본 정보는 확인되지 않아 사진 기준으로만 정리했습니다."
                .to_string(),
            info_heading: "기본 정보".to_string(),
        }
    }
}

/// Drop blank string values so they do not shadow the defaults.
fn without_blank_strings(value: toml::Value) -> toml::Value {
    match value {
        toml::Value::Table(table) => toml::Value::Table(
            table
                .into_iter()
                .filter(|(_, v)| !matches!(v, toml::Value::String(s) if s.trim().is_empty()))
                .collect(),
        ),
        other => other,
    }
}

/// Parse prompt overrides from TOML text on top of the stock set.
pub fn parse_prompts(content: &str) -> Result<PromptSet, toml::de::Error> {
    let overlay: toml::Value = toml::from_str(content)?;
    let base = toml::Value::try_from(PromptSet::default())
        .unwrap_or_else(|_| toml::Value::Table(toml::Table::new()));
    merge_toml(base, without_blank_strings(overlay)).try_into()
}

/// Load the prompt set, applying the optional override file.
pub fn load_prompts(path: Option<&Path>) -> Result<PromptSet, PromptError> {
    let Some(path) = path else {
        return Ok(PromptSet::default());
    };
    let display = path.display().to_string();
    let content = fs::read_to_string(path).map_err(|source| PromptError::Io {
        path: display.clone(),
        source,
    })?;
    parse_prompts(&content).map_err(|source| PromptError::Toml {
        path: display,
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn default_prompt_asks_for_six_fields() {
        let prompts = PromptSet::default();
        for field in [
            "scene_type",
            "observations",
            "food_guess",
            "ambience_hints",
            "bloggable_details",
            "warnings",
        ] {
            assert!(prompts.vision_prompt.contains(field), "missing {field}");
        }
    }

    #[test]
    fn no_file_gives_defaults() {
        assert_eq!(load_prompts(None).unwrap(), PromptSet::default());
    }

    #[test]
    fn overrides_single_template() {
        let prompts = parse_prompts(r#"title_template = "{restaurant_name} notes""#).unwrap();
        assert_eq!(prompts.title_template, "{restaurant_name} notes");
        assert_eq!(prompts.info_heading, PromptSet::default().info_heading);
    }

    #[test]
    fn blank_override_keeps_default() {
        let prompts = parse_prompts(r#"fallback_paragraph = "   ""#).unwrap();
        assert_eq!(
            prompts.fallback_paragraph,
            PromptSet::default().fallback_paragraph
        );
    }

    #[test]
    fn unknown_key_rejected() {
        let err = parse_prompts(r#"titel_template = "x""#).unwrap_err();
        assert!(err.to_string().contains("unknown field"));
    }

    #[test]
    fn non_string_value_rejected() {
        assert!(parse_prompts("info_heading = 3").is_err());
    }

    #[test]
    fn load_from_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("prompts.toml");
        fs::write(&path, "info_heading = \"Info\"\n").unwrap();
        let prompts = load_prompts(Some(&path)).unwrap();
        assert_eq!(prompts.info_heading, "Info");
    }

    #[test]
    fn missing_file_is_error() {
        let tmp = TempDir::new().unwrap();
        let result = load_prompts(Some(&tmp.path().join("nope.toml")));
        assert!(matches!(result, Err(PromptError::Io { .. })));
    }
}
