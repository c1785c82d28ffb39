//! Run configuration.
//!
//! Every setting can come from four places, merged per key with this
//! precedence (highest first):
//!
//! ```text
//! command line  →  --output-root out/
//! config file   →  output_root = "out/"          (--config visit-review.toml)
//! environment   →  VISIT_REVIEW_OUTPUT_ROOT=out/
//! stock default
//! ```
//!
//! Each source is read into a sparse [`ConfigLayer`]; layers are merged and
//! then resolved into a validated [`PipelineConfig`]. Nothing runs until
//! resolution succeeds.
//!
//! ## Config File
//!
//! ```toml
//! # All options are optional - defaults shown below
//! input_root = "photos"
//! output_root = "reviews"
//! latest = 1
//! stage = 4
//! write_intermediates = false
//! storage = "local"              # or "drive"
//! recent_review_days = 60
//! request_timeout_secs = 30
//! vision_model = "gemini-1.5-flash"
//! ```
//!
//! Unknown keys are rejected to catch typos early.
//!
//! ## Environment
//!
//! Every key is read from `VISIT_REVIEW_<KEY>` (e.g. `VISIT_REVIEW_LATEST`).
//! Credentials additionally honour the usual provider variables:
//!
//! | Setting | Also read from |
//! |---------|----------------|
//! | `places_api_key` | `GOOGLE_PLACES_API_KEY` |
//! | `vision_api_key` | `GEMINI_API_KEY`, `GOOGLE_API_KEY` |
//! | `drive_access_token` | `GOOGLE_DRIVE_ACCESS_TOKEN` |

use crate::pipeline::Stage;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

pub const ENV_PREFIX: &str = "VISIT_REVIEW_";
pub const DEFAULT_VISION_MODEL: &str = "gemini-1.5-flash";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
    #[error("missing required setting: {0}")]
    Missing(&'static str),
}

/// One sparse source of settings. `None` means "not set here".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConfigLayer {
    pub input_root: Option<String>,
    pub output_root: Option<String>,
    pub latest: Option<i64>,
    pub stage: Option<i64>,
    pub write_intermediates: Option<bool>,
    pub places_data: Option<PathBuf>,
    pub vision_data: Option<PathBuf>,
    pub places_api_key: Option<String>,
    pub vision_api_key: Option<String>,
    pub vision_model: Option<String>,
    pub prompt_file: Option<PathBuf>,
    pub storage: Option<String>,
    pub drive_access_token: Option<String>,
    pub recent_review_days: Option<i64>,
    pub request_timeout_secs: Option<i64>,
}

impl ConfigLayer {
    /// Stock defaults for every key that has one.
    pub fn defaults() -> Self {
        Self {
            latest: Some(1),
            stage: Some(4),
            write_intermediates: Some(false),
            vision_model: Some(DEFAULT_VISION_MODEL.to_string()),
            storage: Some("local".to_string()),
            recent_review_days: Some(60),
            request_timeout_secs: Some(30),
            ..Self::default()
        }
    }

    /// Overlay `other` on top of `self`: keys set in `other` win.
    pub fn merge(self, other: ConfigLayer) -> ConfigLayer {
        ConfigLayer {
            input_root: other.input_root.or(self.input_root),
            output_root: other.output_root.or(self.output_root),
            latest: other.latest.or(self.latest),
            stage: other.stage.or(self.stage),
            write_intermediates: other.write_intermediates.or(self.write_intermediates),
            places_data: other.places_data.or(self.places_data),
            vision_data: other.vision_data.or(self.vision_data),
            places_api_key: other.places_api_key.or(self.places_api_key),
            vision_api_key: other.vision_api_key.or(self.vision_api_key),
            vision_model: other.vision_model.or(self.vision_model),
            prompt_file: other.prompt_file.or(self.prompt_file),
            storage: other.storage.or(self.storage),
            drive_access_token: other.drive_access_token.or(self.drive_access_token),
            recent_review_days: other.recent_review_days.or(self.recent_review_days),
            request_timeout_secs: other.request_timeout_secs.or(self.request_timeout_secs),
        }
    }

    /// Read the environment layer through `lookup` (normally `std::env::var`).
    ///
    /// Empty values count as unset.
    pub fn from_env(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |names: &[&str]| {
            names
                .iter()
                .filter_map(|name| lookup(name))
                .map(|v| v.trim().to_string())
                .find(|v| !v.is_empty())
        };
        let key = |name: &str| format!("{ENV_PREFIX}{}", name.to_uppercase());
        let text = |name: &str| get(&[key(name).as_str()]);
        let path = |name: &str| text(name).map(PathBuf::from);
        let int = |name: &str| -> Result<Option<i64>, ConfigError> {
            text(name)
                .map(|v| {
                    v.parse().map_err(|_| {
                        ConfigError::Validation(format!(
                            "{} must be an integer, got {v:?}",
                            key(name)
                        ))
                    })
                })
                .transpose()
        };

        let write_intermediates = text("write_intermediates")
            .map(|v| {
                parse_bool(&v).ok_or_else(|| {
                    ConfigError::Validation(format!(
                        "{} must be true or false, got {v:?}",
                        key("write_intermediates")
                    ))
                })
            })
            .transpose()?;

        Ok(Self {
            input_root: text("input_root"),
            output_root: text("output_root"),
            latest: int("latest")?,
            stage: int("stage")?,
            write_intermediates,
            places_data: path("places_data"),
            vision_data: path("vision_data"),
            places_api_key: get(&[key("places_api_key").as_str(), "GOOGLE_PLACES_API_KEY"]),
            vision_api_key: get(&[
                key("vision_api_key").as_str(),
                "GEMINI_API_KEY",
                "GOOGLE_API_KEY",
            ]),
            vision_model: text("vision_model"),
            prompt_file: path("prompt_file"),
            storage: text("storage"),
            drive_access_token: get(&[
                key("drive_access_token").as_str(),
                "GOOGLE_DRIVE_ACCESS_TOKEN",
            ]),
            recent_review_days: int("recent_review_days")?,
            request_timeout_secs: int("request_timeout_secs")?,
        })
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Load a config file layer.
pub fn load_config_file(path: &Path) -> Result<ConfigLayer, ConfigError> {
    let content = fs::read_to_string(path)?;
    Ok(toml::from_str(&content)?)
}

/// Where a provider gets its data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderSource {
    /// Live HTTP API with this key.
    Api(String),
    /// JSON fixture file.
    DataFile(PathBuf),
    /// Not configured; lookups degrade.
    Disabled,
}

impl ProviderSource {
    /// An API key wins over a data file.
    fn pick(api_key: Option<String>, data_file: Option<PathBuf>) -> Self {
        match (api_key, data_file) {
            (Some(key), _) => ProviderSource::Api(key),
            (None, Some(path)) => ProviderSource::DataFile(path),
            (None, None) => ProviderSource::Disabled,
        }
    }

    pub fn describe(&self) -> &'static str {
        match self {
            ProviderSource::Api(_) => "api",
            ProviderSource::DataFile(_) => "data file",
            ProviderSource::Disabled => "disabled",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageBackend {
    Local,
    Drive { access_token: String },
}

/// Fully resolved, validated settings for one run.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    pub input_root: String,
    pub output_root: String,
    pub latest: usize,
    pub max_stage: Stage,
    pub write_intermediates: bool,
    pub places: ProviderSource,
    pub vision: ProviderSource,
    pub vision_model: String,
    pub prompt_file: Option<PathBuf>,
    pub storage: StorageBackend,
    pub recent_review_days: i64,
    pub request_timeout: Duration,
}

impl PipelineConfig {
    /// Stock settings for the given roots, with no providers configured.
    pub fn with_roots(input_root: impl Into<String>, output_root: impl Into<String>) -> Self {
        Self {
            input_root: input_root.into(),
            output_root: output_root.into(),
            latest: 1,
            max_stage: Stage::Compose,
            write_intermediates: false,
            places: ProviderSource::Disabled,
            vision: ProviderSource::Disabled,
            vision_model: DEFAULT_VISION_MODEL.to_string(),
            prompt_file: None,
            storage: StorageBackend::Local,
            recent_review_days: 60,
            request_timeout: Duration::from_secs(30),
        }
    }
}

/// Merge `layer` over the stock defaults and validate the result.
pub fn resolve_config(layer: ConfigLayer) -> Result<PipelineConfig, ConfigError> {
    let merged = ConfigLayer::defaults().merge(layer);
    let non_blank = |v: Option<String>| v.filter(|s| !s.trim().is_empty());

    let input_root = non_blank(merged.input_root).ok_or(ConfigError::Missing("input_root"))?;
    let output_root = non_blank(merged.output_root).ok_or(ConfigError::Missing("output_root"))?;

    let latest = merged.latest.unwrap_or(1);
    if latest < 1 {
        return Err(ConfigError::Validation(format!(
            "latest must be >= 1, got {latest}"
        )));
    }

    let stage = merged.stage.unwrap_or(4);
    let max_stage = u8::try_from(stage)
        .ok()
        .and_then(|n| Stage::try_from(n).ok())
        .ok_or_else(|| ConfigError::Validation(format!("stage must be 1-4, got {stage}")))?;

    let timeout_secs = merged.request_timeout_secs.unwrap_or(30);
    if timeout_secs < 1 {
        return Err(ConfigError::Validation(format!(
            "request_timeout_secs must be >= 1, got {timeout_secs}"
        )));
    }

    let storage = match merged.storage.as_deref().map(str::trim).unwrap_or("local") {
        "local" => StorageBackend::Local,
        "drive" => StorageBackend::Drive {
            access_token: non_blank(merged.drive_access_token).ok_or_else(|| {
                ConfigError::Validation("storage = \"drive\" requires drive_access_token".into())
            })?,
        },
        other => {
            return Err(ConfigError::Validation(format!(
                "storage must be one of: local, drive (got {other:?})"
            )));
        }
    };

    Ok(PipelineConfig {
        input_root,
        output_root,
        latest: latest as usize,
        max_stage,
        write_intermediates: merged.write_intermediates.unwrap_or(false),
        places: ProviderSource::pick(non_blank(merged.places_api_key), merged.places_data),
        vision: ProviderSource::pick(non_blank(merged.vision_api_key), merged.vision_data),
        vision_model: non_blank(merged.vision_model)
            .unwrap_or_else(|| DEFAULT_VISION_MODEL.to_string()),
        prompt_file: merged.prompt_file,
        storage,
        recent_review_days: merged.recent_review_days.unwrap_or(60),
        request_timeout: Duration::from_secs(timeout_secs as u64),
    })
}

/// Resolve the full stack: CLI over config file over environment.
pub fn load_config(
    cli: ConfigLayer,
    config_file: Option<&Path>,
    env: ConfigLayer,
) -> Result<PipelineConfig, ConfigError> {
    let file = match config_file {
        Some(path) => load_config_file(path)?,
        None => ConfigLayer::default(),
    };
    resolve_config(env.merge(file).merge(cli))
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Tables are merged key-by-key (overlay keys override base keys).
/// - Non-table values in overlay replace base values entirely.
/// - Keys in base that are not in overlay are preserved.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Returns a fully-commented stock config file.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# visit-review configuration
# ==========================
# All settings are optional here; input_root and output_root must come from
# this file, the command line or the environment (VISIT_REVIEW_<KEY>).
# Command-line flags override this file; this file overrides the environment.
# Unknown keys will cause an error.

# Folder holding the YYYYMMDD_restaurant visit folders
# (a path for local storage, a folder id for drive).
# input_root = "photos"

# Where per-folder review artifacts are written.
# output_root = "reviews"

# How many of the newest visit folders to process.
latest = 1

# Last stage to run: 1 manifest, 2 restaurant lookup, 3 vision, 4 review.
stage = 4

# Also write the artifacts of stages before the last one.
write_intermediates = false

# ---------------------------------------------------------------------------
# Storage
# ---------------------------------------------------------------------------
# "local" (filesystem) or "drive" (Google Drive, needs drive_access_token).
storage = "local"
# drive_access_token = ""

# ---------------------------------------------------------------------------
# Restaurant lookup
# ---------------------------------------------------------------------------
# An API key wins over a data file. With neither, restaurants are "not found".
# places_api_key = ""
# places_data = "places.json"

# Reviews older than this many days are ignored.
recent_review_days = 60

# ---------------------------------------------------------------------------
# Image analysis
# ---------------------------------------------------------------------------
# An API key wins over a data file. With neither, images are not analyzed.
# vision_api_key = ""
# vision_data = "vision.json"
vision_model = "gemini-1.5-flash"

# ---------------------------------------------------------------------------
# Wording
# ---------------------------------------------------------------------------
# TOML file overriding any of the prompt and template strings.
# prompt_file = "prompts.toml"

# ---------------------------------------------------------------------------
# Network
# ---------------------------------------------------------------------------
request_timeout_secs = 30
"##
}
