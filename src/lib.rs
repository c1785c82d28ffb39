//! # visit-review
//!
//! Turns dated restaurant-visit photo folders into short, rule-checked HTML
//! review documents. Your storage is the data source: each `YYYYMMDD_name`
//! folder is one visit, the images inside are its evidence, and the
//! restaurant name in the folder name is the lookup key.
//!
//! # Architecture: Four-Stage Pipeline
//!
//! Every stage produces a JSON artifact next to the final document, so each
//! step can be inspected on its own:
//!
//! ```text
//! 1. Discover    input root  →  manifest.json     (folders → images)
//! 2. Restaurant  manifest    →  restaurant.json   (place lookup + recent reviews)
//! 3. Vision      manifest    →  vision.json       (per-image scene analysis)
//! 4. Compose     all three   →  review.html + rules_report.json
//! ```
//!
//! A run can stop after any stage (`--stage`). Only the last stage's
//! artifacts are written unless `--write-intermediates` is set.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`naming`] | `YYYYMMDD_name` folder-name parser |
//! | [`scan`] | Stage 1: folder selection, image collection, manifests |
//! | [`storage`] | Storage trait with local filesystem and Google Drive backends |
//! | [`places`] | Stage 2: place lookup and review recency filtering |
//! | [`vision`] | Stage 3: per-image analysis and payload normalization |
//! | [`prompts`] | Prompt and template strings, with file overrides |
//! | [`compose`] | Stage 4 text: info lines, paragraphs, sanitizer |
//! | [`render`] | Stage 4 HTML, rendered with Maud |
//! | [`rules`] | Content rules every document is checked against |
//! | [`pipeline`] | Stage orchestration, artifacts, run report |
//! | [`config`] | Layered settings: CLI > file > environment > default |
//! | [`output`] | CLI output formatting |
//! | [`telemetry`] | Tracing subscriber setup |
//!
//! # Design Decisions
//!
//! ## Degrade, Don't Abort
//!
//! Place and vision providers are network services that fail for boring
//! reasons: quotas, timeouts, a place that simply isn't listed. None of that
//! stops a run. A failed lookup becomes `found: false`; a failed analysis
//! becomes a `_raw` diagnostic on that one image. Running with no providers
//! at all is a supported mode that uses the no-op [`places::NoPlaces`] and
//! [`vision::NoVision`] implementations. Only discovery problems (no visit
//! folders, a visit with no images) and bad configuration are fatal.
//!
//! ## Rules Over Generation
//!
//! The composer is deliberately plain: fixed templates, no free-form text
//! generation. What makes a document publishable is the checklist in
//! [`rules`], which every document passes through before the run reports
//! success. A failing document is still written so it can be inspected and
//! re-checked with `visit-review validate`.
//!
//! ## Maud Over Template Engines
//!
//! HTML is generated with [Maud](https://maud.lambda.xyz/): malformed markup is
//! a build error and all interpolation is escaped.

pub mod compose;
pub mod config;
pub mod naming;
pub mod output;
pub mod pipeline;
pub mod places;
pub mod prompts;
pub mod render;
pub mod rules;
pub mod scan;
pub mod storage;
pub mod telemetry;
pub mod vision;

#[cfg(test)]
pub(crate) mod test_helpers;
