//! Stage orchestration.
//!
//! Runs the four stages in order, stopping after the configured last stage:
//!
//! ```text
//! 1. Discover   input root      →  manifest.json                 (scan)
//! 2. Restaurant manifest        →  restaurant.json               (places)
//! 3. Vision     manifest images →  vision.json                   (vision)
//! 4. Compose    all of the above→  review.html + rules_report.json
//! ```
//!
//! Stages are batched across folders: every folder finishes stage 2 before
//! any folder starts stage 3. Artifacts land in one output folder per visit,
//! named after the source folder:
//!
//! ```text
//! reviews/
//! └── 20260214_스시로쿠/
//!     ├── manifest.json       # last stage, or with write_intermediates
//!     ├── restaurant.json     # ditto
//!     ├── vision.json         # ditto
//!     ├── review.html
//!     └── rules_report.json
//! ```
//!
//! Discovery failures abort the run. Provider failures never do: they show
//! up as `found: false` or a `_raw` diagnostic in the artifacts. A document
//! that fails validation is still written; the failure is carried in the
//! [`RunReport`] and the exit code.

use crate::compose::compose;
use crate::config::{ConfigError, PipelineConfig, ProviderSource, StorageBackend};
use crate::places::fixture::FixtureError;
use crate::places::{
    FixturePlacesProvider, GooglePlacesProvider, NoPlaces, PlacesError, PlacesProvider,
    RestaurantInfo, resolve_restaurant_info,
};
use crate::prompts::{PromptError, PromptSet, load_prompts};
use crate::render::render_document;
use crate::rules::{RulesReport, validate_html_document};
use crate::scan::{Manifest, ScanError, scan};
use crate::storage::{DriveStorage, LocalStorage, Storage, StorageError};
use crate::vision::{
    FixtureVisionProvider, GeminiVisionProvider, NoVision, VisionError, VisionImageResult,
    VisionProvider, analyze_image,
};
use serde::Serialize;
use std::fmt;
use thiserror::Error;

pub const MANIFEST_FILE: &str = "manifest.json";
pub const RESTAURANT_FILE: &str = "restaurant.json";
pub const VISION_FILE: &str = "vision.json";
pub const REVIEW_FILE: &str = "review.html";
pub const RULES_REPORT_FILE: &str = "rules_report.json";

const JSON_CONTENT_TYPE: &str = "application/json";
const HTML_CONTENT_TYPE: &str = "text/html";

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Prompt(#[from] PromptError),
    #[error(transparent)]
    Scan(#[from] ScanError),
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
    #[error("Fixture error: {0}")]
    Fixture(#[from] FixtureError),
    #[error("Places provider setup failed: {0}")]
    Places(#[from] PlacesError),
    #[error("Vision provider setup failed: {0}")]
    Vision(#[from] VisionError),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// A pipeline stage. Ordered, so `stage <= max_stage` gates execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Stage {
    Discover = 1,
    Restaurant = 2,
    Vision = 3,
    Compose = 4,
}

impl Stage {
    pub fn number(self) -> u8 {
        self as u8
    }
}

impl TryFrom<u8> for Stage {
    type Error = u8;

    fn try_from(n: u8) -> Result<Self, Self::Error> {
        match n {
            1 => Ok(Stage::Discover),
            2 => Ok(Stage::Restaurant),
            3 => Ok(Stage::Vision),
            4 => Ok(Stage::Compose),
            other => Err(other),
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.number())
    }
}

/// What happened to one visit folder.
///
/// Stage fields are `None` when that stage did not run.
#[derive(Debug, Clone, PartialEq)]
pub struct FolderOutcome {
    pub folder_name: String,
    pub image_count: usize,
    pub restaurant_found: Option<bool>,
    pub analyzed_images: Option<usize>,
    pub rules: Option<RulesReport>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RunReport {
    pub selected_folders: usize,
    pub completed_stage: Stage,
    pub folders: Vec<FolderOutcome>,
}

impl RunReport {
    /// Folders whose document passed every rule.
    pub fn passed_count(&self) -> usize {
        self.folders
            .iter()
            .filter(|f| f.rules.as_ref().is_some_and(|r| r.passed))
            .count()
    }

    pub fn all_passed(&self) -> bool {
        self.folders
            .iter()
            .all(|f| f.rules.as_ref().is_none_or(|r| r.passed))
    }

    /// 0 on success, 1 when stage 4 ran and any document failed validation.
    pub fn exit_code(&self) -> u8 {
        if self.completed_stage == Stage::Compose && !self.all_passed() {
            1
        } else {
            0
        }
    }
}

#[derive(Serialize)]
struct VisionFile<'a> {
    images: &'a [VisionImageResult],
}

/// One run over injected collaborators.
pub struct Pipeline<'a> {
    pub storage: &'a dyn Storage,
    pub places: &'a dyn PlacesProvider,
    pub vision: &'a dyn VisionProvider,
    pub prompts: &'a PromptSet,
    pub config: &'a PipelineConfig,
    /// Wall-clock time of the run in Unix seconds.
    pub now: i64,
}

impl Pipeline<'_> {
    fn persists(&self, stage: Stage) -> bool {
        stage == self.config.max_stage || self.config.write_intermediates
    }

    fn write_json<T: Serialize + ?Sized>(
        &self,
        folder_id: &str,
        file_name: &str,
        value: &T,
    ) -> Result<(), PipelineError> {
        let text = serde_json::to_string_pretty(value)?;
        self.storage
            .write_text(folder_id, file_name, &text, JSON_CONTENT_TYPE)?;
        tracing::debug!(folder_id, file_name, "wrote artifact");
        Ok(())
    }

    pub fn run(&self) -> Result<RunReport, PipelineError> {
        let max_stage = self.config.max_stage;

        let manifests = scan(self.storage, &self.config.input_root, self.config.latest)?;
        tracing::info!(selected = manifests.len(), "stage 1 complete");

        let mut folders: Vec<FolderOutcome> = manifests
            .iter()
            .map(|m| FolderOutcome {
                folder_name: m.source_folder_name.clone(),
                image_count: m.images.len(),
                restaurant_found: None,
                analyzed_images: None,
                rules: None,
            })
            .collect();

        let output_ids = manifests
            .iter()
            .map(|m| {
                self.storage
                    .ensure_container(&self.config.output_root, &m.source_folder_name)
            })
            .collect::<Result<Vec<_>, _>>()?;

        if self.persists(Stage::Discover) {
            for (manifest, out) in manifests.iter().zip(&output_ids) {
                self.write_json(out, MANIFEST_FILE, manifest)?;
            }
        }

        let report = |folders: Vec<FolderOutcome>, completed_stage| RunReport {
            selected_folders: manifests.len(),
            completed_stage,
            folders,
        };
        if max_stage < Stage::Restaurant {
            return Ok(report(folders, Stage::Discover));
        }

        let infos = self.run_restaurant_stage(&manifests, &output_ids)?;
        for (folder, info) in folders.iter_mut().zip(&infos) {
            folder.restaurant_found = Some(info.found);
        }
        if max_stage < Stage::Vision {
            return Ok(report(folders, Stage::Restaurant));
        }

        let vision = self.run_vision_stage(&manifests, &output_ids)?;
        for (folder, results) in folders.iter_mut().zip(&vision) {
            folder.analyzed_images = Some(results.iter().filter(|r| r.analysis.is_some()).count());
        }
        if max_stage < Stage::Compose {
            return Ok(report(folders, Stage::Vision));
        }

        let reports = self.run_compose_stage(&manifests, &infos, &vision, &output_ids)?;
        for (folder, rules) in folders.iter_mut().zip(reports) {
            folder.rules = Some(rules);
        }
        Ok(report(folders, Stage::Compose))
    }

    fn run_restaurant_stage(
        &self,
        manifests: &[Manifest],
        output_ids: &[String],
    ) -> Result<Vec<RestaurantInfo>, PipelineError> {
        let mut infos = Vec::with_capacity(manifests.len());
        for (manifest, out) in manifests.iter().zip(output_ids) {
            let info = resolve_restaurant_info(
                self.places,
                &manifest.restaurant_name,
                self.config.recent_review_days,
                self.now,
            );
            tracing::debug!(
                folder = %manifest.source_folder_name,
                found = info.found,
                reviews = info.recent_reviews.len(),
                "restaurant resolved"
            );
            if self.persists(Stage::Restaurant) {
                self.write_json(out, RESTAURANT_FILE, &info)?;
            }
            infos.push(info);
        }
        tracing::info!(
            found = infos.iter().filter(|i| i.found).count(),
            total = infos.len(),
            "stage 2 complete"
        );
        Ok(infos)
    }

    fn run_vision_stage(
        &self,
        manifests: &[Manifest],
        output_ids: &[String],
    ) -> Result<Vec<Vec<VisionImageResult>>, PipelineError> {
        let mut all = Vec::with_capacity(manifests.len());
        for (manifest, out) in manifests.iter().zip(output_ids) {
            let mut results = Vec::with_capacity(manifest.images.len());
            for image in &manifest.images {
                let bytes = match self.storage.read_bytes(&image.file_id) {
                    Ok(bytes) => Some(bytes),
                    Err(e) => {
                        tracing::warn!(
                            folder = %manifest.source_folder_name,
                            image = %image.name,
                            error = %e,
                            "image download failed"
                        );
                        None
                    }
                };
                results.push(analyze_image(
                    self.vision,
                    &image.file_id,
                    &image.name,
                    &image.mime_type,
                    bytes.as_deref(),
                ));
            }
            if self.persists(Stage::Vision) {
                self.write_json(out, VISION_FILE, &VisionFile { images: &results })?;
            }
            all.push(results);
        }
        tracing::info!(
            images = all.iter().map(Vec::len).sum::<usize>(),
            "stage 3 complete"
        );
        Ok(all)
    }

    fn run_compose_stage(
        &self,
        manifests: &[Manifest],
        infos: &[RestaurantInfo],
        vision: &[Vec<VisionImageResult>],
        output_ids: &[String],
    ) -> Result<Vec<RulesReport>, PipelineError> {
        let mut reports = Vec::with_capacity(manifests.len());
        for (((manifest, info), results), out) in
            manifests.iter().zip(infos).zip(vision).zip(output_ids)
        {
            let document = compose(manifest, info, results, self.prompts);
            let html = render_document(&document);
            let rules = validate_html_document(&html, info.recent_reviews.len());

            self.storage
                .write_text(out, REVIEW_FILE, &html, HTML_CONTENT_TYPE)?;
            self.write_json(out, RULES_REPORT_FILE, &rules)?;

            if !rules.passed {
                tracing::warn!(
                    folder = %manifest.source_folder_name,
                    violations = ?rules.violations,
                    "review failed content rules"
                );
            }
            reports.push(rules);
        }
        tracing::info!(
            passed = reports.iter().filter(|r| r.passed).count(),
            total = reports.len(),
            "stage 4 complete"
        );
        Ok(reports)
    }
}

// ============================================================================
// Collaborators from configuration
// ============================================================================

pub fn build_storage(config: &PipelineConfig) -> Result<Box<dyn Storage>, PipelineError> {
    Ok(match &config.storage {
        StorageBackend::Local => Box::new(LocalStorage::new()),
        StorageBackend::Drive { access_token } => {
            Box::new(DriveStorage::new(access_token.as_str(), config.request_timeout)?)
        }
    })
}

pub fn build_places_provider(
    config: &PipelineConfig,
) -> Result<Box<dyn PlacesProvider>, PipelineError> {
    Ok(match &config.places {
        ProviderSource::Api(key) => {
            Box::new(GooglePlacesProvider::new(key.as_str(), config.request_timeout)?)
        }
        ProviderSource::DataFile(path) => Box::new(FixturePlacesProvider::from_file(path)?),
        ProviderSource::Disabled => Box::new(NoPlaces),
    })
}

pub fn build_vision_provider(
    config: &PipelineConfig,
    prompts: &PromptSet,
) -> Result<Box<dyn VisionProvider>, PipelineError> {
    Ok(match &config.vision {
        ProviderSource::Api(key) => Box::new(GeminiVisionProvider::new(
            key.as_str(),
            config.vision_model.as_str(),
            prompts.vision_prompt.as_str(),
            config.request_timeout,
        )?),
        ProviderSource::DataFile(path) => Box::new(FixtureVisionProvider::from_file(path)?),
        ProviderSource::Disabled => Box::new(NoVision),
    })
}

/// Build every collaborator from `config` and run at the current time.
pub fn run_with_config(config: &PipelineConfig) -> Result<RunReport, PipelineError> {
    let prompts = load_prompts(config.prompt_file.as_deref())?;
    let storage = build_storage(config)?;
    let places = build_places_provider(config)?;
    let vision = build_vision_provider(config, &prompts)?;
    tracing::info!(
        places = config.places.describe(),
        vision = config.vision.describe(),
        max_stage = %config.max_stage,
        "starting run"
    );

    Pipeline {
        storage: storage.as_ref(),
        places: places.as_ref(),
        vision: vision.as_ref(),
        prompts: &prompts,
        config,
        now: chrono::Utc::now().timestamp(),
    }
    .run()
}
