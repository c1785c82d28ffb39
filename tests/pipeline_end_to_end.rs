//! End-to-end runs over a real directory tree with the local storage backend.

use serde_json::{Value, json};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use visit_review::config::{PipelineConfig, ProviderSource};
use visit_review::pipeline::{
    MANIFEST_FILE, Pipeline, REVIEW_FILE, RULES_REPORT_FILE, RunReport, Stage, VISION_FILE,
    build_places_provider, build_vision_provider,
};
use visit_review::places::{NoPlaces, PlacesProvider};
use visit_review::prompts::PromptSet;
use visit_review::storage::LocalStorage;
use visit_review::vision::{NoVision, VisionProvider};

const FOLDER: &str = "20260214_스시로쿠";
const NOW: i64 = 1_771_200_000;

struct Workspace {
    _tmp: TempDir,
    root: PathBuf,
}

impl Workspace {
    /// `input/20260214_스시로쿠/` with two images and a text file, plus an older visit.
    fn new() -> Self {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path().to_path_buf();
        let visit = root.join("input").join(FOLDER);
        fs::create_dir_all(&visit).unwrap();
        fs::write(visit.join("B.jpg"), b"jpeg").unwrap();
        fs::write(visit.join("a.png"), b"png").unwrap();
        fs::write(visit.join("notes.txt"), "memo").unwrap();

        let older = root.join("input").join("20260101_가게A");
        fs::create_dir_all(&older).unwrap();
        fs::write(older.join("x.jpg"), b"jpeg").unwrap();

        fs::create_dir_all(root.join("input").join("drafts")).unwrap();
        Self { _tmp: tmp, root }
    }

    fn config(&self, max_stage: Stage, write_intermediates: bool) -> PipelineConfig {
        PipelineConfig {
            max_stage,
            write_intermediates,
            ..PipelineConfig::with_roots(path_id(&self.root.join("input")), path_id(&self.out()))
        }
    }

    fn out(&self) -> PathBuf {
        self.root.join("out")
    }

    fn artifact(&self, file: &str) -> PathBuf {
        self.out().join(FOLDER).join(file)
    }

    fn read_json(&self, file: &str) -> Value {
        serde_json::from_str(&fs::read_to_string(self.artifact(file)).unwrap()).unwrap()
    }
}

fn path_id(path: &Path) -> String {
    path.to_str().unwrap().to_string()
}

fn run_with(
    config: &PipelineConfig,
    places: &dyn PlacesProvider,
    vision: &dyn VisionProvider,
    prompts: &PromptSet,
) -> RunReport {
    Pipeline {
        storage: &LocalStorage::new(),
        places,
        vision,
        prompts,
        config,
        now: NOW,
    }
    .run()
    .unwrap()
}

fn run_unconfigured(config: &PipelineConfig) -> RunReport {
    run_with(config, &NoPlaces, &NoVision, &PromptSet::default())
}

// =========================================================================
// Discovery
// =========================================================================

#[test]
fn manifest_for_latest_visit() {
    let ws = Workspace::new();
    let report = run_unconfigured(&ws.config(Stage::Discover, false));

    assert_eq!(report.selected_folders, 1);
    assert_eq!(report.completed_stage, Stage::Discover);

    let manifest = ws.read_json(MANIFEST_FILE);
    assert_eq!(manifest["visit_date"], "20260214");
    assert_eq!(manifest["restaurant_name"], "스시로쿠");
    assert_eq!(manifest["source_folder_name"], FOLDER);

    let images = manifest["images"].as_array().unwrap();
    let names: Vec<&str> = images.iter().map(|i| i["name"].as_str().unwrap()).collect();
    assert_eq!(names, vec!["a.png", "B.jpg"]);
    assert_eq!(images[0]["mime_type"], "image/png");
    assert_eq!(images[1]["mime_type"], "image/jpeg");
}

#[test]
fn artifacts_are_indented_utf8_json() {
    let ws = Workspace::new();
    run_unconfigured(&ws.config(Stage::Discover, false));

    let text = fs::read_to_string(ws.artifact(MANIFEST_FILE)).unwrap();
    assert!(text.contains("\n  \"restaurant_name\": \"스시로쿠\""));
    assert!(!text.contains("\\u"));
}

#[test]
fn latest_two_selects_both_visits() {
    let ws = Workspace::new();
    let config = PipelineConfig {
        latest: 2,
        ..ws.config(Stage::Discover, false)
    };
    let report = run_unconfigured(&config);

    let names: Vec<&str> = report
        .folders
        .iter()
        .map(|f| f.folder_name.as_str())
        .collect();
    assert_eq!(names, vec![FOLDER, "20260101_가게A"]);
    assert!(ws.out().join("20260101_가게A").join(MANIFEST_FILE).exists());
}

#[test]
fn empty_visit_folder_aborts_run() {
    let ws = Workspace::new();
    fs::create_dir_all(ws.root.join("input").join("20260301_빈폴더")).unwrap();

    let config = ws.config(Stage::Compose, false);
    let result = Pipeline {
        storage: &LocalStorage::new(),
        places: &NoPlaces,
        vision: &NoVision,
        prompts: &PromptSet::default(),
        config: &config,
        now: NOW,
    }
    .run();

    let err = result.unwrap_err().to_string();
    assert!(err.contains("20260301_빈폴더"), "{err}");
}

// =========================================================================
// Stage ceiling and intermediates
// =========================================================================

#[test]
fn stage_ceiling_writes_only_last_artifact() {
    let ws = Workspace::new();
    let report = run_unconfigured(&ws.config(Stage::Vision, false));

    assert_eq!(report.completed_stage, Stage::Vision);
    assert!(ws.artifact(VISION_FILE).exists());
    assert!(!ws.artifact(MANIFEST_FILE).exists());
    assert!(!ws.artifact(REVIEW_FILE).exists());
}

#[test]
fn intermediates_keep_every_artifact() {
    let ws = Workspace::new();
    run_unconfigured(&ws.config(Stage::Compose, true));

    let mut written: Vec<String> = fs::read_dir(ws.out().join(FOLDER))
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
        .collect();
    written.sort();
    assert_eq!(
        written,
        vec![
            "manifest.json",
            "restaurant.json",
            "review.html",
            "rules_report.json",
            "vision.json",
        ]
    );
}

// =========================================================================
// Degraded run
// =========================================================================

#[test]
fn unconfigured_providers_still_produce_a_passing_document() {
    let ws = Workspace::new();
    let report = run_unconfigured(&ws.config(Stage::Compose, true));
    let prompts = PromptSet::default();

    let restaurant = ws.read_json("restaurant.json");
    assert_eq!(restaurant["found"], false);

    let vision = ws.read_json(VISION_FILE);
    for image in vision["images"].as_array().unwrap() {
        assert_eq!(image["_raw"], "vision provider not configured");
        assert!(image.get("analysis").is_none_or(Value::is_null));
    }

    let html = fs::read_to_string(ws.artifact(REVIEW_FILE)).unwrap();
    assert!(html.starts_with("<!DOCTYPE html>"));
    assert!(html.contains(&prompts.missing_info_line));
    assert!(html.contains(&prompts.fallback_paragraph));

    assert_eq!(
        ws.read_json(RULES_REPORT_FILE),
        json!({"passed": true, "violations": []})
    );
    assert_eq!(report.passed_count(), 1);
    assert_eq!(report.exit_code(), 0);
}

#[test]
fn review_mention_without_reviews_fails_validation() {
    let ws = Workspace::new();
    let prompts = PromptSet {
        fallback_paragraph: "No review data yet.".into(),
        ..PromptSet::default()
    };
    let report = run_with(
        &ws.config(Stage::Compose, false),
        &NoPlaces,
        &NoVision,
        &prompts,
    );

    let rules = ws.read_json(RULES_REPORT_FILE);
    assert_eq!(rules["passed"], false);
    let violations = rules["violations"].as_array().unwrap();
    assert!(
        violations
            .iter()
            .any(|v| v.as_str().unwrap().starts_with("mentions reviews without recent review data"))
    );

    assert!(ws.artifact(REVIEW_FILE).exists());
    assert_eq!(report.passed_count(), 0);
    assert_eq!(report.exit_code(), 1);
}

// =========================================================================
// Fixture-backed providers
// =========================================================================

#[test]
fn fixture_providers_fill_the_document() {
    let ws = Workspace::new();
    let places_path = ws.root.join("places.json");
    let vision_path = ws.root.join("vision.json");
    fs::write(
        &places_path,
        json!({
            "restaurants": {
                "스시로쿠": {
                    "place_id": "p-001",
                    "address": "서울 강남구 테헤란로 1",
                    "rating": 4.6,
                    "user_ratings_total": 120,
                    "reviews": [
                        {"time": NOW - 86_400, "rating": 5, "text": "신선한 초밥이 좋았어요"},
                        {"time": NOW - 400 * 86_400, "rating": 1, "text": "오래된 후기"}
                    ]
                }
            }
        })
        .to_string(),
    )
    .unwrap();
    fs::write(
        &vision_path,
        json!({
            "images": {
                "a.png": {
                    "scene_type": "FOOD",
                    "observations": ["연어 초밥 한 접시"],
                    "food_guess": "연어 초밥 (추정)"
                }
            }
        })
        .to_string(),
    )
    .unwrap();

    let config = PipelineConfig {
        places: ProviderSource::DataFile(places_path),
        vision: ProviderSource::DataFile(vision_path),
        write_intermediates: true,
        ..ws.config(Stage::Compose, false)
    };
    let prompts = PromptSet::default();
    let places = build_places_provider(&config).unwrap();
    let vision = build_vision_provider(&config, &prompts).unwrap();
    let report = run_with(&config, places.as_ref(), vision.as_ref(), &prompts);

    let folder = &report.folders[0];
    assert_eq!(folder.restaurant_found, Some(true));
    assert_eq!(folder.analyzed_images, Some(2));

    let restaurant = ws.read_json("restaurant.json");
    assert_eq!(restaurant["recent_reviews"].as_array().unwrap().len(), 1);

    let vision = ws.read_json(VISION_FILE);
    let images = vision["images"].as_array().unwrap();
    assert_eq!(images[0]["analysis"]["scene_type"], "food");
    assert_eq!(images[0]["analysis"]["food_guess"], json!(["연어 초밥 (추정)"]));
    assert_eq!(images[1]["analysis"]["scene_type"], "other");

    let html = fs::read_to_string(ws.artifact(REVIEW_FILE)).unwrap();
    assert!(html.contains("서울 강남구 테헤란로 1"));
    assert!(html.contains("연어 초밥 한 접시"));
    assert!(html.contains("신선한 초밥이 좋았어요"));
    assert!(!html.contains("오래된 후기"));
    assert!(report.all_passed(), "{:?}", folder.rules);
}
