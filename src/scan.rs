//! Source-folder discovery and manifest generation.
//!
//! Stage 1 of the review pipeline. Lists the visit folders under the input
//! root, keeps the latest N by visit date, and collects each folder's images
//! into a [`Manifest`] that later stages consume read-only.
//!
//! ## Input Layout
//!
//! ```text
//! RestaurantReviews/                   # Input root
//! ├── 20260214_스시로쿠/                 # Visit folder (YYYYMMDD_name)
//! │   ├── IMG_0001.jpg
//! │   ├── menu.PNG                     # Extensions match case-insensitively
//! │   ├── notes.txt                    # Ignored
//! │   └── 2nd-course/                  # Nested folders are walked too
//! │       └── IMG_0002.webp
//! ├── 20260210_가게A/
//! └── drafts/                          # Not YYYYMMDD_name → never selected
//! ```
//!
//! ## Selection
//!
//! Candidates are ranked by visit date, newest first. Because the date is a
//! fixed-width `YYYYMMDD` string, comparing the strings is the same as
//! comparing the dates. Folders visited on the same day keep the order the
//! storage backend listed them in.

use crate::naming::{self, parse_folder_name};
use crate::storage::{Storage, StorageError};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScanError {
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
    #[error("Naming error: {0}")]
    Naming(#[from] naming::NamingError),
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
    #[error("No valid source folders found under input root {0}")]
    NoSourceFolders(String),
    #[error("No supported image files found in {0}")]
    NoImages(String),
}

/// Image extensions accepted by the collector (compared lowercase).
pub const SUPPORTED_IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "webp"];

/// A candidate visit folder as discovered under the input root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFolderEntry {
    pub folder_id: String,
    pub folder_name: String,
}

/// A supported image found inside a visit folder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageEntry {
    pub file_id: String,
    pub name: String,
    pub mime_type: String,
}

/// Stage 1 output: one visit folder bound to its parsed name and images.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    pub source_folder_id: String,
    pub source_folder_name: String,
    pub visit_date: String,
    pub restaurant_name: String,
    /// Sorted by lowercase name.
    pub images: Vec<ImageEntry>,
}

/// Whether a file name carries one of the supported image extensions.
pub fn is_supported_image(name: &str) -> bool {
    name.rsplit_once('.')
        .map(|(_, ext)| {
            let ext = ext.to_ascii_lowercase();
            SUPPORTED_IMAGE_EXTENSIONS.contains(&ext.as_str())
        })
        .unwrap_or(false)
}

/// List the visit folders directly under the input root.
///
/// Keeps only containers with a non-empty id and a name that parses as
/// `YYYYMMDD_name`. Everything else is silently skipped.
pub fn list_source_folders(
    storage: &dyn Storage,
    input_root_id: &str,
) -> Result<Vec<SourceFolderEntry>, ScanError> {
    let candidates = storage
        .list_children(input_root_id)?
        .into_iter()
        .filter(|entry| entry.is_container())
        .map(|entry| SourceFolderEntry {
            folder_id: entry.id.trim().to_string(),
            folder_name: entry.name.trim().to_string(),
        })
        .filter(|f| !f.folder_id.is_empty() && parse_folder_name(&f.folder_name).is_ok())
        .collect();
    Ok(candidates)
}

/// Keep the `latest` newest folders by visit date.
///
/// Unparseable names are dropped rather than treated as errors. Ties on the
/// same date preserve the input order (the sort is stable). An empty result
/// is returned as-is; deciding whether that is fatal is the caller's job.
pub fn select_latest(
    folders: &[SourceFolderEntry],
    latest: usize,
) -> Result<Vec<SourceFolderEntry>, ScanError> {
    if latest < 1 {
        return Err(ScanError::InvalidArgument("latest must be >= 1".into()));
    }

    let mut dated: Vec<(String, &SourceFolderEntry)> = folders
        .iter()
        .filter_map(|f| {
            parse_folder_name(&f.folder_name)
                .ok()
                .map(|parsed| (parsed.visit_date, f))
        })
        .collect();
    dated.sort_by(|a, b| b.0.cmp(&a.0));

    Ok(dated
        .into_iter()
        .take(latest)
        .map(|(_, f)| f.clone())
        .collect())
}

/// Collect every supported image below `root_folder_id`.
///
/// Walks the tree depth-first with an explicit work list rather than
/// recursion, so deeply nested folders cannot exhaust the call stack.
/// Entries missing an id, name, or type are skipped. The result is sorted
/// by lowercase name; an empty result is not an error here.
pub fn collect_images(
    storage: &dyn Storage,
    root_folder_id: &str,
) -> Result<Vec<ImageEntry>, ScanError> {
    let mut stack = vec![root_folder_id.to_string()];
    let mut collected = Vec::new();

    while let Some(folder_id) = stack.pop() {
        for entry in storage.list_children(&folder_id)? {
            let id = entry.id.trim();
            let name = entry.name.trim();
            let mime_type = entry.mime_type.trim();
            if id.is_empty() || name.is_empty() || mime_type.is_empty() {
                continue;
            }

            if entry.is_container() {
                stack.push(id.to_string());
            } else if is_supported_image(name) {
                collected.push(ImageEntry {
                    file_id: id.to_string(),
                    name: name.to_string(),
                    mime_type: mime_type.to_string(),
                });
            }
        }
    }

    collected.sort_by_key(|image| image.name.to_lowercase());
    Ok(collected)
}

/// Bind a selected folder to its parsed name and collected images.
pub fn build_manifest(
    folder: &SourceFolderEntry,
    images: Vec<ImageEntry>,
) -> Result<Manifest, ScanError> {
    let parsed = parse_folder_name(&folder.folder_name)?;
    Ok(Manifest {
        source_folder_id: folder.folder_id.clone(),
        source_folder_name: folder.folder_name.clone(),
        visit_date: parsed.visit_date,
        restaurant_name: parsed.restaurant_name,
        images,
    })
}

/// Run all of stage 1: list, select, collect, and build manifests.
///
/// Fails when no valid folder exists under the root, or when any selected
/// folder holds no supported image.
pub fn scan(
    storage: &dyn Storage,
    input_root_id: &str,
    latest: usize,
) -> Result<Vec<Manifest>, ScanError> {
    let candidates = list_source_folders(storage, input_root_id)?;
    let selected = select_latest(&candidates, latest)?;
    if selected.is_empty() {
        return Err(ScanError::NoSourceFolders(input_root_id.to_string()));
    }

    let mut manifests = Vec::with_capacity(selected.len());
    for folder in &selected {
        let images = collect_images(storage, &folder.folder_id)?;
        if images.is_empty() {
            return Err(ScanError::NoImages(folder.folder_name.clone()));
        }
        tracing::debug!(
            folder = %folder.folder_name,
            images = images.len(),
            "collected images"
        );
        manifests.push(build_manifest(folder, images)?);
    }
    Ok(manifests)
}
