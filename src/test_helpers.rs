//! Shared test utilities for the visit-review test suite.
//!
//! Provides an in-memory [`Storage`] backend and builders for the records the
//! later stages consume, so stage logic can be tested without a filesystem.
//!
//! # Usage
//!
//! ```rust
//! use crate::test_helpers::*;
//!
//! let storage = visit_storage();
//! let manifests = scan(&storage, "root", 1).unwrap();
//! assert_eq!(manifests[0].images.len(), 2);
//! ```

use std::cell::{Cell, RefCell};
use std::collections::HashMap;

use crate::naming::parse_folder_name;
use crate::scan::{ImageEntry, Manifest};
use crate::storage::{FOLDER_MIME_TYPE, Storage, StorageEntry, StorageError};
use crate::vision::{SceneType, VisionAnalysis, VisionImageResult};

// =========================================================================
// In-memory storage
// =========================================================================

/// Tree of folders and files keyed by opaque ids.
///
/// Listing returns children in insertion order. Written text is kept per
/// `(container id, file name)` and can be read back with [`Self::written`].
#[derive(Default)]
pub struct MemoryStorage {
    entries: RefCell<Vec<(String, StorageEntry)>>,
    texts: RefCell<HashMap<(String, String), String>>,
    fail_reads: Cell<bool>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    fn add(&self, parent: &str, id: &str, name: &str, mime_type: &str) {
        self.entries.borrow_mut().push((
            parent.to_string(),
            StorageEntry {
                id: id.to_string(),
                name: name.to_string(),
                mime_type: mime_type.to_string(),
            },
        ));
    }

    pub fn add_folder(&self, parent: &str, id: &str, name: &str) {
        self.add(parent, id, name, FOLDER_MIME_TYPE);
    }

    pub fn add_file(&self, parent: &str, id: &str, name: &str, mime_type: &str) {
        self.add(parent, id, name, mime_type);
    }

    /// Make every `read_bytes` call fail.
    pub fn fail_reads(&self) {
        self.fail_reads.set(true);
    }

    fn container_id(&self, parent: &str, name: &str) -> Option<String> {
        self.entries
            .borrow()
            .iter()
            .find(|(p, e)| p == parent && e.name == name && e.is_container())
            .map(|(_, e)| e.id.clone())
    }

    /// Text written to `file` inside the container `folder` under `root`.
    pub fn written(&self, root: &str, folder: &str, file: &str) -> Option<String> {
        let id = self.container_id(root, folder)?;
        self.texts.borrow().get(&(id, file.to_string())).cloned()
    }

    /// Sorted names of the files written inside `folder` under `root`.
    pub fn written_files(&self, root: &str, folder: &str) -> Vec<String> {
        let Some(id) = self.container_id(root, folder) else {
            return Vec::new();
        };
        let mut names: Vec<String> = self
            .texts
            .borrow()
            .keys()
            .filter(|(container, _)| *container == id)
            .map(|(_, name)| name.clone())
            .collect();
        names.sort();
        names
    }
}

impl Storage for MemoryStorage {
    fn list_children(&self, container_id: &str) -> Result<Vec<StorageEntry>, StorageError> {
        Ok(self
            .entries
            .borrow()
            .iter()
            .filter(|(parent, _)| parent == container_id)
            .map(|(_, entry)| entry.clone())
            .collect())
    }

    fn ensure_container(&self, parent_id: &str, name: &str) -> Result<String, StorageError> {
        if let Some(id) = self.container_id(parent_id, name) {
            return Ok(id);
        }
        let id = format!("{parent_id}/{name}");
        self.add_folder(parent_id, &id, name);
        Ok(id)
    }

    fn write_text(
        &self,
        parent_id: &str,
        file_name: &str,
        text: &str,
        _content_type: &str,
    ) -> Result<(), StorageError> {
        self.texts
            .borrow_mut()
            .insert((parent_id.to_string(), file_name.to_string()), text.to_string());
        Ok(())
    }

    fn read_bytes(&self, file_id: &str) -> Result<Vec<u8>, StorageError> {
        let known = self.entries.borrow().iter().any(|(_, e)| e.id == file_id);
        if self.fail_reads.get() || !known {
            return Err(StorageError::NotFound(file_id.to_string()));
        }
        Ok(file_id.as_bytes().to_vec())
    }
}

/// Input root `root` with one visit folder: two images and a text file.
pub fn visit_storage() -> MemoryStorage {
    let storage = MemoryStorage::new();
    storage.add_folder("root", "visit", "20260214_스시로쿠");
    storage.add_file("visit", "img-b", "b.jpg", "image/jpeg");
    storage.add_file("visit", "img-a", "A.png", "image/png");
    storage.add_file("visit", "notes", "notes.txt", "text/plain");
    storage
}

// =========================================================================
// Record builders
// =========================================================================

/// Manifest for `folder_name` whose images use their names as file ids.
pub fn manifest_with_images(folder_name: &str, names: &[&str]) -> Manifest {
    let parsed = parse_folder_name(folder_name).unwrap();
    Manifest {
        source_folder_id: folder_name.to_string(),
        source_folder_name: folder_name.to_string(),
        visit_date: parsed.visit_date,
        restaurant_name: parsed.restaurant_name,
        images: names
            .iter()
            .map(|name| ImageEntry {
                file_id: name.to_string(),
                name: name.to_string(),
                mime_type: "image/jpeg".to_string(),
            })
            .collect(),
    }
}

/// A successful vision result.
pub fn analyzed(
    name: &str,
    scene_type: SceneType,
    observations: &[&str],
    food_guess: &[&str],
) -> VisionImageResult {
    let owned = |items: &[&str]| -> Vec<String> { items.iter().map(|s| s.to_string()).collect() };
    VisionImageResult {
        file_id: name.to_string(),
        name: name.to_string(),
        analysis: Some(VisionAnalysis {
            scene_type,
            observations: owned(observations),
            food_guess: owned(food_guess),
            ambience_hints: Vec::new(),
            bloggable_details: Vec::new(),
            warnings: vec![format!("no warnings reported for {name}")],
        }),
        raw: None,
    }
}

/// A vision result from an unconfigured provider.
pub fn degraded(name: &str) -> VisionImageResult {
    VisionImageResult {
        file_id: name.to_string(),
        name: name.to_string(),
        analysis: None,
        raw: Some("vision provider not configured".to_string()),
    }
}
