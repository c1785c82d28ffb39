//! Local filesystem backend.
//!
//! Ids are plain paths. Listing is one level deep and ordered by file name,
//! so repeated runs over the same tree see entries in the same order.

use super::{FOLDER_MIME_TYPE, Storage, StorageEntry, StorageError};
use image::ImageFormat;
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

const FALLBACK_MIME_TYPE: &str = "application/octet-stream";

#[derive(Debug, Clone, Copy, Default)]
pub struct LocalStorage;

impl LocalStorage {
    pub fn new() -> Self {
        Self
    }
}

/// MIME type for a file path, from the image format table.
fn guess_mime_type(path: &Path) -> String {
    ImageFormat::from_path(path)
        .map(|format| format.to_mime_type().to_string())
        .unwrap_or_else(|_| FALLBACK_MIME_TYPE.to_string())
}

impl Storage for LocalStorage {
    fn list_children(&self, container_id: &str) -> Result<Vec<StorageEntry>, StorageError> {
        let root = Path::new(container_id);
        if !root.is_dir() {
            return Err(StorageError::NotFound(container_id.to_string()));
        }

        let mut children = Vec::new();
        for entry in WalkDir::new(root)
            .min_depth(1)
            .max_depth(1)
            .sort_by_file_name()
        {
            let entry = entry.map_err(|e| StorageError::Io(e.into()))?;
            let path = entry.path();
            let mime_type = if entry.file_type().is_dir() {
                FOLDER_MIME_TYPE.to_string()
            } else {
                guess_mime_type(path)
            };
            children.push(StorageEntry {
                id: path.to_string_lossy().to_string(),
                name: entry.file_name().to_string_lossy().to_string(),
                mime_type,
            });
        }
        Ok(children)
    }

    fn ensure_container(&self, parent_id: &str, name: &str) -> Result<String, StorageError> {
        let path: PathBuf = Path::new(parent_id).join(name);
        fs::create_dir_all(&path)?;
        Ok(path.to_string_lossy().to_string())
    }

    fn write_text(
        &self,
        parent_id: &str,
        file_name: &str,
        text: &str,
        _content_type: &str,
    ) -> Result<(), StorageError> {
        fs::write(Path::new(parent_id).join(file_name), text)?;
        Ok(())
    }

    fn read_bytes(&self, file_id: &str) -> Result<Vec<u8>, StorageError> {
        Ok(fs::read(file_id)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn lists_direct_children_sorted_by_name() {
        let tmp = TempDir::new().unwrap();
        fs::create_dir(tmp.path().join("b-dir")).unwrap();
        fs::write(tmp.path().join("c.jpg"), "x").unwrap();
        fs::write(tmp.path().join("a.txt"), "x").unwrap();
        fs::create_dir_all(tmp.path().join("b-dir/nested")).unwrap();

        let storage = LocalStorage::new();
        let children = storage
            .list_children(tmp.path().to_str().unwrap())
            .unwrap();
        let names: Vec<&str> = children.iter().map(|c| c.name.as_str()).collect();

        assert_eq!(names, vec!["a.txt", "b-dir", "c.jpg"]);
    }

    #[test]
    fn directories_carry_folder_marker() {
        let tmp = TempDir::new().unwrap();
        fs::create_dir(tmp.path().join("sub")).unwrap();

        let children = LocalStorage
            .list_children(tmp.path().to_str().unwrap())
            .unwrap();
        assert!(children[0].is_container());
    }

    #[test]
    fn image_mime_types_from_extension() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("a.JPG"), "x").unwrap();
        fs::write(tmp.path().join("b.png"), "x").unwrap();
        fs::write(tmp.path().join("c.webp"), "x").unwrap();
        fs::write(tmp.path().join("d.unknownext"), "x").unwrap();

        let children = LocalStorage
            .list_children(tmp.path().to_str().unwrap())
            .unwrap();
        let types: Vec<&str> = children.iter().map(|c| c.mime_type.as_str()).collect();

        assert_eq!(
            types,
            vec!["image/jpeg", "image/png", "image/webp", FALLBACK_MIME_TYPE]
        );
    }

    #[test]
    fn missing_container_is_not_found() {
        let result = LocalStorage.list_children("/definitely/not/here");
        assert!(matches!(result, Err(StorageError::NotFound(_))));
    }

    #[test]
    fn ensure_container_then_write_and_read_back() {
        let tmp = TempDir::new().unwrap();
        let storage = LocalStorage::new();

        let folder = storage
            .ensure_container(tmp.path().to_str().unwrap(), "20260214_스시로쿠")
            .unwrap();
        // Second call is a no-op returning the same id
        let again = storage
            .ensure_container(tmp.path().to_str().unwrap(), "20260214_스시로쿠")
            .unwrap();
        assert_eq!(folder, again);

        storage
            .write_text(&folder, "review.html", "<p>안녕</p>", "text/html")
            .unwrap();
        let file_id = Path::new(&folder).join("review.html");
        let bytes = storage.read_bytes(file_id.to_str().unwrap()).unwrap();
        assert_eq!(String::from_utf8(bytes).unwrap(), "<p>안녕</p>");
    }
}
