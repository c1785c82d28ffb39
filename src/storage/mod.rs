//! Storage backends for reading visit folders and writing artifacts.
//!
//! The pipeline never touches a filesystem or remote API directly. It sees
//! an opaque tree of *containers* and *files*, each addressed by an id
//! string, through the [`Storage`] trait:
//!
//! | Backend | Container id | File id |
//! |---------|--------------|---------|
//! | [`LocalStorage`] | directory path | file path |
//! | [`DriveStorage`] | Drive folder id | Drive file id |
//!
//! Containers are recognised by their type marker
//! ([`FOLDER_MIME_TYPE`]); every other entry is a file with a MIME type.
//! Both backends use the same marker so stage 1 can stay backend-agnostic.

pub mod drive;
pub mod local;

pub use drive::DriveStorage;
pub use local::LocalStorage;

use thiserror::Error;

/// Type marker carried by container entries.
pub const FOLDER_MIME_TYPE: &str = "application/vnd.google-apps.folder";

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Container not found: {0}")]
    NotFound(String),
    #[error("Storage backend error: {0}")]
    Remote(String),
}

/// A child of a container, as listed by the backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageEntry {
    pub id: String,
    pub name: String,
    pub mime_type: String,
}

impl StorageEntry {
    pub fn is_container(&self) -> bool {
        self.mime_type == FOLDER_MIME_TYPE
    }
}

/// The four operations the pipeline needs from a storage backend.
pub trait Storage {
    /// List the direct children of a container.
    fn list_children(&self, container_id: &str) -> Result<Vec<StorageEntry>, StorageError>;

    /// Return the id of the child container `name`, creating it if missing.
    fn ensure_container(&self, parent_id: &str, name: &str) -> Result<String, StorageError>;

    /// Create or overwrite a text file inside a container.
    fn write_text(
        &self,
        parent_id: &str,
        file_name: &str,
        text: &str,
        content_type: &str,
    ) -> Result<(), StorageError>;

    /// Read a file's full contents.
    fn read_bytes(&self, file_id: &str) -> Result<Vec<u8>, StorageError>;
}
