//! Google Drive backend (Drive v3 REST, bearer-token auth).
//!
//! Ids are Drive file ids. Listing is paginated and excludes trashed items.
//! Writes look up an existing child by name first and overwrite its content,
//! so re-running a folder replaces its artifacts instead of duplicating them.
//!
//! Authentication is a pre-issued OAuth access token (for example from
//! `gcloud auth print-access-token`); token refresh is the caller's concern.

use super::{FOLDER_MIME_TYPE, Storage, StorageEntry, StorageError};
use reqwest::blocking::Client;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

const FILES_URL: &str = "https://www.googleapis.com/drive/v3/files";
const UPLOAD_URL: &str = "https://www.googleapis.com/upload/drive/v3/files";
const PAGE_SIZE: &str = "1000";

pub struct DriveStorage {
    client: Client,
    access_token: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FileList {
    #[serde(default)]
    files: Vec<DriveFile>,
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DriveFile {
    #[serde(default)]
    id: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    mime_type: String,
}

impl DriveStorage {
    pub fn new(access_token: impl Into<String>, timeout: Duration) -> Result<Self, StorageError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            access_token: access_token.into(),
        })
    }

    fn list_page(&self, query: &str, page_token: Option<&str>) -> Result<FileList, StorageError> {
        let mut params = vec![
            ("q", query),
            ("fields", "nextPageToken, files(id,name,mimeType)"),
            ("pageSize", PAGE_SIZE),
            ("supportsAllDrives", "true"),
            ("includeItemsFromAllDrives", "true"),
        ];
        if let Some(token) = page_token {
            params.push(("pageToken", token));
        }
        let response = self
            .client
            .get(FILES_URL)
            .bearer_auth(&self.access_token)
            .query(&params)
            .send()?;
        Ok(check(response)?.json()?)
    }

    fn find_child_id(
        &self,
        parent_id: &str,
        name: &str,
        kind: ChildKind,
    ) -> Result<Option<String>, StorageError> {
        let page = self.list_page(&child_query(parent_id, name, kind), None)?;
        Ok(page.files.into_iter().next().map(|f| f.id))
    }

    fn create_file(
        &self,
        parent_id: &str,
        name: &str,
        mime_type: &str,
    ) -> Result<String, StorageError> {
        let metadata = json!({
            "name": name,
            "mimeType": mime_type,
            "parents": [parent_id],
        });
        let response = self
            .client
            .post(FILES_URL)
            .bearer_auth(&self.access_token)
            .query(&[("fields", "id"), ("supportsAllDrives", "true")])
            .json(&metadata)
            .send()?;
        let created: DriveFile = check(response)?.json()?;
        if created.id.is_empty() {
            return Err(StorageError::Remote(format!("Drive returned no id for {name}")));
        }
        Ok(created.id)
    }
}

/// Escape a value for use inside a single-quoted Drive query literal.
pub(crate) fn escape_query(value: &str) -> String {
    value.replace('\\', "\\\\").replace('\'', "\\'")
}

fn children_query(parent_id: &str) -> String {
    format!("'{}' in parents and trashed=false", escape_query(parent_id))
}

/// Which kind of same-named child a lookup may match.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ChildKind {
    Folder,
    File,
}

fn child_query(parent_id: &str, name: &str, kind: ChildKind) -> String {
    let mime_filter = match kind {
        ChildKind::Folder => "=",
        ChildKind::File => "!=",
    };
    format!(
        "{} and name='{}' and mimeType{mime_filter}'{FOLDER_MIME_TYPE}'",
        children_query(parent_id),
        escape_query(name)
    )
}

fn check(
    response: reqwest::blocking::Response,
) -> Result<reqwest::blocking::Response, StorageError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().unwrap_or_default();
    Err(StorageError::Remote(format!("Drive API returned {status}: {body}")))
}

impl Storage for DriveStorage {
    fn list_children(&self, container_id: &str) -> Result<Vec<StorageEntry>, StorageError> {
        let query = children_query(container_id);
        let mut entries = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let page = self.list_page(&query, page_token.as_deref())?;
            entries.extend(
                page.files
                    .into_iter()
                    .filter(|f| {
                        !f.id.is_empty() && !f.name.is_empty() && !f.mime_type.is_empty()
                    })
                    .map(|f| StorageEntry {
                        id: f.id,
                        name: f.name,
                        mime_type: f.mime_type,
                    }),
            );
            match page.next_page_token {
                Some(token) if !token.is_empty() => page_token = Some(token),
                _ => break,
            }
        }
        Ok(entries)
    }

    fn ensure_container(&self, parent_id: &str, name: &str) -> Result<String, StorageError> {
        if let Some(id) = self.find_child_id(parent_id, name, ChildKind::Folder)? {
            return Ok(id);
        }
        self.create_file(parent_id, name, FOLDER_MIME_TYPE)
    }

    fn write_text(
        &self,
        parent_id: &str,
        file_name: &str,
        text: &str,
        content_type: &str,
    ) -> Result<(), StorageError> {
        let file_id = match self.find_child_id(parent_id, file_name, ChildKind::File)? {
            Some(id) => id,
            None => self.create_file(parent_id, file_name, content_type)?,
        };
        let response = self
            .client
            .patch(format!("{UPLOAD_URL}/{file_id}"))
            .bearer_auth(&self.access_token)
            .query(&[("uploadType", "media"), ("supportsAllDrives", "true")])
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .body(text.as_bytes().to_vec())
            .send()?;
        check(response)?;
        Ok(())
    }

    fn read_bytes(&self, file_id: &str) -> Result<Vec<u8>, StorageError> {
        let response = self
            .client
            .get(format!("{FILES_URL}/{file_id}"))
            .bearer_auth(&self.access_token)
            .query(&[("alt", "media"), ("supportsAllDrives", "true")])
            .send()?;
        Ok(check(response)?.bytes()?.to_vec())
    }
}
