//! JSON records exchanged with clients

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use url::form_urlencoded;

use crate::storage::{Locator, StoredFile};

/// Client-facing description of a stored file
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FileRecord {
    /// Storage name, used as the identifier in every other route
    pub id: String,
    /// Original file name
    pub name: String,
    pub filename: String,
    /// Where the client can fetch the file
    pub path: String,
    pub download_url: String,
    #[serde(rename = "type")]
    pub mime_type: String,
    pub size: u64,
    pub upload_date: DateTime<Utc>,
}

impl From<&StoredFile> for FileRecord {
    fn from(file: &StoredFile) -> Self {
        // Form encoding writes spaces as '+', which is not a space inside a path
        let encoded = form_urlencoded::byte_serialize(file.storage_name.as_bytes())
            .collect::<String>()
            .replace('+', "%20");
        let path = match &file.locator {
            Locator::Url(url) => url.clone(),
            Locator::Path(_) => format!("/uploads/{}", encoded),
        };
        Self {
            id: file.storage_name.clone(),
            name: file.original_name.clone(),
            filename: file.storage_name.clone(),
            path,
            download_url: format!("/download?filename={}", encoded),
            mime_type: file.mime_type.clone(),
            size: file.size_bytes,
            upload_date: file.created_at,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UploadResponse {
    pub success: bool,
    pub files: Vec<FileRecord>,
    pub count: usize,
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct FileListResponse {
    pub success: bool,
    pub files: Vec<FileRecord>,
    pub count: usize,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DeleteResponse {
    pub success: bool,
    pub message: String,
    pub deleted: usize,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

/// Query string carrying a storage name
#[derive(Debug, Deserialize)]
pub struct FilenameQuery {
    pub filename: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_file_record_for_local_entry() {
        let created_at = Utc::now();
        let file = StoredFile::new(
            "1700000000000-7-my report.pdf",
            None,
            1024,
            created_at,
            Locator::Path(PathBuf::from("/srv/uploads/1700000000000-7-my report.pdf")),
        );
        let record = FileRecord::from(&file);
        assert_eq!(record.id, "1700000000000-7-my report.pdf");
        assert_eq!(record.name, "my report.pdf");
        assert_eq!(record.path, "/uploads/1700000000000-7-my%20report.pdf");
        assert_eq!(record.download_url, "/download?filename=1700000000000-7-my%20report.pdf");
        assert_eq!(record.mime_type, "application/pdf");

        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["type"], "application/pdf");
        assert_eq!(json["size"], 1024);
        assert!(json.get("uploadDate").is_some());
        assert!(json.get("downloadUrl").is_some());
    }

    #[test]
    fn test_file_record_for_remote_entry() {
        let file = StoredFile::new(
            "1-2-a.txt",
            Some("text/plain"),
            5,
            Utc::now(),
            Locator::Url("https://blobs.example.com/1-2-a.txt".to_string()),
        );
        assert_eq!(FileRecord::from(&file).path, "https://blobs.example.com/1-2-a.txt");
    }
}
