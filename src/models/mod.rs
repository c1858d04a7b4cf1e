use bson::Document;
use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;

/// One committed file from an upload batch, in input order.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UploadedFile {
    pub file_id: String,
    /// Store-internal name: `<ingest-millis>_<original-name>`
    pub filename: String,
    /// Public download link (the id acts as a bearer capability)
    pub url: String,
    pub mime_type: String,
    pub size_bytes: u64,
}

/// Metadata view returned by the info endpoint.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct FileInfo {
    pub file_id: String,
    pub filename: String,
    pub mime_type: String,
    pub size_bytes: u64,
    pub uploaded_at: DateTime<Utc>,
    /// Free-form metadata attached at creation time
    #[schema(value_type = Object)]
    pub metadata: Option<Document>,
}

/// Listing entry for the caller's own files.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct FileListEntry {
    pub file_id: String,
    pub filename: String,
    pub mime_type: String,
    pub size_bytes: u64,
    pub uploaded_at: DateTime<Utc>,
    pub url: String,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub page: u64,
    pub limit: u64,
    pub total: u64,
    pub total_pages: u64,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct FileListPage {
    pub files: Vec<FileListEntry>,
    pub pagination: Pagination,
}
