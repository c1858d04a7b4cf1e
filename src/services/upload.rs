use crate::config::Config;
use crate::error::AppError;
use crate::models::{FileInfo, FileListEntry, FileListPage, Pagination, UploadedFile};
use crate::services::store::{
    ByteStream, FileQuery, ObjectStore, StoreError, StoredObject,
};
use crate::utils::validation::{is_valid_file_size, is_valid_file_type, unique_filename};
use bson::{DateTime, Document, doc, oid::ObjectId};
use bytes::Bytes;
use futures::future::join_all;
use std::sync::Arc;
use tracing::{error, info};

/// One file buffer accepted by the intake filter.
pub struct IncomingFile {
    pub original_name: String,
    pub mime_type: String,
    pub bytes: Bytes,
}

/// Optional form fields carried into every file's metadata.
#[derive(Debug, Default, Clone)]
pub struct UploadFields {
    pub category: Option<String>,
    pub description: Option<String>,
}

/// Upload orchestration and ownership-scoped lifecycle over the object
/// store: batch fan-out, listing, info, download resolution, deletion.
pub struct UploadService {
    store: Arc<dyn ObjectStore>,
    config: Config,
}

impl UploadService {
    pub fn new(store: Arc<dyn ObjectStore>, config: Config) -> Self {
        Self { store, config }
    }

    pub fn is_valid_file_type(&self, content_type: &str) -> bool {
        is_valid_file_type(content_type, &self.config.allowed_file_types)
    }

    pub fn is_valid_file_size(&self, size: usize) -> bool {
        is_valid_file_size(size, self.config.max_file_size)
    }

    /// Public download link for a stored file.
    pub fn file_url(&self, id: &ObjectId) -> String {
        format!("{}/upload/file/{}", self.config.api_base_url, id.to_hex())
    }

    fn parse_object_id(file_id: &str) -> Result<ObjectId, AppError> {
        ObjectId::parse_str(file_id)
            .map_err(|_| AppError::InvalidId(format!("'{}' is not a valid file id", file_id)))
    }

    fn build_metadata(
        &self,
        file: &IncomingFile,
        principal: &str,
        fields: &UploadFields,
    ) -> Document {
        let mut metadata = doc! {
            "originalName": file.original_name.as_str(),
            "mimeType": file.mime_type.as_str(),
            "sizeBytes": file.bytes.len() as i64,
            "uploadedBy": principal,
            "uploadedAt": DateTime::now(),
        };
        if let Some(category) = &fields.category {
            metadata.insert("category", category.as_str());
        }
        if let Some(description) = &fields.description {
            metadata.insert("description", description.as_str());
        }
        metadata
    }

    /// Stores every file of a batch concurrently. Results come back in
    /// input order, and the call returns only once all submissions have
    /// finished. Any hard failure fails the whole batch: siblings that
    /// already committed get a best-effort compensating delete so a
    /// half-uploaded batch is never served as a coherent set.
    pub async fn upload_files(
        &self,
        files: Vec<IncomingFile>,
        principal: &str,
        fields: &UploadFields,
    ) -> Result<Vec<UploadedFile>, AppError> {
        if files.is_empty() {
            return Err(AppError::Validation("no files were provided".to_string()));
        }
        if files.len() > self.config.max_files_per_upload {
            return Err(AppError::Validation(format!(
                "too many files: at most {} per upload",
                self.config.max_files_per_upload
            )));
        }

        let uploads = files.iter().map(|file| {
            let filename = unique_filename(&file.original_name);
            let metadata = self.build_metadata(file, principal, fields);
            let data = file.bytes.clone();
            async move { self.store.put(&filename, metadata, data).await }
        });

        let results = join_all(uploads).await;

        let mut first_err: Option<StoreError> = None;
        let mut stored: Vec<StoredObject> = Vec::with_capacity(results.len());
        for result in results {
            match result {
                Ok(object) => stored.push(object),
                Err(e) => {
                    if first_err.is_none() {
                        first_err = Some(e);
                    }
                }
            }
        }

        if let Some(err) = first_err {
            error!(
                user_id = %principal,
                committed = stored.len(),
                "batch upload failed, rolling back committed siblings: {}",
                err
            );
            for object in &stored {
                if let Err(e) = self.store.delete(object.id).await {
                    // Orphaned blob; operators reconcile from this log line.
                    error!(file_id = %object.id, "compensating delete failed: {}", e);
                }
            }
            return Err(err.into());
        }

        let uploaded: Vec<UploadedFile> = stored
            .iter()
            .map(|object| UploadedFile {
                file_id: object.id.to_hex(),
                filename: object.filename.clone(),
                url: self.file_url(&object.id),
                mime_type: object.mime_type(),
                size_bytes: object.length,
            })
            .collect();

        info!(
            user_id = %principal,
            files_count = uploaded.len(),
            file_ids = ?uploaded.iter().map(|f| f.file_id.as_str()).collect::<Vec<_>>(),
            "upload batch committed"
        );

        Ok(uploaded)
    }

    /// Programmatic entry point that rejects loudly instead of relying on
    /// the intake filter: disallowed type and oversize fail the whole
    /// batch before anything reaches the store.
    pub async fn upload_files_strict(
        &self,
        files: Vec<IncomingFile>,
        principal: &str,
        fields: &UploadFields,
    ) -> Result<Vec<UploadedFile>, AppError> {
        for file in &files {
            if !self.is_valid_file_type(&file.mime_type) {
                return Err(AppError::UnsupportedMedia(format!(
                    "file type not allowed: {}",
                    file.mime_type
                )));
            }
            if !self.is_valid_file_size(file.bytes.len()) {
                return Err(AppError::PayloadTooLarge(format!(
                    "file too large: {}",
                    file.original_name
                )));
            }
        }

        self.upload_files(files, principal, fields).await
    }

    /// Caller-scoped listing, newest first, 1-based pages. `limit` is
    /// clamped to the configured page-size cap rather than rejected.
    pub async fn get_user_files(
        &self,
        principal: &str,
        page: u64,
        limit: u64,
    ) -> Result<FileListPage, AppError> {
        let page = page.max(1);
        let limit = limit.clamp(1, self.config.max_page_size);
        // Saturates so an absurd caller-supplied page degrades to an
        // empty page instead of overflowing.
        let skip = page.saturating_sub(1).saturating_mul(limit);

        let query = FileQuery::Uploader(principal.to_string());
        let files = self.store.find(&query, skip, Some(limit as i64)).await?;
        let total = self.store.count(&query).await?;

        let entries = files
            .iter()
            .map(|file| FileListEntry {
                file_id: file.id.to_hex(),
                filename: file.filename.clone(),
                mime_type: file.mime_type(),
                size_bytes: file.length,
                uploaded_at: file.uploaded_at(),
                url: self.file_url(&file.id),
            })
            .collect();

        Ok(FileListPage {
            files: entries,
            pagination: Pagination {
                page,
                limit,
                total,
                total_pages: total.div_ceil(limit),
            },
        })
    }

    pub async fn get_file_info(&self, file_id: &str) -> Result<FileInfo, AppError> {
        let id = Self::parse_object_id(file_id)?;

        let file = self
            .store
            .find(&FileQuery::Id(id), 0, Some(1))
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| AppError::NotFound("file not found".to_string()))?;

        Ok(FileInfo {
            file_id: file.id.to_hex(),
            filename: file.filename.clone(),
            mime_type: file.mime_type(),
            size_bytes: file.length,
            uploaded_at: file.uploaded_at(),
            metadata: file.metadata,
        })
    }

    /// Resolves a file id to its catalog entry plus a chunk stream. The id
    /// format is checked before any store round-trip.
    pub async fn open_download(
        &self,
        file_id: &str,
    ) -> Result<(StoredObject, ByteStream), AppError> {
        let id = Self::parse_object_id(file_id)?;

        let file = self
            .store
            .find(&FileQuery::Id(id), 0, Some(1))
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| AppError::NotFound("file not found".to_string()))?;

        let stream = self.store.open_download(file.id).await.map_err(|e| match e {
            // Deleted between lookup and open; same outcome as never there.
            StoreError::NotFound => AppError::NotFound("file not found".to_string()),
            other => AppError::Store(other),
        })?;

        Ok((file, stream))
    }

    /// Owner-gated delete. Missing file and ownership mismatch are
    /// deliberately indistinguishable (`false`) so callers cannot probe
    /// for foreign ids; unexpected store failures also map to `false`
    /// after logging (fail closed, fail quiet).
    pub async fn delete_file(&self, file_id: &str, principal: &str) -> Result<bool, AppError> {
        let id = Self::parse_object_id(file_id)?;

        let found = self.store.find(&FileQuery::Id(id), 0, Some(1)).await?;
        let Some(file) = found.into_iter().next() else {
            return Ok(false);
        };

        // Files without an uploadedBy are deletable by no one here.
        if file.uploaded_by() != Some(principal) {
            info!(file_id = %file_id, user_id = %principal, "delete denied: not the uploader");
            return Ok(false);
        }

        match self.store.delete(id).await {
            Ok(()) => {
                info!(file_id = %file_id, user_id = %principal, "file deleted");
                Ok(true)
            }
            Err(e) => {
                // Includes the benign race where a concurrent delete won.
                error!(file_id = %file_id, "delete failed: {}", e);
                Ok(false)
            }
        }
    }
}
