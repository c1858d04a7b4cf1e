use async_trait::async_trait;
use bson::{Bson, DateTime, Document, doc, oid::ObjectId};
use bytes::Bytes;
use futures::io::AsyncWriteExt;
use futures::stream::{self, BoxStream, StreamExt, TryStreamExt};
use mongodb::gridfs::{FilesCollectionDocument, GridFsBucket};
use mongodb::options::GridFsBucketOptions;
use mongodb::{Collection, Database};
use std::collections::HashMap;
use std::sync::Mutex;
use thiserror::Error;
use tokio_util::compat::FuturesAsyncReadCompatExt;
use tokio_util::io::ReaderStream;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("object not found")]
    NotFound,

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("store backend error: {0}")]
    Backend(String),
}

/// Chunked byte stream handed to the download path.
pub type ByteStream = BoxStream<'static, Result<Bytes, StoreError>>;

/// Metadata view of one stored file, as recorded by the store's catalog.
#[derive(Debug, Clone)]
pub struct StoredObject {
    pub id: ObjectId,
    pub filename: String,
    pub length: u64,
    pub upload_date: DateTime,
    pub metadata: Option<Document>,
}

impl StoredObject {
    pub fn mime_type(&self) -> String {
        self.metadata
            .as_ref()
            .and_then(|m| m.get_str("mimeType").ok())
            .unwrap_or(mime::APPLICATION_OCTET_STREAM.as_ref())
            .to_string()
    }

    pub fn uploaded_by(&self) -> Option<&str> {
        self.metadata
            .as_ref()
            .and_then(|m| m.get_str("uploadedBy").ok())
    }

    pub fn uploaded_at(&self) -> chrono::DateTime<chrono::Utc> {
        self.upload_date.to_chrono()
    }

    fn from_files_doc(doc: FilesCollectionDocument) -> Result<Self, StoreError> {
        let id = doc
            .id
            .as_object_id()
            .ok_or_else(|| StoreError::Backend("file id is not an ObjectId".to_string()))?;

        Ok(Self {
            id,
            filename: doc.filename.unwrap_or_default(),
            length: doc.length,
            upload_date: doc.upload_date,
            metadata: doc.metadata,
        })
    }
}

/// Catalog filters supported by the adapter.
#[derive(Debug, Clone)]
pub enum FileQuery {
    Id(ObjectId),
    Uploader(String),
}

impl FileQuery {
    fn to_document(&self) -> Document {
        match self {
            FileQuery::Id(id) => doc! { "_id": *id },
            FileQuery::Uploader(user_id) => doc! { "metadata.uploadedBy": user_id.as_str() },
        }
    }
}

/// Thin adapter over a chunked object store.
///
/// Holds no cross-request state beyond the bucket binding; concurrency
/// safety is delegated to the backing store.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Writes a full buffer as one stored file and commits it. A failed
    /// write must leave nothing discoverable by `find` or `open_download`.
    async fn put(
        &self,
        filename: &str,
        metadata: Document,
        data: Bytes,
    ) -> Result<StoredObject, StoreError>;

    /// Catalog lookup, sorted by upload date descending.
    async fn find(
        &self,
        query: &FileQuery,
        skip: u64,
        limit: Option<i64>,
    ) -> Result<Vec<StoredObject>, StoreError>;

    async fn count(&self, query: &FileQuery) -> Result<u64, StoreError>;

    /// Opens a chunk stream for an existing file. Missing ids surface as
    /// `StoreError::NotFound` before any bytes are produced.
    async fn open_download(&self, id: ObjectId) -> Result<ByteStream, StoreError>;

    /// Removes the file and all of its chunks as a unit.
    async fn delete(&self, id: ObjectId) -> Result<(), StoreError>;
}

fn map_mongo_err(e: mongodb::error::Error) -> StoreError {
    use mongodb::error::{ErrorKind, GridFsErrorKind};

    if matches!(
        *e.kind,
        ErrorKind::GridFs(GridFsErrorKind::FileNotFound { .. })
    ) {
        StoreError::NotFound
    } else {
        StoreError::Backend(e.to_string())
    }
}

/// GridFS-backed store: files catalog in `<bucket>.files`, content split
/// into fixed-size chunks in `<bucket>.chunks`.
pub struct GridFsStore {
    bucket: GridFsBucket,
    files: Collection<Document>,
}

impl GridFsStore {
    pub fn new(db: &Database, bucket_name: &str, chunk_size_bytes: u32) -> Self {
        let bucket = db.gridfs_bucket(
            GridFsBucketOptions::builder()
                .bucket_name(bucket_name.to_string())
                .chunk_size_bytes(chunk_size_bytes)
                .build(),
        );

        // The bucket API exposes no count, so keep a handle on the files
        // collection for pagination totals.
        let files = db.collection(&format!("{}.files", bucket_name));

        Self { bucket, files }
    }
}

#[async_trait]
impl ObjectStore for GridFsStore {
    async fn put(
        &self,
        filename: &str,
        metadata: Document,
        data: Bytes,
    ) -> Result<StoredObject, StoreError> {
        let mut upload = self
            .bucket
            .open_upload_stream(filename)
            .metadata(metadata)
            .await
            .map_err(map_mongo_err)?;

        let id = upload
            .id()
            .as_object_id()
            .ok_or_else(|| StoreError::Backend("upload id is not an ObjectId".to_string()))?;

        // GridFS only writes the files document on close, so an aborted
        // write is never visible to readers. abort() drops orphan chunks.
        if let Err(e) = upload.write_all(&data).await {
            let _ = upload.abort().await;
            return Err(StoreError::Io(e));
        }
        if let Err(e) = upload.close().await {
            let _ = upload.abort().await;
            return Err(StoreError::Io(e));
        }

        // Re-read the committed files document so callers see the
        // store-assigned upload date.
        let committed = self.find(&FileQuery::Id(id), 0, Some(1)).await?;
        committed.into_iter().next().ok_or(StoreError::NotFound)
    }

    async fn find(
        &self,
        query: &FileQuery,
        skip: u64,
        limit: Option<i64>,
    ) -> Result<Vec<StoredObject>, StoreError> {
        let mut find = self
            .bucket
            .find(query.to_document())
            .sort(doc! { "uploadDate": -1 });

        if skip > 0 {
            find = find.skip(skip);
        }
        if let Some(limit) = limit {
            find = find.limit(limit);
        }

        let cursor = find.await.map_err(map_mongo_err)?;
        let docs: Vec<FilesCollectionDocument> =
            cursor.try_collect().await.map_err(map_mongo_err)?;

        docs.into_iter().map(StoredObject::from_files_doc).collect()
    }

    async fn count(&self, query: &FileQuery) -> Result<u64, StoreError> {
        self.files
            .count_documents(query.to_document())
            .await
            .map_err(map_mongo_err)
    }

    async fn open_download(&self, id: ObjectId) -> Result<ByteStream, StoreError> {
        let download = self
            .bucket
            .open_download_stream(Bson::ObjectId(id))
            .await
            .map_err(map_mongo_err)?;

        Ok(ReaderStream::new(download.compat())
            .map_err(StoreError::from)
            .boxed())
    }

    async fn delete(&self, id: ObjectId) -> Result<(), StoreError> {
        self.bucket
            .delete(Bson::ObjectId(id))
            .await
            .map_err(map_mongo_err)
    }
}

#[derive(Clone)]
struct MemoryObject {
    seq: u64,
    filename: String,
    upload_date: DateTime,
    metadata: Document,
    data: Bytes,
}

impl MemoryObject {
    fn matches(&self, query: &FileQuery, id: &ObjectId) -> bool {
        match query {
            FileQuery::Id(wanted) => wanted == id,
            FileQuery::Uploader(user_id) => {
                self.metadata.get_str("uploadedBy") == Ok(user_id.as_str())
            }
        }
    }
}

#[derive(Default)]
struct MemoryState {
    seq: u64,
    objects: HashMap<ObjectId, MemoryObject>,
}

/// In-process store with the same visibility semantics as GridFS: an
/// object either exists completely or not at all.
pub struct MemoryStore {
    chunk_size: usize,
    state: Mutex<MemoryState>,
}

impl MemoryStore {
    pub fn new(chunk_size: usize) -> Self {
        Self {
            chunk_size: chunk_size.max(1),
            state: Mutex::new(MemoryState::default()),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Matching objects, newest first. Uploads in the same millisecond are
    /// ordered by insertion sequence.
    fn matching(&self, query: &FileQuery) -> Vec<(ObjectId, MemoryObject)> {
        let state = self.lock();
        let mut matches: Vec<(ObjectId, MemoryObject)> = state
            .objects
            .iter()
            .filter(|(id, obj)| obj.matches(query, id))
            .map(|(id, obj)| (*id, obj.clone()))
            .collect();

        matches.sort_by(|(_, a), (_, b)| (b.upload_date, b.seq).cmp(&(a.upload_date, a.seq)));
        matches
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn put(
        &self,
        filename: &str,
        metadata: Document,
        data: Bytes,
    ) -> Result<StoredObject, StoreError> {
        let id = ObjectId::new();
        let upload_date = DateTime::now();

        let mut state = self.lock();
        state.seq += 1;
        let object = MemoryObject {
            seq: state.seq,
            filename: filename.to_string(),
            upload_date,
            metadata: metadata.clone(),
            data: data.clone(),
        };
        state.objects.insert(id, object);

        Ok(StoredObject {
            id,
            filename: filename.to_string(),
            length: data.len() as u64,
            upload_date,
            metadata: Some(metadata),
        })
    }

    async fn find(
        &self,
        query: &FileQuery,
        skip: u64,
        limit: Option<i64>,
    ) -> Result<Vec<StoredObject>, StoreError> {
        let limit = limit.map(|l| l.max(0) as usize).unwrap_or(usize::MAX);

        Ok(self
            .matching(query)
            .into_iter()
            .skip(skip as usize)
            .take(limit)
            .map(|(id, obj)| StoredObject {
                id,
                filename: obj.filename,
                length: obj.data.len() as u64,
                upload_date: obj.upload_date,
                metadata: Some(obj.metadata),
            })
            .collect())
    }

    async fn count(&self, query: &FileQuery) -> Result<u64, StoreError> {
        Ok(self.matching(query).len() as u64)
    }

    async fn open_download(&self, id: ObjectId) -> Result<ByteStream, StoreError> {
        let data = {
            let state = self.lock();
            state
                .objects
                .get(&id)
                .map(|obj| obj.data.clone())
                .ok_or(StoreError::NotFound)?
        };

        let chunks: Vec<Result<Bytes, StoreError>> = data
            .chunks(self.chunk_size)
            .map(|c| Ok(Bytes::copy_from_slice(c)))
            .collect();

        Ok(stream::iter(chunks).boxed())
    }

    async fn delete(&self, id: ObjectId) -> Result<(), StoreError> {
        let mut state = self.lock();
        state
            .objects
            .remove(&id)
            .map(|_| ())
            .ok_or(StoreError::NotFound)
    }
}
