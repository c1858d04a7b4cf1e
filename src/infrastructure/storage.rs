use crate::config::{Config, StorageBackend};
use crate::infrastructure::database;
use crate::services::store::{GridFsStore, MemoryStore, ObjectStore};
use std::sync::Arc;
use tracing::{info, warn};

/// Builds the configured object store backend.
pub async fn setup_storage(config: &Config) -> anyhow::Result<Arc<dyn ObjectStore>> {
    match config.storage_backend {
        StorageBackend::GridFs => {
            let db = database::setup_database(config).await?;
            info!(
                "Using GridFS bucket '{}' (chunk size {} bytes)",
                config.bucket_name, config.chunk_size_bytes
            );
            Ok(Arc::new(GridFsStore::new(
                &db,
                &config.bucket_name,
                config.chunk_size_bytes,
            )))
        }
        StorageBackend::Memory => {
            warn!("Using in-memory object store; uploads will not survive a restart");
            Ok(Arc::new(MemoryStore::new(config.chunk_size_bytes as usize)))
        }
    }
}
