use std::env;

/// How the multipart intake filter treats parts with a disallowed MIME type.
///
/// `Permissive` drops the offending part and keeps parsing the request, so a
/// batch can succeed with fewer files. `Strict` rejects the whole request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntakeMode {
    Permissive,
    Strict,
}

impl IntakeMode {
    fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "permissive" => Some(IntakeMode::Permissive),
            "strict" => Some(IntakeMode::Strict),
            _ => None,
        }
    }
}

/// Which object store backend serves uploads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    /// MongoDB GridFS bucket (production default).
    GridFs,
    /// In-process store, useful for tests and local development.
    Memory,
}

impl StorageBackend {
    fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "gridfs" => Some(StorageBackend::GridFs),
            "memory" => Some(StorageBackend::Memory),
            _ => None,
        }
    }
}

/// Upload service configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Maximum size of a single file in bytes (default: 10 MiB)
    pub max_file_size: usize,

    /// Maximum number of files accepted per upload request (default: 5)
    pub max_files_per_upload: usize,

    /// MIME types accepted by the intake filter
    pub allowed_file_types: Vec<String>,

    /// GridFS bucket name holding files and chunks
    pub bucket_name: String,

    /// GridFS chunk size in bytes (default: 255 KiB)
    pub chunk_size_bytes: u32,

    /// Upper bound for the `limit` query parameter on listings
    pub max_page_size: u64,

    /// Intake filter policy for disallowed MIME types
    pub intake_mode: IntakeMode,

    /// Object store backend selection
    pub storage_backend: StorageBackend,

    /// MongoDB connection string
    pub mongodb_uri: String,

    /// MongoDB database name
    pub mongodb_database: String,

    /// Base URL used when building public download links
    pub api_base_url: String,

    /// HMAC secret for bearer token verification
    pub jwt_secret: String,

    /// TCP port the server binds to
    pub port: u16,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_file_size: 10 * 1024 * 1024, // 10 MiB
            max_files_per_upload: 5,
            allowed_file_types: vec![
                "image/jpeg".to_string(),
                "image/png".to_string(),
                "image/gif".to_string(),
                "video/mp4".to_string(),
                "video/quicktime".to_string(),
            ],
            bucket_name: "super_app_uploads".to_string(),
            chunk_size_bytes: 261_120,
            max_page_size: 100,
            intake_mode: IntakeMode::Permissive,
            storage_backend: StorageBackend::GridFs,
            mongodb_uri: "mongodb://localhost:27017".to_string(),
            mongodb_database: "super_app".to_string(),
            api_base_url: "http://localhost:3000".to_string(),
            jwt_secret: "secret".to_string(),
            port: 3000,
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let default = Self::default();

        Self {
            max_file_size: env::var("MAX_FILE_SIZE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.max_file_size),

            max_files_per_upload: env::var("MAX_FILES_PER_UPLOAD")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.max_files_per_upload),

            allowed_file_types: env::var("ALLOWED_FILE_TYPES")
                .ok()
                .map(|v| parse_mime_list(&v))
                .filter(|list| !list.is_empty())
                .unwrap_or(default.allowed_file_types),

            bucket_name: env::var("GRIDFS_BUCKET_NAME").unwrap_or(default.bucket_name),

            chunk_size_bytes: env::var("GRIDFS_CHUNK_SIZE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.chunk_size_bytes),

            max_page_size: env::var("MAX_PAGE_SIZE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.max_page_size),

            intake_mode: env::var("UPLOAD_INTAKE_MODE")
                .ok()
                .and_then(|v| IntakeMode::parse(&v))
                .unwrap_or(default.intake_mode),

            storage_backend: env::var("STORAGE_BACKEND")
                .ok()
                .and_then(|v| StorageBackend::parse(&v))
                .unwrap_or(default.storage_backend),

            mongodb_uri: env::var("MONGODB_URI").unwrap_or(default.mongodb_uri),

            mongodb_database: env::var("MONGODB_DATABASE").unwrap_or(default.mongodb_database),

            api_base_url: env::var("API_BASE_URL").unwrap_or(default.api_base_url),

            jwt_secret: env::var("JWT_SECRET").unwrap_or(default.jwt_secret),

            port: env::var("PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.port),
        }
    }

    /// Total request body cap: every file at max size plus multipart framing
    pub fn request_body_limit(&self) -> usize {
        self.max_file_size * self.max_files_per_upload + 1024 * 1024
    }
}

fn parse_mime_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_ascii_lowercase())
        .filter(|s| !s.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.max_file_size, 10 * 1024 * 1024);
        assert_eq!(config.max_files_per_upload, 5);
        assert_eq!(config.chunk_size_bytes, 261_120);
        assert_eq!(config.bucket_name, "super_app_uploads");
        assert_eq!(config.intake_mode, IntakeMode::Permissive);
        assert!(config.allowed_file_types.contains(&"image/png".to_string()));
    }

    #[test]
    fn test_parse_mime_list() {
        let list = parse_mime_list("image/jpeg, Image/PNG ,,video/mp4");
        assert_eq!(list, vec!["image/jpeg", "image/png", "video/mp4"]);
        assert!(parse_mime_list("").is_empty());
    }

    #[test]
    fn test_intake_mode_parse() {
        assert_eq!(IntakeMode::parse("strict"), Some(IntakeMode::Strict));
        assert_eq!(IntakeMode::parse("PERMISSIVE"), Some(IntakeMode::Permissive));
        assert_eq!(IntakeMode::parse("loose"), None);
    }

    #[test]
    fn test_request_body_limit() {
        let config = Config::default();
        assert_eq!(
            config.request_body_limit(),
            10 * 1024 * 1024 * 5 + 1024 * 1024
        );
    }
}
