use chrono::Utc;

/// Checks a MIME type against the configured allow-list.
///
/// Comparison ignores case and any `;charset=` style parameters.
pub fn is_valid_file_type(content_type: &str, allowed: &[String]) -> bool {
    let normalized = content_type
        .split(';')
        .next()
        .unwrap_or("")
        .trim()
        .to_ascii_lowercase();

    allowed.iter().any(|a| a == &normalized)
}

/// Checks a file size against the configured per-file maximum.
pub fn is_valid_file_size(size: usize, max_size: usize) -> bool {
    size <= max_size
}

/// Builds the store-internal filename: `<ingest-millis>_<original-name>`.
///
/// The timestamp prefix keeps concurrent uploads of the same original name
/// from colliding; the original name is preserved for download headers.
pub fn unique_filename(original_name: &str) -> String {
    format!("{}_{}", Utc::now().timestamp_millis(), original_name)
}
