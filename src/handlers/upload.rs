use crate::config::IntakeMode;
use crate::error::AppError;
use crate::models::{FileInfo, FileListPage, UploadedFile};
use crate::services::upload::{IncomingFile, UploadFields};
use crate::utils::auth::Claims;
use axum::{
    Extension, Json,
    body::Body,
    extract::{Multipart, Path, Query, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use serde_json::{Value, json};

#[derive(Deserialize)]
pub struct ListQuery {
    pub page: Option<String>,
    pub limit: Option<String>,
}

#[utoipa::path(
    post,
    path = "/upload/files",
    request_body(content = Multipart, description = "Multi-file upload: `files` parts plus optional `category` and `description` fields"),
    responses(
        (status = 201, description = "Files uploaded", body = Vec<UploadedFile>),
        (status = 400, description = "No files or malformed request"),
        (status = 401, description = "Unauthorized"),
        (status = 413, description = "File exceeds the size limit"),
        (status = 415, description = "Disallowed file type (strict intake)")
    ),
    security(
        ("jwt" = [])
    )
)]
pub async fn upload_files(
    State(state): State<crate::AppState>,
    Extension(claims): Extension<Claims>,
    mut multipart: Multipart,
) -> Result<Response, AppError> {
    let mut accepted: Vec<IncomingFile> = Vec::new();
    let mut fields = UploadFields::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Validation(format!("malformed multipart request: {}", e)))?
    {
        let name = field.name().unwrap_or_default().to_string();

        match name.as_str() {
            // Accept both the bare and the bracketed field name; clients
            // built on form-data libraries disagree about which to send.
            "files" | "files[]" => {
                let original_name = field.file_name().unwrap_or("unnamed").to_string();
                let content_type = field
                    .content_type()
                    .map(|s| s.to_string())
                    .unwrap_or_else(|| mime::APPLICATION_OCTET_STREAM.to_string());

                let bytes = field.bytes().await.map_err(|e| {
                    AppError::Validation(format!("failed to read file part: {}", e))
                })?;

                if !state.service.is_valid_file_type(&content_type) {
                    match state.config.intake_mode {
                        IntakeMode::Permissive => {
                            // Dropped, not fatal: the rest of the batch
                            // still goes through.
                            tracing::debug!(
                                file = %original_name,
                                mime = %content_type,
                                "intake filter dropped disallowed file type"
                            );
                            continue;
                        }
                        IntakeMode::Strict => {
                            return Err(AppError::UnsupportedMedia(format!(
                                "file type not allowed: {}",
                                content_type
                            )));
                        }
                    }
                }

                if !state.service.is_valid_file_size(bytes.len()) {
                    return Err(AppError::PayloadTooLarge(format!(
                        "file too large: {}",
                        original_name
                    )));
                }

                if accepted.len() >= state.config.max_files_per_upload {
                    return Err(AppError::Validation(format!(
                        "too many files: at most {} per upload",
                        state.config.max_files_per_upload
                    )));
                }

                accepted.push(IncomingFile {
                    original_name,
                    mime_type: content_type,
                    bytes,
                });
            }
            "category" => {
                fields.category = field.text().await.ok().filter(|s| !s.is_empty());
            }
            "description" => {
                fields.description = field.text().await.ok().filter(|s| !s.is_empty());
            }
            _ => {}
        }
    }

    let uploaded = state
        .service
        .upload_files(accepted, &claims.sub, &fields)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "message": "files uploaded",
            "data": { "files": uploaded },
        })),
    )
        .into_response())
}

#[utoipa::path(
    get,
    path = "/upload/file/{file_id}",
    params(
        ("file_id" = String, Path, description = "Stored file id")
    ),
    responses(
        (status = 200, description = "File byte stream"),
        (status = 400, description = "Malformed file id"),
        (status = 404, description = "File not found")
    )
)]
pub async fn download_file(
    State(state): State<crate::AppState>,
    Path(file_id): Path<String>,
) -> Result<Response, AppError> {
    let (file, stream) = state.service.open_download(&file_id).await?;

    let disposition = format!(
        "inline; filename=\"{}\"",
        file.filename.replace(['"', '\\'], "_")
    );

    // Bytes are forwarded as the store produces them; a read error after
    // this point aborts the connection instead of a second status line.
    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, file.mime_type())
        .header(header::CONTENT_LENGTH, file.length)
        .header(header::CONTENT_DISPOSITION, disposition)
        .header(header::CACHE_CONTROL, "public, max-age=31536000")
        .body(Body::from_stream(stream))
        .map_err(|e| AppError::Internal(format!("failed to build download response: {}", e)))
}

#[utoipa::path(
    get,
    path = "/upload/info/{file_id}",
    params(
        ("file_id" = String, Path, description = "Stored file id")
    ),
    responses(
        (status = 200, description = "File metadata", body = FileInfo),
        (status = 400, description = "Malformed file id"),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "File not found")
    ),
    security(
        ("jwt" = [])
    )
)]
pub async fn get_file_info(
    State(state): State<crate::AppState>,
    Extension(_claims): Extension<Claims>,
    Path(file_id): Path<String>,
) -> Result<Json<Value>, AppError> {
    let info = state.service.get_file_info(&file_id).await?;

    Ok(Json(json!({
        "success": true,
        "data": info,
    })))
}

#[utoipa::path(
    get,
    path = "/upload/my-files",
    params(
        ("page" = Option<String>, Query, description = "1-based page, defaults to 1"),
        ("limit" = Option<String>, Query, description = "Page size, defaults to 10, clamped to the configured maximum")
    ),
    responses(
        (status = 200, description = "Paginated listing of the caller's files", body = FileListPage),
        (status = 401, description = "Unauthorized")
    ),
    security(
        ("jwt" = [])
    )
)]
pub async fn get_user_files(
    State(state): State<crate::AppState>,
    Extension(claims): Extension<Claims>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Value>, AppError> {
    // Absent or non-numeric values fall back to the defaults.
    let page = query
        .page
        .as_deref()
        .and_then(|v| v.parse().ok())
        .unwrap_or(1);
    let limit = query
        .limit
        .as_deref()
        .and_then(|v| v.parse().ok())
        .unwrap_or(10);

    let data = state.service.get_user_files(&claims.sub, page, limit).await?;

    Ok(Json(json!({
        "success": true,
        "data": data,
    })))
}

#[utoipa::path(
    delete,
    path = "/upload/file/{file_id}",
    params(
        ("file_id" = String, Path, description = "Stored file id")
    ),
    responses(
        (status = 200, description = "File deleted"),
        (status = 400, description = "Malformed file id"),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "File not found or not owned by the caller")
    ),
    security(
        ("jwt" = [])
    )
)]
pub async fn delete_file(
    State(state): State<crate::AppState>,
    Extension(claims): Extension<Claims>,
    Path(file_id): Path<String>,
) -> Result<Json<Value>, AppError> {
    let deleted = state.service.delete_file(&file_id, &claims.sub).await?;

    // Missing and not-owned deliberately look the same to the caller.
    if !deleted {
        return Err(AppError::NotFound(
            "file not found or no permission".to_string(),
        ));
    }

    Ok(Json(json!({
        "success": true,
        "message": "file deleted",
    })))
}
