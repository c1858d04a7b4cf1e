pub mod config;
pub mod error;
pub mod handlers;
pub mod infrastructure;
pub mod middleware;
pub mod models;
pub mod services;
pub mod utils;

use crate::config::Config;
use crate::services::upload::UploadService;
use axum::{
    Router,
    extract::DefaultBodyLimit,
    middleware::from_fn_with_state,
    routing::{delete, get, post},
};
use std::sync::Arc;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::upload::upload_files,
        handlers::upload::download_file,
        handlers::upload::get_file_info,
        handlers::upload::get_user_files,
        handlers::upload::delete_file,
    ),
    components(
        schemas(
            models::UploadedFile,
            models::FileInfo,
            models::FileListEntry,
            models::Pagination,
            models::FileListPage,
        )
    ),
    tags(
        (name = "upload", description = "File upload, retrieval and lifecycle endpoints")
    )
)]
pub struct ApiDoc;

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<UploadService>,
    pub config: Config,
}

pub fn create_app(state: AppState) -> Router {
    // Download is public by design: holding a file id grants read access.
    let public = Router::new().route(
        "/upload/file/:file_id",
        get(handlers::upload::download_file),
    );

    let protected = Router::new()
        .route("/upload/files", post(handlers::upload::upload_files))
        // Compatibility aliases kept for older mobile clients.
        .route("/upload/image", post(handlers::upload::upload_files))
        .route("/upload/video", post(handlers::upload::upload_files))
        .route("/upload/info/:file_id", get(handlers::upload::get_file_info))
        .route("/upload/my-files", get(handlers::upload::get_user_files))
        .route("/upload/file/:file_id", delete(handlers::upload::delete_file))
        .layer(from_fn_with_state(
            state.clone(),
            middleware::auth::auth_middleware,
        ));

    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .merge(public)
        .merge(protected)
        .layer(DefaultBodyLimit::max(state.config.request_body_limit()))
        .with_state(state)
}
