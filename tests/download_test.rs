use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode},
};
use http_body_util::BodyExt;
use marketplace_upload::config::Config;
use marketplace_upload::services::store::MemoryStore;
use marketplace_upload::services::upload::UploadService;
use marketplace_upload::utils::auth::create_jwt;
use marketplace_upload::{AppState, create_app};
use serde_json::Value;
use std::sync::Arc;
use tower::ServiceExt;

const BOUNDARY: &str = "---------------------------987654321098765432109876543";

fn test_config() -> Config {
    Config {
        jwt_secret: "test_secret".to_string(),
        ..Config::default()
    }
}

fn build_app(config: &Config) -> Router {
    let store = Arc::new(MemoryStore::new(config.chunk_size_bytes as usize));
    let service = Arc::new(UploadService::new(store, config.clone()));
    create_app(AppState {
        service,
        config: config.clone(),
    })
}

fn upload_body(filenames: &[&str]) -> String {
    let mut body = String::new();
    for filename in filenames {
        body.push_str(&format!(
            "--{BOUNDARY}\r\n\
            Content-Disposition: form-data; name=\"files\"; filename=\"{filename}\"\r\n\
            Content-Type: image/png\r\n\r\n\
            contents of {filename}\r\n"
        ));
    }
    body.push_str(&format!(
        "--{BOUNDARY}\r\n\
        Content-Disposition: form-data; name=\"description\"\r\n\r\n\
        integration fixture\r\n\
        --{BOUNDARY}--\r\n"
    ));
    body
}

async fn upload_files(app: &Router, token: &str, filenames: &[&str]) -> Vec<String> {
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/upload/files")
                .header("Authorization", format!("Bearer {}", token))
                .header(
                    "Content-Type",
                    format!("multipart/form-data; boundary={}", BOUNDARY),
                )
                .body(Body::from(upload_body(filenames)))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    let json = json_body(response).await;
    json["data"]["files"]
        .as_array()
        .unwrap()
        .iter()
        .map(|f| f["fileId"].as_str().unwrap().to_string())
        .collect()
}

async fn authed_get(app: &Router, token: &str, uri: &str) -> axum::response::Response {
    app.clone()
        .oneshot(
            Request::builder()
                .uri(uri)
                .header("Authorization", format!("Bearer {}", token))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap()
}

async fn authed_delete(app: &Router, token: &str, uri: &str) -> axum::response::Response {
    app.clone()
        .oneshot(
            Request::builder()
                .method("DELETE")
                .uri(uri)
                .header("Authorization", format!("Bearer {}", token))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap()
}

async fn json_body(response: axum::response::Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_download_with_malformed_id_is_bad_request() {
    let config = test_config();
    let app = build_app(&config);

    let response = app
        .oneshot(
            Request::builder()
                .uri("/upload/file/not-an-object-id")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_download_unknown_id_is_not_found() {
    let config = test_config();
    let app = build_app(&config);

    let response = app
        .oneshot(
            Request::builder()
                .uri("/upload/file/0123456789abcdef01234567")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_file_info_returns_metadata() {
    let config = test_config();
    let app = build_app(&config);
    let token = create_jwt("user-1", &config.jwt_secret).unwrap();

    let ids = upload_files(&app, &token, &["doc.png"]).await;
    let file_id = &ids[0];

    // Info is a protected route.
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri(format!("/upload/info/{}", file_id))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = authed_get(&app, &token, &format!("/upload/info/{}", file_id)).await;
    assert_eq!(response.status(), StatusCode::OK);

    let json = json_body(response).await;
    assert_eq!(json["success"], true);
    let info = &json["data"];
    assert_eq!(info["fileId"], *file_id);
    assert_eq!(info["mimeType"], "image/png");
    assert_eq!(info["sizeBytes"], "contents of doc.png".len() as u64);
    assert_eq!(info["metadata"]["originalName"], "doc.png");
    assert_eq!(info["metadata"]["uploadedBy"], "user-1");
    assert_eq!(info["metadata"]["description"], "integration fixture");
}

#[tokio::test]
async fn test_my_files_pagination() {
    let config = test_config();
    let app = build_app(&config);
    let token = create_jwt("user-1", &config.jwt_secret).unwrap();

    // 12 files across three batches, within the per-request cap of 5.
    upload_files(&app, &token, &["a.png", "b.png", "c.png", "d.png", "e.png"]).await;
    upload_files(&app, &token, &["f.png", "g.png", "h.png", "i.png", "j.png"]).await;
    upload_files(&app, &token, &["k.png", "l.png"]).await;

    let response = authed_get(&app, &token, "/upload/my-files?page=2&limit=10").await;
    assert_eq!(response.status(), StatusCode::OK);

    let json = json_body(response).await;
    let page = &json["data"];
    assert_eq!(page["files"].as_array().unwrap().len(), 2);
    assert_eq!(page["pagination"]["page"], 2);
    assert_eq!(page["pagination"]["limit"], 10);
    assert_eq!(page["pagination"]["total"], 12);
    assert_eq!(page["pagination"]["totalPages"], 2);

    // Non-numeric parameters fall back to the defaults.
    let response = authed_get(&app, &token, "/upload/my-files?page=abc&limit=xyz").await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = json_body(response).await;
    assert_eq!(json["data"]["pagination"]["page"], 1);
    assert_eq!(json["data"]["pagination"]["limit"], 10);
    assert_eq!(json["data"]["files"].as_array().unwrap().len(), 10);
}

#[tokio::test]
async fn test_my_files_only_lists_own_uploads() {
    let config = test_config();
    let app = build_app(&config);
    let alice = create_jwt("alice", &config.jwt_secret).unwrap();
    let bob = create_jwt("bob", &config.jwt_secret).unwrap();

    upload_files(&app, &alice, &["alice.png"]).await;
    upload_files(&app, &bob, &["bob-1.png", "bob-2.png"]).await;

    let response = authed_get(&app, &alice, "/upload/my-files").await;
    let json = json_body(response).await;
    let files = json["data"]["files"].as_array().unwrap().clone();
    assert_eq!(files.len(), 1);
    assert!(files[0]["filename"].as_str().unwrap().ends_with("_alice.png"));

    let response = authed_get(&app, &bob, "/upload/my-files").await;
    let json = json_body(response).await;
    assert_eq!(json["data"]["pagination"]["total"], 2);
}

#[tokio::test]
async fn test_delete_is_owner_gated() {
    let config = test_config();
    let app = build_app(&config);
    let owner = create_jwt("owner", &config.jwt_secret).unwrap();
    let intruder = create_jwt("intruder", &config.jwt_secret).unwrap();

    let ids = upload_files(&app, &owner, &["keep.png"]).await;
    let uri = format!("/upload/file/{}", ids[0]);

    // A non-owner gets the same not-found as a missing file.
    let response = authed_delete(&app, &intruder, &uri).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    // The file is still there.
    let response = app
        .clone()
        .oneshot(Request::builder().uri(&uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    // The owner can delete it, exactly once.
    let response = authed_delete(&app, &owner, &uri).await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = json_body(response).await;
    assert_eq!(json["success"], true);

    let response = authed_delete(&app, &owner, &uri).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = app
        .clone()
        .oneshot(Request::builder().uri(&uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
