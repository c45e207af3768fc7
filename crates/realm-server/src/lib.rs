//! HTTP server for Realm.
//!
//! Accepts content-addressed asset uploads, answers existence checks so
//! clients can skip redundant uploads, hands out presigned upload URLs when
//! the store is a bucket, and serves the assets directory directly when it
//! is local disk. Error responses never carry backend details.

pub mod config;
pub mod error;
pub mod handler;
pub mod router;
pub mod server;

pub use config::ServerConfig;
pub use error::{ServerError, ServerResult};
pub use handler::AppState;
pub use server::RealmServer;

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{header, Request, StatusCode};
    use axum::Router;
    use realm_crypto::ContentHasher;
    use realm_store::{StorageConfig, StorageManager};
    use std::sync::Arc;
    use tempfile::TempDir;
    use tower::util::ServiceExt;

    const BOUNDARY: &str = "realm-test-boundary";

    async fn app(dir: &TempDir) -> (Router, Arc<StorageManager>) {
        let storage = Arc::new(StorageManager::init(&StorageConfig::local(dir.path())).await.unwrap());
        let server = RealmServer::new(ServerConfig::default(), storage.clone());
        (server.router(), storage)
    }

    fn multipart(field: &str, filename: &str, data: &[u8]) -> Request<Body> {
        let mut body = format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{field}\"; filename=\"{filename}\"\r\nContent-Type: application/octet-stream\r\n\r\n"
        )
        .into_bytes();
        body.extend_from_slice(data);
        body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());
        Request::builder()
            .method("POST")
            .uri("/api/upload")
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(body))
            .unwrap()
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    async fn json(response: axum::response::Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn health_endpoint() {
        let dir = TempDir::new().unwrap();
        let (app, _) = app(&dir).await;
        let response = app.oneshot(get("/health")).await.unwrap();
        assert_eq!(response.status(), 200);
        assert_eq!(json(response).await["backend"], "local");
    }

    #[tokio::test]
    async fn upload_then_check_then_serve() {
        let dir = TempDir::new().unwrap();
        let (app, storage) = app(&dir).await;
        let data = b"fake png bytes";
        let name = ContentHasher::asset_name(data, "logo.png").unwrap().to_string();

        let response = app.clone().oneshot(multipart("file", &name, data)).await.unwrap();
        assert_eq!(response.status(), 200);
        let body = json(response).await;
        assert_eq!(body["filename"], name);
        assert_eq!(body["url"], format!("/assets/{name}"));
        assert!(storage.file_exists(&name).await.unwrap());

        let check = app
            .clone()
            .oneshot(get(&format!("/api/upload-check?filename={name}")))
            .await
            .unwrap();
        assert_eq!(check.status(), 200);
        assert_eq!(json(check).await["exists"], true);

        let served = app.oneshot(get(&format!("/assets/{name}"))).await.unwrap();
        assert_eq!(served.status(), 200);
        let bytes = axum::body::to_bytes(served.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&bytes[..], data);
    }

    #[tokio::test]
    async fn duplicate_upload_is_a_noop() {
        let dir = TempDir::new().unwrap();
        let (app, storage) = app(&dir).await;
        let data = b"same";
        let name = ContentHasher::asset_name(data, "a.bin").unwrap().to_string();
        for _ in 0..2 {
            let response = app.clone().oneshot(multipart("file", &name, data)).await.unwrap();
            assert_eq!(response.status(), 200);
        }
        assert_eq!(storage.list_files().await.unwrap(), vec![name]);
    }

    #[tokio::test]
    async fn check_unknown_file() {
        let dir = TempDir::new().unwrap();
        let (app, _) = app(&dir).await;
        let name = format!("{}.glb", "a".repeat(64));
        let response = app
            .oneshot(get(&format!("/api/upload-check?filename={name}")))
            .await
            .unwrap();
        assert_eq!(response.status(), 200);
        assert_eq!(json(response).await["exists"], false);
    }

    #[tokio::test]
    async fn non_hash_filename_rejected() {
        let dir = TempDir::new().unwrap();
        let (app, storage) = app(&dir).await;
        let response = app.oneshot(multipart("file", "logo.png", b"x")).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(storage.list_files().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn hash_mismatch_rejected() {
        let dir = TempDir::new().unwrap();
        let (app, _) = app(&dir).await;
        let name = ContentHasher::asset_name(b"original", "a.png").unwrap().to_string();
        let response = app.oneshot(multipart("file", &name, b"tampered")).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn missing_file_field_rejected() {
        let dir = TempDir::new().unwrap();
        let (app, _) = app(&dir).await;
        let name = ContentHasher::asset_name(b"x", "a.png").unwrap().to_string();
        let response = app.oneshot(multipart("other", &name, b"x")).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn presigned_url_unsupported_on_local() {
        let dir = TempDir::new().unwrap();
        let (app, _) = app(&dir).await;
        let name = format!("{}.png", "b".repeat(64));
        let response = app
            .oneshot(get(&format!("/api/upload-url?filename={name}")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_IMPLEMENTED);
        let body = json(response).await;
        assert!(!body["error"].as_str().unwrap().contains("local"));
    }

    #[tokio::test]
    async fn unknown_static_asset_is_404() {
        let dir = TempDir::new().unwrap();
        let (app, _) = app(&dir).await;
        let response = app.oneshot(get("/assets/nope.glb")).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
