use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Multipart, Query, State};
use axum::response::Json;
use realm_crypto::ContentHasher;
use realm_store::{content_type_for, StorageManager};
use realm_types::AssetName;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::ServerConfig;
use crate::error::{ServerError, ServerResult};

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub storage: Arc<StorageManager>,
    pub config: Arc<ServerConfig>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub backend: String,
    pub version: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UploadResponse {
    pub filename: String,
    pub url: String,
}

#[derive(Debug, Deserialize)]
pub struct CheckQuery {
    pub filename: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CheckResponse {
    pub exists: bool,
    pub url: String,
}

#[derive(Debug, Deserialize)]
pub struct UploadUrlQuery {
    pub filename: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadUrlResponse {
    pub upload_url: String,
    pub url: String,
}

fn hash_name(filename: &str) -> ServerResult<AssetName> {
    AssetName::parse(filename)
        .map_err(|_| ServerError::BadRequest("filename must be <sha256-hex>.<ext>".into()))
}

/// Health check handler.
pub async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".into(),
        backend: state.storage.backend_kind().to_string(),
        version: env!("CARGO_PKG_VERSION").into(),
    })
}

/// `POST /api/upload`: multipart form with one `file` field named by its
/// content hash. Re-uploading existing content is a no-op.
pub async fn upload_handler(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> ServerResult<Json<UploadResponse>> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|_| ServerError::BadRequest("malformed multipart body".into()))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let filename = field
            .file_name()
            .map(str::to_string)
            .ok_or_else(|| ServerError::BadRequest("file field has no filename".into()))?;
        let name = hash_name(&filename)?;
        let content_type = field
            .content_type()
            .map(str::to_string)
            .unwrap_or_else(|| content_type_for(&filename).to_string());
        let data = field
            .bytes()
            .await
            .map_err(|_| ServerError::BadRequest("could not read file body".into()))?;
        if !ContentHasher::verify(&data, &name) {
            return Err(ServerError::BadRequest("content does not match filename hash".into()));
        }
        let size = data.len();
        let url = state.storage.upload_file(&name, data, &content_type).await?;
        info!(%name, size, "asset uploaded");
        return Ok(Json(UploadResponse {
            filename: name.to_string(),
            url,
        }));
    }
    Err(ServerError::BadRequest("missing file field".into()))
}

/// `GET /api/upload-check?filename=`: lets a client skip uploading
/// content the store already has.
pub async fn upload_check_handler(
    State(state): State<AppState>,
    Query(query): Query<CheckQuery>,
) -> ServerResult<Json<CheckResponse>> {
    let name = hash_name(&query.filename)?.to_string();
    let exists = state.storage.file_exists(&name).await?;
    Ok(Json(CheckResponse {
        exists,
        url: state.storage.get_public_url(&name),
    }))
}

/// `GET /api/upload-url?filename=`: presigned direct upload. The URL does
/// not pin a content type. Only object-store backends support this; local
/// answers 501.
pub async fn upload_url_handler(
    State(state): State<AppState>,
    Query(query): Query<UploadUrlQuery>,
) -> ServerResult<Json<UploadUrlResponse>> {
    let name = hash_name(&query.filename)?.to_string();
    let expires_in = Duration::from_secs(state.config.presign_expiry_secs);
    let upload_url = state
        .storage
        .get_presigned_upload_url(&name, expires_in)
        .await?;
    Ok(Json(UploadUrlResponse {
        upload_url,
        url: state.storage.get_public_url(&name),
    }))
}
