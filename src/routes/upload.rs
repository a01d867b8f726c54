//! routes/upload.rs — admin upload into the media library. Chunks are
//! streamed to disk and the file is recorded in the upload ledger the
//! janitor evicts from.
use std::{path::Path, sync::Arc};

use axum::{
    routing::post, Router, Json,
    extract::{Extension, Multipart},
    http::HeaderMap,
};
use tokio::{fs::{self, File}, io::AsyncWriteExt};
use bytes::Bytes;
use serde_json::json;

use crate::{
    config::Config,
    state::{MediaEntry, UploadLog},
    error::{AppResult, bad, io},
    utils::jwt,
};

pub fn router() -> Router {
    Router::new().route("/upload", post(upload_file))
}

pub async fn upload_file(
    headers: HeaderMap,
    Extension(cfg): Extension<Arc<Config>>,
    Extension(media): Extension<UploadLog>,
    mut mp: Multipart,
) -> AppResult<Json<serde_json::Value>> {
    jwt::require_admin(&headers, &cfg.jwt_secret)?;

    let Some(mut field) = mp.next_field().await.map_err(bad)? else {
        return Err(bad("no file"));
    };

    let mime = field
        .content_type()
        .unwrap_or("application/octet-stream")
        .to_owned();
    let ext = field
        .file_name()
        .and_then(|n| Path::new(n).extension())
        .and_then(|e| e.to_str())
        .map(str::to_owned)
        .or_else(|| {
            mime_guess::get_mime_extensions_str(&mime)
                .and_then(|a| a.first().copied())
                .map(str::to_owned)
        })
        .unwrap_or_else(|| "bin".into());

    let fname = format!("uploads/{}.{}", uuid::Uuid::new_v4(), ext);
    let full = cfg.library_root.join(&fname);
    fs::create_dir_all(cfg.library_root.join("uploads")).await.map_err(io)?;

    let mut file = File::create(&full).await.map_err(io)?;
    while let Some(chunk) = field.chunk().await.map_err(bad)? {
        let chunk: Bytes = chunk;
        file.write_all(&chunk).await.map_err(io)?;
    }
    file.flush().await.map_err(io)?;

    let meta = fs::metadata(&full).await.map_err(io)?;
    media.write().await.push_back(MediaEntry { path: full, size: meta.len() });
    tracing::info!(file = %fname, size = meta.len(), "upload stored");

    Ok(Json(json!({ "url": format!("/media/{fname}"), "mime": mime })))
}
