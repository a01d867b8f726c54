//! routes/media.rs — the library surface: video listing, subtitle
//! discovery, and the admin-only room retarget. Byte serving (including
//! Range requests) is handled by the `ServeDir` mounted at `/media`.
use std::{
    path::{Component, Path, PathBuf},
    sync::Arc,
};

use axum::{
    extract::{Extension, Path as RoomId, Query},
    http::HeaderMap,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;

use crate::{
    config::Config,
    error::{AppErr, AppResult, bad},
    hub::SyncHub,
    protocol::StateData,
    store::now_ms,
    subtitles::{self, SubtitleTrack},
    utils::jwt,
};

const VIDEO_EXTS: [&str; 6] = ["mp4", "m4v", "webm", "mkv", "mov", "avi"];

pub fn router() -> Router {
    Router::new()
        .route("/videos", get(list_videos))
        .route("/subtitles", get(list_subtitles))
        .route("/rooms/:room/video", post(set_video))
}

/// Reject absolute paths and `..` traversal; anything a client hands us
/// must stay inside the library root.
pub fn sanitize_rel_path(raw: &str) -> Option<PathBuf> {
    let path = Path::new(raw);
    if path.is_absolute() {
        return None;
    }
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Normal(seg) => out.push(seg),
            Component::CurDir => {}
            _ => return None,
        }
    }
    if out.as_os_str().is_empty() { None } else { Some(out) }
}

/* ---------------- Library listing ---------------- */
async fn list_videos(Extension(cfg): Extension<Arc<Config>>) -> AppResult<Json<Vec<String>>> {
    let root = cfg.library_root.clone();
    let mut found = Vec::new();
    let mut stack = vec![root.clone()];

    while let Some(dir) = stack.pop() {
        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(_) => continue,
        };
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if entry.file_type().await?.is_dir() {
                stack.push(path);
                continue;
            }
            let playable = path
                .extension()
                .and_then(|e| e.to_str())
                .map(|e| VIDEO_EXTS.contains(&e.to_ascii_lowercase().as_str()))
                .unwrap_or(false);
            if !playable {
                continue;
            }
            if let Ok(rel) = path.strip_prefix(&root) {
                found.push(rel.to_string_lossy().into_owned());
            }
        }
    }

    found.sort();
    Ok(Json(found))
}

/* ---------------- Subtitle discovery ---------------- */
#[derive(Deserialize)] struct SubsQuery { video: String }

async fn list_subtitles(
    Query(q): Query<SubsQuery>,
    Extension(cfg): Extension<Arc<Config>>,
) -> AppResult<Json<Vec<SubtitleTrack>>> {
    let rel = sanitize_rel_path(&q.video).ok_or_else(|| bad("bad video path"))?;
    let tracks = subtitles::discover(&cfg.library_root, &rel.to_string_lossy()).await?;
    Ok(Json(tracks))
}

/* ---------------- Admin retarget ---------------- */
#[derive(Deserialize)] struct SetVideoBody { video: Option<String> }

async fn set_video(
    RoomId(room): RoomId<String>,
    headers: HeaderMap,
    Extension(cfg): Extension<Arc<Config>>,
    Extension(hub): Extension<SyncHub>,
    Json(body): Json<SetVideoBody>,
) -> AppResult<Json<StateData>> {
    jwt::require_admin(&headers, &cfg.jwt_secret)?;

    let video = match body.video {
        Some(raw) => {
            let rel = sanitize_rel_path(&raw).ok_or_else(|| bad("bad video path"))?;
            if !tokio::fs::try_exists(cfg.library_root.join(&rel)).await? {
                return Err(AppErr::NotFound("no such video".into()));
            }
            Some(rel.to_string_lossy().into_owned())
        }
        None => None,
    };

    let row = hub.set_video(&room, video).await?;
    Ok(Json(StateData::from_row(&room, &row, now_ms())))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_rejects_traversal_and_absolute_paths() {
        assert!(sanitize_rel_path("/etc/passwd").is_none());
        assert!(sanitize_rel_path("../secret.mp4").is_none());
        assert!(sanitize_rel_path("films/../../x.mp4").is_none());
        assert!(sanitize_rel_path("").is_none());

        assert_eq!(sanitize_rel_path("films/heat.mp4").unwrap(), PathBuf::from("films/heat.mp4"));
        assert_eq!(sanitize_rel_path("./movie.mp4").unwrap(), PathBuf::from("movie.mp4"));
    }
}
