//! Sidecar subtitle discovery for library videos.
//!
//! Tracks are files next to the video sharing its stem, with a `.vtt` or
//! `.srt` extension. `movie.en.vtt` gets the label `en`; a bare
//! `movie.vtt` is labeled by its extension. The result is sorted by file
//! name so downstream preference heuristics are stable.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tokio::fs;

use crate::error::AppResult;

pub const SUBTITLE_EXTS: [&str; 2] = ["vtt", "srt"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubtitleTrack {
    pub label: String,
    pub url: String,
}

/// List subtitle tracks for a library-relative video path. A missing
/// directory yields an empty list, not an error.
pub async fn discover(library_root: &Path, video: &str) -> AppResult<Vec<SubtitleTrack>> {
    let rel = Path::new(video);
    let Some(stem) = rel.file_stem().and_then(|s| s.to_str()) else {
        return Ok(Vec::new());
    };
    let rel_dir = rel.parent().unwrap_or_else(|| Path::new(""));

    let mut entries = match fs::read_dir(library_root.join(rel_dir)).await {
        Ok(entries) => entries,
        Err(_) => return Ok(Vec::new()),
    };

    let mut names = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        let name = entry.file_name();
        let Some(name) = name.to_str() else { continue };
        let ext_ok = Path::new(name)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| SUBTITLE_EXTS.contains(&e.to_ascii_lowercase().as_str()))
            .unwrap_or(false);
        if ext_ok && name.len() > stem.len() && name.starts_with(stem) {
            names.push(name.to_owned());
        }
    }
    names.sort();

    Ok(names
        .into_iter()
        .map(|name| {
            let label = track_label(&name, stem);
            let url = if rel_dir.as_os_str().is_empty() {
                format!("/media/{name}")
            } else {
                format!("/media/{}/{}", rel_dir.display(), name)
            };
            SubtitleTrack { label, url }
        })
        .collect())
}

fn track_label(file_name: &str, stem: &str) -> String {
    let tail = file_name[stem.len()..].trim_start_matches('.');
    match tail.rsplit_once('.') {
        Some((label, _ext)) if !label.is_empty() => label.to_owned(),
        _ => tail.to_owned(),
    }
}
