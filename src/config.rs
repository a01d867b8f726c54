use std::path::PathBuf;

use crate::error::AppResult;

/// Process configuration, collected from the environment once at startup
/// and shared through an `Extension` layer.
#[derive(Clone)]
pub struct Config {
    pub database_url: String,
    pub bind_addr: String,
    /// Root directory of the video library; every `videoPath` is relative
    /// to it.
    pub library_root: PathBuf,
    pub jwt_secret: String,
    /// Cumulative size cap for uploaded media, enforced by the janitor.
    pub upload_disk_cap: u64,
}

const DEFAULT_DISK_CAP: u64 = 10 * 1024 * 1024 * 1024; // 10 GB

impl Config {
    pub fn from_env() -> AppResult<Self> {
        let database_url = std::env::var("DATABASE_URL")?;
        let bind_addr = std::env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".into());
        let library_root = std::env::var("LIBRARY_ROOT")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("library"));
        let jwt_secret = std::env::var("JWT_SECRET")?;
        let upload_disk_cap = std::env::var("UPLOAD_DISK_CAP")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_DISK_CAP);

        Ok(Self {
            database_url,
            bind_addr,
            library_root,
            jwt_secret,
            upload_disk_cap,
        })
    }
}
