//! Durable authoritative record of each room's playback state.
//!
//! One row per room id, created lazily on first access and never deleted.
//! Mutations are full-row replace-on-write: `update` coalesces the patch
//! over the current row and stamps `updated_at`. Last writer wins; the hub
//! serializes callers per room so no two read-modify-writes interleave.

use chrono::Utc;
use sqlx::SqlitePool;

use crate::error::AppResult;

pub fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct RoomState {
    pub room_id: String,
    /// Relative identifier of the active media resource; `None` means
    /// nothing selected.
    pub video_path: Option<String>,
    pub position: f64,
    pub paused: bool,
    pub playback_rate: f64,
    /// Epoch ms of the last mutation.
    pub updated_at: i64,
}

/// Field-level patch folded over the current row. Absent fields keep their
/// prior value.
#[derive(Debug, Clone, Default)]
pub struct StatePatch {
    /// `Some(None)` clears the active video.
    pub video_path: Option<Option<String>>,
    pub position: Option<f64>,
    pub paused: Option<bool>,
    pub playback_rate: Option<f64>,
}

#[derive(Clone)]
pub struct RoomStore {
    pool: SqlitePool,
}

impl RoomStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Existing row, or the default row `(no video, 0, paused, rate 1)`
    /// created atomically on first access. Concurrent first-access from
    /// several channels resolves to a single row via the conflict clause.
    pub async fn get(&self, room_id: &str) -> AppResult<RoomState> {
        sqlx::query(
            "INSERT INTO room_state (room_id, video_path, position, paused, playback_rate, updated_at) \
             VALUES (?, NULL, 0, 1, 1.0, ?) \
             ON CONFLICT(room_id) DO NOTHING",
        )
        .bind(room_id)
        .bind(now_ms())
        .execute(&self.pool)
        .await?;

        let row = sqlx::query_as::<_, RoomState>(
            "SELECT room_id, video_path, position, paused, playback_rate, updated_at \
             FROM room_state WHERE room_id = ?",
        )
        .bind(room_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(row)
    }

    /// Read-modify-write: coalesce each provided field over the current
    /// row, stamp `updated_at`, write the full row back.
    pub async fn update(&self, room_id: &str, patch: StatePatch) -> AppResult<RoomState> {
        let cur = self.get(room_id).await?;
        let next = RoomState {
            room_id: cur.room_id,
            video_path: patch.video_path.unwrap_or(cur.video_path),
            position: patch.position.unwrap_or(cur.position),
            paused: patch.paused.unwrap_or(cur.paused),
            playback_rate: patch.playback_rate.unwrap_or(cur.playback_rate),
            updated_at: now_ms(),
        };

        sqlx::query(
            "UPDATE room_state \
             SET video_path = ?, position = ?, paused = ?, playback_rate = ?, updated_at = ? \
             WHERE room_id = ?",
        )
        .bind(&next.video_path)
        .bind(next.position)
        .bind(next.paused)
        .bind(next.playback_rate)
        .bind(next.updated_at)
        .bind(room_id)
        .execute(&self.pool)
        .await?;
        Ok(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;

    async fn store() -> RoomStore {
        RoomStore::new(db::memory_pool().await)
    }

    #[tokio::test]
    async fn first_access_creates_default_row() {
        let store = store().await;
        let row = store.get("movie-night").await.unwrap();
        assert_eq!(row.video_path, None);
        assert_eq!(row.position, 0.0);
        assert!(row.paused);
        assert_eq!(row.playback_rate, 1.0);
    }

    #[tokio::test]
    async fn concurrent_first_access_yields_one_row() {
        let store = store().await;
        let (a, b) = tokio::join!(store.get("r"), store.get("r"));
        let (a, b) = (a.unwrap(), b.unwrap());
        assert_eq!(a.video_path, b.video_path);
        assert_eq!(a.position, b.position);
        assert_eq!(a.paused, b.paused);
        assert_eq!(a.playback_rate, b.playback_rate);

        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM room_state")
            .fetch_one(&store.pool)
            .await
            .unwrap();
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn update_coalesces_absent_fields() {
        let store = store().await;
        store
            .update(
                "r",
                StatePatch {
                    video_path: Some(Some("films/heat.mp4".into())),
                    position: Some(30.0),
                    paused: Some(false),
                    playback_rate: None,
                },
            )
            .await
            .unwrap();

        // Only position provided; everything else must survive.
        let row = store
            .update("r", StatePatch { position: Some(45.5), ..Default::default() })
            .await
            .unwrap();
        assert_eq!(row.video_path.as_deref(), Some("films/heat.mp4"));
        assert_eq!(row.position, 45.5);
        assert!(!row.paused);
        assert_eq!(row.playback_rate, 1.0);
    }

    #[tokio::test]
    async fn clearing_video_writes_null() {
        let store = store().await;
        store
            .update(
                "r",
                StatePatch { video_path: Some(Some("a.mp4".into())), ..Default::default() },
            )
            .await
            .unwrap();
        let row = store
            .update("r", StatePatch { video_path: Some(None), ..Default::default() })
            .await
            .unwrap();
        assert_eq!(row.video_path, None);

        let fetched = store.get("r").await.unwrap();
        assert_eq!(fetched.video_path, None);
    }

    #[tokio::test]
    async fn updated_at_is_non_decreasing() {
        let store = store().await;
        let mut last = store.get("r").await.unwrap().updated_at;
        for i in 0..5 {
            let row = store
                .update("r", StatePatch { position: Some(i as f64), ..Default::default() })
                .await
                .unwrap();
            assert!(row.updated_at >= last);
            last = row.updated_at;
        }
    }
}
