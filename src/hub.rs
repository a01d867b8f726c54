//! Sync hub: authoritative arbiter of one room's real-time playback state.
//!
//! The only writer path to the room store for live playback fields. Every
//! accepted mutation is broadcast as a full state snapshot to all current
//! members of the room, the sender included — clients reconcile from the
//! echo instead of trusting optimistic local state.

use tokio::sync::broadcast;
use uuid::Uuid;

use crate::{
    error::AppResult,
    protocol::{Action, ServerMsg},
    state::RoomRegistry,
    store::{now_ms, RoomState, RoomStore, StatePatch},
};

#[derive(Clone)]
pub struct SyncHub {
    registry: RoomRegistry,
    store: RoomStore,
}

impl SyncHub {
    pub fn new(registry: RoomRegistry, store: RoomStore) -> Self {
        Self { registry, store }
    }

    pub fn registry(&self) -> &RoomRegistry {
        &self.registry
    }

    /// Register a channel in the room and return the snapshot to push to
    /// the new member, so joiners see truth without waiting for the next
    /// action.
    pub async fn join(
        &self,
        room_id: &str,
        conn_id: Uuid,
    ) -> AppResult<(ServerMsg, broadcast::Receiver<String>)> {
        let (_tx, rx) = self.registry.join(room_id, conn_id).await;
        let row = self.store.get(room_id).await?;
        tracing::debug!(room = room_id, %conn_id, "channel open");
        Ok((ServerMsg::state(room_id, &row, now_ms()), rx))
    }

    /// Deregister; no leave broadcast — members infer liveness from the
    /// absence of future chatter.
    pub async fn leave(&self, room_id: &str, conn_id: Uuid) {
        let remaining = self.registry.leave(room_id, conn_id).await;
        tracing::debug!(room = room_id, %conn_id, remaining, "channel closed");
    }

    /// Apply a client action. Unknown kinds are a silent no-op: no
    /// mutation, no broadcast.
    pub async fn apply(&self, room_id: &str, action: &Action) -> AppResult<Option<RoomState>> {
        let Some(patch) = action.to_patch() else {
            tracing::debug!(room = room_id, "ignoring unknown action kind");
            return Ok(None);
        };
        self.mutate(room_id, patch).await.map(Some)
    }

    /// Admin retarget. Changing the video always restarts playback state
    /// for everyone: position 0, paused.
    pub async fn set_video(&self, room_id: &str, video_path: Option<String>) -> AppResult<RoomState> {
        tracing::info!(room = room_id, video = ?video_path, "set video");
        self.mutate(
            room_id,
            StatePatch {
                video_path: Some(video_path),
                position: Some(0.0),
                paused: Some(true),
                playback_rate: None,
            },
        )
        .await
    }

    /// The room gate spans the read-modify-write and the broadcast
    /// enqueue, so every member observes snapshots in production order
    /// (non-decreasing `updated_at`).
    async fn mutate(&self, room_id: &str, patch: StatePatch) -> AppResult<RoomState> {
        let (tx, gate) = self.registry.channel(room_id).await;
        let _guard = gate.lock().await;

        let row = self.store.update(room_id, patch).await?;
        let msg = ServerMsg::state(room_id, &row, now_ms());
        if let Ok(payload) = serde_json::to_string(&msg) {
            // Fire-and-forget: Err only means the room has no listeners.
            tx.send(payload).ok();
        }
        Ok(row)
    }
}
