use std::{
    collections::{HashMap, HashSet, VecDeque},
    path::PathBuf,
    sync::Arc,
};
use tokio::sync::{broadcast, Mutex, RwLock};
use uuid::Uuid;

pub type Tx = broadcast::Sender<String>;

const CHANNEL_CAPACITY: usize = 100;

/* ------------ per-room live channels ------------ */
pub struct RoomChannels {
    pub tx: Tx,
    pub members: HashSet<Uuid>,
    /// Serializes read-modify-write + broadcast for this room.
    pub gate: Arc<Mutex<()>>,
}

impl Default for RoomChannels {
    fn default() -> Self {
        let (tx, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self {
            tx,
            members: HashSet::new(),
            gate: Arc::new(Mutex::new(())),
        }
    }
}

/// In-memory membership registry: room id → live channels. Owned by the
/// hub and dropped wholesale on process exit; room rows survive in the
/// store. A connection belongs to exactly one room for its lifetime.
#[derive(Clone, Default)]
pub struct RoomRegistry {
    inner: Arc<RwLock<HashMap<String, RoomChannels>>>,
}

impl RoomRegistry {
    /// Register a connection; returns the room's sender and a fresh
    /// subscription.
    pub async fn join(&self, room_id: &str, conn_id: Uuid) -> (Tx, broadcast::Receiver<String>) {
        let mut map = self.inner.write().await;
        let entry = map.entry(room_id.to_owned()).or_default();
        entry.members.insert(conn_id);
        (entry.tx.clone(), entry.tx.subscribe())
    }

    /// Deregister a connection; returns how many members remain.
    pub async fn leave(&self, room_id: &str, conn_id: Uuid) -> usize {
        let mut map = self.inner.write().await;
        match map.get_mut(room_id) {
            Some(entry) => {
                entry.members.remove(&conn_id);
                entry.members.len()
            }
            None => 0,
        }
    }

    /// Sender + apply gate for a room, creating the entry when the room
    /// has no live members yet (an admin may retarget an idle room).
    pub async fn channel(&self, room_id: &str) -> (Tx, Arc<Mutex<()>>) {
        let mut map = self.inner.write().await;
        let entry = map.entry(room_id.to_owned()).or_default();
        (entry.tx.clone(), entry.gate.clone())
    }

    pub async fn member_count(&self, room_id: &str) -> usize {
        self.inner
            .read()
            .await
            .get(room_id)
            .map(|e| e.members.len())
            .unwrap_or(0)
    }
}

/* ------------ uploaded media ledger ------------- */
#[derive(Clone)]
pub struct MediaEntry {
    pub path: PathBuf,
    pub size: u64,
}
pub type UploadLog = Arc<RwLock<VecDeque<MediaEntry>>>;
