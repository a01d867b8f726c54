//! Wire protocol between the server and room members.
//!
//! One persistent WebSocket per client. Downstream traffic is always a full
//! `state` snapshot; upstream traffic is an `action`. Anything that does not
//! parse into these shapes is dropped by the connection handler without
//! closing the socket.

use serde::{Deserialize, Serialize};

use crate::store::{RoomState, StatePatch};

/// Client intent to change playback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionKind {
    Play,
    Pause,
    Seek,
    Rate,
    Sync,
    /// Forward-compatible catch-all: kinds we don't know are a no-op,
    /// not an error.
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Action {
    #[serde(rename = "action")]
    pub kind: ActionKind,
    #[serde(default)]
    pub position: Option<f64>,
    #[serde(default, rename = "playbackRate")]
    pub playback_rate: Option<f64>,
}

/// Messages a client may send. Tagged on `type`; unrecognized tags fail to
/// parse and the frame is discarded upstream.
#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
pub enum ClientMsg {
    #[serde(rename = "action")]
    Action(Action),
}

/// Authoritative snapshot pushed to every room member.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateData {
    #[serde(rename = "roomId")]
    pub room_id: String,
    #[serde(rename = "videoPath")]
    pub video_path: Option<String>,
    pub position: f64,
    pub paused: bool,
    #[serde(rename = "playbackRate")]
    pub playback_rate: f64,
    /// Epoch ms of the last mutation.
    #[serde(rename = "updatedAt")]
    pub updated_at: i64,
    /// Epoch ms at which this snapshot was pushed; receivers use it to
    /// extrapolate in-flight drift.
    #[serde(rename = "serverTime")]
    pub server_time: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ServerMsg {
    #[serde(rename = "state")]
    State { data: StateData },
}

impl StateData {
    pub fn from_row(room_id: &str, row: &RoomState, server_time: i64) -> Self {
        StateData {
            room_id: room_id.to_owned(),
            video_path: row.video_path.clone(),
            position: row.position,
            paused: row.paused,
            playback_rate: row.playback_rate,
            updated_at: row.updated_at,
            server_time,
        }
    }
}

impl ServerMsg {
    pub fn state(room_id: &str, row: &RoomState, server_time: i64) -> Self {
        ServerMsg::State { data: StateData::from_row(room_id, row, server_time) }
    }
}

impl Action {
    /// Fold this action into a store patch, or `None` when the kind is
    /// unknown (no mutation, no broadcast).
    ///
    /// `play`/`pause` set the paused flag; `seek`/`rate`/`sync` leave it
    /// alone. Numeric fields are coalesced only when they are finite and in
    /// range — a malformed number degrades to "keep prior value" instead of
    /// rejecting the whole action.
    pub fn to_patch(&self) -> Option<StatePatch> {
        let paused = match self.kind {
            ActionKind::Play => Some(false),
            ActionKind::Pause => Some(true),
            ActionKind::Seek | ActionKind::Rate | ActionKind::Sync => None,
            ActionKind::Unknown => return None,
        };
        Some(StatePatch {
            video_path: None,
            position: self.position.filter(|p| p.is_finite() && *p >= 0.0),
            paused,
            playback_rate: self.playback_rate.filter(|r| r.is_finite() && *r > 0.0),
        })
    }
}
