//! Client-side reconciler: renders authoritative room snapshots into a
//! local media player and turns genuine user intent back into actions.
//!
//! The machine has two states, Idle and ApplyingRemote, plus a suppression
//! deadline. While a snapshot is being applied (and for a short window
//! after), player events are treated as echoes of our own programmatic
//! mutations and swallowed; without this, applying a remote pause would
//! fire a local `pause` event, re-emit it as an action, and every member
//! would re-echo it back — a broadcast storm.
//!
//! This module is transport- and player-agnostic: embedders implement
//! [`MediaPlayer`] over whatever element or process they drive, feed
//! incoming `state` payloads to [`Reconciler::apply_state`], and send the
//! returned/emitted [`Action`]s upstream.

use crate::protocol::{Action, ActionKind, StateData};
use crate::subtitles::SubtitleTrack;

/// Positions closer than this to the target are left alone; correcting
/// them would cause visible seek jitter on every broadcast.
pub const DRIFT_TOLERANCE_SECS: f64 = 0.4;

/// How long after a programmatic mutation locally-fired player events are
/// treated as artifacts. Sized to exceed the media element's event
/// dispatch latency.
pub const ECHO_SUPPRESS_MS: i64 = 600;

/// Subtitle discovery for the same video is skipped when it ran within
/// this window, so a burst of state messages doesn't trigger redundant
/// lookups.
pub const DISCOVERY_DEBOUNCE_MS: i64 = 30_000;

/// Seam between the reconciler and the actual playback surface.
pub trait MediaPlayer {
    fn position(&self) -> f64;
    fn playback_rate(&self) -> f64;
    fn seek(&mut self, position: f64);
    fn set_paused(&mut self, paused: bool);
    fn set_playback_rate(&mut self, rate: f64);
    /// Swap the media source; `None` clears it.
    fn load(&mut self, video_path: Option<&str>);
    /// Stage a subtitle track by url; `None` tears the current one down.
    fn set_subtitle(&mut self, url: Option<&str>);
}

/// Local media element events, post-debounce by the embedder (e.g. only
/// completed seeks, not every `timeupdate`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerEvent {
    Play,
    Pause,
    SeekCompleted,
    RateChange,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Idle,
    ApplyingRemote,
}

pub struct Reconciler {
    phase: Phase,
    /// Epoch ms; player events before this deadline are echoes.
    ignore_events_until: i64,
    loaded_video: Option<String>,
    /// Last subtitle discovery: (video, epoch ms).
    last_discovery: Option<(String, i64)>,
}

impl Default for Reconciler {
    fn default() -> Self {
        Self::new()
    }
}

impl Reconciler {
    pub fn new() -> Self {
        Self {
            phase: Phase::Idle,
            ignore_events_until: 0,
            loaded_video: None,
            last_discovery: None,
        }
    }

    pub fn is_applying(&self) -> bool {
        self.phase == Phase::ApplyingRemote
    }

    /// Render an authoritative snapshot into the player.
    ///
    /// Returns the video path to run subtitle discovery for, when
    /// discovery is due; the embedder performs the lookup and feeds the
    /// result to [`Self::on_tracks_discovered`].
    pub fn apply_state<P: MediaPlayer>(
        &mut self,
        state: &StateData,
        player: &mut P,
        now_ms: i64,
    ) -> Option<String> {
        self.phase = Phase::ApplyingRemote;

        if state.video_path != self.loaded_video {
            player.set_subtitle(None);
            player.load(state.video_path.as_deref());
            self.loaded_video = state.video_path.clone();
        }

        // Discovery is attempted on every snapshot for the active video;
        // the debounce absorbs bursts of state messages for the same one.
        let mut discover = None;
        if let Some(video) = &state.video_path {
            if self.discovery_due(video, now_ms) {
                self.last_discovery = Some((video.clone(), now_ms));
                discover = Some(video.clone());
            }
        }

        let target = target_position(state, now_ms);
        if (target - player.position()).abs() > DRIFT_TOLERANCE_SECS {
            player.seek(target);
        }
        player.set_paused(state.paused);
        player.set_playback_rate(state.playback_rate);

        self.phase = Phase::Idle;
        self.ignore_events_until = now_ms + ECHO_SUPPRESS_MS;
        discover
    }

    /// Map a local player event to an outbound action — unless we are
    /// mid-apply or inside the suppression window, in which case the event
    /// is presumed to be an echo of our own mutation and swallowed.
    pub fn on_player_event<P: MediaPlayer>(
        &mut self,
        event: PlayerEvent,
        player: &P,
        now_ms: i64,
    ) -> Option<Action> {
        if self.suppressed(now_ms) {
            return None;
        }
        let kind = match event {
            PlayerEvent::Play => ActionKind::Play,
            PlayerEvent::Pause => ActionKind::Pause,
            PlayerEvent::SeekCompleted => ActionKind::Seek,
            PlayerEvent::RateChange => ActionKind::Rate,
        };
        Some(self.action(kind, player))
    }

    /// Periodic position report. Same suppression rules as real events, so
    /// a timer firing right after a remote apply doesn't re-echo it.
    pub fn periodic_sync<P: MediaPlayer>(&self, player: &P, now_ms: i64) -> Option<Action> {
        if self.suppressed(now_ms) {
            return None;
        }
        Some(self.action(ActionKind::Sync, player))
    }

    /// Stage the preferred subtitle track once discovery completes. Safe
    /// to call again when track metadata arrives late; stale results for a
    /// video we already navigated away from are ignored.
    pub fn on_tracks_discovered<P: MediaPlayer>(
        &mut self,
        video: &str,
        tracks: &[SubtitleTrack],
        player: &mut P,
    ) {
        if self.loaded_video.as_deref() != Some(video) {
            return;
        }
        if let Some(track) = preferred_track(tracks) {
            player.set_subtitle(Some(&track.url));
        }
    }

    fn suppressed(&self, now_ms: i64) -> bool {
        self.phase == Phase::ApplyingRemote || now_ms < self.ignore_events_until
    }

    fn discovery_due(&self, video: &str, now_ms: i64) -> bool {
        match &self.last_discovery {
            Some((v, at)) => v != video || now_ms - at >= DISCOVERY_DEBOUNCE_MS,
            None => true,
        }
    }

    fn action<P: MediaPlayer>(&self, kind: ActionKind, player: &P) -> Action {
        Action {
            kind,
            position: Some(player.position()),
            playback_rate: Some(player.playback_rate()),
        }
    }
}

/// Where the room is "now": paused rooms sit exactly at `position`;
/// playing rooms advance by the time the snapshot spent in flight,
/// scaled by the playback rate, so receivers don't land behind.
fn target_position(state: &StateData, now_ms: i64) -> f64 {
    if state.paused {
        return state.position;
    }
    let elapsed = (now_ms - state.server_time).max(0) as f64 / 1000.0;
    state.position + elapsed * state.playback_rate
}

/// First track whose label reads as English, else the first track that
/// isn't an explicit "off" entry.
pub fn preferred_track(tracks: &[SubtitleTrack]) -> Option<&SubtitleTrack> {
    tracks
        .iter()
        .find(|t| {
            let label = t.label.to_lowercase();
            label.contains("english") || label == "eng" || label == "en"
        })
        .or_else(|| tracks.iter().find(|t| !t.label.eq_ignore_ascii_case("off")))
}
