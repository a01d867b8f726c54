//! Full-loop test: actions flow through the hub into the store, fan out to
//! every member, and each member's reconciler renders the snapshot without
//! echoing it back as a fresh action.

use sqlx::sqlite::SqlitePoolOptions;
use uuid::Uuid;

use watch_server::{
    db,
    hub::SyncHub,
    protocol::{Action, ActionKind, ServerMsg, StateData},
    reconciler::{MediaPlayer, PlayerEvent, Reconciler, ECHO_SUPPRESS_MS},
    state::RoomRegistry,
    store::RoomStore,
};

#[derive(Default)]
struct FakePlayer {
    position: f64,
    rate: f64,
    paused: bool,
    loaded: Option<String>,
    subtitle: Option<String>,
}

impl MediaPlayer for FakePlayer {
    fn position(&self) -> f64 {
        self.position
    }
    fn playback_rate(&self) -> f64 {
        self.rate
    }
    fn seek(&mut self, position: f64) {
        self.position = position;
    }
    fn set_paused(&mut self, paused: bool) {
        self.paused = paused;
    }
    fn set_playback_rate(&mut self, rate: f64) {
        self.rate = rate;
    }
    fn load(&mut self, video_path: Option<&str>) {
        self.loaded = video_path.map(str::to_owned);
    }
    fn set_subtitle(&mut self, url: Option<&str>) {
        self.subtitle = url.map(str::to_owned);
    }
}

async fn hub() -> SyncHub {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .unwrap();
    db::init_schema(&pool).await.unwrap();
    SyncHub::new(RoomRegistry::default(), RoomStore::new(pool))
}

fn decode(payload: String) -> StateData {
    let ServerMsg::State { data } = serde_json::from_str(&payload).unwrap();
    data
}

#[tokio::test]
async fn play_propagates_without_a_feedback_loop() {
    let hub = hub().await;
    let room = "movie-night";

    // Two members join; both see the paused default.
    let (ServerMsg::State { data: init_a }, mut rx_a) =
        hub.join(room, Uuid::new_v4()).await.unwrap();
    let (ServerMsg::State { data: init_b }, mut rx_b) =
        hub.join(room, Uuid::new_v4()).await.unwrap();
    assert!(init_a.paused && init_b.paused);

    let mut rec_a = Reconciler::new();
    let mut rec_b = Reconciler::new();
    let mut player_a = FakePlayer { rate: 1.0, paused: true, ..Default::default() };
    let mut player_b = FakePlayer { rate: 1.0, paused: true, ..Default::default() };

    rec_a.apply_state(&init_a, &mut player_a, init_a.server_time);
    rec_b.apply_state(&init_b, &mut player_b, init_b.server_time);

    // A presses play well after the join settled: a genuine user event.
    let t_play = init_a.server_time + ECHO_SUPPRESS_MS + 1_000;
    player_a.paused = false;
    let action = rec_a
        .on_player_event(PlayerEvent::Play, &player_a, t_play)
        .expect("genuine play must become an action");
    assert_eq!(action.kind, ActionKind::Play);

    hub.apply(room, &action).await.unwrap();

    // Both members (sender included) receive the same authoritative state.
    let state_a = decode(rx_a.recv().await.unwrap());
    let state_b = decode(rx_b.recv().await.unwrap());
    assert!(!state_a.paused && !state_b.paused);
    assert_eq!(state_a.updated_at, state_b.updated_at);

    rec_b.apply_state(&state_b, &mut player_b, state_b.server_time);
    assert!(!player_b.paused);

    // B's media element fires `play` as a side effect of the programmatic
    // call; inside the suppression window it must not become an action.
    assert!(rec_b
        .on_player_event(PlayerEvent::Play, &player_b, state_b.server_time + 100)
        .is_none());
}

#[tokio::test]
async fn seek_converges_members_to_the_same_position() {
    let hub = hub().await;
    let room = "r";

    let (ServerMsg::State { data: init }, _rx_a) = hub.join(room, Uuid::new_v4()).await.unwrap();
    let (_, mut rx_b) = hub.join(room, Uuid::new_v4()).await.unwrap();

    hub.apply(
        room,
        &Action { kind: ActionKind::Seek, position: Some(300.0), playback_rate: Some(1.0) },
    )
    .await
    .unwrap();

    let state = decode(rx_b.recv().await.unwrap());
    let mut rec = Reconciler::new();
    let mut player = FakePlayer { rate: 1.0, paused: true, position: 5.0, ..Default::default() };
    rec.apply_state(&state, &mut player, state.server_time);

    // Room is paused (seek leaves the default paused flag), so the target
    // is exact.
    assert_eq!(player.position, 300.0);
    assert!(player.paused);
    assert!(state.updated_at >= init.updated_at);
}

#[tokio::test]
async fn set_video_restarts_playback_for_everyone() {
    let hub = hub().await;
    let room = "r";

    let (_, mut rx) = hub.join(room, Uuid::new_v4()).await.unwrap();
    hub.apply(
        room,
        &Action { kind: ActionKind::Play, position: Some(95.0), playback_rate: None },
    )
    .await
    .unwrap();
    rx.recv().await.unwrap();

    hub.set_video(room, Some("films/heat.mp4".into())).await.unwrap();
    let state = decode(rx.recv().await.unwrap());

    let mut rec = Reconciler::new();
    let mut player = FakePlayer { rate: 1.0, paused: false, position: 95.0, ..Default::default() };
    let discover = rec.apply_state(&state, &mut player, state.server_time);

    assert_eq!(player.loaded.as_deref(), Some("films/heat.mp4"));
    assert_eq!(player.position, 0.0);
    assert!(player.paused);
    // The new video's subtitle discovery is requested exactly once.
    assert_eq!(discover.as_deref(), Some("films/heat.mp4"));
}
