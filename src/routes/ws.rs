//! routes/ws.rs — one persistent WebSocket per room member. The socket is
//! addressed to a room at connect time and pumps in both directions:
//! inbound frames become hub actions, hub broadcasts become outbound
//! state pushes. Malformed inbound traffic is dropped without closing the
//! connection.
use std::sync::Arc;

use axum::{
    Router,
    routing::get,
    response::IntoResponse,
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Extension, Query,
    },
};
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::broadcast::error::RecvError;
use uuid::Uuid;

use crate::{
    config::Config,
    error::{AppErr, AppResult},
    hub::SyncHub,
    protocol::ClientMsg,
    utils::jwt,
};

#[derive(Deserialize)] struct WsQuery { room: Option<String>, token: String }

pub fn router() -> Router {
    Router::new().route("/room", get(ws_handler))
}

async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(q): Query<WsQuery>,
    Extension(cfg): Extension<Arc<Config>>,
    Extension(hub): Extension<SyncHub>,
) -> AppResult<impl IntoResponse> {
    let claims = jwt::verify(&q.token, &cfg.jwt_secret)
        .ok_or_else(|| AppErr::Unauthorized("bad token".into()))?;
    let room = q.room.unwrap_or_else(|| "lobby".into());
    Ok(ws.on_upgrade(move |sock| member_ws(sock, room, claims.sub, hub)))
}

/* ---------------- per member ---------------- */
async fn member_ws(sock: WebSocket, room: String, uid: String, hub: SyncHub) {
    let conn_id = Uuid::new_v4();
    let (initial, mut rx) = match hub.join(&room, conn_id).await {
        Ok(joined) => joined,
        Err(e) => {
            tracing::error!(%room, %uid, error = %e, "join failed");
            return;
        }
    };
    let members = hub.registry().member_count(&room).await;
    tracing::info!(%room, %uid, members, "member joined");

    let (mut sink, mut stream) = sock.split();

    // New joiners see truth immediately, before any action arrives.
    let pushed = match serde_json::to_string(&initial) {
        Ok(payload) => sink.send(Message::Text(payload)).await.is_ok(),
        Err(_) => false,
    };
    if !pushed {
        hub.leave(&room, conn_id).await;
        return;
    }

    loop {
        tokio::select! {
            inbound = stream.next() => match inbound {
                Some(Ok(Message::Text(raw))) => match serde_json::from_str::<ClientMsg>(&raw) {
                    Ok(ClientMsg::Action(action)) => {
                        // Storage failure is fatal for this action only; no
                        // retry — the next action or periodic sync heals.
                        if let Err(e) = hub.apply(&room, &action).await {
                            tracing::error!(%room, error = %e, "action failed");
                        }
                    }
                    // Unrecognized shapes are dropped, connection stays open.
                    Err(_) => {}
                },
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => {} // ping/pong/binary
                Some(Err(_)) => break,
            },
            outbound = rx.recv() => match outbound {
                Ok(payload) => {
                    if sink.send(Message::Text(payload)).await.is_err() {
                        break;
                    }
                }
                // Fell behind the broadcast channel: skip the missed
                // snapshots, the next one carries full truth.
                Err(RecvError::Lagged(missed)) => {
                    tracing::warn!(%room, missed, "member lagged behind broadcasts");
                }
                Err(RecvError::Closed) => break,
            },
        }
    }

    hub.leave(&room, conn_id).await;
    tracing::info!(%room, %uid, "member left");
}
