use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use futures::SinkExt;
use futures::StreamExt;
use serde::Serialize;
use tokio_stream::wrappers::{BroadcastStream, WatchStream};
use tracing::{info, warn};

use crate::engine::tracker::{TrackerEvent, TrackerSnapshot};
use crate::state::AppState;

/// One websocket frame: either the full tracker snapshot or a single event.
#[derive(Serialize)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
enum Frame {
    Snapshot(TrackerSnapshot),
    Event(TrackerEvent),
}

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(|socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let (mut sender, mut receiver) = socket.split();

    let snapshots = WatchStream::new(state.tracker.subscribe()).map(Frame::Snapshot);
    let events = BroadcastStream::new(state.tracker.events())
        .filter_map(|event| async move { event.ok() })
        .map(Frame::Event);
    let mut frames = futures::stream::select(snapshots, events).boxed();

    info!("websocket client connected");

    let mut send_task = tokio::spawn(async move {
        while let Some(frame) = frames.next().await {
            let json = match serde_json::to_string(&frame) {
                Ok(json) => json,
                Err(err) => {
                    warn!(error = %err, "failed to serialize tracker frame for ws");
                    continue;
                }
            };

            if sender.send(Message::Text(json.into())).await.is_err() {
                break;
            }
        }
    });

    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(_msg)) = receiver.next().await {}
    });

    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }

    info!("websocket client disconnected");
}
