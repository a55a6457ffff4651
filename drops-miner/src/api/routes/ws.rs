//! Push channel for status and log events.

use std::sync::Arc;

use axum::{
    Router,
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::Response,
    routing::get,
};
use futures::{SinkExt, StreamExt};
use tracing::debug;

use crate::api::server::AppState;
use crate::broadcast::ChannelSubscriber;

/// Events buffered per connection before it is considered too slow.
const SUBSCRIBER_BUFFER: usize = 256;

pub fn router() -> Router<AppState> {
    Router::new().route("/", get(events_ws))
}

async fn events_ws(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(|socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let (subscriber, mut events) = ChannelSubscriber::new(SUBSCRIBER_BUFFER);
    let Some(id) = state.broadcaster.subscribe(Arc::new(subscriber)) else {
        return;
    };
    debug!("WebSocket subscriber connected");

    let (mut sender, mut receiver) = socket.split();

    loop {
        tokio::select! {
            msg = receiver.next() => {
                match msg {
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(Message::Ping(data))) => {
                        if sender.send(Message::Pong(data)).await.is_err() {
                            break;
                        }
                    }
                    Some(Err(e)) => {
                        debug!("WebSocket error: {}", e);
                        break;
                    }
                    _ => {}
                }
            }

            event = events.recv() => {
                // None: the broadcaster dropped us after a failed delivery
                let Some(event) = event else { break };
                let text = match serde_json::to_string(&event) {
                    Ok(text) => text,
                    Err(e) => {
                        debug!("Failed to encode event: {}", e);
                        continue;
                    }
                };
                if sender.send(Message::Text(text.into())).await.is_err() {
                    break;
                }
            }
        }
    }

    state.broadcaster.unsubscribe(id);
    let _ = sender.close().await;
    debug!("WebSocket subscriber disconnected");
}
