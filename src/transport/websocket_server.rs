use std::sync::Arc;

use axum::{
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::IntoResponse,
};
use tracing::{debug, error, info, warn};

use crate::protocol::ClientEvent;
use crate::relay::ConnectionHandle;
use crate::server::AppState;

pub async fn websocket_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// One task per connection. All session mutation happens inside the relay
/// engine under the per-session lock; this loop only shuttles messages
/// between the socket and the connection's fan-out channel.
async fn handle_socket(mut socket: WebSocket, state: Arc<AppState>) {
    let (tx, rx) = flume::unbounded();
    let conn = ConnectionHandle::new(tx);

    info!("WebSocket connected: {}", conn.id);

    loop {
        tokio::select! {
            Ok(msg) = rx.recv_async() => {
                if let Err(e) = socket.send(msg).await {
                    error!("Socket send error: conn={} err={}", conn.id, e);
                    break;
                }
            }
            msg = socket.recv() => {
                let msg = match msg {
                    Some(Ok(msg)) => msg,
                    Some(Err(e)) => {
                        warn!("WebSocket error: conn={} err={}", conn.id, e);
                        break;
                    }
                    None => break,
                };

                match msg {
                    Message::Text(text) => match serde_json::from_str::<ClientEvent>(&text) {
                        Ok(event) => {
                            debug!("Event from {}: {:?}", conn.id, event);
                            state.engine.handle_event(&conn, event);
                        }
                        Err(e) => {
                            warn!("Unparseable event from {}: {} | {}", conn.id, e, text);
                        }
                    },
                    Message::Close(_) => break,
                    _ => {}
                }
            }
        }
    }

    // Transport drop, not an explicit leave: the engine keeps the slot for
    // the grace period. After leave-session this resolves to a no-op.
    state.engine.handle_disconnect(&conn);
    info!("WebSocket closed: {}", conn.id);
}
