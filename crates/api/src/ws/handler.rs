use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{ConnectInfo, State};
use axum::response::IntoResponse;
use chrono::Utc;
use futures::{SinkExt, StreamExt};

use crate::coordinator::Coordinator;
use crate::state::AppState;

/// HTTP handler that upgrades the connection to a display WebSocket.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    ConnectInfo(remote_addr): ConnectInfo<SocketAddr>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, remote_addr, state.coordinator))
}

/// Manage a single display connection after upgrade.
///
/// Splits the socket into a sink (outbound) and stream (inbound), then:
///   1. Registers the connection with the broadcast hub.
///   2. Spawns a sender task that forwards messages from the hub channel.
///   3. Hands every inbound text frame to the coordinator as its own task.
///   4. Cleans up on disconnect.
async fn handle_socket(socket: WebSocket, remote_addr: SocketAddr, coordinator: Arc<Coordinator>) {
    let conn_id = uuid::Uuid::new_v4().to_string();
    tracing::info!(conn_id = %conn_id, remote_addr = %remote_addr, "Display connected");

    let hub = Arc::clone(coordinator.hub());
    let (conn, mut rx) = hub.add(conn_id.clone(), Some(remote_addr.to_string())).await;

    let (mut sink, mut stream) = socket.split();

    let sender_conn_id = conn_id.clone();
    let send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if sink.send(msg).await.is_err() {
                tracing::debug!(conn_id = %sender_conn_id, "WebSocket sink closed");
                break;
            }
        }
    });

    while let Some(result) = stream.next().await {
        match result {
            Ok(Message::Text(text)) => {
                let coordinator = Arc::clone(&coordinator);
                let origin = Arc::downgrade(&conn);
                tokio::spawn(async move {
                    coordinator.on_message(origin, text.as_str()).await;
                });
            }
            Ok(Message::Close(_)) => break,
            Ok(Message::Pong(_)) => {
                tracing::trace!(conn_id = %conn_id, "Pong received");
            }
            Ok(_) => {
                tracing::debug!(conn_id = %conn_id, "Ignoring non-text frame");
            }
            Err(e) => {
                tracing::debug!(conn_id = %conn_id, error = %e, "WebSocket receive error");
                break;
            }
        }
    }

    hub.remove(&conn_id).await;
    send_task.abort();
    tracing::info!(
        conn_id = %conn_id,
        remote_addr = conn.remote_addr.as_deref().unwrap_or("unknown"),
        connected_secs = (Utc::now() - conn.connected_at).num_seconds(),
        "Display disconnected"
    );
}
