use std::collections::HashMap;
use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::ws::{Message, Utf8Bytes};
use chrono::Utc;
use signage_core::protocol::{OutboundEnvelope, Payload};
use signage_core::types::Timestamp;
use tokio::sync::{mpsc, RwLock};

/// Channel sender half for pushing messages to a display connection.
pub type WsSender = mpsc::UnboundedSender<Message>;

/// A registered display (or admin page) connection.
#[derive(Debug)]
pub struct DisplayConnection {
    pub id: String,
    /// Peer address as reported by the transport, if known.
    pub remote_addr: Option<String>,
    sender: WsSender,
    pub connected_at: Timestamp,
}

impl DisplayConnection {
    /// Whether the outbound side is still attached to a socket.
    pub fn is_open(&self) -> bool {
        !self.sender.is_closed()
    }

    fn send(&self, message: Message) -> bool {
        self.sender.send(message).is_ok()
    }
}

/// Registry of live display connections and the fan-out point for
/// timeline payloads.
///
/// Delivery is at-most-once: closed connections are skipped, nothing is
/// queued for later, and the unbounded per-connection channel means a slow
/// socket never holds up the others.
pub struct BroadcastHub {
    connections: RwLock<HashMap<String, Arc<DisplayConnection>>>,
}

impl BroadcastHub {
    pub fn new() -> Self {
        Self {
            connections: RwLock::new(HashMap::new()),
        }
    }

    /// Register a new connection.
    ///
    /// Returns the connection handle and the receiver half of its outbound
    /// channel; the caller forwards received messages to the socket sink.
    pub async fn add(
        &self,
        conn_id: String,
        remote_addr: Option<String>,
    ) -> (Arc<DisplayConnection>, mpsc::UnboundedReceiver<Message>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let conn = Arc::new(DisplayConnection {
            id: conn_id.clone(),
            remote_addr,
            sender: tx,
            connected_at: Utc::now(),
        });
        self.connections
            .write()
            .await
            .insert(conn_id, Arc::clone(&conn));
        (conn, rx)
    }

    /// Remove a connection by its ID.
    pub async fn remove(&self, conn_id: &str) {
        self.connections.write().await.remove(conn_id);
    }

    /// Send `payload` to every open connection.
    ///
    /// Returns the number of connections the message was handed to.
    pub async fn broadcast(&self, payload: &Payload) -> usize {
        let Some(text) = encode(payload) else {
            return 0;
        };

        let conns = self.connections.read().await;
        let delivered = conns
            .values()
            .filter(|conn| conn.is_open())
            .filter(|conn| conn.send(Message::Text(text.clone())))
            .count();

        tracing::debug!(
            command = %payload.command,
            delivered,
            registered = conns.len(),
            "Broadcast payload"
        );
        delivered
    }

    /// Send `payload` to a single connection.
    ///
    /// Returns `false` if the connection has already closed.
    pub fn send_to(&self, conn: &DisplayConnection, payload: &Payload) -> bool {
        if !conn.is_open() {
            return false;
        }
        match encode(payload) {
            Some(text) => conn.send(Message::Text(text)),
            None => false,
        }
    }

    /// Return the current number of registered connections.
    pub async fn connection_count(&self) -> usize {
        self.connections.read().await.len()
    }

    /// Send a Close frame to every connection, then clear the registry.
    pub async fn shutdown_all(&self) {
        let mut conns = self.connections.write().await;
        let count = conns.len();
        for conn in conns.values() {
            conn.send(Message::Close(None));
        }
        conns.clear();
        tracing::info!(count, "Closed all display connections");
    }

    /// Send a Ping frame to every connection.
    pub async fn ping_all(&self) {
        let conns = self.connections.read().await;
        for conn in conns.values() {
            conn.send(Message::Ping(Bytes::new()));
        }
    }
}

impl Default for BroadcastHub {
    fn default() -> Self {
        Self::new()
    }
}

/// Wrap `payload` in a timestamped envelope and serialize it once.
fn encode(payload: &Payload) -> Option<Utf8Bytes> {
    let envelope = OutboundEnvelope::new(Utc::now(), payload.clone());
    match serde_json::to_string(&envelope) {
        Ok(text) => Some(Utf8Bytes::from(text)),
        Err(e) => {
            tracing::error!(command = %payload.command, error = %e, "Failed to encode payload");
            None
        }
    }
}
