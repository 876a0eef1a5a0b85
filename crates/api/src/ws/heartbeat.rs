use std::sync::Arc;
use std::time::Duration;

use crate::ws::BroadcastHub;

/// Spawn a background task that sends periodic Ping frames to all connected
/// displays.
///
/// The task runs until aborted through the returned `JoinHandle`, which
/// happens during shutdown.
pub fn start_heartbeat(hub: Arc<BroadcastHub>, period: Duration) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);

        loop {
            interval.tick().await;
            let count = hub.connection_count().await;
            tracing::debug!(count, "Display heartbeat ping");
            hub.ping_all().await;
        }
    })
}
