pub mod health;

use axum::routing::get;
use axum::Router;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;

use crate::state::AppState;
use crate::ws;

/// Build the full application router.
///
/// ```text
/// /          display WebSocket
/// /ws        display WebSocket
/// /health    service health
/// ```
///
/// The WebSocket routes read the peer address, so the router must be served
/// with `into_make_service_with_connect_info::<SocketAddr>()`.
pub fn app_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(ws::ws_handler))
        .route("/ws", get(ws::ws_handler))
        .merge(health::router())
        // Panic recovery: catch panics and return 500.
        .layer(CatchPanicLayer::new())
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .with_state(state)
}
