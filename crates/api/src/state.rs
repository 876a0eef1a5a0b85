use std::sync::Arc;

use crate::coordinator::Coordinator;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// Cheaply cloneable; everything lives behind `Arc`.
#[derive(Clone)]
pub struct AppState {
    pub coordinator: Arc<Coordinator>,
}
