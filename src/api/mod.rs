//! REST API for home state, economy control, schedules, and savings.
//!
//! Administrative surface over a running engine:
//! - `GET /homes` — all homes with mode and balance
//! - `GET /homes/{id}/state` — devices, schedules, and settings
//! - `POST /homes/{id}/economy` — toggle Economy Mode
//! - `POST /homes/{id}/schedules` — create a schedule
//! - `GET /homes/{id}/savings` — ledger records, optional time range
//! - `POST /suggestions/{id}/accept`, `POST /suggestions/{id}/reject`
//! - `POST /tick` — force one evaluation pass immediately

mod handlers;
mod types;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};

use crate::runtime::Runtime;
use crate::scenario::ScenarioBackend;

/// Application state shared across all request handlers.
///
/// The backend holds the mutable home state behind its own locks, so the
/// state itself needs none.
pub struct AppState {
    pub backend: Arc<ScenarioBackend>,
    pub runtime: Arc<Runtime>,
}

impl AppState {
    pub fn new(backend: Arc<ScenarioBackend>, runtime: Arc<Runtime>) -> Self {
        Self { backend, runtime }
    }
}

/// Builds the axum router with all API routes.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/homes", get(handlers::list_homes))
        .route("/homes/{id}/state", get(handlers::get_home_state))
        .route("/homes/{id}/economy", post(handlers::set_economy))
        .route("/homes/{id}/schedules", post(handlers::create_schedule))
        .route("/homes/{id}/savings", get(handlers::get_savings))
        .route(
            "/suggestions/{id}/accept",
            post(handlers::accept_suggestion),
        )
        .route(
            "/suggestions/{id}/reject",
            post(handlers::reject_suggestion),
        )
        .route("/tick", post(handlers::run_tick))
        .with_state(state)
}

/// Binds to the given address and serves the API.
///
/// # Panics
///
/// Panics if the TCP listener cannot bind to `addr`.
pub async fn serve(state: Arc<AppState>, addr: SocketAddr) {
    let app = router(state);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .unwrap_or_else(|e| panic!("failed to bind to {addr}: {e}"));
    eprintln!("API server listening on http://{addr}");
    axum::serve(listener, app)
        .await
        .unwrap_or_else(|e| panic!("server error: {e}"));
}
