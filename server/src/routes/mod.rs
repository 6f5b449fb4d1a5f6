//! Router assembly.
//!
//! SYSTEM CONTEXT
//! ==============
//! This module binds the websocket endpoint and the small read-side REST
//! surface under a single Axum router. All mutations flow through the
//! websocket frame protocol; REST exists for dashboards and tooling that
//! only need to read.

pub mod maps;
pub mod ws;

use axum::Router;
use axum::http::StatusCode;
use axum::routing::get;
use tower_http::cors::{Any, CorsLayer};

use crate::state::AppState;

pub fn app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/campaigns/{id}/maps", get(maps::list_maps_rest))
        .route("/api/maps/{id}", get(maps::get_map))
        .route("/api/maps/{id}/tokens", get(maps::list_tokens))
        .route("/api/ws", get(ws::handle_ws))
        .route("/healthz", get(healthz))
        .layer(cors)
        .with_state(state)
}

async fn healthz() -> StatusCode {
    StatusCode::OK
}
