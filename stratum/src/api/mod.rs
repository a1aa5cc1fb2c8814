//! Runtime Endpoint (spec §4.9): a plain JSON HTTP surface over the
//! Lifecycle Engine and Image Store, the way an external orchestrator
//! talks to a container runtime shim. The teacher exposes only a gRPC
//! surface (`boxlite-shared::generated`, consumed by `portal/`); this
//! module is a fresh `axum` adapter instead, composing with the teacher's
//! existing `tower`/`hyper-util` dependencies.

mod error_response;
mod routes;

use crate::lifecycle::LifecycleEngine;
use axum::Router;
use std::sync::Arc;

/// Shared application state handed to every route handler.
pub struct ApiState {
    pub engine: LifecycleEngine,
    pub version: &'static str,
}

pub fn router(engine: LifecycleEngine) -> Router {
    let state = Arc::new(ApiState {
        engine,
        version: env!("CARGO_PKG_VERSION"),
    });

    Router::new()
        .merge(routes::health_routes())
        .merge(routes::container_routes())
        .merge(routes::image_routes())
        .with_state(state)
}
