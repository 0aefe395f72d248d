pub mod health;
pub mod resources;

use axum::{middleware, routing::get, Router};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::middleware::require_bearer;
use crate::state::AppState;

/// Full application router: public `/health` plus the gated resource routes
/// mounted under the configured prefix.
pub fn router(state: AppState) -> Router {
    let resources = Router::new()
        .route("/", get(resources::index).post(resources::create))
        .route("/:id", get(resources::show).put(resources::update))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_bearer));

    let prefix = state.api.prefix.trim_end_matches('/');
    let app = Router::new().route("/health", get(health::health));
    let app = if prefix.is_empty() {
        app.merge(resources)
    } else {
        app.nest(prefix, resources)
    };

    let app = app.layer(TraceLayer::new_for_http());
    let app = if state.api.enable_cors {
        app.layer(CorsLayer::permissive())
    } else {
        app
    };

    app.with_state(state)
}
