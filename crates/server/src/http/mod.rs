use axum::{Router, middleware::from_fn_with_state, routing::get};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{AppState, routes};

pub mod auth;

pub fn router(state: AppState) -> Router {
    let api_routes = Router::new()
        .merge(routes::users::router())
        .merge(routes::projects::router())
        .merge(routes::tasks::router(&state))
        .merge(routes::comments::router(&state))
        .merge(routes::sprints::router())
        .merge(routes::time_logs::router())
        .merge(routes::activity::router())
        .merge(routes::ws::router())
        .layer(from_fn_with_state(state.clone(), auth::require_auth));

    Router::new()
        .route("/health", get(routes::health::health_check))
        .nest("/api", api_routes)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
