//! HTTP surface (§4.12): public, watcher-token-gated, and admin-gated route
//! groups layered with `axum::middleware::from_fn_with_state`.

use crate::web::handlers::{channels, health, probe_configs, probe_types, push, results, watchers};
use crate::web::state::AppState;
use crate::web::auth;
use axum::middleware;
use axum::routing::{get, post, put};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

#[must_use]
pub fn build(state: AppState) -> Router {
    let heartbeat_routes: Router<AppState> = Router::new()
        .route("/heartbeat", post(push::heartbeat))
        .route_layer(middleware::from_fn_with_state(state.clone(), auth::require_watcher_token));

    let approved_watcher_routes: Router<AppState> = Router::new()
        .route("/result", post(push::submit_result))
        .route("/configs/:watcher", get(push::get_configs))
        .route("/missed_run", post(push::missed_run))
        .route_layer(middleware::from_fn_with_state(state.clone(), auth::require_approved_watcher));

    let public_push_routes = Router::new()
        .route("/register", post(push::register))
        .route("/alert", post(push::alert));

    let admin_routes = Router::new()
        .route("/watchers", get(watchers::list))
        .route("/watchers/:id", get(watchers::get).delete(watchers::delete))
        .route("/watchers/:id/paused", put(watchers::set_paused))
        .route("/probe_types", get(probe_types::list))
        .route(
            "/probe_configs",
            get(probe_configs::list).post(probe_configs::create),
        )
        .route(
            "/probe_configs/:id",
            get(probe_configs::get)
                .put(probe_configs::update)
                .delete(probe_configs::delete),
        )
        .route("/probe_configs/:id/enabled", put(probe_configs::set_enabled))
        .route("/probe_configs/:id/run-now", post(probe_configs::run_now))
        .route("/results", get(results::list))
        .route("/results/latest", get(results::latest))
        .route("/results/aggregate", get(results::aggregate))
        .route(
            "/channels",
            get(channels::list).post(channels::create),
        )
        .route(
            "/channels/:id",
            get(channels::get).put(channels::update).delete(channels::delete),
        )
        .route("/channels/:id/test", post(channels::test))
        .route_layer(middleware::from_fn_with_state(state.clone(), auth::require_admin));

    Router::new()
        .route("/api/health", get(health::health))
        .nest(
            "/api/push",
            public_push_routes.merge(heartbeat_routes).merge(approved_watcher_routes),
        )
        .nest("/api", admin_routes)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
