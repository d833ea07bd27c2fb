use axum::{
    middleware,
    routing::{get, patch, post},
    Router,
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use super::{handlers, middleware::metrics_middleware, plan, run, ws};
use crate::state::AppState;

pub fn create_router(state: Arc<AppState>) -> Router {
    // API routes
    let api_routes = Router::new()
        // Health and config
        .route("/health", get(handlers::health))
        .route("/config", get(handlers::get_config))
        // Run lifecycle
        .route("/run", get(run::get_run))
        .route("/run/start", post(run::start_run))
        .route("/run/approve", post(run::approve_run))
        .route("/run/regenerate-identity", post(run::regenerate_identity))
        .route("/run/reset", post(run::reset_run))
        .route("/wardrobe", post(run::add_wardrobe_item))
        .route("/persona-card", get(run::get_persona_card))
        // Content plan
        .route("/plan/weeks/{week}/regenerate", post(plan::regenerate_week))
        .route("/plan/weeks/{week}/items", post(plan::add_content))
        .route(
            "/plan/weeks/{week}/items/{item}",
            patch(plan::update_item),
        )
        .route(
            "/plan/weeks/{week}/items/{item}/generate",
            post(plan::generate_item),
        )
        .route(
            "/plan/weeks/{week}/items/{item}/extend",
            post(plan::extend_item),
        )
        .route(
            "/plan/weeks/{week}/items/{item}/selfie",
            post(plan::selfie_item),
        )
        .route(
            "/plan/weeks/{week}/items/{item}/animate",
            post(plan::animate_item),
        )
        // Live updates
        .route("/ws", get(ws::ws_handler));

    Router::new()
        .nest("/api/v1", api_routes)
        .route("/metrics", get(handlers::metrics))
        .with_state(state)
        .layer(middleware::from_fn(metrics_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}
