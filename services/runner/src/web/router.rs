//! services/runner/src/web/router.rs

use crate::error::RunnerError;
use crate::web::rest::{self, ApiDoc};
use crate::web::state::AppState;
use crate::web::ws_handler;
use axum::http::{
    header::{ACCEPT, CONTENT_TYPE},
    HeaderValue, Method,
};
use axum::{
    routing::{delete, get, post, put},
    Router,
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

/// Builds the full application: bridge routes, the socket, and Swagger UI.
pub fn build_router(app_state: Arc<AppState>) -> Result<Router, RunnerError> {
    let origin = app_state
        .config
        .ui_origin
        .parse::<HeaderValue>()
        .map_err(|e| RunnerError::Internal(format!("Invalid UI_ORIGIN: {}", e)))?;
    let cors = CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE, ACCEPT]);

    let api_router = Router::new()
        .route("/state", get(rest::get_state_handler))
        .route("/session", delete(rest::discard_session_handler))
        .route("/session/start", post(rest::start_session_handler))
        .route("/session/load", post(rest::load_session_handler))
        .route("/session/begin", post(rest::begin_workout_handler))
        .route("/session/complete", post(rest::complete_session_handler))
        .route("/session/abandon", post(rest::abandon_session_handler))
        .route("/sets", put(rest::update_sets_handler))
        .route("/sets/complete", post(rest::complete_set_handler))
        .route("/sets/{id}", delete(rest::delete_set_handler))
        .route("/pending", put(rest::set_pending_handler))
        .route("/rest/skip", post(rest::skip_rest_handler))
        .route("/rest/adjust", post(rest::adjust_rest_handler))
        .route("/rest/pause", post(rest::pause_rest_handler))
        .route("/rest/resume", post(rest::resume_rest_handler))
        .route("/exercises/skip", post(rest::skip_exercise_handler))
        .route("/exercises/substitute", post(rest::substitute_exercise_handler))
        .route("/exercises/postpone", post(rest::postpone_exercise_handler))
        .route("/exercises/reorder", put(rest::reorder_exercises_handler))
        .route(
            "/exercises/{id}/last-performance",
            get(rest::last_performance_handler),
        )
        .route("/ws", get(ws_handler))
        .layer(cors)
        .with_state(app_state);

    Ok(Router::new()
        .merge(api_router)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi())))
}
