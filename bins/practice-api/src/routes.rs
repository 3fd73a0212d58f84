// Route table for the Practice API

use axum::{
    routing::{get, post, put},
    Router,
};
use std::sync::Arc;

use crate::handlers;
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/sessions", post(handlers::create_session))
        .route(
            "/sessions/:session_id",
            get(handlers::get_session).delete(handlers::delete_session),
        )
        .route("/sessions/:session_id/index", put(handlers::set_index))
        .route("/sessions/:session_id/code", put(handlers::edit_code))
        .route("/sessions/:session_id/submit", post(handlers::submit))
        .route(
            "/sessions/:session_id/questions/:index/load",
            post(handlers::load_question),
        )
        .route("/sessions/:session_id/progress", get(handlers::session_progress))
        .route("/progress", get(handlers::list_progress))
        .route("/status", get(handlers::health_check))
        .route("/metrics", get(handlers::metrics))
}
