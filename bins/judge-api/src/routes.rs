use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;

use crate::handlers;
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/run", post(handlers::run))
        .route("/submit", post(handlers::submit))
        .route("/submissions/:submission_id", get(handlers::get_submission))
        .route("/progress/:user_id", get(handlers::get_progress))
        .route("/languages", get(handlers::list_languages))
        .route("/health", get(handlers::health_check))
        .route("/metrics", get(handlers::export_metrics))
}
