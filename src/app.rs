use crate::handlers;
use crate::state::AppState;
use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{get, post},
};

pub fn router(state: AppState) -> Router {
    let upload_limit = state.upload_limit;
    Router::new()
        .route("/", get(handlers::index))
        .route("/unlock", post(handlers::unlock))
        .route("/submit", post(handlers::submit))
        .route("/forward", post(handlers::forward))
        .route("/api/session", get(handlers::get_session))
        .route("/api/unlock", post(handlers::api_unlock))
        .route("/api/form", get(handlers::get_form))
        .route(
            "/api/entries",
            get(handlers::get_entries).post(handlers::post_entry),
        )
        .route("/api/forward", post(handlers::api_forward))
        .layer(DefaultBodyLimit::max(upload_limit))
        .with_state(state)
}
