pub mod auth;
pub mod middleware;
pub mod rest;
pub mod state;

pub use middleware::require_auth;

use axum::{
    extract::DefaultBodyLimit,
    middleware as axum_middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;

use crate::web::state::AppState;

/// Upload limit for report files.
pub const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

/// Builds the API router: public auth routes plus the session-protected routes.
pub fn router(app_state: Arc<AppState>) -> Router {
    // Public routes (no auth required)
    let public_routes = Router::new()
        .route("/auth/register", post(auth::register_handler))
        .route("/auth/login", post(auth::login_handler))
        .route("/auth/logout", post(auth::logout_handler));

    // Protected routes (auth required)
    let protected_routes = Router::new()
        .route("/disclaimer", post(rest::accept_disclaimer_handler))
        .route(
            "/profile",
            get(rest::get_profile_handler).put(rest::save_profile_handler),
        )
        .route("/reports", post(rest::upload_reports_handler))
        .route("/explanation", post(rest::explain_handler))
        .route("/explanation/audio", get(rest::explanation_audio_handler))
        .route("/explanation/pdf", get(rest::explanation_pdf_handler))
        .route(
            "/history",
            get(rest::history_handler).delete(rest::clear_history_handler),
        )
        .route("/analysis/reset", post(rest::new_analysis_handler))
        .layer(axum_middleware::from_fn_with_state(
            app_state.clone(),
            require_auth,
        ));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .with_state(app_state)
}
