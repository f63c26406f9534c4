//! services/api/src/web/auth.rs
//!
//! Authentication endpoints for user registration, login, and logout.

use axum::{
    extract::State,
    http::{header, HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;
use utoipa::ToSchema;

use crate::web::middleware::{session_id_from_headers, SESSION_COOKIE};
use crate::web::rest::session_error_response;
use crate::web::state::AppState;

/// Shown once after login; must be accepted before using the tool.
pub const DISCLAIMER: &str = "Esta herramienta permite interpretar informes médicos de forma \
simplificada, según tu perfil. Importante: este es un prototipo con fines educativos. \
No reemplaza la consulta con profesionales sanitarios.";

//=========================================================================================
// Request/Response Types
//=========================================================================================

#[derive(Deserialize, ToSchema)]
pub struct RegisterRequest {
    pub username: String,
    pub password: String,
    #[serde(default)]
    pub email: String,
}

#[derive(Deserialize, ToSchema)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Serialize, ToSchema)]
pub struct RegisterResponse {
    pub username: String,
}

#[derive(Serialize, ToSchema)]
pub struct LoginResponse {
    pub username: String,
    pub has_profile: bool,
    pub history_entries: usize,
    pub disclaimer: String,
}

fn session_cookie(value: &str, max_age_secs: i64) -> String {
    format!(
        "{}={}; HttpOnly; Secure; SameSite=Lax; Path=/; Max-Age={}",
        SESSION_COOKIE, value, max_age_secs
    )
}

//=========================================================================================
// Handlers
//=========================================================================================

/// POST /auth/register - Create a new user account
#[utoipa::path(
    post,
    path = "/auth/register",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "User created successfully", body = RegisterResponse),
        (status = 400, description = "Empty username"),
        (status = 409, description = "Username already registered"),
        (status = 502, description = "Credential store unavailable")
    )
)]
pub async fn register_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RegisterRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    state
        .controller
        .register(&req.username, &req.password, &req.email)
        .await
        .map_err(session_error_response)?;

    let response = RegisterResponse {
        username: req.username.trim().to_string(),
    };
    Ok((StatusCode::CREATED, Json(response)))
}

/// POST /auth/login - Login with an existing account
#[utoipa::path(
    post,
    path = "/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = LoginResponse),
        (status = 401, description = "Invalid credentials"),
        (status = 502, description = "Stored data unavailable")
    )
)]
pub async fn login_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<LoginRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    // 1. Verify credentials and load the user's document
    let session = state
        .controller
        .login(&req.username, &req.password)
        .await
        .map_err(session_error_response)?;

    let response = LoginResponse {
        username: session.username().unwrap_or_default().to_string(),
        has_profile: session.profile.is_some(),
        history_entries: session.history.len(),
        disclaimer: DISCLAIMER.to_string(),
    };

    // 2. Register the session and hand its id back as a cookie
    let session_id = state.sessions.insert(session).await;
    let cookie = session_cookie(&session_id, state.sessions.ttl().num_seconds());

    Ok((StatusCode::OK, [(header::SET_COOKIE, cookie)], Json(response)))
}

/// POST /auth/logout - Logout and drop the session
#[utoipa::path(
    post,
    path = "/auth/logout",
    responses(
        (status = 200, description = "Logout successful"),
        (status = 401, description = "No active session")
    )
)]
pub async fn logout_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    // 1. Extract session id from cookie
    let session_id = session_id_from_headers(&headers)
        .ok_or((StatusCode::UNAUTHORIZED, "No session found".to_string()))?;

    // 2. Forget the session
    let session = state
        .sessions
        .remove(session_id)
        .await
        .ok_or((StatusCode::UNAUTHORIZED, "No session found".to_string()))?;
    state.controller.logout(&mut *session.lock().await);
    let active_sessions = state.sessions.len().await;
    info!(active_sessions, "Session closed");

    // 3. Clear cookie
    Ok((StatusCode::OK, [(header::SET_COOKIE, session_cookie("", 0))]))
}
