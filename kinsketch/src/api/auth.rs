//! Authentication API endpoints

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::AppState;

/// Build auth router
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/auth/login", post(login))
        .route("/auth/logout", post(logout))
        .route("/auth/validate", get(validate))
}

/// Login request
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

/// Login response
#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub username: String,
    pub display_name: Option<String>,
    pub greeting: String,
}

/// Login with username and password
async fn login(State(state): State<AppState>, Json(req): Json<LoginRequest>) -> impl IntoResponse {
    match state.accounts.authenticate(&req.username, &req.password) {
        Ok(account) => {
            let token = state.sessions.create(&account);
            let greeting = format!("欢迎回来，{}！", account.greeting_name());
            (
                StatusCode::OK,
                Json(LoginResponse {
                    token,
                    username: account.username,
                    display_name: account.display_name,
                    greeting,
                }),
            )
                .into_response()
        }
        Err(e) => {
            info!("Login failed for '{}': {}", req.username, e);
            e.into_response()
        }
    }
}

/// Logout request
#[derive(Debug, Deserialize)]
pub struct LogoutRequest {
    pub token: String,
}

/// Logout response
#[derive(Debug, Serialize)]
pub struct LogoutResponse {
    pub success: bool,
}

/// Logout by dropping the session and everything in it
async fn logout(
    State(state): State<AppState>,
    Json(req): Json<LogoutRequest>,
) -> impl IntoResponse {
    let success = state.sessions.remove(&req.token);
    Json(LogoutResponse { success })
}

/// Validate query params
#[derive(Debug, Deserialize)]
pub struct ValidateQuery {
    pub token: String,
}

/// Validate response
#[derive(Debug, Serialize)]
pub struct ValidateResponse {
    pub valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
}

/// Validate a token
async fn validate(
    State(state): State<AppState>,
    Query(params): Query<ValidateQuery>,
) -> impl IntoResponse {
    let username = match state.sessions.get(&params.token) {
        Some(handle) => Some(handle.lock().await.username.clone()),
        None => None,
    };
    Json(ValidateResponse {
        valid: username.is_some(),
        username,
    })
}
