//! HTTP API module - JSON endpoints and image downloads

mod auth;
mod conversation;
mod images;

use std::sync::Arc;

use axum::{
    extract::State,
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tower_http::trace::TraceLayer;

use crate::auth::{AccountService, AuthError};
use crate::config::Config;
use crate::gemini::TextGenerator;
use crate::images::GenerateError;
use crate::session::{SessionHandle, SessionManager};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub accounts: Arc<AccountService>,
    pub sessions: Arc<SessionManager>,
    pub generator: Arc<dyn TextGenerator>,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(config: Config, generator: Arc<dyn TextGenerator>) -> Self {
        let accounts = AccountService::new(
            config.users_path.clone(),
            config.password_scheme.verifier(),
        );
        Self {
            accounts: Arc::new(accounts),
            sessions: Arc::new(SessionManager::new()),
            generator,
            config: Arc::new(config),
        }
    }

    /// Resolve the session for a request, from the bearer header or `?token=`
    fn session(&self, headers: &HeaderMap, query_token: Option<&str>) -> Result<SessionHandle, Response> {
        let token = bearer_token(headers)
            .or(query_token)
            .ok_or_else(|| error_response(StatusCode::UNAUTHORIZED, "missing session token"))?;
        self.sessions
            .get(token)
            .ok_or_else(|| error_response(StatusCode::UNAUTHORIZED, "invalid or expired session"))
    }
}

/// Build the API router
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/", get(root))
        .merge(auth::router())
        .merge(conversation::router())
        .nest("/images", images::router())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Optional `?token=` query parameter
#[derive(Debug, Default, Deserialize)]
pub struct TokenQuery {
    pub token: Option<String>,
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

/// Error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub kind: &'static str,
}

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    error_with_kind(status, "request", message)
}

fn error_with_kind(status: StatusCode, kind: &'static str, message: impl Into<String>) -> Response {
    (
        status,
        Json(ErrorResponse {
            error: message.into(),
            kind,
        }),
    )
        .into_response()
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let (status, kind, message) = match &self {
            AuthError::InvalidInput => (
                StatusCode::BAD_REQUEST,
                "invalid_input",
                "username and password must not be empty".to_string(),
            ),
            AuthError::UnknownUser(_) => (
                StatusCode::NOT_FOUND,
                "unknown_user",
                "user does not exist, check the username".to_string(),
            ),
            AuthError::WrongCredential => (
                StatusCode::UNAUTHORIZED,
                "wrong_credential",
                "wrong password, please try again".to_string(),
            ),
            AuthError::Persistence(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "persistence",
                self.to_string(),
            ),
        };
        error_with_kind(status, kind, message)
    }
}

impl IntoResponse for GenerateError {
    fn into_response(self) -> Response {
        let (status, kind) = match &self {
            GenerateError::InvalidInput(_) => (StatusCode::BAD_REQUEST, "invalid_input"),
            GenerateError::EmptyResponse => (StatusCode::BAD_GATEWAY, "empty_response"),
            GenerateError::NoImageFound => (StatusCode::BAD_GATEWAY, "no_image_found"),
            GenerateError::DecodeError(_) => (StatusCode::BAD_GATEWAY, "decode_error"),
            GenerateError::Network(_) => (StatusCode::BAD_GATEWAY, "network"),
            GenerateError::RemoteApi(_) => (StatusCode::BAD_GATEWAY, "remote_api"),
            GenerateError::Storage(_) => (StatusCode::INTERNAL_SERVER_ERROR, "storage"),
        };
        let message = match &self {
            GenerateError::Network(_) => {
                "network error, check your connection and retry".to_string()
            }
            GenerateError::Storage(_) => self.to_string(),
            other => format!("AI service error: {}", other),
        };
        error_with_kind(status, kind, message)
    }
}

/// Root endpoint
async fn root() -> impl IntoResponse {
    Json(RootResponse {
        name: "kinsketch",
        version: env!("CARGO_PKG_VERSION"),
    })
}

#[derive(Serialize)]
struct RootResponse {
    name: &'static str,
    version: &'static str,
}

/// Health check endpoint
async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let users = state.accounts.load_store().len();
    Json(HealthResponse {
        status: "healthy",
        users,
        generator: if state.config.api_key().is_some() {
            "configured"
        } else {
            "unconfigured"
        },
        sessions: state.sessions.len(),
    })
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    users: usize,
    generator: &'static str,
    sessions: usize,
}
