//! Conversation endpoints
//!
//! GET    /conversation - history of the current session
//! DELETE /conversation - clear history and images
//! POST   /reflections  - add a reflection and generate its image

use axum::{
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use super::{error_with_kind, AppState, TokenQuery};
use crate::images::{ConversationTurn, ImageSummary};

/// Build the conversation router
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/conversation", get(history).delete(clear))
        .route("/reflections", post(reflect))
}

#[derive(Debug, Serialize)]
pub struct HistoryResponse {
    pub username: String,
    pub history: Vec<ConversationTurn>,
}

async fn history(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<TokenQuery>,
) -> Response {
    let handle = match state.session(&headers, query.token.as_deref()) {
        Ok(handle) => handle,
        Err(resp) => return resp,
    };
    let session = handle.lock().await;
    Json(HistoryResponse {
        username: session.username.clone(),
        history: session.history.clone(),
    })
    .into_response()
}

#[derive(Debug, Serialize)]
pub struct ClearResponse {
    pub cleared: bool,
}

async fn clear(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<TokenQuery>,
) -> Response {
    let handle = match state.session(&headers, query.token.as_deref()) {
        Ok(handle) => handle,
        Err(resp) => return resp,
    };
    handle.lock().await.clear();
    Json(ClearResponse { cleared: true }).into_response()
}

/// Reflection request
#[derive(Debug, Deserialize)]
pub struct ReflectRequest {
    #[serde(default)]
    pub text: String,
}

/// Reflection response
#[derive(Debug, Serialize)]
pub struct ReflectResponse {
    pub image: ImageSummary,
    pub url: String,
    pub download_url: String,
    pub history_len: usize,
}

async fn reflect(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<TokenQuery>,
    Json(req): Json<ReflectRequest>,
) -> Response {
    let handle = match state.session(&headers, query.token.as_deref()) {
        Ok(handle) => handle,
        Err(resp) => return resp,
    };

    let Some(api_key) = state.config.api_key() else {
        return error_with_kind(
            StatusCode::SERVICE_UNAVAILABLE,
            "unconfigured",
            "GEMINI_API_KEY is not configured",
        );
    };

    let options = state.config.generate_options();
    let mut session = handle.lock().await;
    match session
        .reflect(state.generator.as_ref(), api_key, &options, &req.text)
        .await
    {
        Ok(image) => {
            let url = format!("/images/{}", image.hash);
            (
                StatusCode::CREATED,
                Json(ReflectResponse {
                    url,
                    download_url: "/images/latest".to_string(),
                    image,
                    history_len: session.history.len(),
                }),
            )
                .into_response()
        }
        Err(e) => e.into_response(),
    }
}
