//! Image serving endpoints
//!
//! GET /images         - Gallery listing for the session
//! GET /images/latest  - Latest image as a PNG attachment
//! GET /images/{hash}  - Serve image by content hash

use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::Serialize;

use super::{error_response, AppState, TokenQuery};
use crate::images::{ImageData, ImageSummary};

/// Build the images router
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_images))
        .route("/latest", get(latest_image))
        .route("/{hash}", get(get_image))
}

#[derive(Debug, Serialize)]
pub struct GalleryResponse {
    pub count: usize,
    pub latest: Option<ImageSummary>,
    pub thumbnails: Vec<ImageSummary>,
}

async fn list_images(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<TokenQuery>,
) -> Response {
    let handle = match state.session(&headers, query.token.as_deref()) {
        Ok(handle) => handle,
        Err(resp) => return resp,
    };
    let session = handle.lock().await;
    let gallery = &session.gallery;
    Json(GalleryResponse {
        count: gallery.len(),
        latest: gallery.latest().map(ImageData::summary),
        thumbnails: gallery.thumbnails().iter().map(ImageData::summary).collect(),
    })
    .into_response()
}

/// Latest image, offered as a download
async fn latest_image(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<TokenQuery>,
) -> Response {
    let handle = match state.session(&headers, query.token.as_deref()) {
        Ok(handle) => handle,
        Err(resp) => return resp,
    };
    let session = handle.lock().await;
    match session.gallery.latest() {
        Some(image) => (
            StatusCode::OK,
            [
                (header::CONTENT_TYPE, image.mime_type.clone()),
                (
                    header::CONTENT_DISPOSITION,
                    format!("attachment; filename=\"{}\"", image.download_filename()),
                ),
            ],
            image.data.clone(),
        )
            .into_response(),
        None => error_response(StatusCode::NOT_FOUND, "no image generated yet"),
    }
}

/// Serve an image by hash
async fn get_image(
    Path(hash): Path<String>,
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<TokenQuery>,
) -> Response {
    let handle = match state.session(&headers, query.token.as_deref()) {
        Ok(handle) => handle,
        Err(resp) => return resp,
    };
    let session = handle.lock().await;
    match session.gallery.get(&hash) {
        Some(image) => (
            StatusCode::OK,
            [
                (header::CONTENT_TYPE, image.mime_type.clone()),
                (
                    header::CACHE_CONTROL,
                    "private, max-age=31536000, immutable".to_string(),
                ),
            ],
            image.data.clone(),
        )
            .into_response(),
        None => error_response(StatusCode::NOT_FOUND, "Image not found"),
    }
}
