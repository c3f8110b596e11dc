use axum::{
    body::Body,
    extract::{Path as UrlPath, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use std::path::Path;
use std::sync::Arc;

use super::AppState;

/// GET /avatars/{filename}
///
/// Serves a stored avatar, falling back to the default image when the file
/// does not exist. Content type is inferred from the extension.
pub async fn get_avatar(
    State(state): State<Arc<AppState>>,
    UrlPath(filename): UrlPath<String>,
) -> Response {
    let path = state.avatars().path_of(&filename);

    match tokio::fs::read(&path).await {
        Ok(bytes) => image_response(&path, bytes),
        Err(_) => default_response(&state).await,
    }
}

/// GET /avatars
pub async fn default_avatar(State(state): State<Arc<AppState>>) -> Response {
    default_response(&state).await
}

async fn default_response(state: &AppState) -> Response {
    let path = Path::new(&state.config().uploads.default_avatar);

    match tokio::fs::read(path).await {
        Ok(bytes) => image_response(path, bytes),
        Err(_) => (StatusCode::NOT_FOUND, "404 Not Found").into_response(),
    }
}

fn image_response(path: &Path, bytes: Vec<u8>) -> Response {
    let mime = mime_guess::from_path(path)
        .first_raw()
        .unwrap_or("image/jpeg");

    ([(header::CONTENT_TYPE, mime)], Body::from(bytes)).into_response()
}
