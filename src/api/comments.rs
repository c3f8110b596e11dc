use axum::{
    Json,
    extract::{Path, Query, State},
};
use serde::Deserialize;
use std::sync::Arc;

use super::auth::CurrentUser;
use super::{
    ApiError, ApiResponse, AppState, CommentDto, CommentListResponse, MessageResponse,
};
use crate::constants::pagination::{DEFAULT_PER_PAGE, MAX_PER_PAGE};

#[derive(Deserialize)]
pub struct ListQuery {
    pub page: Option<u64>,
    pub per_page: Option<u64>,
}

#[derive(Deserialize)]
pub struct CommentRequest {
    pub content: String,
}

/// GET /posts/{id}/comments?page&per_page
pub async fn list_comments(
    State(state): State<Arc<AppState>>,
    Path(post_id): Path<i32>,
    Query(query): Query<ListQuery>,
) -> Result<Json<ApiResponse<CommentListResponse>>, ApiError> {
    let page = query.page.unwrap_or(1).max(1);
    let per_page = query
        .per_page
        .unwrap_or(DEFAULT_PER_PAGE)
        .clamp(1, MAX_PER_PAGE);

    let result = state.comments().list(post_id, page, per_page).await?;

    Ok(Json(ApiResponse::success(CommentListResponse {
        comments: result.comments.into_iter().map(CommentDto::from).collect(),
        pagination: result.page,
    })))
}

/// POST /posts/{id}/comments
pub async fn create_comment(
    State(state): State<Arc<AppState>>,
    CurrentUser(identity): CurrentUser,
    Path(post_id): Path<i32>,
    Json(payload): Json<CommentRequest>,
) -> Result<Json<ApiResponse<CommentDto>>, ApiError> {
    let comment = state
        .comments()
        .create(&identity, post_id, payload.content.trim())
        .await?;

    Ok(Json(ApiResponse::success(comment.into())))
}

/// PUT /comments/{id}
pub async fn edit_comment(
    State(state): State<Arc<AppState>>,
    CurrentUser(identity): CurrentUser,
    Path(comment_id): Path<i32>,
    Json(payload): Json<CommentRequest>,
) -> Result<Json<ApiResponse<CommentDto>>, ApiError> {
    let comment = state
        .comments()
        .edit(&identity, comment_id, payload.content.trim())
        .await?;

    Ok(Json(ApiResponse::success(comment.into())))
}

/// DELETE /comments/{id}
pub async fn delete_comment(
    State(state): State<Arc<AppState>>,
    CurrentUser(identity): CurrentUser,
    Path(comment_id): Path<i32>,
) -> Result<Json<ApiResponse<MessageResponse>>, ApiError> {
    state.comments().delete(&identity, comment_id).await?;

    Ok(Json(ApiResponse::success(MessageResponse::new(
        "Comment deleted.",
    ))))
}
