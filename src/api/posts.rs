use axum::{
    Json,
    extract::{Multipart, Path, Query, State},
};
use serde::Deserialize;
use std::sync::Arc;

use super::auth::{CurrentUser, MaybeUser};
use super::{
    ApiError, ApiResponse, AppState, MessageResponse, PostDto, PostListResponse, validation,
};
use crate::constants::pagination::{DEFAULT_PER_PAGE, MAX_PER_PAGE};
use crate::domain::AccessDenied;
use crate::services::{ImageAction, NewImage};

#[derive(Deserialize)]
pub struct ListQuery {
    pub page: Option<u64>,
    pub per_page: Option<u64>,
    /// "mine" restricts the listing to the caller's posts.
    pub mode: Option<String>,
}

/// Fields collected from a multipart post form.
#[derive(Default)]
struct PostForm {
    title: String,
    content: String,
    delete_image: bool,
    image: Option<(Option<String>, Vec<u8>)>,
}

async fn read_post_form(
    mut multipart: Multipart,
    image_field: &str,
) -> Result<PostForm, ApiError> {
    let mut form = PostForm::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::validation(format!("Upload failed: {e}")))?
    {
        let name = field.name().map(ToString::to_string);
        match name.as_deref() {
            Some("title") => {
                form.title = field
                    .text()
                    .await
                    .map_err(|e| ApiError::validation(format!("Invalid form field: {e}")))?;
            }
            Some("content") => {
                form.content = field
                    .text()
                    .await
                    .map_err(|e| ApiError::validation(format!("Invalid form field: {e}")))?;
            }
            Some("delete_image") => {
                let value = field
                    .text()
                    .await
                    .map_err(|e| ApiError::validation(format!("Invalid form field: {e}")))?;
                form.delete_image = value == "1" || value.eq_ignore_ascii_case("true");
            }
            Some(name) if name == image_field => {
                let content_type = field.content_type().map(ToString::to_string);
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::validation(format!("Upload failed: {e}")))?;
                // an empty part means the form had no file selected
                if !bytes.is_empty() {
                    form.image = Some((content_type, bytes.to_vec()));
                }
            }
            _ => {}
        }
    }

    Ok(form)
}

fn validated_image(
    upload: Option<(Option<String>, Vec<u8>)>,
) -> Result<Option<NewImage>, ApiError> {
    match upload {
        Some((content_type, bytes)) => {
            let extension =
                validation::validate_image_upload(content_type.as_deref(), bytes.len())?;
            Ok(Some(NewImage { bytes, extension }))
        }
        None => Ok(None),
    }
}

/// GET /posts?page&per_page&mode
pub async fn list_posts(
    State(state): State<Arc<AppState>>,
    MaybeUser(identity): MaybeUser,
    Query(query): Query<ListQuery>,
) -> Result<Json<ApiResponse<PostListResponse>>, ApiError> {
    let page = query.page.unwrap_or(1).max(1);
    let per_page = query
        .per_page
        .unwrap_or(DEFAULT_PER_PAGE)
        .clamp(1, MAX_PER_PAGE);

    let author = if query.mode.as_deref() == Some("mine") {
        let identity = identity.ok_or_else(|| ApiError::denied(AccessDenied::NotLoggedIn))?;
        Some(identity.user_id)
    } else {
        None
    };

    let result = state.posts().list(page, per_page, author).await?;

    Ok(Json(ApiResponse::success(PostListResponse {
        posts: result.posts.into_iter().map(PostDto::from).collect(),
        pagination: result.page,
    })))
}

/// GET /posts/{id}
pub async fn get_post(
    State(state): State<Arc<AppState>>,
    Path(post_id): Path<i32>,
) -> Result<Json<ApiResponse<PostDto>>, ApiError> {
    let post = state.posts().get(post_id).await?;

    Ok(Json(ApiResponse::success(post.into())))
}

/// POST /posts (multipart: title, content, optional image)
pub async fn create_post(
    State(state): State<Arc<AppState>>,
    CurrentUser(identity): CurrentUser,
    multipart: Multipart,
) -> Result<Json<ApiResponse<PostDto>>, ApiError> {
    let form = read_post_form(multipart, "image").await?;

    let title = validation::validate_non_empty(&form.title, "Title and content cannot be empty.")?;
    let content =
        validation::validate_non_empty(&form.content, "Title and content cannot be empty.")?;
    let image = validated_image(form.image)?;

    let post = state
        .posts()
        .create(&identity, title, content, image)
        .await?;

    Ok(Json(ApiResponse::success(post.into())))
}

/// PUT /posts/{id} (multipart: title, content, optional new_image or
/// delete_image flag)
pub async fn edit_post(
    State(state): State<Arc<AppState>>,
    CurrentUser(identity): CurrentUser,
    Path(post_id): Path<i32>,
    multipart: Multipart,
) -> Result<Json<ApiResponse<PostDto>>, ApiError> {
    let form = read_post_form(multipart, "new_image").await?;

    let title = validation::validate_non_empty(&form.title, "Title and content cannot be empty.")?;
    let content =
        validation::validate_non_empty(&form.content, "Title and content cannot be empty.")?;

    let action = match validated_image(form.image)? {
        Some(image) => ImageAction::Replace(image),
        None if form.delete_image => ImageAction::Remove,
        None => ImageAction::Keep,
    };

    let post = state
        .posts()
        .edit(&identity, post_id, title, content, action)
        .await?;

    Ok(Json(ApiResponse::success(post.into())))
}

/// DELETE /posts/{id}
pub async fn delete_post(
    State(state): State<Arc<AppState>>,
    CurrentUser(identity): CurrentUser,
    Path(post_id): Path<i32>,
) -> Result<Json<ApiResponse<MessageResponse>>, ApiError> {
    state.posts().delete(&identity, post_id).await?;

    Ok(Json(ApiResponse::success(MessageResponse::new(
        "Post successfully deleted.",
    ))))
}
