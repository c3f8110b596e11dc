use axum::{
    Json,
    extract::{Multipart, Path, State},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_sessions::Session;

use super::auth::CurrentUser;
use super::{
    ApiError, ApiResponse, AppState, AvatarUploadResponse, MessageResponse, UserOverviewDto,
    UserProfileDto, validation,
};
use crate::constants::auth::{MIN_PASSWORD_LEN, SESSION_USER_KEY};
use crate::services::NewImage;

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Deserialize)]
pub struct UpdateProfileRequest {
    pub username: String,
    pub email: String,
}

#[derive(Serialize)]
pub struct UpdateProfileResponse {
    pub message: String,
    pub username: String,
}

#[derive(Deserialize)]
pub struct UpdatePasswordRequest {
    pub current_password: String,
    pub new_password: String,
    pub confirm_password: String,
}

// ============================================================================
// Handlers
// ============================================================================

/// GET /users/profile
pub async fn get_profile(
    State(state): State<Arc<AppState>>,
    CurrentUser(identity): CurrentUser,
) -> Result<Json<ApiResponse<UserProfileDto>>, ApiError> {
    let profile = state.users().profile(identity.user_id).await?;

    Ok(Json(ApiResponse::success(profile.into())))
}

/// PUT /users/profile
pub async fn update_profile(
    State(state): State<Arc<AppState>>,
    CurrentUser(identity): CurrentUser,
    session: Session,
    Json(payload): Json<UpdateProfileRequest>,
) -> Result<Json<ApiResponse<UpdateProfileResponse>>, ApiError> {
    let username = validation::validate_non_empty(&payload.username, "Username cannot be empty.")?;
    validation::validate_non_empty(&payload.email, "Email cannot be empty.")?;
    let email = validation::validate_email(&payload.email)?;

    let refreshed = state
        .users()
        .update_profile(&identity, username, email)
        .await?;

    // Keep the session's cached username in sync with the change.
    session
        .insert(SESSION_USER_KEY, &refreshed)
        .await
        .map_err(|e| ApiError::internal(format!("Session error: {e}")))?;

    Ok(Json(ApiResponse::success(UpdateProfileResponse {
        message: "Profile updated successfully.".to_string(),
        username: refreshed.username,
    })))
}

/// PUT /users/password
pub async fn update_password(
    State(state): State<Arc<AppState>>,
    CurrentUser(identity): CurrentUser,
    Json(payload): Json<UpdatePasswordRequest>,
) -> Result<Json<ApiResponse<MessageResponse>>, ApiError> {
    validation::validate_non_empty(
        &payload.current_password,
        "Current password cannot be empty.",
    )?;
    validation::validate_non_empty(&payload.new_password, "New password cannot be empty.")?;
    validation::validate_non_empty(
        &payload.confirm_password,
        "Please confirm your new password.",
    )?;
    validation::validate_min_length(
        &payload.new_password,
        MIN_PASSWORD_LEN,
        "New password must contain at least 6 characters.",
    )?;
    if payload.new_password == payload.current_password {
        return Err(ApiError::validation(
            "New password must be different from the current password.",
        ));
    }
    validation::validate_match(
        &payload.new_password,
        &payload.confirm_password,
        "New passwords do not match.",
    )?;

    state
        .users()
        .update_password(
            identity.user_id,
            &payload.current_password,
            &payload.new_password,
        )
        .await?;

    Ok(Json(ApiResponse::success(MessageResponse::new(
        "Password updated successfully.",
    ))))
}

/// POST /users/avatar (multipart)
pub async fn upload_avatar(
    State(state): State<Arc<AppState>>,
    CurrentUser(identity): CurrentUser,
    mut multipart: Multipart,
) -> Result<Json<ApiResponse<AvatarUploadResponse>>, ApiError> {
    let mut upload: Option<(Option<String>, Vec<u8>)> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::validation(format!("Upload failed: {e}")))?
    {
        if field.name() == Some("avatar") {
            let content_type = field.content_type().map(ToString::to_string);
            let bytes = field
                .bytes()
                .await
                .map_err(|e| ApiError::validation(format!("Upload failed: {e}")))?;
            upload = Some((content_type, bytes.to_vec()));
        }
    }

    let (content_type, bytes) =
        upload.ok_or_else(|| ApiError::validation("Upload failed or no file."))?;

    let extension = validation::validate_image_upload(content_type.as_deref(), bytes.len())?;

    let filename = state
        .users()
        .update_avatar(identity.user_id, NewImage { bytes, extension })
        .await?;

    Ok(Json(ApiResponse::success(AvatarUploadResponse {
        message: "Avatar uploaded.".to_string(),
        filename,
    })))
}

/// DELETE /users/avatar
pub async fn remove_avatar(
    State(state): State<Arc<AppState>>,
    CurrentUser(identity): CurrentUser,
) -> Result<Json<ApiResponse<MessageResponse>>, ApiError> {
    state.users().remove_avatar(identity.user_id).await?;

    Ok(Json(ApiResponse::success(MessageResponse::new(
        "Avatar removed.",
    ))))
}

/// GET /users (admin only)
pub async fn list_users(
    State(state): State<Arc<AppState>>,
    CurrentUser(identity): CurrentUser,
) -> Result<Json<ApiResponse<Vec<UserOverviewDto>>>, ApiError> {
    let users = state.users().list_users(&identity).await?;

    Ok(Json(ApiResponse::success(
        users.into_iter().map(UserOverviewDto::from).collect(),
    )))
}

/// POST /users/{id}/promote
pub async fn promote_user(
    State(state): State<Arc<AppState>>,
    CurrentUser(identity): CurrentUser,
    Path(user_id): Path<i32>,
) -> Result<Json<ApiResponse<MessageResponse>>, ApiError> {
    state.users().promote(&identity, user_id).await?;

    Ok(Json(ApiResponse::success(MessageResponse::new(
        "User promoted to admin.",
    ))))
}

/// POST /users/{id}/demote
pub async fn demote_user(
    State(state): State<Arc<AppState>>,
    CurrentUser(identity): CurrentUser,
    Path(user_id): Path<i32>,
) -> Result<Json<ApiResponse<MessageResponse>>, ApiError> {
    state.users().demote(&identity, user_id).await?;

    Ok(Json(ApiResponse::success(MessageResponse::new(
        "User demoted to regular user.",
    ))))
}

/// DELETE /users/{id}
pub async fn delete_user(
    State(state): State<Arc<AppState>>,
    CurrentUser(identity): CurrentUser,
    Path(user_id): Path<i32>,
) -> Result<Json<ApiResponse<MessageResponse>>, ApiError> {
    state.users().delete_user(&identity, user_id).await?;

    Ok(Json(ApiResponse::success(MessageResponse::new(
        "User deleted.",
    ))))
}
