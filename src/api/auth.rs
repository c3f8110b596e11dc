use axum::{
    Json,
    extract::{FromRequestParts, State},
    http::{StatusCode, request::Parts},
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_sessions::Session;

use super::{ApiError, ApiResponse, AppState, IdentityDto, MessageResponse, SessionDto, validation};
use crate::constants::auth::{MIN_PASSWORD_LEN, SESSION_USER_KEY};
use crate::domain::{AccessDenied, Identity};

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
    pub confirm_password: String,
}

#[derive(Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Serialize)]
pub struct LoginResponse {
    pub message: String,
    pub user: IdentityDto,
}

// ============================================================================
// Extractors
// ============================================================================

/// The session identity, if any. Populated once per request from the session
/// store and passed into handlers explicitly.
pub struct MaybeUser(pub Option<Identity>);

impl<S> FromRequestParts<S> for MaybeUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let session = Session::from_request_parts(parts, state)
            .await
            .map_err(|(_, message)| ApiError::internal(format!("Session error: {message}")))?;

        let identity = session
            .get::<Identity>(SESSION_USER_KEY)
            .await
            .map_err(|e| ApiError::internal(format!("Session error: {e}")))?;

        Ok(Self(identity))
    }
}

/// The session identity; rejects the request with 401 when not logged in.
pub struct CurrentUser(pub Identity);

impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let MaybeUser(identity) = MaybeUser::from_request_parts(parts, state).await?;

        identity
            .map(Self)
            .ok_or_else(|| ApiError::denied(AccessDenied::NotLoggedIn))
    }
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /auth/register
pub async fn register(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<RegisterRequest>,
) -> Result<Json<ApiResponse<MessageResponse>>, ApiError> {
    let username = payload.username.trim();
    let email = payload.email.trim();
    let password = payload.password.trim();
    let confirm = payload.confirm_password.trim();

    validation::validate_min_length(
        password,
        MIN_PASSWORD_LEN,
        "The password must contain at least 6 characters.",
    )?;
    let email = validation::validate_email(email)?;
    validation::validate_match(password, confirm, "Passwords do not match.")?;
    let username = validation::validate_non_empty(username, "Username cannot be empty.")?;

    state.users().register(username, email, password).await?;

    Ok(Json(ApiResponse::success(MessageResponse::new(
        "Registration successful. You can now log in.",
    ))))
}

/// POST /auth/login
pub async fn login(
    State(state): State<Arc<AppState>>,
    session: Session,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<ApiResponse<LoginResponse>>, ApiError> {
    let username = validation::validate_non_empty(&payload.username, "Username cannot be empty.")?;
    let password = validation::validate_non_empty(&payload.password, "Password cannot be empty.")?;

    let identity = state.users().login(username, password).await?;

    // Fresh session id for the authenticated session, so a pre-login id
    // cannot be fixed onto it.
    session
        .cycle_id()
        .await
        .map_err(|e| ApiError::internal(format!("Session error: {e}")))?;
    session
        .insert(SESSION_USER_KEY, &identity)
        .await
        .map_err(|e| ApiError::internal(format!("Failed to create session: {e}")))?;

    tracing::info!(username = %identity.username, "User logged in");

    Ok(Json(ApiResponse::success(LoginResponse {
        message: "Login successful.".to_string(),
        user: IdentityDto::from(&identity),
    })))
}

/// POST /auth/logout
pub async fn logout(
    CurrentUser(identity): CurrentUser,
    session: Session,
) -> Result<Json<ApiResponse<MessageResponse>>, ApiError> {
    session
        .flush()
        .await
        .map_err(|e| ApiError::internal(format!("Session error: {e}")))?;

    tracing::info!(username = %identity.username, "User logged out");

    Ok(Json(ApiResponse::success(MessageResponse::new(
        "Logged out successfully.",
    ))))
}

/// GET /auth/session
pub async fn check_session(MaybeUser(identity): MaybeUser) -> Response {
    match identity {
        Some(identity) => Json(ApiResponse::success(SessionDto {
            logged_in: true,
            user: Some(IdentityDto::from(&identity)),
        }))
        .into_response(),
        None => (
            StatusCode::UNAUTHORIZED,
            Json(ApiResponse::<SessionDto>::error("Not logged in.")),
        )
            .into_response(),
    }
}
