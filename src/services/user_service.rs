//! Domain service for accounts: registration, authentication, profile and
//! avatar management, and the admin/owner moderation actions.

use thiserror::Error;

use crate::db::{UserOverview, UserProfile};
use crate::domain::{AccessDenied, Identity};
use crate::services::upload::NewImage;

/// Errors specific to account operations.
#[derive(Debug, Error)]
pub enum UserError {
    #[error("{0}")]
    Validation(String),

    /// Username or email already taken by another account.
    #[error("{0}")]
    Duplicate(String),

    /// Deliberately identical for a wrong password and an unknown username.
    #[error("Invalid username or password.")]
    InvalidCredentials,

    #[error("User not found.")]
    NotFound,

    #[error(transparent)]
    Denied(#[from] AccessDenied),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<sea_orm::DbErr> for UserError {
    fn from(err: sea_orm::DbErr) -> Self {
        Self::Database(err.to_string())
    }
}

impl From<anyhow::Error> for UserError {
    fn from(err: anyhow::Error) -> Self {
        Self::Internal(err.to_string())
    }
}

/// Domain service trait for accounts.
#[async_trait::async_trait]
pub trait UserService: Send + Sync {
    /// Creates an account with the default `user` role.
    ///
    /// # Errors
    ///
    /// Returns [`UserError::Duplicate`] when the username or email is taken.
    async fn register(&self, username: &str, email: &str, password: &str)
    -> Result<(), UserError>;

    /// Verifies credentials and returns the identity to store in the session.
    ///
    /// # Errors
    ///
    /// Returns [`UserError::InvalidCredentials`] on any failed login.
    async fn login(&self, username: &str, password: &str) -> Result<Identity, UserError>;

    /// The caller's own profile, including their post count.
    async fn profile(&self, user_id: i32) -> Result<UserProfile, UserError>;

    /// Updates username and email; returns the refreshed identity so the
    /// caller can update the session's cached username.
    async fn update_profile(
        &self,
        identity: &Identity,
        username: &str,
        email: &str,
    ) -> Result<Identity, UserError>;

    /// Changes the password after verifying the current one.
    async fn update_password(
        &self,
        user_id: i32,
        current_password: &str,
        new_password: &str,
    ) -> Result<(), UserError>;

    /// Stores a new avatar and returns its filename. The replaced file is
    /// removed; a file written for a failed update is removed as well.
    async fn update_avatar(&self, user_id: i32, image: NewImage) -> Result<String, UserError>;

    /// Clears the avatar reference and removes the file.
    async fn remove_avatar(&self, user_id: i32) -> Result<(), UserError>;

    /// Admin listing of all users with per-user post counts.
    async fn list_users(&self, actor: &Identity) -> Result<Vec<UserOverview>, UserError>;

    /// Promotes the target to admin, subject to the role matrix.
    async fn promote(&self, actor: &Identity, target_id: i32) -> Result<(), UserError>;

    /// Demotes the target to a regular user; owner only.
    async fn demote(&self, actor: &Identity, target_id: i32) -> Result<(), UserError>;

    /// Deletes the target account together with its content and files.
    async fn delete_user(&self, actor: &Identity, target_id: i32) -> Result<(), UserError>;
}
