//! Domain service for posts: paginated listing and CRUD with ownership
//! checks and image-file lifecycle.

use thiserror::Error;

use crate::db::{PostPage, PostRow};
use crate::domain::{AccessDenied, Identity};
use crate::services::upload::NewImage;

/// Errors specific to post operations.
#[derive(Debug, Error)]
pub enum PostError {
    #[error("{0}")]
    Validation(String),

    #[error("Post not found.")]
    NotFound,

    #[error(transparent)]
    Denied(#[from] AccessDenied),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<sea_orm::DbErr> for PostError {
    fn from(err: sea_orm::DbErr) -> Self {
        Self::Database(err.to_string())
    }
}

impl From<anyhow::Error> for PostError {
    fn from(err: anyhow::Error) -> Self {
        Self::Internal(err.to_string())
    }
}

/// What to do with a post's image on edit.
#[derive(Debug)]
pub enum ImageAction {
    Keep,
    Remove,
    Replace(NewImage),
}

/// Domain service trait for posts.
#[async_trait::async_trait]
pub trait PostService: Send + Sync {
    /// One page of posts, newest activity first; `author` filters to a
    /// single user's posts.
    async fn list(&self, page: u64, per_page: u64, author: Option<i32>)
    -> Result<PostPage, PostError>;

    async fn get(&self, id: i32) -> Result<PostRow, PostError>;

    /// Creates a post for the author, persisting the image first and
    /// removing it again if the row cannot be inserted.
    async fn create(
        &self,
        author: &Identity,
        title: &str,
        content: &str,
        image: Option<NewImage>,
    ) -> Result<PostRow, PostError>;

    /// Edits a post after an ownership check against the stored row; a
    /// replaced or removed image file is deleted once the row update is
    /// through.
    async fn edit(
        &self,
        actor: &Identity,
        post_id: i32,
        title: &str,
        content: &str,
        image: ImageAction,
    ) -> Result<PostRow, PostError>;

    /// Deletes a post and its image file after an ownership check. A failure
    /// to remove the file does not block the deletion.
    async fn delete(&self, actor: &Identity, post_id: i32) -> Result<(), PostError>;
}
