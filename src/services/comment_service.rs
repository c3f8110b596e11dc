//! Domain service for comments, scoped to a single post.

use thiserror::Error;

use crate::db::{CommentPage, CommentRow};
use crate::domain::{AccessDenied, Identity};

/// Errors specific to comment operations.
#[derive(Debug, Error)]
pub enum CommentError {
    #[error("{0}")]
    Validation(String),

    #[error("Comment not found.")]
    NotFound,

    #[error("Post not found.")]
    PostNotFound,

    #[error(transparent)]
    Denied(#[from] AccessDenied),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<sea_orm::DbErr> for CommentError {
    fn from(err: sea_orm::DbErr) -> Self {
        Self::Database(err.to_string())
    }
}

impl From<anyhow::Error> for CommentError {
    fn from(err: anyhow::Error) -> Self {
        Self::Internal(err.to_string())
    }
}

/// Domain service trait for comments.
#[async_trait::async_trait]
pub trait CommentService: Send + Sync {
    /// One page of a post's comments, newest first.
    async fn list(
        &self,
        post_id: i32,
        page: u64,
        per_page: u64,
    ) -> Result<CommentPage, CommentError>;

    /// Creates a comment on an existing post.
    async fn create(
        &self,
        author: &Identity,
        post_id: i32,
        content: &str,
    ) -> Result<CommentRow, CommentError>;

    /// Edits a comment after an ownership check against the stored row.
    async fn edit(
        &self,
        actor: &Identity,
        comment_id: i32,
        content: &str,
    ) -> Result<CommentRow, CommentError>;

    /// Deletes a comment after an ownership check.
    async fn delete(&self, actor: &Identity, comment_id: i32) -> Result<(), CommentError>;
}
