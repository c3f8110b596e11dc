//! `SeaORM` implementation of the `CommentService` trait.

use async_trait::async_trait;

use crate::db::{CommentPage, CommentRow, Store};
use crate::domain::{Identity, policy};
use crate::services::comment_service::{CommentError, CommentService};

pub struct SeaOrmCommentService {
    store: Store,
}

impl SeaOrmCommentService {
    #[must_use]
    pub const fn new(store: Store) -> Self {
        Self { store }
    }
}

fn validate_content(content: &str) -> Result<(), CommentError> {
    if content.trim().is_empty() {
        return Err(CommentError::Validation(
            "The comment cannot be empty.".to_string(),
        ));
    }
    Ok(())
}

#[async_trait]
impl CommentService for SeaOrmCommentService {
    async fn list(
        &self,
        post_id: i32,
        page: u64,
        per_page: u64,
    ) -> Result<CommentPage, CommentError> {
        Ok(self.store.comment_page(post_id, page, per_page).await?)
    }

    async fn create(
        &self,
        author: &Identity,
        post_id: i32,
        content: &str,
    ) -> Result<CommentRow, CommentError> {
        validate_content(content)?;

        if self.store.get_post_model(post_id).await?.is_none() {
            return Err(CommentError::PostNotFound);
        }

        let created = self
            .store
            .create_comment(author.user_id, post_id, content)
            .await?;

        tracing::info!(comment_id = created.id, post_id, author = %author.username, "Comment created");

        self.store
            .get_comment(created.id)
            .await?
            .ok_or(CommentError::NotFound)
    }

    async fn edit(
        &self,
        actor: &Identity,
        comment_id: i32,
        content: &str,
    ) -> Result<CommentRow, CommentError> {
        let comment = self
            .store
            .get_comment_model(comment_id)
            .await?
            .ok_or(CommentError::NotFound)?;

        policy::require_owner_or_admin(actor, comment.user_id)?;
        validate_content(content)?;

        let updated = self.store.update_comment(comment, content).await?;

        self.store
            .get_comment(updated.id)
            .await?
            .ok_or(CommentError::NotFound)
    }

    async fn delete(&self, actor: &Identity, comment_id: i32) -> Result<(), CommentError> {
        let comment = self
            .store
            .get_comment_model(comment_id)
            .await?
            .ok_or(CommentError::NotFound)?;

        policy::require_owner_or_admin(actor, comment.user_id)?;

        self.store.delete_comment(comment).await?;

        tracing::info!(comment_id, actor = %actor.username, "Comment deleted");
        Ok(())
    }
}
