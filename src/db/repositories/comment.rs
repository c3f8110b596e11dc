use anyhow::{Context, Result};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, FromQueryResult, JoinType,
    ModelTrait, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, RelationTrait, Set,
};

use crate::domain::Page;
use crate::entities::{comments, users};
use crate::entities::prelude::*;

/// A comment joined with its author's username.
#[derive(Debug, Clone, FromQueryResult)]
pub struct CommentRow {
    pub id: i32,
    pub user_id: i32,
    pub username: String,
    pub post_id: i32,
    pub content: String,
    pub created_at: String,
    pub updated_at: String,
}

/// One page of a post's comments plus the navigation metadata.
#[derive(Debug, Clone)]
pub struct CommentPage {
    pub comments: Vec<CommentRow>,
    pub page: Page,
}

pub struct CommentRepository {
    conn: DatabaseConnection,
}

impl CommentRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    fn with_author() -> sea_orm::Select<Comments> {
        Comments::find()
            .column_as(users::Column::Username, "username")
            .join(JoinType::InnerJoin, comments::Relation::Users.def())
    }

    /// Paginated comments of one post, newest first.
    pub async fn page(&self, post_id: i32, page: u64, per_page: u64) -> Result<CommentPage> {
        let per_page = per_page.max(1);

        let paginator = Self::with_author()
            .filter(comments::Column::PostId.eq(post_id))
            .order_by_desc(comments::Column::CreatedAt)
            .into_model::<CommentRow>()
            .paginate(&self.conn, per_page);

        let total = paginator
            .num_items()
            .await
            .context("Failed to count comments")?;

        let window = Page::compute(total, page, per_page);
        let comments = paginator
            .fetch_page(window.index())
            .await
            .context("Failed to fetch comment page")?;

        Ok(CommentPage {
            comments,
            page: window,
        })
    }

    pub async fn get(&self, id: i32) -> Result<Option<CommentRow>> {
        Self::with_author()
            .filter(comments::Column::Id.eq(id))
            .into_model::<CommentRow>()
            .one(&self.conn)
            .await
            .context("Failed to query comment")
    }

    /// Raw row, used to read the owner id that a mutation will be checked
    /// and applied against.
    pub async fn get_model(&self, id: i32) -> Result<Option<comments::Model>> {
        Comments::find_by_id(id)
            .one(&self.conn)
            .await
            .context("Failed to query comment")
    }

    pub async fn create(
        &self,
        user_id: i32,
        post_id: i32,
        content: &str,
    ) -> Result<comments::Model> {
        let now = chrono::Utc::now().to_rfc3339();

        let active = comments::ActiveModel {
            user_id: Set(user_id),
            post_id: Set(post_id),
            content: Set(content.to_string()),
            created_at: Set(now.clone()),
            updated_at: Set(now),
            ..Default::default()
        };

        active
            .insert(&self.conn)
            .await
            .context("Failed to insert comment")
    }

    /// Applies an update to the exact row previously read for the ownership
    /// check.
    pub async fn update(&self, comment: comments::Model, content: &str) -> Result<comments::Model> {
        let mut active: comments::ActiveModel = comment.into();
        active.content = Set(content.to_string());
        active.updated_at = Set(chrono::Utc::now().to_rfc3339());

        active
            .update(&self.conn)
            .await
            .context("Failed to update comment")
    }

    pub async fn delete(&self, comment: comments::Model) -> Result<()> {
        comment
            .delete(&self.conn)
            .await
            .context("Failed to delete comment")?;
        Ok(())
    }
}
