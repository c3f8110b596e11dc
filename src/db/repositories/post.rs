use anyhow::{Context, Result};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, FromQueryResult, JoinType,
    ModelTrait, Order, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, RelationTrait, Set,
};

use crate::domain::Page;
use crate::entities::{posts, users};
use crate::entities::prelude::*;

/// A post joined with its author's username.
#[derive(Debug, Clone, FromQueryResult)]
pub struct PostRow {
    pub id: i32,
    pub user_id: i32,
    pub username: String,
    pub title: String,
    pub content: String,
    pub image: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// One page of posts plus the navigation metadata.
#[derive(Debug, Clone)]
pub struct PostPage {
    pub posts: Vec<PostRow>,
    pub page: Page,
}

pub struct PostRepository {
    conn: DatabaseConnection,
}

impl PostRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    fn with_author() -> sea_orm::Select<Posts> {
        Posts::find()
            .column_as(users::Column::Username, "username")
            .join(JoinType::InnerJoin, posts::Relation::Users.def())
    }

    /// Paginated listing, newest activity first (the later of creation and
    /// update time). `author` restricts the listing to one user's posts.
    pub async fn page(
        &self,
        page: u64,
        per_page: u64,
        author: Option<i32>,
    ) -> Result<PostPage> {
        let per_page = per_page.max(1);

        let mut query = Self::with_author().order_by(
            Expr::cust(r#"MAX("posts"."created_at", "posts"."updated_at")"#),
            Order::Desc,
        );

        if let Some(user_id) = author {
            query = query.filter(posts::Column::UserId.eq(user_id));
        }

        let paginator = query.into_model::<PostRow>().paginate(&self.conn, per_page);
        let total = paginator
            .num_items()
            .await
            .context("Failed to count posts")?;

        let window = Page::compute(total, page, per_page);
        let posts = paginator
            .fetch_page(window.index())
            .await
            .context("Failed to fetch post page")?;

        Ok(PostPage {
            posts,
            page: window,
        })
    }

    pub async fn get(&self, id: i32) -> Result<Option<PostRow>> {
        Self::with_author()
            .filter(posts::Column::Id.eq(id))
            .into_model::<PostRow>()
            .one(&self.conn)
            .await
            .context("Failed to query post")
    }

    /// Raw row, used to read the owner id that a mutation will be checked
    /// and applied against.
    pub async fn get_model(&self, id: i32) -> Result<Option<posts::Model>> {
        Posts::find_by_id(id)
            .one(&self.conn)
            .await
            .context("Failed to query post")
    }

    pub async fn create(
        &self,
        user_id: i32,
        title: &str,
        content: &str,
        image: Option<String>,
    ) -> Result<posts::Model> {
        let now = chrono::Utc::now().to_rfc3339();

        let active = posts::ActiveModel {
            user_id: Set(user_id),
            title: Set(title.to_string()),
            content: Set(content.to_string()),
            image: Set(image),
            created_at: Set(now.clone()),
            updated_at: Set(now),
            ..Default::default()
        };

        active.insert(&self.conn).await.context("Failed to insert post")
    }

    /// Applies an update to the exact row previously read for the ownership
    /// check, replacing the mutable fields and bumping `updated_at`.
    pub async fn update(
        &self,
        post: posts::Model,
        title: &str,
        content: &str,
        image: Option<String>,
    ) -> Result<posts::Model> {
        let mut active: posts::ActiveModel = post.into();
        active.title = Set(title.to_string());
        active.content = Set(content.to_string());
        active.image = Set(image);
        active.updated_at = Set(chrono::Utc::now().to_rfc3339());

        active.update(&self.conn).await.context("Failed to update post")
    }

    pub async fn delete(&self, post: posts::Model) -> Result<()> {
        post.delete(&self.conn)
            .await
            .context("Failed to delete post")?;
        Ok(())
    }
}
