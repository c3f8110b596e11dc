use anyhow::Result;
use sea_orm::{ConnectOptions, ConnectionTrait, Database, DatabaseConnection, Statement};
use std::path::Path;
use std::time::Duration;
use tracing::info;

use crate::config::SecurityConfig;
use crate::domain::Role;
use crate::entities::{comments, posts};

pub mod migrator;
pub mod repositories;

pub use repositories::comment::{CommentPage, CommentRow};
pub use repositories::post::{PostPage, PostRow};
pub use repositories::user::{User, UserOverview, UserProfile};

#[derive(Clone)]
pub struct Store {
    pub conn: DatabaseConnection,
}

impl Store {
    pub async fn new(db_url: &str) -> Result<Self> {
        Self::with_pool_options(db_url, 5, 1).await
    }

    pub async fn with_pool_options(
        db_url: &str,
        max_connections: u32,
        min_connections: u32,
    ) -> Result<Self> {
        use sea_orm_migration::MigratorTrait;

        // A pooled in-memory sqlite hands every connection its own database;
        // collapse the pool so all queries share the migrated one.
        let (max_connections, min_connections) = if db_url.contains(":memory:") {
            (1, 1)
        } else {
            let path_str = db_url.trim_start_matches("sqlite:");
            if let Some(parent) = Path::new(path_str).parent() {
                tokio::fs::create_dir_all(parent).await.ok();
            }
            if !Path::new(path_str).exists() {
                std::fs::File::create(path_str)?;
            }
            (max_connections, min_connections)
        };

        let mut opt = ConnectOptions::new(db_url.to_string());
        opt.max_connections(max_connections)
            .min_connections(min_connections)
            .connect_timeout(Duration::from_secs(10))
            .acquire_timeout(Duration::from_secs(10))
            .idle_timeout(Duration::from_secs(300))
            .max_lifetime(Duration::from_secs(600))
            .sqlx_logging(false);

        let conn = Database::connect(opt).await?;

        migrator::Migrator::up(&conn, None).await?;

        info!(
            "Database connected & migrations applied (pool: {}-{})",
            min_connections, max_connections
        );

        Ok(Self { conn })
    }

    pub async fn ping(&self) -> Result<()> {
        let backend = self.conn.get_database_backend();
        self.conn
            .query_one(Statement::from_string(backend, "SELECT 1".to_string()))
            .await?;
        Ok(())
    }

    fn user_repo(&self) -> repositories::user::UserRepository {
        repositories::user::UserRepository::new(self.conn.clone())
    }

    fn post_repo(&self) -> repositories::post::PostRepository {
        repositories::post::PostRepository::new(self.conn.clone())
    }

    fn comment_repo(&self) -> repositories::comment::CommentRepository {
        repositories::comment::CommentRepository::new(self.conn.clone())
    }

    // --- users ---

    pub async fn get_user_by_id(&self, id: i32) -> Result<Option<User>> {
        self.user_repo().get_by_id(id).await
    }

    pub async fn get_user_by_username(&self, username: &str) -> Result<Option<User>> {
        self.user_repo().get_by_username(username).await
    }

    pub async fn get_user_role(&self, id: i32) -> Result<Option<Role>> {
        self.user_repo().get_role(id).await
    }

    pub async fn register_user(
        &self,
        username: &str,
        email: &str,
        password: &str,
        security: &SecurityConfig,
    ) -> Result<Option<User>> {
        self.user_repo()
            .register(username, email, password, security)
            .await
    }

    pub async fn verify_user_password(&self, username: &str, password: &str) -> Result<bool> {
        self.user_repo().verify_password(username, password).await
    }

    pub async fn verify_user_password_by_id(&self, user_id: i32, password: &str) -> Result<bool> {
        self.user_repo()
            .verify_password_by_id(user_id, password)
            .await
    }

    pub async fn update_user_profile(
        &self,
        user_id: i32,
        username: &str,
        email: &str,
    ) -> Result<Option<User>> {
        self.user_repo()
            .update_profile(user_id, username, email)
            .await
    }

    pub async fn update_user_password(
        &self,
        user_id: i32,
        new_password: &str,
        security: &SecurityConfig,
    ) -> Result<()> {
        self.user_repo()
            .update_password(user_id, new_password, security)
            .await
    }

    pub async fn set_user_avatar(
        &self,
        user_id: i32,
        avatar: Option<String>,
    ) -> Result<Option<String>> {
        self.user_repo().set_avatar(user_id, avatar).await
    }

    pub async fn get_user_profile(&self, user_id: i32) -> Result<Option<UserProfile>> {
        self.user_repo().get_profile(user_id).await
    }

    pub async fn list_users_with_post_counts(&self) -> Result<Vec<UserOverview>> {
        self.user_repo().list_with_post_counts().await
    }

    pub async fn set_user_role(&self, user_id: i32, role: Role) -> Result<()> {
        self.user_repo().set_role(user_id, role).await
    }

    pub async fn delete_user(&self, user_id: i32) -> Result<Option<(User, Vec<String>)>> {
        self.user_repo().delete(user_id).await
    }

    // --- posts ---

    pub async fn post_page(
        &self,
        page: u64,
        per_page: u64,
        author: Option<i32>,
    ) -> Result<PostPage> {
        self.post_repo().page(page, per_page, author).await
    }

    pub async fn get_post(&self, id: i32) -> Result<Option<PostRow>> {
        self.post_repo().get(id).await
    }

    pub async fn get_post_model(&self, id: i32) -> Result<Option<posts::Model>> {
        self.post_repo().get_model(id).await
    }

    pub async fn create_post(
        &self,
        user_id: i32,
        title: &str,
        content: &str,
        image: Option<String>,
    ) -> Result<posts::Model> {
        self.post_repo().create(user_id, title, content, image).await
    }

    pub async fn update_post(
        &self,
        post: posts::Model,
        title: &str,
        content: &str,
        image: Option<String>,
    ) -> Result<posts::Model> {
        self.post_repo().update(post, title, content, image).await
    }

    pub async fn delete_post(&self, post: posts::Model) -> Result<()> {
        self.post_repo().delete(post).await
    }

    // --- comments ---

    pub async fn comment_page(
        &self,
        post_id: i32,
        page: u64,
        per_page: u64,
    ) -> Result<CommentPage> {
        self.comment_repo().page(post_id, page, per_page).await
    }

    pub async fn get_comment(&self, id: i32) -> Result<Option<CommentRow>> {
        self.comment_repo().get(id).await
    }

    pub async fn get_comment_model(&self, id: i32) -> Result<Option<comments::Model>> {
        self.comment_repo().get_model(id).await
    }

    pub async fn create_comment(
        &self,
        user_id: i32,
        post_id: i32,
        content: &str,
    ) -> Result<comments::Model> {
        self.comment_repo().create(user_id, post_id, content).await
    }

    pub async fn update_comment(
        &self,
        comment: comments::Model,
        content: &str,
    ) -> Result<comments::Model> {
        self.comment_repo().update(comment, content).await
    }

    pub async fn delete_comment(&self, comment: comments::Model) -> Result<()> {
        self.comment_repo().delete(comment).await
    }
}
