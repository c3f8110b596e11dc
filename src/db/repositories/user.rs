use anyhow::{Context, Result};
use argon2::{
    Algorithm, Argon2, Params, Version,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, EntityTrait, FromQueryResult,
    JoinType, ModelTrait, QueryFilter, QueryOrder, QuerySelect, RelationTrait, Set, SqlErr,
};
use tokio::task;

use crate::config::SecurityConfig;
use crate::domain::Role;
use crate::entities::{posts, prelude::*, users};

/// User data returned from the repository (without the password hash).
#[derive(Debug, Clone)]
pub struct User {
    pub id: i32,
    pub username: String,
    pub email: String,
    pub role: Role,
    pub avatar: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl From<users::Model> for User {
    fn from(model: users::Model) -> Self {
        Self {
            id: model.id,
            username: model.username,
            email: model.email,
            role: Role::from_db(&model.role),
            avatar: model.avatar,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}

/// A user's own profile, including how many posts they have written.
#[derive(Debug, Clone)]
pub struct UserProfile {
    pub id: i32,
    pub username: String,
    pub email: String,
    pub role: Role,
    pub avatar: Option<String>,
    pub created_at: String,
    pub post_count: i64,
}

/// One row of the admin user listing.
#[derive(Debug, Clone)]
pub struct UserOverview {
    pub id: i32,
    pub username: String,
    pub email: String,
    pub role: Role,
    pub created_at: String,
    pub post_count: i64,
}

#[derive(FromQueryResult)]
struct ProfileRow {
    id: i32,
    username: String,
    email: String,
    role: String,
    avatar: Option<String>,
    created_at: String,
    post_count: i64,
}

#[derive(FromQueryResult)]
struct OverviewRow {
    id: i32,
    username: String,
    email: String,
    role: String,
    created_at: String,
    post_count: i64,
}

pub struct UserRepository {
    conn: DatabaseConnection,
}

impl UserRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    pub async fn get_by_id(&self, id: i32) -> Result<Option<User>> {
        let user = Users::find_by_id(id)
            .one(&self.conn)
            .await
            .context("Failed to query user by ID")?;

        Ok(user.map(User::from))
    }

    pub async fn get_by_username(&self, username: &str) -> Result<Option<User>> {
        let user = Users::find()
            .filter(users::Column::Username.eq(username))
            .one(&self.conn)
            .await
            .context("Failed to query user by username")?;

        Ok(user.map(User::from))
    }

    pub async fn get_role(&self, id: i32) -> Result<Option<Role>> {
        let user = Users::find_by_id(id)
            .one(&self.conn)
            .await
            .context("Failed to query user role")?;

        Ok(user.map(|u| Role::from_db(&u.role)))
    }

    /// Creates a new account with the default `user` role.
    ///
    /// Returns `None` when the username or email is already taken. The
    /// pre-insert check gives the fast answer; the unique indexes on both
    /// columns are authoritative, so losing a concurrent race surfaces as
    /// the same `None` instead of a second row.
    pub async fn register(
        &self,
        username: &str,
        email: &str,
        password: &str,
        security: &SecurityConfig,
    ) -> Result<Option<User>> {
        let taken = Users::find()
            .filter(
                Condition::any()
                    .add(users::Column::Username.eq(username))
                    .add(users::Column::Email.eq(email)),
            )
            .one(&self.conn)
            .await
            .context("Failed to check for existing user")?;

        if taken.is_some() {
            return Ok(None);
        }

        let password_hash = hash_password_blocking(password, security).await?;
        let now = chrono::Utc::now().to_rfc3339();

        let active = users::ActiveModel {
            username: Set(username.to_string()),
            email: Set(email.to_string()),
            password_hash: Set(password_hash),
            role: Set(Role::User.as_str().to_string()),
            avatar: Set(None),
            created_at: Set(now.clone()),
            updated_at: Set(now),
            ..Default::default()
        };

        match active.insert(&self.conn).await {
            Ok(model) => Ok(Some(User::from(model))),
            Err(err) if is_unique_violation(&err) => Ok(None),
            Err(err) => Err(err).context("Failed to insert user"),
        }
    }

    /// Verify a password for a username.
    ///
    /// Returns `false` both for a wrong password and for an unknown
    /// username, so callers cannot distinguish the two.
    pub async fn verify_password(&self, username: &str, password: &str) -> Result<bool> {
        let user = Users::find()
            .filter(users::Column::Username.eq(username))
            .one(&self.conn)
            .await
            .context("Failed to query user for password verification")?;

        let Some(user) = user else {
            return Ok(false);
        };

        verify_hash_blocking(password, user.password_hash).await
    }

    pub async fn verify_password_by_id(&self, user_id: i32, password: &str) -> Result<bool> {
        let user = Users::find_by_id(user_id)
            .one(&self.conn)
            .await
            .context("Failed to query user for password verification")?;

        let Some(user) = user else {
            return Ok(false);
        };

        verify_hash_blocking(password, user.password_hash).await
    }

    /// Updates username and email.
    ///
    /// Returns `None` when another account already holds either value; the
    /// unique indexes back the pre-check under concurrent updates.
    pub async fn update_profile(
        &self,
        user_id: i32,
        username: &str,
        email: &str,
    ) -> Result<Option<User>> {
        let collision = Users::find()
            .filter(
                Condition::any()
                    .add(users::Column::Username.eq(username))
                    .add(users::Column::Email.eq(email)),
            )
            .filter(users::Column::Id.ne(user_id))
            .one(&self.conn)
            .await
            .context("Failed to check for profile collision")?;

        if collision.is_some() {
            return Ok(None);
        }

        let user = Users::find_by_id(user_id)
            .one(&self.conn)
            .await
            .context("Failed to query user for profile update")?
            .ok_or_else(|| anyhow::anyhow!("User {user_id} not found"))?;

        let mut active: users::ActiveModel = user.into();
        active.username = Set(username.to_string());
        active.email = Set(email.to_string());
        active.updated_at = Set(chrono::Utc::now().to_rfc3339());

        match active.update(&self.conn).await {
            Ok(model) => Ok(Some(User::from(model))),
            Err(err) if is_unique_violation(&err) => Ok(None),
            Err(err) => Err(err).context("Failed to update profile"),
        }
    }

    /// Update password for a user (hashes the new password).
    pub async fn update_password(
        &self,
        user_id: i32,
        new_password: &str,
        security: &SecurityConfig,
    ) -> Result<()> {
        let user = Users::find_by_id(user_id)
            .one(&self.conn)
            .await
            .context("Failed to query user for password update")?
            .ok_or_else(|| anyhow::anyhow!("User {user_id} not found"))?;

        let new_hash = hash_password_blocking(new_password, security).await?;

        let mut active: users::ActiveModel = user.into();
        active.password_hash = Set(new_hash);
        active.updated_at = Set(chrono::Utc::now().to_rfc3339());
        active.update(&self.conn).await?;

        Ok(())
    }

    /// Stores or clears the avatar filename, returning the replaced one so
    /// the caller can remove the file.
    pub async fn set_avatar(
        &self,
        user_id: i32,
        avatar: Option<String>,
    ) -> Result<Option<String>> {
        let user = Users::find_by_id(user_id)
            .one(&self.conn)
            .await
            .context("Failed to query user for avatar update")?
            .ok_or_else(|| anyhow::anyhow!("User {user_id} not found"))?;

        let previous = user.avatar.clone();

        let mut active: users::ActiveModel = user.into();
        active.avatar = Set(avatar);
        active.updated_at = Set(chrono::Utc::now().to_rfc3339());
        active.update(&self.conn).await?;

        Ok(previous)
    }

    pub async fn get_profile(&self, user_id: i32) -> Result<Option<UserProfile>> {
        let row = Users::find()
            .select_only()
            .columns([
                users::Column::Id,
                users::Column::Username,
                users::Column::Email,
                users::Column::Role,
                users::Column::Avatar,
                users::Column::CreatedAt,
            ])
            .column_as(posts::Column::Id.count(), "post_count")
            .join(JoinType::LeftJoin, users::Relation::Posts.def())
            .filter(users::Column::Id.eq(user_id))
            .group_by(users::Column::Id)
            .into_model::<ProfileRow>()
            .one(&self.conn)
            .await
            .context("Failed to query user profile")?;

        Ok(row.map(|r| UserProfile {
            id: r.id,
            username: r.username,
            email: r.email,
            role: Role::from_db(&r.role),
            avatar: r.avatar,
            created_at: r.created_at,
            post_count: r.post_count,
        }))
    }

    /// All users with their post counts, ordered by id.
    pub async fn list_with_post_counts(&self) -> Result<Vec<UserOverview>> {
        let rows = Users::find()
            .select_only()
            .columns([
                users::Column::Id,
                users::Column::Username,
                users::Column::Email,
                users::Column::Role,
                users::Column::CreatedAt,
            ])
            .column_as(posts::Column::Id.count(), "post_count")
            .join(JoinType::LeftJoin, users::Relation::Posts.def())
            .group_by(users::Column::Id)
            .order_by_asc(users::Column::Id)
            .into_model::<OverviewRow>()
            .all(&self.conn)
            .await
            .context("Failed to list users")?;

        Ok(rows
            .into_iter()
            .map(|r| UserOverview {
                id: r.id,
                username: r.username,
                email: r.email,
                role: Role::from_db(&r.role),
                created_at: r.created_at,
                post_count: r.post_count,
            })
            .collect())
    }

    pub async fn set_role(&self, user_id: i32, role: Role) -> Result<()> {
        let user = Users::find_by_id(user_id)
            .one(&self.conn)
            .await
            .context("Failed to query user for role change")?
            .ok_or_else(|| anyhow::anyhow!("User {user_id} not found"))?;

        let mut active: users::ActiveModel = user.into();
        active.role = Set(role.as_str().to_string());
        active.updated_at = Set(chrono::Utc::now().to_rfc3339());
        active.update(&self.conn).await?;

        Ok(())
    }

    /// Deletes a user. Posts and comments go with the row via the foreign
    /// keys; the filenames of the user's post images are returned together
    /// with the deleted record so the caller can remove the files.
    pub async fn delete(&self, user_id: i32) -> Result<Option<(User, Vec<String>)>> {
        let user = Users::find_by_id(user_id)
            .one(&self.conn)
            .await
            .context("Failed to query user for deletion")?;

        let Some(user) = user else {
            return Ok(None);
        };

        let images: Vec<String> = Posts::find()
            .filter(posts::Column::UserId.eq(user_id))
            .filter(posts::Column::Image.is_not_null())
            .all(&self.conn)
            .await
            .context("Failed to collect post images for deletion")?
            .into_iter()
            .filter_map(|p| p.image)
            .collect();

        let record = User::from(user.clone());
        user.delete(&self.conn)
            .await
            .context("Failed to delete user")?;

        Ok(Some((record, images)))
    }
}

fn is_unique_violation(err: &sea_orm::DbErr) -> bool {
    matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_)))
}

/// Hash a password using Argon2id with the configured params.
pub fn hash_password(password: &str, security: &SecurityConfig) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);

    let params = Params::new(
        security.argon2_memory_cost_kib,
        security.argon2_time_cost,
        security.argon2_parallelism,
        None,
    )
    .map_err(|e| anyhow::anyhow!("Invalid Argon2 params: {e}"))?;
    let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);

    let hash = argon2
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!("Failed to hash password: {e}"))?;

    Ok(hash.to_string())
}

/// Argon2 hashing is CPU-intensive and would stall the async runtime if run
/// inline, so both helpers run it under `spawn_blocking`.
async fn hash_password_blocking(password: &str, security: &SecurityConfig) -> Result<String> {
    let password = password.to_string();
    let security = security.clone();

    task::spawn_blocking(move || hash_password(&password, &security))
        .await
        .context("Password hashing task panicked")?
}

async fn verify_hash_blocking(password: &str, password_hash: String) -> Result<bool> {
    let password = password.to_string();

    task::spawn_blocking(move || {
        let parsed_hash = PasswordHash::new(&password_hash)
            .map_err(|e| anyhow::anyhow!("Invalid password hash format: {e}"))?;

        let argon2 = Argon2::default();
        Ok::<bool, anyhow::Error>(
            argon2
                .verify_password(password.as_bytes(), &parsed_hash)
                .is_ok(),
        )
    })
    .await
    .context("Password verification task panicked")?
}
