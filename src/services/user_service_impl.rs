//! `SeaORM` implementation of the `UserService` trait.

use async_trait::async_trait;

use crate::config::SecurityConfig;
use crate::db::{Store, UserOverview, UserProfile};
use crate::domain::{Identity, Role, policy};
use crate::services::upload::{NewImage, UploadStore};
use crate::services::user_service::{UserError, UserService};

pub struct SeaOrmUserService {
    store: Store,
    security: SecurityConfig,
    avatars: UploadStore,
    post_images: UploadStore,
}

impl SeaOrmUserService {
    #[must_use]
    pub const fn new(
        store: Store,
        security: SecurityConfig,
        avatars: UploadStore,
        post_images: UploadStore,
    ) -> Self {
        Self {
            store,
            security,
            avatars,
            post_images,
        }
    }

    async fn target_role(&self, target_id: i32) -> Result<Role, UserError> {
        self.store
            .get_user_role(target_id)
            .await?
            .ok_or(UserError::NotFound)
    }
}

#[async_trait]
impl UserService for SeaOrmUserService {
    async fn register(
        &self,
        username: &str,
        email: &str,
        password: &str,
    ) -> Result<(), UserError> {
        if username.trim().is_empty() || email.trim().is_empty() || password.trim().is_empty() {
            return Err(UserError::Validation("All fields are required.".to_string()));
        }

        let created = self
            .store
            .register_user(username, email, password, &self.security)
            .await?;

        if created.is_none() {
            return Err(UserError::Duplicate(
                "A user with that username or email already exists.".to_string(),
            ));
        }

        tracing::info!(username, "User registered");
        Ok(())
    }

    async fn login(&self, username: &str, password: &str) -> Result<Identity, UserError> {
        let is_valid = self.store.verify_user_password(username, password).await?;

        if !is_valid {
            return Err(UserError::InvalidCredentials);
        }

        let user = self
            .store
            .get_user_by_username(username)
            .await?
            .ok_or(UserError::InvalidCredentials)?;

        Ok(Identity {
            user_id: user.id,
            username: user.username,
            role: user.role,
        })
    }

    async fn profile(&self, user_id: i32) -> Result<UserProfile, UserError> {
        self.store
            .get_user_profile(user_id)
            .await?
            .ok_or(UserError::NotFound)
    }

    async fn update_profile(
        &self,
        identity: &Identity,
        username: &str,
        email: &str,
    ) -> Result<Identity, UserError> {
        if username.trim().is_empty() || email.trim().is_empty() {
            return Err(UserError::Validation(
                "Username and email cannot be empty.".to_string(),
            ));
        }

        let updated = self
            .store
            .update_user_profile(identity.user_id, username, email)
            .await?
            .ok_or_else(|| {
                UserError::Duplicate("Username or email already exists.".to_string())
            })?;

        Ok(Identity {
            user_id: updated.id,
            username: updated.username,
            role: updated.role,
        })
    }

    async fn update_password(
        &self,
        user_id: i32,
        current_password: &str,
        new_password: &str,
    ) -> Result<(), UserError> {
        if new_password.trim().is_empty() {
            return Err(UserError::Validation(
                "New password cannot be empty.".to_string(),
            ));
        }

        let is_valid = self
            .store
            .verify_user_password_by_id(user_id, current_password)
            .await?;

        if !is_valid {
            return Err(UserError::Validation(
                "Current password is incorrect.".to_string(),
            ));
        }

        self.store
            .update_user_password(user_id, new_password, &self.security)
            .await?;

        tracing::info!(user_id, "Password changed");
        Ok(())
    }

    async fn update_avatar(&self, user_id: i32, image: NewImage) -> Result<String, UserError> {
        let filename = self
            .avatars
            .save("avatar", image.extension, &image.bytes)
            .await?;

        // The file is on disk before the row points at it; roll it back if
        // the row update does not go through.
        let previous = match self.store.set_user_avatar(user_id, Some(filename.clone())).await {
            Ok(previous) => previous,
            Err(err) => {
                self.avatars.remove(&filename).await;
                return Err(err.into());
            }
        };

        if let Some(old) = previous {
            self.avatars.remove(&old).await;
        }

        Ok(filename)
    }

    async fn remove_avatar(&self, user_id: i32) -> Result<(), UserError> {
        let previous = self.store.set_user_avatar(user_id, None).await?;

        if let Some(old) = previous {
            self.avatars.remove(&old).await;
        }

        Ok(())
    }

    async fn list_users(&self, actor: &Identity) -> Result<Vec<UserOverview>, UserError> {
        policy::require_admin(actor)?;

        Ok(self.store.list_users_with_post_counts().await?)
    }

    async fn promote(&self, actor: &Identity, target_id: i32) -> Result<(), UserError> {
        let target_role = self.target_role(target_id).await?;
        policy::check_promote(actor, target_role)?;

        self.store.set_user_role(target_id, Role::Admin).await?;

        tracing::info!(actor = %actor.username, target_id, "User promoted to admin");
        Ok(())
    }

    async fn demote(&self, actor: &Identity, target_id: i32) -> Result<(), UserError> {
        let target_role = self.target_role(target_id).await?;
        policy::check_demote(actor, target_role)?;

        self.store.set_user_role(target_id, Role::User).await?;

        tracing::info!(actor = %actor.username, target_id, "User demoted to regular user");
        Ok(())
    }

    async fn delete_user(&self, actor: &Identity, target_id: i32) -> Result<(), UserError> {
        let target_role = self.target_role(target_id).await?;
        policy::check_delete_user(actor, target_id, target_role)?;

        let Some((deleted, post_images)) = self.store.delete_user(target_id).await? else {
            return Err(UserError::NotFound);
        };

        if let Some(avatar) = deleted.avatar {
            self.avatars.remove(&avatar).await;
        }
        for image in post_images {
            self.post_images.remove(&image).await;
        }

        tracing::info!(actor = %actor.username, target_id, "User deleted");
        Ok(())
    }
}
