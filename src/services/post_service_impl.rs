//! `SeaORM` implementation of the `PostService` trait.

use async_trait::async_trait;

use crate::db::{PostPage, PostRow, Store};
use crate::domain::{Identity, policy};
use crate::services::post_service::{ImageAction, PostError, PostService};
use crate::services::upload::{NewImage, UploadStore};

pub struct SeaOrmPostService {
    store: Store,
    images: UploadStore,
}

impl SeaOrmPostService {
    #[must_use]
    pub const fn new(store: Store, images: UploadStore) -> Self {
        Self { store, images }
    }
}

fn validate_fields(title: &str, content: &str) -> Result<(), PostError> {
    if title.trim().is_empty() || content.trim().is_empty() {
        return Err(PostError::Validation(
            "Title and content cannot be empty.".to_string(),
        ));
    }
    Ok(())
}

#[async_trait]
impl PostService for SeaOrmPostService {
    async fn list(
        &self,
        page: u64,
        per_page: u64,
        author: Option<i32>,
    ) -> Result<PostPage, PostError> {
        Ok(self.store.post_page(page, per_page, author).await?)
    }

    async fn get(&self, id: i32) -> Result<PostRow, PostError> {
        self.store.get_post(id).await?.ok_or(PostError::NotFound)
    }

    async fn create(
        &self,
        author: &Identity,
        title: &str,
        content: &str,
        image: Option<NewImage>,
    ) -> Result<PostRow, PostError> {
        validate_fields(title, content)?;

        let filename = match image {
            Some(img) => Some(self.images.save("post", img.extension, &img.bytes).await?),
            None => None,
        };

        let created = match self
            .store
            .create_post(author.user_id, title, content, filename.clone())
            .await
        {
            Ok(model) => model,
            Err(err) => {
                // do not leave an orphaned upload behind
                if let Some(name) = filename {
                    self.images.remove(&name).await;
                }
                return Err(err.into());
            }
        };

        tracing::info!(post_id = created.id, author = %author.username, "Post created");

        self.store
            .get_post(created.id)
            .await?
            .ok_or(PostError::NotFound)
    }

    async fn edit(
        &self,
        actor: &Identity,
        post_id: i32,
        title: &str,
        content: &str,
        image: ImageAction,
    ) -> Result<PostRow, PostError> {
        let post = self
            .store
            .get_post_model(post_id)
            .await?
            .ok_or(PostError::NotFound)?;

        policy::require_owner_or_admin(actor, post.user_id)?;
        validate_fields(title, content)?;

        // Resolve the image change up front; `superseded` is only deleted
        // after the row update has gone through, and a freshly written file
        // is rolled back if it has not.
        let superseded = post.image.clone();
        let (next_image, written) = match image {
            ImageAction::Keep => (post.image.clone(), None),
            ImageAction::Remove => (None, None),
            ImageAction::Replace(img) => {
                let name = self.images.save("post", img.extension, &img.bytes).await?;
                (Some(name.clone()), Some(name))
            }
        };

        let updated = match self
            .store
            .update_post(post, title, content, next_image.clone())
            .await
        {
            Ok(model) => model,
            Err(err) => {
                if let Some(name) = written {
                    self.images.remove(&name).await;
                }
                return Err(err.into());
            }
        };

        if let Some(old) = superseded
            && next_image.as_deref() != Some(old.as_str())
        {
            self.images.remove(&old).await;
        }

        tracing::info!(post_id, actor = %actor.username, "Post updated");

        self.store
            .get_post(updated.id)
            .await?
            .ok_or(PostError::NotFound)
    }

    async fn delete(&self, actor: &Identity, post_id: i32) -> Result<(), PostError> {
        let post = self
            .store
            .get_post_model(post_id)
            .await?
            .ok_or(PostError::NotFound)?;

        policy::require_owner_or_admin(actor, post.user_id)?;

        let image = post.image.clone();
        self.store.delete_post(post).await?;

        if let Some(name) = image {
            self.images.remove(&name).await;
        }

        tracing::info!(post_id, actor = %actor.username, "Post deleted");
        Ok(())
    }
}
