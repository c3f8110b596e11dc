use std::sync::Arc;

use crate::config::Config;
use crate::db::Store;
use crate::services::{
    CommentService, PostService, SeaOrmCommentService, SeaOrmPostService, SeaOrmUserService,
    UploadStore, UserService,
};

/// Everything a request handler needs, wired once at startup.
#[derive(Clone)]
pub struct SharedState {
    pub config: Config,

    pub store: Store,

    pub users: Arc<dyn UserService>,

    pub posts: Arc<dyn PostService>,

    pub comments: Arc<dyn CommentService>,

    pub post_images: UploadStore,

    pub avatars: UploadStore,
}

impl SharedState {
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        let store = Store::with_pool_options(
            &config.general.database_path,
            config.general.max_db_connections,
            config.general.min_db_connections,
        )
        .await?;

        let post_images = UploadStore::new(&config.uploads.posts_path);
        let avatars = UploadStore::new(&config.uploads.avatars_path);

        let users = Arc::new(SeaOrmUserService::new(
            store.clone(),
            config.security.clone(),
            avatars.clone(),
            post_images.clone(),
        )) as Arc<dyn UserService>;

        let posts = Arc::new(SeaOrmPostService::new(store.clone(), post_images.clone()))
            as Arc<dyn PostService>;

        let comments =
            Arc::new(SeaOrmCommentService::new(store.clone())) as Arc<dyn CommentService>;

        Ok(Self {
            config,
            store,
            users,
            posts,
            comments,
            post_images,
            avatars,
        })
    }
}
