use serde::Serialize;

use crate::db::{CommentRow, PostRow, UserOverview, UserProfile};
use crate::domain::{Identity, Page, Role};

#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    pub const fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message.into()),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// The identity slice of a session, as returned to clients.
#[derive(Debug, Serialize)]
pub struct IdentityDto {
    pub id: i32,
    pub username: String,
    pub role: Role,
}

impl From<&Identity> for IdentityDto {
    fn from(identity: &Identity) -> Self {
        Self {
            id: identity.user_id,
            username: identity.username.clone(),
            role: identity.role,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SessionDto {
    pub logged_in: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<IdentityDto>,
}

#[derive(Debug, Serialize)]
pub struct UserProfileDto {
    pub id: i32,
    pub username: String,
    pub email: String,
    pub role: Role,
    pub avatar: Option<String>,
    pub created_at: String,
    pub post_count: i64,
}

impl From<UserProfile> for UserProfileDto {
    fn from(profile: UserProfile) -> Self {
        Self {
            id: profile.id,
            username: profile.username,
            email: profile.email,
            role: profile.role,
            avatar: profile.avatar,
            created_at: profile.created_at,
            post_count: profile.post_count,
        }
    }
}

/// One row of the admin user listing.
#[derive(Debug, Serialize)]
pub struct UserOverviewDto {
    pub id: i32,
    pub username: String,
    pub email: String,
    pub role: Role,
    pub created_at: String,
    pub post_count: i64,
}

impl From<UserOverview> for UserOverviewDto {
    fn from(row: UserOverview) -> Self {
        Self {
            id: row.id,
            username: row.username,
            email: row.email,
            role: row.role,
            created_at: row.created_at,
            post_count: row.post_count,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct PostDto {
    pub id: i32,
    pub user_id: i32,
    pub username: String,
    pub title: String,
    pub content: String,
    pub image: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl From<PostRow> for PostDto {
    fn from(row: PostRow) -> Self {
        Self {
            id: row.id,
            user_id: row.user_id,
            username: row.username,
            title: row.title,
            content: row.content,
            image: row.image,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct PostListResponse {
    pub posts: Vec<PostDto>,
    pub pagination: Page,
}

#[derive(Debug, Serialize)]
pub struct CommentDto {
    pub id: i32,
    pub user_id: i32,
    pub username: String,
    pub post_id: i32,
    pub content: String,
    pub created_at: String,
    pub updated_at: String,
}

impl From<CommentRow> for CommentDto {
    fn from(row: CommentRow) -> Self {
        Self {
            id: row.id,
            user_id: row.user_id,
            username: row.username,
            post_id: row.post_id,
            content: row.content,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CommentListResponse {
    pub comments: Vec<CommentDto>,
    pub pagination: Page,
}

#[derive(Debug, Serialize)]
pub struct AvatarUploadResponse {
    pub message: String,
    pub filename: String,
}
