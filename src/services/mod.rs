pub mod comment_service;
pub mod comment_service_impl;
pub mod post_service;
pub mod post_service_impl;
pub mod upload;
pub mod user_service;
pub mod user_service_impl;

pub use comment_service::{CommentError, CommentService};
pub use comment_service_impl::SeaOrmCommentService;
pub use post_service::{ImageAction, PostError, PostService};
pub use post_service_impl::SeaOrmPostService;
pub use upload::{NewImage, UploadStore};
pub use user_service::{UserError, UserService};
pub use user_service_impl::SeaOrmUserService;
