//! Service layer
//!
//! Contains business logic separated from HTTP handlers.
//! Services orchestrate database and media storage operations.

mod post;
mod user;

pub use post::{FEED_PAGE_SIZE, FeedPage, PageRequest, PostService, num_pages};
pub use user::{UserDetail, UserService};
