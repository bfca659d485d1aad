//! Post service
//!
//! Feed pagination, post lookup and post creation.

use std::str::FromStr;
use std::sync::Arc;

use crate::auth::Viewer;
use crate::data::{Database, EntityId, FeedEntry, Post};
use crate::error::AppError;
use crate::forms::NewPost;
use crate::metrics::{MEDIA_BYTES_UPLOADED, MEDIA_UPLOADS_TOTAL, POSTS_CREATED_TOTAL};
use crate::storage::MediaStorage;

/// Posts shown per feed page
pub const FEED_PAGE_SIZE: usize = 30;

/// Requested feed page
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageRequest {
    /// 1-based page number
    Number(usize),
    Last,
}

impl Default for PageRequest {
    fn default() -> Self {
        PageRequest::Number(1)
    }
}

impl FromStr for PageRequest {
    type Err = AppError;

    /// Parse the `page` query value
    ///
    /// Blank means the first page. Zero, negative and non-numeric values
    /// are rejected as not found.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Ok(PageRequest::default());
        }
        if s == "last" {
            return Ok(PageRequest::Last);
        }

        match s.parse::<usize>() {
            Ok(number) if number >= 1 => Ok(PageRequest::Number(number)),
            _ => Err(AppError::NotFound),
        }
    }
}

/// Number of pages for `count` items
///
/// An empty feed still has one (empty) page.
pub fn num_pages(count: usize, page_size: usize) -> usize {
    count.div_ceil(page_size).max(1)
}

/// One page of the feed
#[derive(Debug, Clone)]
pub struct FeedPage {
    pub entries: Vec<FeedEntry>,
    /// 1-based number of this page
    pub number: usize,
    pub num_pages: usize,
    /// Total posts in the feed
    pub count: usize,
}

impl FeedPage {
    pub fn has_next(&self) -> bool {
        self.number < self.num_pages
    }

    pub fn has_previous(&self) -> bool {
        self.number > 1
    }
}

/// Post service
pub struct PostService {
    db: Arc<Database>,
    storage: Arc<MediaStorage>,
}

impl PostService {
    /// Create new post service
    pub fn new(db: Arc<Database>, storage: Arc<MediaStorage>) -> Self {
        Self { db, storage }
    }

    /// Get one page of the feed, newest first
    ///
    /// # Errors
    /// `NotFound` if the page is past the last one
    pub async fn list_feed(&self, page: PageRequest) -> Result<FeedPage, AppError> {
        let count = usize::try_from(self.db.count_posts().await?).unwrap_or(0);
        let num_pages = num_pages(count, FEED_PAGE_SIZE);

        let number = match page {
            PageRequest::Last => num_pages,
            PageRequest::Number(number) if number <= num_pages => number,
            PageRequest::Number(_) => return Err(AppError::NotFound),
        };

        let entries = self
            .db
            .get_feed_page(FEED_PAGE_SIZE, (number - 1) * FEED_PAGE_SIZE)
            .await?;

        Ok(FeedPage {
            entries,
            number,
            num_pages,
            count,
        })
    }

    /// Get post by ID
    pub async fn get_post(&self, id: &str) -> Result<FeedEntry, AppError> {
        self.db.get_post_entry(id).await?.ok_or(AppError::NotFound)
    }

    /// Create a post owned by the viewer
    ///
    /// # Side Effects
    /// - Writes the photo below `posts/photos/`
    /// - Inserts into database
    ///
    /// The stored photo is removed again if the insert fails.
    pub async fn create_post(&self, viewer: &Viewer, new_post: NewPost) -> Result<Post, AppError> {
        let profile = self
            .db
            .get_profile_by_user(&viewer.user.id)
            .await?
            .ok_or_else(|| {
                AppError::Internal(anyhow::anyhow!(
                    "user {} has no profile",
                    viewer.user.username
                ))
            })?;

        let id = EntityId::new().0;
        let (photo, _url) = self
            .storage
            .upload_post_photo(&id, &new_post.photo)
            .await?;
        MEDIA_UPLOADS_TOTAL.with_label_values(&["post_photo"]).inc();
        MEDIA_BYTES_UPLOADED.inc_by(new_post.photo.size() as f64);

        let post = Post {
            id,
            user_id: viewer.user.id.clone(),
            profile_id: profile.id,
            title: new_post.title,
            photo,
            created_at: chrono::Utc::now(),
        };

        if let Err(error) = self.db.insert_post(&post).await {
            if let Err(cleanup) = self.storage.delete(&post.photo).await {
                tracing::warn!(error = %cleanup, key = %post.photo, "Failed to remove orphaned photo");
            }
            return Err(error);
        }

        POSTS_CREATED_TOTAL.inc();
        tracing::info!(
            post_id = %post.id,
            username = %viewer.user.username,
            "Post created"
        );

        Ok(post)
    }
}
