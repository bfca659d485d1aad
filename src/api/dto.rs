//! Response DTOs
//!
//! JSON shapes for the page contexts returned by the handlers. Media keys
//! are turned into public URLs here.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::data::{FeedEntry, Post, Profile, User};
use crate::service::{FeedPage, UserDetail};
use crate::storage::MediaStorage;

/// User response
///
/// Never carries the password hash.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserResponse {
    pub id: String,
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub full_name: String,
    pub created_at: DateTime<Utc>,
}

impl From<&User> for UserResponse {
    fn from(user: &User) -> Self {
        Self {
            id: user.id.clone(),
            username: user.username.clone(),
            email: user.email.clone(),
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            full_name: user.full_name(),
            created_at: user.created_at,
        }
    }
}

/// Profile response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileResponse {
    pub id: String,
    pub website: String,
    pub biography: String,
    pub phone_number: String,
    pub picture_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ProfileResponse {
    pub fn new(profile: &Profile, storage: &MediaStorage) -> Self {
        Self {
            id: profile.id.clone(),
            website: profile.website.clone(),
            biography: profile.biography.clone(),
            phone_number: profile.phone_number.clone(),
            picture_url: profile
                .picture
                .as_deref()
                .map(|key| storage.get_public_url(key)),
            created_at: profile.created_at,
            updated_at: profile.updated_at,
        }
    }
}

/// Author shown next to a post
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthorResponse {
    pub username: String,
    pub full_name: String,
    pub picture_url: Option<String>,
}

/// Post response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostResponse {
    pub id: String,
    pub title: String,
    pub photo_url: String,
    pub created_at: DateTime<Utc>,
    /// Present in the feed and on the detail page
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<AuthorResponse>,
}

impl PostResponse {
    pub fn from_entry(entry: &FeedEntry, storage: &MediaStorage) -> Self {
        let full_name = format!("{} {}", entry.first_name, entry.last_name)
            .trim()
            .to_string();

        Self {
            id: entry.id.clone(),
            title: entry.title.clone(),
            photo_url: storage.get_public_url(&entry.photo),
            created_at: entry.created_at,
            user: Some(AuthorResponse {
                username: entry.username.clone(),
                full_name,
                picture_url: entry
                    .picture
                    .as_deref()
                    .map(|key| storage.get_public_url(key)),
            }),
        }
    }

    pub fn from_post(post: &Post, storage: &MediaStorage) -> Self {
        Self {
            id: post.id.clone(),
            title: post.title.clone(),
            photo_url: storage.get_public_url(&post.photo),
            created_at: post.created_at,
            user: None,
        }
    }
}

/// Pagination info for the feed
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageInfo {
    pub number: usize,
    pub num_pages: usize,
    pub count: usize,
    pub has_next: bool,
    pub has_previous: bool,
}

/// GET /
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedResponse {
    pub posts: Vec<PostResponse>,
    pub page: PageInfo,
}

impl FeedResponse {
    pub fn new(page: &FeedPage, storage: &MediaStorage) -> Self {
        Self {
            posts: page
                .entries
                .iter()
                .map(|entry| PostResponse::from_entry(entry, storage))
                .collect(),
            page: PageInfo {
                number: page.number,
                num_pages: page.num_pages,
                count: page.count,
                has_next: page.has_next(),
                has_previous: page.has_previous(),
            },
        }
    }
}

/// GET /users/<username>/
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserDetailResponse {
    pub user: UserResponse,
    pub profile: ProfileResponse,
    pub posts: Vec<PostResponse>,
}

impl UserDetailResponse {
    pub fn new(detail: &UserDetail, storage: &MediaStorage) -> Self {
        Self {
            user: UserResponse::from(&detail.user),
            profile: ProfileResponse::new(&detail.profile, storage),
            posts: detail
                .posts
                .iter()
                .map(|post| PostResponse::from_post(post, storage))
                .collect(),
        }
    }
}

/// Context for forms that belong to the logged-in user
/// (new post, update profile)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ViewerContext {
    pub user: UserResponse,
    pub profile: ProfileResponse,
}

/// Context for the anonymous login and signup forms
#[derive(Debug, Clone, Serialize)]
pub struct FormContext {
    pub form: &'static str,
    pub fields: Vec<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next: Option<String>,
}
