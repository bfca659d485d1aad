//! Data models
//!
//! Rust structs representing database entities.
//! All models use ULID for IDs and chrono for timestamps.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

// =============================================================================
// ID Types
// =============================================================================

/// Entity ID wrapper (ULID format, 26 characters)
///
/// Example: "01ARZ3NDEKTSV4RRFFQ69G5FAV"
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(pub String);

impl EntityId {
    /// Generate a new ULID
    pub fn new() -> Self {
        Self(ulid::Ulid::new().to_string())
    }
}

impl Default for EntityId {
    fn default() -> Self {
        Self::new()
    }
}

/// Timestamp as stored in the database
///
/// Fixed width (microseconds, `Z` suffix) so that string comparison in SQL
/// matches chronological order.
pub fn db_timestamp(at: &DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

// =============================================================================
// User
// =============================================================================

/// Login identity
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    pub id: String,
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    /// Argon2 PHC string
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
            .trim()
            .to_string()
    }
}

// =============================================================================
// Profile
// =============================================================================

/// Editable user attributes, one per user
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Profile {
    pub id: String,
    pub user_id: String,
    pub website: String,
    pub biography: String,
    pub phone_number: String,
    /// Media key of the profile picture
    pub picture: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Profile {
    /// Empty profile created alongside a new user
    pub fn for_user(user: &User) -> Self {
        Self {
            id: EntityId::new().0,
            user_id: user.id.clone(),
            website: String::new(),
            biography: String::new(),
            phone_number: String::new(),
            picture: None,
            created_at: user.created_at,
            updated_at: user.created_at,
        }
    }
}

// =============================================================================
// Post
// =============================================================================

/// An image post
///
/// Immutable once created.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Post {
    pub id: String,
    pub user_id: String,
    pub profile_id: String,
    pub title: String,
    /// Media key of the photo
    pub photo: String,
    pub created_at: DateTime<Utc>,
}

/// Post joined with what the feed shows about its author
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct FeedEntry {
    pub id: String,
    pub user_id: String,
    pub title: String,
    pub photo: String,
    pub created_at: DateTime<Utc>,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    /// Author's profile picture media key
    pub picture: Option<String>,
}

// =============================================================================
// Session
// =============================================================================

/// Server-side record of a login
///
/// Deleting the row ends the session even if the cookie is replayed.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct SessionRecord {
    pub id: String,
    pub user_id: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}
