//! User service
//!
//! Handles signup, login/logout and profile operations.

use std::sync::Arc;

use chrono::{Duration, Utc};

use crate::auth::{Session, Viewer, create_session_token, hash_password, verify_password};
use crate::config::AuthConfig;
use crate::data::{
    Database, EntityId, Post, Profile, SessionRecord, User, unique_violation_column,
};
use crate::error::AppError;
use crate::forms::{FormErrors, NewUser, ProfileChanges};
use crate::metrics::{LOGINS_TOTAL, MEDIA_BYTES_UPLOADED, MEDIA_UPLOADS_TOTAL, SIGNUPS_TOTAL};
use crate::storage::MediaStorage;

const USERNAME_TAKEN: &str = "Username is already in use.";
const EMAIL_TAKEN: &str = "Email is already in use.";

/// Random, unguessable session ID
fn generate_session_id() -> String {
    use base64::{Engine as _, engine::general_purpose};
    use rand::RngCore;

    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    general_purpose::URL_SAFE_NO_PAD.encode(bytes)
}

/// A user page: the user, their profile and their posts
#[derive(Debug, Clone)]
pub struct UserDetail {
    pub user: User,
    pub profile: Profile,
    pub posts: Vec<Post>,
}

/// User service
pub struct UserService {
    db: Arc<Database>,
    storage: Arc<MediaStorage>,
    auth: AuthConfig,
}

impl UserService {
    /// Create new user service
    pub fn new(db: Arc<Database>, storage: Arc<MediaStorage>, auth: AuthConfig) -> Self {
        Self { db, storage, auth }
    }

    // =========================================================================
    // Accounts
    // =========================================================================

    /// Create a user together with an empty profile
    ///
    /// A taken username or email is reported as a field error, including
    /// when a concurrent signup wins the race past the pre-checks.
    pub async fn signup(&self, new_user: NewUser) -> Result<User, AppError> {
        let mut errors = new_user.errors();
        if self.db.username_exists(&new_user.username).await? {
            errors.add("username", USERNAME_TAKEN);
        }
        if self.db.email_exists(&new_user.email).await? {
            errors.add("email", EMAIL_TAKEN);
        }
        if !errors.is_empty() {
            return Err(AppError::Form(errors));
        }

        let password_hash = hash_password(&new_user.password).await?;
        let user = User {
            id: EntityId::new().0,
            username: new_user.username.clone(),
            email: new_user.email.clone(),
            first_name: new_user.first_name.clone(),
            last_name: new_user.last_name.clone(),
            password_hash,
            created_at: Utc::now(),
        };
        let profile = Profile::for_user(&user);

        match self.db.insert_user_with_profile(&user, &profile).await {
            Ok(()) => {}
            Err(AppError::Database(error)) => {
                return Err(match unique_violation_column(&error).as_deref() {
                    Some("username") => taken(new_user.errors(), "username", USERNAME_TAKEN),
                    Some("email") => taken(new_user.errors(), "email", EMAIL_TAKEN),
                    _ => AppError::Database(error),
                });
            }
            Err(error) => return Err(error),
        }

        SIGNUPS_TOTAL.inc();
        tracing::info!(user_id = %user.id, username = %user.username, "User signed up");

        Ok(user)
    }

    /// Check credentials and open a session
    ///
    /// Returns the signed token for the session cookie.
    ///
    /// # Errors
    /// `InvalidCredentials` for an unknown user or wrong password alike
    pub async fn login(&self, username: &str, password: &str) -> Result<String, AppError> {
        let user = self.db.get_user_by_username(username.trim()).await?;
        let valid = verify_password(password, user.as_ref().map(|u| u.password_hash.as_str()))
            .await?;

        let user = match user {
            Some(user) if valid => user,
            _ => {
                LOGINS_TOTAL.with_label_values(&["failure"]).inc();
                tracing::info!(username = %username.trim(), "Rejected login");
                return Err(AppError::InvalidCredentials);
            }
        };

        let now = Utc::now();
        let record = SessionRecord {
            id: generate_session_id(),
            user_id: user.id.clone(),
            created_at: now,
            expires_at: now + Duration::seconds(self.auth.session_max_age),
        };
        self.db.insert_session(&record).await?;

        let session = Session {
            session_id: record.id,
            user_id: user.id,
            username: user.username,
            created_at: record.created_at,
            expires_at: record.expires_at,
        };
        let token = create_session_token(&session, &self.auth.session_secret)?;

        LOGINS_TOTAL.with_label_values(&["success"]).inc();
        tracing::info!(username = %session.username, "User logged in");

        Ok(token)
    }

    /// End the viewer's session
    pub async fn logout(&self, viewer: &Viewer) -> Result<(), AppError> {
        self.db.delete_session(&viewer.session.session_id).await?;
        tracing::info!(username = %viewer.user.username, "User logged out");
        Ok(())
    }

    /// Drop sessions past their expiry
    pub async fn purge_expired_sessions(&self) -> Result<u64, AppError> {
        self.db.delete_expired_sessions(Utc::now()).await
    }

    // =========================================================================
    // Profiles
    // =========================================================================

    /// Get a user with profile and posts, newest first
    pub async fn get_user_detail(&self, username: &str) -> Result<UserDetail, AppError> {
        let user = self
            .db
            .get_user_by_username(username)
            .await?
            .ok_or(AppError::NotFound)?;
        let profile = self.get_profile(&user).await?;
        let posts = self.db.get_posts_by_user(&user.id).await?;

        Ok(UserDetail {
            user,
            profile,
            posts,
        })
    }

    /// Get the profile of a user
    pub async fn get_profile(&self, user: &User) -> Result<Profile, AppError> {
        self.db.get_profile_by_user(&user.id).await?.ok_or_else(|| {
            AppError::Internal(anyhow::anyhow!("user {} has no profile", user.username))
        })
    }

    /// Apply profile changes to the viewer's own profile
    ///
    /// A new picture replaces the old file, which is deleted once the row
    /// points at the new one.
    pub async fn update_profile(
        &self,
        viewer: &Viewer,
        changes: ProfileChanges,
    ) -> Result<Profile, AppError> {
        let mut profile = self.get_profile(&viewer.user).await?;
        let previous_picture = profile.picture.clone();

        let mut new_picture = None;
        if let Some(picture) = &changes.picture {
            let key_id = EntityId::new().0;
            let (key, _url) = self.storage.upload_profile_picture(&key_id, picture).await?;
            MEDIA_UPLOADS_TOTAL
                .with_label_values(&["profile_picture"])
                .inc();
            MEDIA_BYTES_UPLOADED.inc_by(picture.size() as f64);
            new_picture = Some(key);
        }

        profile.website = changes.website;
        profile.biography = changes.biography;
        profile.phone_number = changes.phone_number;
        if new_picture.is_some() {
            profile.picture = new_picture.clone();
        }
        profile.updated_at = Utc::now();

        let updated = match self.db.update_profile(&profile).await {
            Ok(updated) => updated,
            Err(error) => {
                self.discard_picture(new_picture.as_deref()).await;
                return Err(error);
            }
        };
        if !updated {
            self.discard_picture(new_picture.as_deref()).await;
            return Err(AppError::NotFound);
        }

        if new_picture.is_some() {
            self.discard_picture(previous_picture.as_deref()).await;
        }

        tracing::info!(username = %viewer.user.username, "Profile updated");
        Ok(profile)
    }

    async fn discard_picture(&self, key: Option<&str>) {
        let Some(key) = key else {
            return;
        };
        if let Err(error) = self.storage.delete(key).await {
            tracing::warn!(%error, key, "Failed to remove profile picture");
        }
    }
}

fn taken(mut errors: FormErrors, field: &str, message: &str) -> AppError {
    errors.add(field, message);
    AppError::Form(errors)
}
