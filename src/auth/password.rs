//! Password hashing and verification using Argon2id

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};

use crate::error::AppError;

/// Hash a password into a PHC string for storage
///
/// Hashing is CPU bound and runs on the blocking pool.
pub async fn hash_password(password: &str) -> Result<String, AppError> {
    let password = password.to_string();
    tokio::task::spawn_blocking(move || {
        let salt = SaltString::generate(&mut OsRng);
        Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| AppError::Encryption(format!("password hashing failed: {}", e)))
    })
    .await
    .map_err(|e| AppError::Internal(e.into()))?
}

/// Verify a password against a stored PHC string
///
/// `None` for the hash still runs a full verification against a fixed
/// hash, so an unknown username takes as long as a wrong password.
pub async fn verify_password(password: &str, password_hash: Option<&str>) -> Result<bool, AppError> {
    let password = password.to_string();
    let known_user = password_hash.is_some();
    let password_hash = password_hash.unwrap_or(UNKNOWN_USER_HASH).to_string();

    let matches = tokio::task::spawn_blocking(move || {
        let parsed = PasswordHash::new(&password_hash)
            .map_err(|e| AppError::Encryption(format!("invalid password hash: {}", e)))?;

        match Argon2::default().verify_password(password.as_bytes(), &parsed) {
            Ok(()) => Ok(true),
            Err(argon2::password_hash::Error::Password) => Ok(false),
            Err(e) => Err(AppError::Encryption(format!(
                "password verification failed: {}",
                e
            ))),
        }
    })
    .await
    .map_err(|e| AppError::Internal(e.into()))??;

    Ok(known_user && matches)
}

/// Argon2id hash of a random string nobody knows
const UNKNOWN_USER_HASH: &str = "$argon2id$v=19$m=19456,t=2,p=1$c29tZXNhbHRzb21lc2FsdA$Xv2Fe4lZqKa9n5jgY1yN2h0mAgtw8k4AxSBe7YSi7Fo";
