//! Database tests

use super::*;
use crate::error::AppError;
use chrono::{Duration, TimeZone, Utc};
use tempfile::TempDir;

/// Helper to create a test database
async fn create_test_db() -> (Database, TempDir) {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("test.db");
    let db = Database::connect(&db_path).await.unwrap();
    (db, temp_dir)
}

fn test_user(username: &str) -> User {
    User {
        id: EntityId::new().0,
        username: username.to_string(),
        email: format!("{}@example.com", username),
        first_name: "Test".to_string(),
        last_name: "User".to_string(),
        password_hash: "not-a-real-hash".to_string(),
        created_at: Utc::now(),
    }
}

async fn insert_user(db: &Database, username: &str) -> (User, Profile) {
    let user = test_user(username);
    let profile = Profile::for_user(&user);
    db.insert_user_with_profile(&user, &profile).await.unwrap();
    (user, profile)
}

fn post_at(user: &User, profile: &Profile, minutes: i64) -> Post {
    let base = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();
    Post {
        id: EntityId::new().0,
        user_id: user.id.clone(),
        profile_id: profile.id.clone(),
        title: format!("post {}", minutes),
        photo: format!("posts/photos/{}.png", minutes),
        created_at: base + Duration::minutes(minutes),
    }
}

#[tokio::test]
async fn test_database_connection() {
    let (_db, _temp_dir) = create_test_db().await;
    // Connection successful if we get here without panicking
}

#[tokio::test]
async fn test_user_and_profile_insert() {
    let (db, _temp_dir) = create_test_db().await;
    let (user, profile) = insert_user(&db, "pablo").await;

    let retrieved = db.get_user_by_username("pablo").await.unwrap().unwrap();
    assert_eq!(retrieved.id, user.id);
    assert_eq!(retrieved.email, "pablo@example.com");

    let retrieved = db.get_profile_by_user(&user.id).await.unwrap().unwrap();
    assert_eq!(retrieved.id, profile.id);
    assert!(retrieved.picture.is_none());

    assert!(db.username_exists("pablo").await.unwrap());
    assert!(!db.username_exists("other").await.unwrap());
    assert!(db.email_exists("PABLO@example.com").await.unwrap());
    assert_eq!(db.count_users().await.unwrap(), 1);
}

#[tokio::test]
async fn test_duplicate_username_is_unique_violation() {
    let (db, _temp_dir) = create_test_db().await;
    insert_user(&db, "pablo").await;

    let mut duplicate = test_user("pablo");
    duplicate.email = "another@example.com".to_string();
    let profile = Profile::for_user(&duplicate);

    let error = db
        .insert_user_with_profile(&duplicate, &profile)
        .await
        .expect_err("duplicate username must fail");
    let AppError::Database(error) = error else {
        panic!("expected database error, got {error:?}");
    };
    assert_eq!(unique_violation_column(&error).as_deref(), Some("username"));

    // The profile insert was rolled back with the user
    assert_eq!(db.count_users().await.unwrap(), 1);
    assert!(db.get_profile_by_user(&duplicate.id).await.unwrap().is_none());
}

#[tokio::test]
async fn test_duplicate_email_is_unique_violation() {
    let (db, _temp_dir) = create_test_db().await;
    insert_user(&db, "pablo").await;

    let mut duplicate = test_user("pablo2");
    duplicate.email = "pablo@example.com".to_string();
    let profile = Profile::for_user(&duplicate);

    let Err(AppError::Database(error)) = db.insert_user_with_profile(&duplicate, &profile).await
    else {
        panic!("duplicate email must fail with a database error");
    };
    assert_eq!(unique_violation_column(&error).as_deref(), Some("email"));
}

#[tokio::test]
async fn test_email_unique_ignores_case() {
    let (db, _temp_dir) = create_test_db().await;
    insert_user(&db, "pablo").await;

    let mut duplicate = test_user("pablo2");
    duplicate.email = "PABLO@Example.com".to_string();
    let profile = Profile::for_user(&duplicate);

    let Err(AppError::Database(error)) = db.insert_user_with_profile(&duplicate, &profile).await
    else {
        panic!("email differing only in case must fail with a database error");
    };
    assert_eq!(unique_violation_column(&error).as_deref(), Some("email"));
    assert_eq!(db.count_users().await.unwrap(), 1);
}

#[tokio::test]
async fn test_feed_orders_newest_first_and_pages() {
    let (db, _temp_dir) = create_test_db().await;
    let (alice, alice_profile) = insert_user(&db, "alice").await;
    let (bob, bob_profile) = insert_user(&db, "bobby").await;

    // Interleave authors and insert out of order
    for minutes in [5, 1, 4, 2, 3, 0] {
        let post = if minutes % 2 == 0 {
            post_at(&alice, &alice_profile, minutes)
        } else {
            post_at(&bob, &bob_profile, minutes)
        };
        db.insert_post(&post).await.unwrap();
    }

    assert_eq!(db.count_posts().await.unwrap(), 6);

    let first = db.get_feed_page(4, 0).await.unwrap();
    let titles: Vec<_> = first.iter().map(|e| e.title.as_str()).collect();
    assert_eq!(titles, vec!["post 5", "post 4", "post 3", "post 2"]);
    assert_eq!(first[0].username, "bobby");
    assert_eq!(first[1].username, "alice");

    let second = db.get_feed_page(4, 4).await.unwrap();
    let titles: Vec<_> = second.iter().map(|e| e.title.as_str()).collect();
    assert_eq!(titles, vec!["post 1", "post 0"]);
}

#[tokio::test]
async fn test_feed_orders_sub_second_timestamps() {
    let (db, _temp_dir) = create_test_db().await;
    let (user, profile) = insert_user(&db, "alice").await;

    let base = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();
    let mut whole = post_at(&user, &profile, 0);
    whole.created_at = base;
    whole.title = "whole".to_string();
    let mut fraction = post_at(&user, &profile, 0);
    fraction.created_at = base + Duration::milliseconds(250);
    fraction.title = "fraction".to_string();

    db.insert_post(&whole).await.unwrap();
    db.insert_post(&fraction).await.unwrap();

    let feed = db.get_feed_page(30, 0).await.unwrap();
    assert_eq!(feed[0].title, "fraction");
    assert_eq!(feed[1].title, "whole");
}

#[tokio::test]
async fn test_posts_by_user() {
    let (db, _temp_dir) = create_test_db().await;
    let (alice, alice_profile) = insert_user(&db, "alice").await;
    let (bob, bob_profile) = insert_user(&db, "bobby").await;

    db.insert_post(&post_at(&alice, &alice_profile, 1)).await.unwrap();
    db.insert_post(&post_at(&alice, &alice_profile, 3)).await.unwrap();
    db.insert_post(&post_at(&bob, &bob_profile, 2)).await.unwrap();

    let posts = db.get_posts_by_user(&alice.id).await.unwrap();
    let titles: Vec<_> = posts.iter().map(|p| p.title.as_str()).collect();
    assert_eq!(titles, vec!["post 3", "post 1"]);

    let entry = db.get_post_entry(&posts[0].id).await.unwrap().unwrap();
    assert_eq!(entry.username, "alice");
    assert!(db.get_post_entry("missing").await.unwrap().is_none());
}

#[tokio::test]
async fn test_post_requires_existing_user() {
    let (db, _temp_dir) = create_test_db().await;
    let ghost = test_user("ghost");
    let ghost_profile = Profile::for_user(&ghost);

    let result = db.insert_post(&post_at(&ghost, &ghost_profile, 0)).await;
    assert!(result.is_err());
}

#[tokio::test]
async fn test_update_profile_is_scoped_to_owner() {
    let (db, _temp_dir) = create_test_db().await;
    let (alice, alice_profile) = insert_user(&db, "alice").await;
    let (bob, _) = insert_user(&db, "bobby").await;

    // Bob's ID with Alice's profile must not match any row
    let mut forged = alice_profile.clone();
    forged.user_id = bob.id.clone();
    forged.website = "https://evil.example.com".to_string();
    assert!(!db.update_profile(&forged).await.unwrap());

    let mut updated = alice_profile.clone();
    updated.website = "https://alice.example.com".to_string();
    updated.biography = "hello".to_string();
    updated.updated_at = Utc::now();
    assert!(db.update_profile(&updated).await.unwrap());

    let stored = db.get_profile_by_user(&alice.id).await.unwrap().unwrap();
    assert_eq!(stored.website, "https://alice.example.com");
    assert_eq!(stored.biography, "hello");

    let bob_profile = db.get_profile_by_user(&bob.id).await.unwrap().unwrap();
    assert_eq!(bob_profile.website, "");
}

#[tokio::test]
async fn test_session_lifecycle() {
    let (db, _temp_dir) = create_test_db().await;
    let (user, _) = insert_user(&db, "alice").await;
    let now = Utc::now();

    let active = SessionRecord {
        id: EntityId::new().0,
        user_id: user.id.clone(),
        created_at: now,
        expires_at: now + Duration::hours(1),
    };
    let expired = SessionRecord {
        id: EntityId::new().0,
        user_id: user.id.clone(),
        created_at: now - Duration::hours(2),
        expires_at: now - Duration::hours(1),
    };
    db.insert_session(&active).await.unwrap();
    db.insert_session(&expired).await.unwrap();

    assert!(db.get_active_session(&active.id, now).await.unwrap().is_some());
    assert!(db.get_active_session(&expired.id, now).await.unwrap().is_none());

    assert_eq!(db.delete_expired_sessions(now).await.unwrap(), 1);

    db.delete_session(&active.id).await.unwrap();
    assert!(db.get_active_session(&active.id, now).await.unwrap().is_none());
}
