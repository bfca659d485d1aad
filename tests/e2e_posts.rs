//! E2E tests for the feed and posts

mod common;

use chrono::{Duration, TimeZone, Utc};
use common::{TestServer, location, png_part};
use platzigram::data::{EntityId, Post};

/// Insert posts straight into the database with distinct timestamps
async fn seed_posts(server: &TestServer, username: &str, count: i64) {
    let user = server
        .state
        .db
        .get_user_by_username(username)
        .await
        .unwrap()
        .unwrap();
    let profile = server
        .state
        .db
        .get_profile_by_user(&user.id)
        .await
        .unwrap()
        .unwrap();
    let base = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();

    for i in 0..count {
        let post = Post {
            id: EntityId::new().0,
            user_id: user.id.clone(),
            profile_id: profile.id.clone(),
            title: format!("post {}", i),
            photo: format!("posts/photos/seed-{}.png", i),
            created_at: base + Duration::minutes(i),
        };
        server.state.db.insert_post(&post).await.unwrap();
    }
}

#[tokio::test]
async fn test_protected_routes_redirect_to_login() {
    let server = TestServer::new().await;
    server.signup("pablo", "pablo@example.com").await;

    for path in [
        "/",
        "/posts/01HZX0000000000000000000AB/",
        "/posts/new/",
        "/users/pablo/",
        "/users/me/profile/",
    ] {
        let response = server.client.get(server.url(path)).send().await.unwrap();
        assert_eq!(response.status(), 303, "{path}");
        assert!(
            location(&response).starts_with("/users/login/?next="),
            "{path}"
        );
    }
}

#[tokio::test]
async fn test_empty_feed_has_one_page() {
    let server = TestServer::new().await;
    let cookie = server.create_user("pablo").await;

    let response = server.get_as(&cookie, "/").await;
    assert_eq!(response.status(), 200);
    let json: serde_json::Value = response.json().await.unwrap();
    assert_eq!(json["posts"], serde_json::json!([]));
    assert_eq!(json["page"]["number"], 1);
    assert_eq!(json["page"]["num_pages"], 1);

    let response = server.get_as(&cookie, "/?page=2").await;
    assert_eq!(response.status(), 404);
}

#[tokio::test]
async fn test_feed_is_newest_first_and_paginated() {
    let server = TestServer::new().await;
    let cookie = server.create_user("pablo").await;
    seed_posts(&server, "pablo", 35).await;

    let response = server.get_as(&cookie, "/").await;
    assert_eq!(response.status(), 200);
    let json: serde_json::Value = response.json().await.unwrap();
    let posts = json["posts"].as_array().unwrap();
    assert_eq!(posts.len(), 30);
    assert_eq!(posts[0]["title"], "post 34");
    assert_eq!(posts[29]["title"], "post 5");
    assert_eq!(posts[0]["user"]["username"], "pablo");
    assert_eq!(json["page"]["has_next"], true);

    let response = server.get_as(&cookie, "/?page=2").await;
    let json: serde_json::Value = response.json().await.unwrap();
    let titles: Vec<_> = json["posts"]
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p["title"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(titles, vec!["post 4", "post 3", "post 2", "post 1", "post 0"]);

    let response = server.get_as(&cookie, "/?page=last").await;
    let json: serde_json::Value = response.json().await.unwrap();
    assert_eq!(json["page"]["number"], 2);

    for bad in ["/?page=3", "/?page=0", "/?page=abc"] {
        assert_eq!(server.get_as(&cookie, bad).await.status(), 404, "{bad}");
    }
}

#[tokio::test]
async fn test_create_post_and_view_it() {
    let server = TestServer::new().await;
    let cookie = server.create_user("pablo").await;

    let response = server.get_as(&cookie, "/posts/new/").await;
    assert_eq!(response.status(), 200);
    let json: serde_json::Value = response.json().await.unwrap();
    assert_eq!(json["user"]["username"], "pablo");

    let response = server.create_post(&cookie, "Sunset").await;
    assert_eq!(response.status(), 303);
    assert_eq!(location(&response), "/");

    let json: serde_json::Value = server.get_as(&cookie, "/").await.json().await.unwrap();
    let post = &json["posts"][0];
    assert_eq!(post["title"], "Sunset");
    let photo_url = post["photo_url"].as_str().unwrap().to_string();
    assert!(photo_url.starts_with("/media/posts/photos/"));
    assert!(photo_url.ends_with(".png"));

    let id = post["id"].as_str().unwrap();
    let response = server.get_as(&cookie, &format!("/posts/{}/", id)).await;
    assert_eq!(response.status(), 200);
    let detail: serde_json::Value = response.json().await.unwrap();
    assert_eq!(detail["title"], "Sunset");
    assert_eq!(detail["user"]["username"], "pablo");

    // The stored photo is served back
    let response = server.client.get(server.url(&photo_url)).send().await.unwrap();
    assert_eq!(response.status(), 200);
    assert_eq!(response.bytes().await.unwrap().to_vec(), common::png_bytes());
}

#[tokio::test]
async fn test_post_owner_comes_from_session() {
    let server = TestServer::new().await;
    let cookie = server.create_user("pablo").await;
    server.signup("other", "other@example.com").await;
    let other = server
        .state
        .db
        .get_user_by_username("other")
        .await
        .unwrap()
        .unwrap();

    let form = reqwest::multipart::Form::new()
        .text("title", "Mine")
        .text("user", other.id.clone())
        .text("profile", other.id.clone())
        .part("photo", png_part());
    let response = server
        .client
        .post(server.url("/posts/new/"))
        .header("Cookie", &cookie)
        .multipart(form)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 303);

    assert!(server.state.db.get_posts_by_user(&other.id).await.unwrap().is_empty());
    let pablo = server
        .state
        .db
        .get_user_by_username("pablo")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(server.state.db.get_posts_by_user(&pablo.id).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_create_post_validates_input() {
    let server = TestServer::new().await;
    let cookie = server.create_user("pablo").await;

    // Missing photo and title
    let form = reqwest::multipart::Form::new().text("title", "");
    let response = server
        .client
        .post(server.url("/posts/new/"))
        .header("Cookie", &cookie)
        .multipart(form)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 400);
    let json: serde_json::Value = response.json().await.unwrap();
    assert!(json["errors"]["title"].is_array());
    assert!(json["errors"]["photo"].is_array());

    // A text file posing as an image
    let fake = reqwest::multipart::Part::bytes(b"not an image".to_vec())
        .file_name("photo.png")
        .mime_str("image/png")
        .unwrap();
    let form = reqwest::multipart::Form::new()
        .text("title", "Fake")
        .part("photo", fake);
    let response = server
        .client
        .post(server.url("/posts/new/"))
        .header("Cookie", &cookie)
        .multipart(form)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 400);
    let json: serde_json::Value = response.json().await.unwrap();
    assert!(json["errors"]["photo"].is_array());
    assert_eq!(json["values"]["title"], "Fake");

    assert_eq!(server.state.db.count_posts().await.unwrap(), 0);
}

#[tokio::test]
async fn test_unknown_post_is_not_found() {
    let server = TestServer::new().await;
    let cookie = server.create_user("pablo").await;

    let response = server.get_as(&cookie, "/posts/does-not-exist/").await;

    assert_eq!(response.status(), 404);
    let json: serde_json::Value = response.json().await.unwrap();
    assert_eq!(json["error"], "Not found");
}

#[tokio::test]
async fn test_create_post_enforces_upload_size_limit() {
    let temp_dir = tempfile::TempDir::new().unwrap();
    let mut config = common::test_config(&temp_dir);
    let photo = common::png_bytes();
    config.media.max_upload_bytes = photo.len();
    let server = TestServer::with_config(config, temp_dir).await;
    let cookie = server.create_user("pablo").await;

    // Far past the request body limit, not just the per-file cap
    let mut oversized = photo.clone();
    oversized.resize(photo.len() + 2 * 1024 * 1024, 0);
    let part = reqwest::multipart::Part::bytes(oversized)
        .file_name("photo.png")
        .mime_str("image/png")
        .unwrap();
    let form = reqwest::multipart::Form::new()
        .text("title", "Big")
        .part("photo", part);
    let response = server
        .client
        .post(server.url("/posts/new/"))
        .header("Cookie", &cookie)
        .multipart(form)
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 400);
    let json: serde_json::Value = response.json().await.unwrap();
    assert_eq!(
        json["errors"]["photo"][0],
        format!("Ensure this file is at most {} bytes.", photo.len())
    );
    assert_eq!(json["values"]["title"], "Big");
    assert_eq!(server.state.db.count_posts().await.unwrap(), 0);

    // A file exactly at the cap is accepted
    let response = server.create_post(&cookie, "Fits").await;
    assert_eq!(response.status(), 303);
    assert_eq!(server.state.db.count_posts().await.unwrap(), 1);
}

#[tokio::test]
async fn test_malformed_feed_query_is_not_found() {
    let server = TestServer::new().await;
    let cookie = server.create_user("pablo").await;

    let response = server.get_as(&cookie, "/?page=1&page=2").await;

    assert_eq!(response.status(), 404);
    let json: serde_json::Value = response.json().await.unwrap();
    assert_eq!(json["error"], "Not found");
}
