//! Post endpoints
//!
//! Feed, post detail and post creation. All routes require a session.

use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, Multipart, Path, Query, State, rejection::QueryRejection},
    middleware,
    response::{IntoResponse, Redirect, Response},
    routing::get,
};
use serde::Deserialize;

use super::dto::{FeedResponse, PostResponse, ProfileResponse, UserResponse, ViewerContext};
use super::upload::UploadForm;
use crate::AppState;
use crate::auth::{CurrentUser, require_auth};
use crate::error::AppError;
use crate::forms::PostForm;
use crate::metrics::{HTTP_REQUEST_DURATION_SECONDS, HTTP_REQUESTS_TOTAL};
use crate::service::{PageRequest, PostService, UserService};

/// Room for the text parts and multipart framing on top of the file
pub(crate) const MULTIPART_OVERHEAD_BYTES: usize = 64 * 1024;

/// Create posts router
///
/// Every route sits behind [`require_auth`].
pub fn posts_router(state: AppState) -> Router<AppState> {
    let body_limit = state.config.media.max_upload_bytes + MULTIPART_OVERHEAD_BYTES;

    Router::new()
        .route("/", get(list_feed))
        .route("/posts/new/", get(new_post_form).post(create_post))
        .route("/posts/:id/", get(get_post))
        .layer(DefaultBodyLimit::max(body_limit))
        .route_layer(middleware::from_fn_with_state(state, require_auth))
}

fn build_post_service(state: &AppState) -> PostService {
    PostService::new(state.db.clone(), state.storage.clone())
}

#[derive(Debug, Deserialize)]
struct FeedQuery {
    page: Option<String>,
}

/// GET /?page=N
///
/// An unreadable query string is a missing page, like a bad page number.
async fn list_feed(
    State(state): State<AppState>,
    CurrentUser(_viewer): CurrentUser,
    query: Result<Query<FeedQuery>, QueryRejection>,
) -> Result<Json<FeedResponse>, AppError> {
    let _timer = HTTP_REQUEST_DURATION_SECONDS
        .with_label_values(&["GET", "/"])
        .start_timer();

    let Query(query) = query.map_err(|rejection| {
        tracing::debug!(%rejection, "Unreadable feed query");
        AppError::NotFound
    })?;

    let page = match query.page.as_deref() {
        Some(raw) => raw.parse::<PageRequest>()?,
        None => PageRequest::default(),
    };
    let feed = build_post_service(&state).list_feed(page).await?;

    HTTP_REQUESTS_TOTAL
        .with_label_values(&["GET", "/", "200"])
        .inc();

    Ok(Json(FeedResponse::new(&feed, &state.storage)))
}

/// GET /posts/:id/
async fn get_post(
    State(state): State<AppState>,
    CurrentUser(_viewer): CurrentUser,
    Path(id): Path<String>,
) -> Result<Json<PostResponse>, AppError> {
    let entry = build_post_service(&state).get_post(&id).await?;
    Ok(Json(PostResponse::from_entry(&entry, &state.storage)))
}

/// GET /posts/new/
async fn new_post_form(
    State(state): State<AppState>,
    CurrentUser(viewer): CurrentUser,
) -> Result<Json<ViewerContext>, AppError> {
    let users = UserService::new(
        state.db.clone(),
        state.storage.clone(),
        state.config.auth.clone(),
    );
    let profile = users.get_profile(&viewer.user).await?;

    Ok(Json(ViewerContext {
        user: UserResponse::from(&viewer.user),
        profile: ProfileResponse::new(&profile, &state.storage),
    }))
}

/// POST /posts/new/ (multipart `title`, `photo`)
///
/// The post always belongs to the session user.
async fn create_post(
    State(state): State<AppState>,
    CurrentUser(viewer): CurrentUser,
    multipart: Multipart,
) -> Result<Response, AppError> {
    let _timer = HTTP_REQUEST_DURATION_SECONDS
        .with_label_values(&["POST", "/posts/new/"])
        .start_timer();

    let mut upload = UploadForm::read(multipart, state.config.media.max_upload_bytes).await?;
    let form = PostForm {
        title: upload.text("title"),
    };
    let photo = upload.image("photo").await?;
    let new_post = form.into_valid(photo).map_err(AppError::Form)?;

    build_post_service(&state)
        .create_post(&viewer, new_post)
        .await?;

    HTTP_REQUESTS_TOTAL
        .with_label_values(&["POST", "/posts/new/", "303"])
        .inc();

    Ok(Redirect::to("/").into_response())
}
