//! User endpoints
//!
//! Login, logout, signup, profile update and user detail pages.

use axum::{
    Form, Json, Router,
    extract::{DefaultBodyLimit, Multipart, Path, Query, State},
    middleware,
    response::{IntoResponse, Redirect, Response},
    routing::get,
};
use axum_extra::extract::CookieJar;
use axum_extra::extract::cookie::{Cookie, SameSite};
use serde::Deserialize;

use super::dto::{FormContext, ProfileResponse, UserDetailResponse, UserResponse, ViewerContext};
use super::posts::MULTIPART_OVERHEAD_BYTES;
use super::upload::UploadForm;
use crate::AppState;
use crate::auth::{CurrentUser, SESSION_COOKIE, require_auth};
use crate::error::{AppError, LOGIN_URL};
use crate::forms::{LoginForm, ProfileForm, SignupForm, is_local_path};
use crate::metrics::{HTTP_REQUEST_DURATION_SECONDS, HTTP_REQUESTS_TOTAL};
use crate::service::UserService;

/// Create users router, mounted under `/users`
pub fn users_router(state: AppState) -> Router<AppState> {
    let body_limit = state.config.media.max_upload_bytes + MULTIPART_OVERHEAD_BYTES;

    let public = Router::new()
        .route("/login/", get(login_form).post(login))
        .route("/signup/", get(signup_form).post(signup));

    let protected = Router::new()
        .route("/logout/", get(logout).post(logout))
        .route("/me/profile/", get(update_profile_form).post(update_profile))
        .route("/:username/", get(get_user_detail))
        .layer(DefaultBodyLimit::max(body_limit))
        .route_layer(middleware::from_fn_with_state(state, require_auth));

    public.merge(protected)
}

fn build_user_service(state: &AppState) -> UserService {
    UserService::new(
        state.db.clone(),
        state.storage.clone(),
        state.config.auth.clone(),
    )
}

fn session_cookie(token: String, secure: bool) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, token))
        .path("/")
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Lax)
        .build()
}

fn clear_session_cookie() -> Cookie<'static> {
    let mut cookie = Cookie::build((SESSION_COOKIE, "".to_string()))
        .path("/")
        .http_only(true)
        .build();
    cookie.make_removal();
    cookie
}

#[derive(Debug, Deserialize)]
struct LoginQuery {
    next: Option<String>,
}

/// GET /users/login/
async fn login_form(Query(query): Query<LoginQuery>) -> Json<FormContext> {
    Json(FormContext {
        form: "login",
        fields: vec!["username", "password", "next"],
        next: query.next.filter(|next| is_local_path(next)),
    })
}

/// POST /users/login/ (urlencoded `username`, `password`, `next`)
async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    Form(form): Form<LoginForm>,
) -> Result<Response, AppError> {
    let _timer = HTTP_REQUEST_DURATION_SECONDS
        .with_label_values(&["POST", "/users/login/"])
        .start_timer();

    let token = build_user_service(&state)
        .login(&form.username, &form.password)
        .await?;

    let cookie = session_cookie(token, state.config.should_use_secure_cookies());
    let target = form.redirect_target();

    HTTP_REQUESTS_TOTAL
        .with_label_values(&["POST", "/users/login/", "303"])
        .inc();

    Ok((jar.add(cookie), Redirect::to(&target)).into_response())
}

/// GET|POST /users/logout/
async fn logout(
    State(state): State<AppState>,
    CurrentUser(viewer): CurrentUser,
    jar: CookieJar,
) -> Result<Response, AppError> {
    build_user_service(&state).logout(&viewer).await?;
    Ok((jar.remove(clear_session_cookie()), Redirect::to(LOGIN_URL)).into_response())
}

/// GET /users/signup/
async fn signup_form() -> Json<FormContext> {
    Json(FormContext {
        form: "signup",
        fields: vec![
            "username",
            "password",
            "password_confirmation",
            "first_name",
            "last_name",
            "email",
        ],
        next: None,
    })
}

/// POST /users/signup/ (urlencoded)
async fn signup(
    State(state): State<AppState>,
    Form(form): Form<SignupForm>,
) -> Result<Response, AppError> {
    let _timer = HTTP_REQUEST_DURATION_SECONDS
        .with_label_values(&["POST", "/users/signup/"])
        .start_timer();

    let new_user = form.into_valid().map_err(AppError::Form)?;
    build_user_service(&state).signup(new_user).await?;

    HTTP_REQUESTS_TOTAL
        .with_label_values(&["POST", "/users/signup/", "303"])
        .inc();

    Ok(Redirect::to(LOGIN_URL).into_response())
}

/// GET /users/me/profile/
async fn update_profile_form(
    State(state): State<AppState>,
    CurrentUser(viewer): CurrentUser,
) -> Result<Json<ViewerContext>, AppError> {
    let profile = build_user_service(&state).get_profile(&viewer.user).await?;

    Ok(Json(ViewerContext {
        user: UserResponse::from(&viewer.user),
        profile: ProfileResponse::new(&profile, &state.storage),
    }))
}

/// POST /users/me/profile/ (multipart `website`, `biography`,
/// `phone_number`, `picture`)
///
/// Only ever touches the session user's own profile.
async fn update_profile(
    State(state): State<AppState>,
    CurrentUser(viewer): CurrentUser,
    multipart: Multipart,
) -> Result<Response, AppError> {
    let mut upload = UploadForm::read(multipart, state.config.media.max_upload_bytes).await?;
    let form = ProfileForm {
        website: upload.text("website"),
        biography: upload.text("biography"),
        phone_number: upload.text("phone_number"),
    };
    let picture = upload.image("picture").await?;
    let changes = form.into_valid(picture).map_err(AppError::Form)?;

    build_user_service(&state)
        .update_profile(&viewer, changes)
        .await?;

    let target = format!("/users/{}/", urlencoding::encode(&viewer.user.username));
    Ok(Redirect::to(&target).into_response())
}

/// GET /users/:username/
async fn get_user_detail(
    State(state): State<AppState>,
    CurrentUser(_viewer): CurrentUser,
    Path(username): Path<String>,
) -> Result<Json<UserDetailResponse>, AppError> {
    let detail = build_user_service(&state)
        .get_user_detail(&username)
        .await?;
    Ok(Json(UserDetailResponse::new(&detail, &state.storage)))
}
