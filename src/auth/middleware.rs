//! Authentication middleware
//!
//! Protects routes that require a logged-in user.

use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts, OriginalUri, State},
    http::{HeaderMap, Request, request::Parts},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::CookieJar;
use chrono::Utc;

use super::session::{SESSION_COOKIE, Session, verify_session_token};
use crate::AppState;
use crate::data::User;
use crate::error::{AppError, LOGIN_URL};

/// The authenticated request's session together with its user
#[derive(Debug, Clone)]
pub struct Viewer {
    pub session: Session,
    pub user: User,
}

fn extract_token_from_headers(headers: &HeaderMap) -> Option<String> {
    headers
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(ToOwned::to_owned)
        .or_else(|| {
            let jar = CookieJar::from_headers(headers);
            jar.get(SESSION_COOKIE)
                .map(|cookie| cookie.value().to_owned())
        })
}

/// Resolve a token to a live session
///
/// The signature must verify and the backing sessions row must still
/// exist, so a logged-out token is rejected even before it expires.
async fn authenticate_token(token: &str, state: &AppState) -> Result<Viewer, AppError> {
    let session = verify_session_token(token, &state.config.auth.session_secret)?;

    let record = state
        .db
        .get_active_session(&session.session_id, Utc::now())
        .await?
        .ok_or(AppError::Unauthorized)?;
    if record.user_id != session.user_id {
        return Err(AppError::Unauthorized);
    }

    let user = state
        .db
        .get_user(&record.user_id)
        .await?
        .ok_or(AppError::Unauthorized)?;

    Ok(Viewer { session, user })
}

/// Redirect to the login page, remembering where to come back to
pub fn login_redirect(path: &str) -> Response {
    let target = format!("{}?next={}", LOGIN_URL, urlencoding::encode(path));
    Redirect::to(&target).into_response()
}

/// Middleware to require authentication
///
/// Extracts and verifies the session from the cookie or Authorization
/// header and adds the [`Viewer`] to request extensions. Anonymous
/// requests are redirected to the login page with `next` set.
///
/// # Usage
/// ```ignore
/// let protected_routes = Router::new()
///     .route("/posts/new/", ...)
///     .route_layer(middleware::from_fn_with_state(state, require_auth));
/// ```
pub async fn require_auth(
    State(state): State<AppState>,
    mut request: Request<axum::body::Body>,
    next: Next,
) -> Response {
    let viewer = match extract_token_from_headers(request.headers()) {
        Some(token) => authenticate_token(&token, &state).await,
        None => Err(AppError::Unauthorized),
    };

    match viewer {
        Ok(viewer) => {
            request.extensions_mut().insert(viewer);
            next.run(request).await
        }
        Err(AppError::Unauthorized) => {
            // Nested routers see a stripped URI
            let uri = request
                .extensions()
                .get::<OriginalUri>()
                .map(|original| original.0.clone())
                .unwrap_or_else(|| request.uri().clone());
            let path = uri
                .path_and_query()
                .map(|pq| pq.as_str().to_string())
                .unwrap_or_else(|| "/".to_string());
            tracing::debug!(%path, "Anonymous request to protected route");
            login_redirect(&path)
        }
        Err(error) => error.into_response(),
    }
}

/// Extractor for the current authenticated user
///
/// # Usage
/// ```ignore
/// async fn handler(
///     CurrentUser(viewer): CurrentUser,
/// ) -> impl IntoResponse {
///     format!("Hello, {}", viewer.user.username)
/// }
/// ```
#[derive(Debug, Clone)]
pub struct CurrentUser(pub Viewer);

#[async_trait]
impl<S> FromRequestParts<S> for CurrentUser
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        if let Some(viewer) = parts.extensions.get::<Viewer>().cloned() {
            return Ok(CurrentUser(viewer));
        }

        let state = AppState::from_ref(state);
        let token = extract_token_from_headers(&parts.headers).ok_or(AppError::Unauthorized)?;
        let viewer = authenticate_token(&token, &state).await?;
        parts.extensions.insert(viewer.clone());

        Ok(CurrentUser(viewer))
    }
}
