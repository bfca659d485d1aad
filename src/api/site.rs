//! Site endpoints
//!
//! Small public pages that need neither a session nor the database.

use axum::{
    Router,
    extract::{Path, Query},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::get,
};
use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::metrics::{HTTP_REQUEST_DURATION_SECONDS, HTTP_REQUESTS_TOTAL};

/// Youngest age let in by `/hi/`
const MIN_AGE: u64 = 12;

/// Create site router
pub fn site_router<S>() -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    Router::new()
        .route("/hello-world/", get(hello_world))
        .route("/sorted/", get(sort_integers))
        .route("/hi/:name/:age/", get(say_hi))
}

/// GET /hello-world/
async fn hello_world() -> String {
    let now = chrono::Local::now();
    format!(
        "Oh, hi! Current server time is {}",
        now.format("%b %dth, %Y - %H:%M hrs")
    )
}

#[derive(Debug, Deserialize)]
struct SortQuery {
    numbers: Option<String>,
}

#[derive(Debug, Serialize)]
struct SortResponse {
    status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    numbers: Option<Vec<i64>>,
    message: String,
}

/// Parse a comma separated list of integers and sort it ascending
///
/// Every token must be an integer; nothing is silently dropped.
pub fn parse_sorted(raw: &str) -> Result<Vec<i64>, String> {
    let mut numbers = raw
        .split(',')
        .map(|token| {
            let token = token.trim();
            token
                .parse::<i64>()
                .map_err(|_| format!("'{}' is not an integer", token))
        })
        .collect::<Result<Vec<_>, _>>()?;
    numbers.sort_unstable();
    Ok(numbers)
}

/// Serialize with a 4-space indent
fn to_pretty_json<T: Serialize>(value: &T) -> Result<String, AppError> {
    let mut out = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut serializer = serde_json::Serializer::with_formatter(&mut out, formatter);
    value
        .serialize(&mut serializer)
        .map_err(|e| AppError::Internal(e.into()))?;
    String::from_utf8(out).map_err(|e| AppError::Internal(e.into()))
}

/// GET /sorted/?numbers=3,1,2
async fn sort_integers(Query(query): Query<SortQuery>) -> Result<Response, AppError> {
    let _timer = HTTP_REQUEST_DURATION_SECONDS
        .with_label_values(&["GET", "/sorted/"])
        .start_timer();

    let result = match query.numbers.as_deref() {
        None => Err("Missing 'numbers' parameter".to_string()),
        Some(raw) => parse_sorted(raw),
    };

    let (status, body) = match result {
        Ok(numbers) => (
            StatusCode::OK,
            SortResponse {
                status: "ok",
                numbers: Some(numbers),
                message: "Integers sorted successfully".to_string(),
            },
        ),
        Err(message) => (
            StatusCode::BAD_REQUEST,
            SortResponse {
                status: "error",
                numbers: None,
                message,
            },
        ),
    };

    HTTP_REQUESTS_TOTAL
        .with_label_values(&["GET", "/sorted/", status.as_str()])
        .inc();

    Ok((
        status,
        [(header::CONTENT_TYPE, "application/json")],
        to_pretty_json(&body)?,
    )
        .into_response())
}

/// Greeting for `/hi/<name>/<age>/`
pub fn greeting(name: &str, age: u64) -> String {
    if age < MIN_AGE {
        format!("Sorry {}, you are not allowed to be here", name)
    } else {
        format!("Welcome {}", name)
    }
}

/// GET /hi/:name/:age/
///
/// An age that is not a non-negative integer does not match the route.
async fn say_hi(Path((name, age)): Path<(String, String)>) -> Result<String, AppError> {
    if age.is_empty() || !age.bytes().all(|b| b.is_ascii_digit()) {
        return Err(AppError::NotFound);
    }
    let age = age.parse::<u64>().map_err(|_| AppError::NotFound)?;
    Ok(greeting(&name, age))
}
