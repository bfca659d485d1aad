//! API layer
//!
//! HTTP handlers for:
//! - Site pages (greetings, integer sorting)
//! - Posts (feed, detail, create)
//! - Users (auth, signup, profile)
//! - Metrics (Prometheus)

mod dto;
pub mod metrics;
mod posts;
mod site;
mod upload;
mod users;

pub use dto::*;

pub use metrics::metrics_router;
pub use posts::posts_router;
pub use site::{greeting, parse_sorted, site_router};
pub use users::users_router;
