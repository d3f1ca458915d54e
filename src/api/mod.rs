//! API layer
//!
//! HTTP handlers for:
//! - Greeting and current user
//! - Metrics (Prometheus)

mod dto;
pub mod metrics;
mod user;

pub use dto::*;

pub use metrics::metrics_router;
pub use user::user_router;
