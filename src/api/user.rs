//! Greeting and current-user endpoints

use axum::{
    Json, Router,
    response::{IntoResponse, Response},
    routing::get,
};

use super::dto::IdentityResponse;
use crate::AppState;
use crate::auth::MaybeUser;

/// Create user router
///
/// Routes:
/// - GET / - Greeting
/// - GET /getuser - Signed-in identity, or an empty body
pub fn user_router() -> Router<AppState> {
    Router::new()
        .route("/", get(hello))
        .route("/getuser", get(get_user))
}

async fn hello() -> &'static str {
    "Hello World"
}

/// GET /getuser
///
/// Anonymous callers get a 200 with an empty body, not an error.
async fn get_user(MaybeUser(identity): MaybeUser) -> Response {
    match identity {
        Some(identity) => Json(IdentityResponse::from(identity)).into_response(),
        None => ().into_response(),
    }
}
