//! Provider sign-in flow
//!
//! Routes:
//! - GET /login - Login page (also the failure destination)
//! - GET /auth/{provider} - Redirect to the provider
//! - GET /auth/{provider}/callback - Complete the handshake, start a session
//! - GET /auth/logout - End the session

use axum::{
    Router,
    extract::{Query, State, rejection::QueryRejection},
    http::HeaderMap,
    response::{Html, IntoResponse, Redirect, Response},
    routing::get,
};
use axum_extra::extract::CookieJar;
use axum_extra::extract::cookie::{Cookie, SameSite};
use chrono::Utc;

use super::adapter;
use super::middleware::{SESSION_COOKIE, extract_token_from_headers};
use super::providers::{CallbackParams, IdentityProvider};
use super::session::{sign_value, verify_signed_value};
use crate::AppState;
use crate::data::{Identity, Provider};
use crate::error::AppError;
use crate::metrics::{LOGINS_TOTAL, LOGOUTS_TOTAL};

const PENDING_COOKIE_PREFIX: &str = "oauth_pending_";
const PENDING_COOKIE_PATH: &str = "/auth";
const PENDING_MAX_AGE_SECONDS: i64 = 600;

/// Create authentication router
pub fn auth_router() -> Router<AppState> {
    let mut router = Router::new()
        .route("/login", get(login_page))
        .route("/auth/logout", get(logout));

    for provider in Provider::ALL {
        router = router
            .route(
                &format!("/auth/{provider}"),
                get(move |State(state): State<AppState>, jar: CookieJar| {
                    begin_handshake(provider, state, jar)
                }),
            )
            .route(
                &format!("/auth/{provider}/callback"),
                get(
                    move |State(state): State<AppState>,
                          params: Result<Query<CallbackParams>, QueryRejection>,
                          jar: CookieJar| {
                        provider_callback(provider, state, params.map(|Query(p)| p), jar)
                    },
                ),
            );
    }

    router
}

// =============================================================================
// Login Page
// =============================================================================

/// GET /login
///
/// Lists the configured providers.
async fn login_page(State(state): State<AppState>) -> impl IntoResponse {
    let links = state
        .providers
        .configured()
        .into_iter()
        .map(|provider| {
            format!(
                r#"<li><a href="/auth/{}">Sign in with {}</a></li>"#,
                provider,
                provider.label()
            )
        })
        .collect::<Vec<_>>()
        .join("\n");

    Html(format!(
        r#"<!DOCTYPE html>
<html>
<head><title>Sign in</title></head>
<body>
    <h1>Sign in</h1>
    <ul>
{links}
    </ul>
</body>
</html>
"#
    ))
}

// =============================================================================
// Handshake
// =============================================================================

/// GET /auth/{provider}
///
/// # Steps
/// 1. Ask the provider for an authorization location
/// 2. Store the pending handshake state in a signed cookie
/// 3. Redirect to the provider
async fn begin_handshake(provider: Provider, state: AppState, jar: CookieJar) -> Response {
    let Some(client) = state.providers.get(provider) else {
        return AppError::NotFound.into_response();
    };

    let started = async {
        let start = client.begin(&state.config.callback_url(provider)).await?;
        let cookie_value = sign_value(
            &format!("{}.{}.{}", provider, Utc::now().timestamp(), start.pending),
            &state.config.auth.session_secret,
        )?;
        Ok::<_, AppError>((start.location, cookie_value))
    }
    .await;

    match started {
        Ok((location, cookie_value)) => {
            tracing::debug!(%provider, "Redirecting to identity provider");
            let cookie =
                build_pending_cookie(provider, cookie_value, state.config.should_use_secure_cookies());
            (jar.add(cookie), Redirect::to(&location)).into_response()
        }
        Err(error) => {
            tracing::error!(%provider, %error, "Failed to start provider handshake");
            LOGINS_TOTAL
                .with_label_values(&[provider.as_str(), "failure"])
                .inc();
            Redirect::to(&state.config.auth.failure_redirect).into_response()
        }
    }
}

/// GET /auth/{provider}/callback
///
/// # Steps
/// 1. Verify the pending handshake cookie and parse the query
/// 2. Let the provider complete the handshake and report a profile
/// 3. Resolve the profile to an identity record
/// 4. Create session and set cookie
/// 5. Redirect to the client origin, or to the failure page on any error
async fn provider_callback(
    provider: Provider,
    state: AppState,
    params: Result<CallbackParams, QueryRejection>,
    jar: CookieJar,
) -> Response {
    let Some(client) = state.providers.get(provider) else {
        return AppError::NotFound.into_response();
    };

    let outcome = complete_login(&state, client.as_ref(), params, &jar).await;
    let jar = jar.remove(clear_pending_cookie(provider));

    match outcome {
        Ok((identity, token)) => {
            LOGINS_TOTAL
                .with_label_values(&[provider.as_str(), "success"])
                .inc();
            tracing::info!(
                %provider,
                identity_id = %identity.id,
                "Login succeeded"
            );

            let cookie = build_session_cookie(token, state.config.should_use_secure_cookies());
            (jar.add(cookie), Redirect::to(&state.config.auth.client_origin)).into_response()
        }
        Err(error) => {
            LOGINS_TOTAL
                .with_label_values(&[provider.as_str(), "failure"])
                .inc();
            match &error {
                AppError::Database(_) | AppError::Internal(_) | AppError::Encryption(_) => {
                    tracing::error!(%provider, %error, kind = error.kind(), "Login failed");
                }
                _ => {
                    tracing::warn!(%provider, %error, kind = error.kind(), "Login failed");
                }
            }

            (jar, Redirect::to(&state.config.auth.failure_redirect)).into_response()
        }
    }
}

async fn complete_login(
    state: &AppState,
    client: &dyn IdentityProvider,
    params: Result<CallbackParams, QueryRejection>,
    jar: &CookieJar,
) -> Result<(Identity, String), AppError> {
    let provider = client.provider();
    let pending = read_pending_cookie(provider, jar, &state.config.auth.session_secret)?;
    let params = params.map_err(|rejection| AppError::Validation(rejection.body_text()))?;

    let profile = client
        .complete(&state.config.callback_url(provider), &pending, &params)
        .await?;
    let identity = adapter::handle_callback(&state.resolver, &profile).await?;
    let token = state.sessions.on_login_success(&identity).await?;

    Ok((identity, token))
}

// =============================================================================
// Logout
// =============================================================================

/// GET /auth/logout
///
/// Always answers 200 and clears the cookie; the body says whether there was
/// a session to end.
async fn logout(
    State(state): State<AppState>,
    headers: HeaderMap,
    jar: CookieJar,
) -> Result<impl IntoResponse, AppError> {
    let invalidated = match extract_token_from_headers(&headers) {
        Some(token) => state.sessions.logout(&token).await?,
        None => false,
    };

    let outcome = if invalidated { "done" } else { "no_session" };
    LOGOUTS_TOTAL.with_label_values(&[outcome]).inc();

    let body = if invalidated {
        "done"
    } else {
        "no active session"
    };

    Ok((jar.remove(clear_session_cookie()), body))
}

// =============================================================================
// Cookies
// =============================================================================

fn pending_cookie_name(provider: Provider) -> String {
    format!("{PENDING_COOKIE_PREFIX}{provider}")
}

fn build_pending_cookie(provider: Provider, value: String, secure: bool) -> Cookie<'static> {
    Cookie::build((pending_cookie_name(provider), value))
        .path(PENDING_COOKIE_PATH)
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Lax)
        .build()
}

fn clear_pending_cookie(provider: Provider) -> Cookie<'static> {
    let mut cookie = Cookie::build((pending_cookie_name(provider), ""))
        .path(PENDING_COOKIE_PATH)
        .http_only(true)
        .build();
    cookie.make_removal();
    cookie
}

/// Verify the pending cookie and return the provider's pending state
///
/// The signed value is `{provider}.{issued_at}.{pending}`.
fn read_pending_cookie(
    provider: Provider,
    jar: &CookieJar,
    secret: &str,
) -> Result<String, AppError> {
    let signed = jar
        .get(&pending_cookie_name(provider))
        .map(|cookie| cookie.value().to_owned())
        .ok_or(AppError::Unauthorized)?;
    let value = verify_signed_value(&signed, secret)?;

    let rest = value
        .strip_prefix(provider.as_str())
        .and_then(|rest| rest.strip_prefix('.'))
        .ok_or(AppError::Unauthorized)?;
    let (issued_at, pending) = rest.split_once('.').ok_or(AppError::Unauthorized)?;
    let issued_at: i64 = issued_at.parse().map_err(|_| AppError::Unauthorized)?;
    if Utc::now().timestamp() - issued_at > PENDING_MAX_AGE_SECONDS {
        return Err(AppError::Unauthorized);
    }

    Ok(pending.to_string())
}

fn build_session_cookie(token: String, secure: bool) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, token))
        .path("/")
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Lax)
        .build()
}

fn clear_session_cookie() -> Cookie<'static> {
    let mut cookie = Cookie::build((SESSION_COOKIE, "")).path("/").http_only(true).build();
    cookie.make_removal();
    cookie
}
