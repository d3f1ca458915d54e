//! OAuth 2.0 authorization code flow (Google, GitHub)

use axum::async_trait;
use reqwest::header::ACCEPT;
use serde::Deserialize;
use url::Url;

use super::{CallbackParams, HandshakeStart, IdentityProvider, random_token};
use crate::auth::adapter::ProviderProfile;
use crate::config::OAuthClientConfig;
use crate::data::Provider;
use crate::error::AppError;

const STATE_BYTES: usize = 24;

/// Provider endpoints and requested scope
#[derive(Debug, Clone)]
pub struct OAuth2Endpoints {
    pub authorize_url: String,
    pub token_url: String,
    pub userinfo_url: String,
    pub scope: String,
}

impl OAuth2Endpoints {
    pub fn google() -> Self {
        Self {
            authorize_url: "https://accounts.google.com/o/oauth2/v2/auth".to_string(),
            token_url: "https://oauth2.googleapis.com/token".to_string(),
            userinfo_url: "https://www.googleapis.com/oauth2/v3/userinfo".to_string(),
            scope: "profile".to_string(),
        }
    }

    pub fn github() -> Self {
        Self {
            authorize_url: "https://github.com/login/oauth/authorize".to_string(),
            token_url: "https://github.com/login/oauth/access_token".to_string(),
            userinfo_url: "https://api.github.com/user".to_string(),
            scope: "read:user".to_string(),
        }
    }
}

/// Token endpoint response
///
/// GitHub reports failures with a 200 and an `error` field.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    error: Option<String>,
    error_description: Option<String>,
}

/// Google userinfo
#[derive(Debug, Deserialize)]
struct GoogleUserInfo {
    sub: String,
    given_name: Option<String>,
    name: Option<String>,
}

/// GitHub user info
#[derive(Debug, Deserialize)]
struct GitHubUser {
    id: u64,
    login: String,
}

pub struct OAuth2Provider {
    provider: Provider,
    client_id: String,
    client_secret: String,
    endpoints: OAuth2Endpoints,
    http: reqwest::Client,
}

impl OAuth2Provider {
    pub fn new(
        provider: Provider,
        credentials: &OAuthClientConfig,
        endpoints: OAuth2Endpoints,
        http: reqwest::Client,
    ) -> Self {
        Self {
            provider,
            client_id: credentials.client_id.clone(),
            client_secret: credentials.client_secret.clone(),
            endpoints,
            http,
        }
    }

    pub fn google(credentials: &OAuthClientConfig, http: reqwest::Client) -> Self {
        Self::new(Provider::Google, credentials, OAuth2Endpoints::google(), http)
    }

    pub fn github(credentials: &OAuthClientConfig, http: reqwest::Client) -> Self {
        Self::new(Provider::GitHub, credentials, OAuth2Endpoints::github(), http)
    }

    fn authorize_location(&self, callback_url: &str, state: &str) -> Result<String, AppError> {
        let url = Url::parse_with_params(
            &self.endpoints.authorize_url,
            &[
                ("response_type", "code"),
                ("client_id", self.client_id.as_str()),
                ("redirect_uri", callback_url),
                ("scope", self.endpoints.scope.as_str()),
                ("state", state),
            ],
        )
        .map_err(|e| AppError::Config(format!("invalid {} authorize URL: {e}", self.provider)))?;

        Ok(url.to_string())
    }

    async fn exchange_code(&self, callback_url: &str, code: &str) -> Result<String, AppError> {
        let response: TokenResponse = self
            .http
            .post(&self.endpoints.token_url)
            .header(ACCEPT, "application/json")
            .form(&[
                ("grant_type", "authorization_code"),
                ("code", code),
                ("redirect_uri", callback_url),
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
            ])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        if let Some(error) = response.error {
            return Err(AppError::Provider(format!(
                "{} token exchange failed: {} {}",
                self.provider,
                error,
                response.error_description.unwrap_or_default()
            )));
        }

        response.access_token.ok_or_else(|| {
            AppError::Provider(format!("{} token response had no access_token", self.provider))
        })
    }

    async fn fetch_profile(&self, access_token: &str) -> Result<ProviderProfile, AppError> {
        let request = self
            .http
            .get(&self.endpoints.userinfo_url)
            .bearer_auth(access_token)
            .header(ACCEPT, "application/json");

        let profile = match self.provider {
            Provider::Google => {
                let info: GoogleUserInfo =
                    request.send().await?.error_for_status()?.json().await?;
                ProviderProfile::Google {
                    id: info.sub,
                    given_name: info.given_name,
                    name: info.name,
                }
            }
            Provider::GitHub => {
                let user: GitHubUser = request.send().await?.error_for_status()?.json().await?;
                ProviderProfile::GitHub {
                    id: user.id.to_string(),
                    username: user.login,
                }
            }
            Provider::Twitter => {
                return Err(AppError::Internal(anyhow::anyhow!(
                    "twitter does not use the OAuth2 client"
                )));
            }
        };

        Ok(profile)
    }
}

#[async_trait]
impl IdentityProvider for OAuth2Provider {
    fn provider(&self) -> Provider {
        self.provider
    }

    async fn begin(&self, callback_url: &str) -> Result<HandshakeStart, AppError> {
        let state = random_token(STATE_BYTES);
        let location = self.authorize_location(callback_url, &state)?;

        Ok(HandshakeStart {
            location,
            pending: state,
        })
    }

    async fn complete(
        &self,
        callback_url: &str,
        pending: &str,
        params: &CallbackParams,
    ) -> Result<ProviderProfile, AppError> {
        if let Some(error) = &params.error {
            return Err(AppError::Provider(format!(
                "{} returned {}: {}",
                self.provider,
                error,
                params.error_description.as_deref().unwrap_or("no description")
            )));
        }

        if params.state.as_deref() != Some(pending) {
            return Err(AppError::Unauthorized);
        }

        let code = params
            .code
            .as_deref()
            .filter(|code| !code.is_empty())
            .ok_or_else(|| AppError::Validation("missing authorization code".to_string()))?;

        let access_token = self.exchange_code(callback_url, code).await?;
        self.fetch_profile(&access_token).await
    }
}
