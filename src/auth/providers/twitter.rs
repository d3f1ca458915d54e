//! OAuth 1.0a three-legged flow (Twitter)
//!
//! 1. POST request_token (signed with consumer secret) → temporary token
//! 2. Redirect to authenticate?oauth_token=...
//! 3. POST access_token with the verifier (signed with the temporary secret)
//!    → `user_id` and `screen_name`

use axum::async_trait;
use base64::{Engine as _, engine::general_purpose::STANDARD};
use chrono::Utc;
use hmac::{Hmac, Mac};
use reqwest::header::AUTHORIZATION;
use sha1::Sha1;
use std::collections::HashMap;
use url::form_urlencoded;

use super::{CallbackParams, HandshakeStart, IdentityProvider, random_token};
use crate::auth::adapter::ProviderProfile;
use crate::config::TwitterClientConfig;
use crate::data::Provider;
use crate::error::AppError;

const REQUEST_TOKEN_URL: &str = "https://api.twitter.com/oauth/request_token";
const AUTHENTICATE_URL: &str = "https://api.twitter.com/oauth/authenticate";
const ACCESS_TOKEN_URL: &str = "https://api.twitter.com/oauth/access_token";

/// RFC 3986 percent-encoding as required by OAuth 1.0a
fn percent_encode(value: &str) -> String {
    urlencoding::encode(value).into_owned()
}

/// `METHOD&url&sorted-params`, each part percent-encoded
fn signature_base_string(method: &str, url: &str, params: &[(String, String)]) -> String {
    let mut encoded: Vec<(String, String)> = params
        .iter()
        .map(|(key, value)| (percent_encode(key), percent_encode(value)))
        .collect();
    encoded.sort();

    let parameter_string = encoded
        .iter()
        .map(|(key, value)| format!("{key}={value}"))
        .collect::<Vec<_>>()
        .join("&");

    format!(
        "{}&{}&{}",
        method.to_ascii_uppercase(),
        percent_encode(url),
        percent_encode(&parameter_string)
    )
}

fn hmac_sha1_base64(key: &str, data: &str) -> Result<String, AppError> {
    let mut mac = Hmac::<Sha1>::new_from_slice(key.as_bytes())
        .map_err(|e| AppError::Encryption(e.to_string()))?;
    mac.update(data.as_bytes());
    Ok(STANDARD.encode(mac.finalize().into_bytes()))
}

fn parse_form(body: &str) -> HashMap<String, String> {
    form_urlencoded::parse(body.as_bytes())
        .into_owned()
        .collect()
}

/// Temporary credentials carried between the two legs
#[derive(Debug, PartialEq, Eq)]
struct RequestToken {
    token: String,
    secret: String,
}

impl RequestToken {
    fn encode(&self) -> String {
        form_urlencoded::Serializer::new(String::new())
            .append_pair("oauth_token", &self.token)
            .append_pair("oauth_token_secret", &self.secret)
            .finish()
    }

    fn decode(pending: &str) -> Result<Self, AppError> {
        let mut fields = parse_form(pending);
        match (
            fields.remove("oauth_token"),
            fields.remove("oauth_token_secret"),
        ) {
            (Some(token), Some(secret)) => Ok(Self { token, secret }),
            _ => Err(AppError::Unauthorized),
        }
    }
}

pub struct TwitterProvider {
    consumer_key: String,
    consumer_secret: String,
    http: reqwest::Client,
}

impl TwitterProvider {
    pub fn new(credentials: &TwitterClientConfig, http: reqwest::Client) -> Self {
        Self {
            consumer_key: credentials.consumer_key.clone(),
            consumer_secret: credentials.consumer_secret.clone(),
            http,
        }
    }

    /// Build the `Authorization: OAuth ...` header for a body-less request
    fn authorization_header(
        &self,
        method: &str,
        url: &str,
        token: Option<&RequestToken>,
        extra: &[(&str, &str)],
        nonce: &str,
        timestamp: i64,
    ) -> Result<String, AppError> {
        let mut params: Vec<(String, String)> = vec![
            ("oauth_consumer_key".to_string(), self.consumer_key.clone()),
            ("oauth_nonce".to_string(), nonce.to_string()),
            ("oauth_signature_method".to_string(), "HMAC-SHA1".to_string()),
            ("oauth_timestamp".to_string(), timestamp.to_string()),
            ("oauth_version".to_string(), "1.0".to_string()),
        ];
        if let Some(token) = token {
            params.push(("oauth_token".to_string(), token.token.clone()));
        }
        params.extend(
            extra
                .iter()
                .map(|(key, value)| (key.to_string(), value.to_string())),
        );

        let base = signature_base_string(method, url, &params);
        let signing_key = format!(
            "{}&{}",
            percent_encode(&self.consumer_secret),
            percent_encode(token.map(|t| t.secret.as_str()).unwrap_or(""))
        );
        params.push(("oauth_signature".to_string(), hmac_sha1_base64(&signing_key, &base)?));
        params.sort();

        let header = params
            .iter()
            .map(|(key, value)| format!("{}=\"{}\"", percent_encode(key), percent_encode(value)))
            .collect::<Vec<_>>()
            .join(", ");

        Ok(format!("OAuth {header}"))
    }

    async fn signed_post(
        &self,
        url: &str,
        token: Option<&RequestToken>,
        extra: &[(&str, &str)],
    ) -> Result<HashMap<String, String>, AppError> {
        let header = self.authorization_header(
            "POST",
            url,
            token,
            extra,
            &random_token(24),
            Utc::now().timestamp(),
        )?;

        let body = self
            .http
            .post(url)
            .header(AUTHORIZATION, header)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;

        Ok(parse_form(&body))
    }
}

#[async_trait]
impl IdentityProvider for TwitterProvider {
    fn provider(&self) -> Provider {
        Provider::Twitter
    }

    async fn begin(&self, callback_url: &str) -> Result<HandshakeStart, AppError> {
        let mut response = self
            .signed_post(REQUEST_TOKEN_URL, None, &[("oauth_callback", callback_url)])
            .await?;

        if response.get("oauth_callback_confirmed").map(String::as_str) != Some("true") {
            return Err(AppError::Provider(
                "twitter did not confirm the callback URL".to_string(),
            ));
        }

        let request_token = match (
            response.remove("oauth_token"),
            response.remove("oauth_token_secret"),
        ) {
            (Some(token), Some(secret)) => RequestToken { token, secret },
            _ => {
                return Err(AppError::Provider(
                    "twitter request token response was incomplete".to_string(),
                ));
            }
        };

        let location = format!(
            "{}?oauth_token={}",
            AUTHENTICATE_URL,
            percent_encode(&request_token.token)
        );

        Ok(HandshakeStart {
            location,
            pending: request_token.encode(),
        })
    }

    async fn complete(
        &self,
        _callback_url: &str,
        pending: &str,
        params: &CallbackParams,
    ) -> Result<ProviderProfile, AppError> {
        if params.denied.is_some() {
            return Err(AppError::Provider("twitter sign-in was denied".to_string()));
        }

        let request_token = RequestToken::decode(pending)?;
        if params.oauth_token.as_deref() != Some(request_token.token.as_str()) {
            return Err(AppError::Unauthorized);
        }

        let verifier = params
            .oauth_verifier
            .as_deref()
            .filter(|verifier| !verifier.is_empty())
            .ok_or_else(|| AppError::Validation("missing oauth_verifier".to_string()))?;

        let mut response = self
            .signed_post(
                ACCESS_TOKEN_URL,
                Some(&request_token),
                &[("oauth_verifier", verifier)],
            )
            .await?;

        match (response.remove("user_id"), response.remove("screen_name")) {
            (Some(id), Some(username)) => Ok(ProviderProfile::Twitter { id, username }),
            _ => Err(AppError::Provider(
                "twitter access token response had no user".to_string(),
            )),
        }
    }
}
