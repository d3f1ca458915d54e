//! Identity provider handshakes
//!
//! The OAuth dance itself sits behind [`IdentityProvider`]; the routes only
//! ever see a redirect location, an opaque pending value to carry across the
//! round trip, and finally a [`ProviderProfile`].

mod oauth2;
mod twitter;

use std::collections::HashMap;
use std::sync::Arc;

use axum::async_trait;
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use rand::RngCore;
use serde::Deserialize;

pub use oauth2::{OAuth2Endpoints, OAuth2Provider};
pub use twitter::TwitterProvider;

use super::adapter::ProviderProfile;
use crate::config::ProvidersConfig;
use crate::data::Provider;
use crate::error::AppError;

/// First leg of a handshake
#[derive(Debug, Clone)]
pub struct HandshakeStart {
    /// Where to send the user agent
    pub location: String,
    /// State to hand back to [`IdentityProvider::complete`]
    pub pending: String,
}

/// Query parameters a provider may append to the callback URL
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CallbackParams {
    /// OAuth2 authorization code
    pub code: Option<String>,
    /// OAuth2 CSRF state
    pub state: Option<String>,
    /// OAuth1 request token
    pub oauth_token: Option<String>,
    /// OAuth1 verifier
    pub oauth_verifier: Option<String>,
    /// OAuth2 error code (e.g. `access_denied`)
    pub error: Option<String>,
    pub error_description: Option<String>,
    /// OAuth1 denial marker
    pub denied: Option<String>,
}

/// An external identity provider
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    fn provider(&self) -> Provider;

    /// Start a handshake whose callback lands on `callback_url`
    async fn begin(&self, callback_url: &str) -> Result<HandshakeStart, AppError>;

    /// Finish the handshake and fetch the user's profile
    ///
    /// `pending` is the value returned by [`IdentityProvider::begin`] for this
    /// user agent.
    async fn complete(
        &self,
        callback_url: &str,
        pending: &str,
        params: &CallbackParams,
    ) -> Result<ProviderProfile, AppError>;
}

/// Enabled providers
#[derive(Clone, Default)]
pub struct ProviderRegistry {
    providers: HashMap<Provider, Arc<dyn IdentityProvider>>,
}

impl ProviderRegistry {
    /// Enable every provider whose credentials are configured
    pub fn from_config(config: &ProvidersConfig, http: &reqwest::Client) -> Self {
        let mut registry = Self::default();

        if let Some(google) = &config.google {
            registry = registry.with_provider(Arc::new(OAuth2Provider::google(google, http.clone())));
        }
        if let Some(twitter) = &config.twitter {
            registry = registry.with_provider(Arc::new(TwitterProvider::new(twitter, http.clone())));
        }
        if let Some(github) = &config.github {
            registry = registry.with_provider(Arc::new(OAuth2Provider::github(github, http.clone())));
        }

        for provider in Provider::ALL {
            if !registry.providers.contains_key(&provider) {
                tracing::warn!(%provider, "Provider not configured; its routes will return 404");
            }
        }

        registry
    }

    /// Register (or replace) a provider
    pub fn with_provider(mut self, provider: Arc<dyn IdentityProvider>) -> Self {
        self.providers.insert(provider.provider(), provider);
        self
    }

    pub fn get(&self, provider: Provider) -> Option<Arc<dyn IdentityProvider>> {
        self.providers.get(&provider).cloned()
    }

    /// Enabled providers in display order
    pub fn configured(&self) -> Vec<Provider> {
        Provider::ALL
            .into_iter()
            .filter(|provider| self.providers.contains_key(provider))
            .collect()
    }
}

/// Random URL-safe value for CSRF state and nonces
pub(crate) fn random_token(bytes: usize) -> String {
    let mut buf = vec![0u8; bytes];
    rand::thread_rng().fill_bytes(&mut buf);
    URL_SAFE_NO_PAD.encode(buf)
}
