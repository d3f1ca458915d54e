//! Provider profile normalization
//!
//! Each provider reports its user in its own shape. The adapter reduces that
//! to an external id plus a display name and hands it to the resolver.

use crate::data::{Identity, Provider};
use crate::error::AppError;
use crate::service::IdentityResolver;

/// Profile reported by a provider after a completed handshake
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderProfile {
    /// Google userinfo: `sub`, structured name
    Google {
        id: String,
        given_name: Option<String>,
        name: Option<String>,
    },
    /// Twitter access-token response: `user_id`, `screen_name`
    Twitter { id: String, username: String },
    /// GitHub user: numeric `id`, `login`
    GitHub { id: String, username: String },
}

/// Provider-independent view of a profile
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedProfile {
    pub external_id: String,
    pub display_name: String,
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|value| !value.is_empty())
}

impl ProviderProfile {
    pub fn provider(&self) -> Provider {
        match self {
            Self::Google { .. } => Provider::Google,
            Self::Twitter { .. } => Provider::Twitter,
            Self::GitHub { .. } => Provider::GitHub,
        }
    }

    /// Extract the external id and display name
    ///
    /// Google contributes its given name (then the full name, then the id if
    /// the profile scope returned neither); Twitter and GitHub contribute the
    /// username.
    pub fn normalize(&self) -> Result<NormalizedProfile, AppError> {
        let (external_id, display_name) = match self {
            Self::Google {
                id,
                given_name,
                name,
            } => {
                let display_name = non_blank(given_name.as_deref())
                    .or_else(|| non_blank(name.as_deref()))
                    .unwrap_or(id.as_str());
                (id.as_str(), display_name)
            }
            Self::Twitter { id, username } | Self::GitHub { id, username } => {
                (id.as_str(), username.as_str())
            }
        };

        let external_id = external_id.trim();
        if external_id.is_empty() {
            return Err(AppError::Provider(format!(
                "{} profile has no id",
                self.provider()
            )));
        }

        Ok(NormalizedProfile {
            external_id: external_id.to_string(),
            display_name: display_name.trim().to_string(),
        })
    }
}

/// Turn a completed provider handshake into an identity record
///
/// Produces exactly one outcome: the resolved identity, or the error that
/// aborts the login.
pub async fn handle_callback(
    resolver: &IdentityResolver,
    profile: &ProviderProfile,
) -> Result<Identity, AppError> {
    let normalized = profile.normalize()?;
    resolver
        .resolve(
            profile.provider(),
            &normalized.external_id,
            &normalized.display_name,
        )
        .await
}
