//! API response DTOs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::data::Identity;

/// Signed-in identity as returned by `/getuser`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct IdentityResponse {
    pub id: String,
    pub display_name: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub google_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub twitter_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub github_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<Identity> for IdentityResponse {
    fn from(identity: Identity) -> Self {
        Self {
            id: identity.id,
            display_name: identity.display_name,
            google_id: identity.google_id,
            twitter_id: identity.twitter_id,
            github_id: identity.github_id,
            created_at: identity.created_at,
        }
    }
}
