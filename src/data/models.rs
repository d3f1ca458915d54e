//! Data models
//!
//! Rust structs representing database entities.
//! All models use ULID for IDs and chrono for timestamps.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// =============================================================================
// ID Types
// =============================================================================

/// Entity ID wrapper (ULID format, 26 characters)
///
/// Example: "01ARZ3NDEKTSV4RRFFQ69G5FAV"
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(pub String);

impl EntityId {
    /// Generate a new ULID
    pub fn new() -> Self {
        Self(ulid::Ulid::new().to_string())
    }
}

impl Default for EntityId {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Provider
// =============================================================================

/// External identity provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Google,
    Twitter,
    GitHub,
}

impl Provider {
    pub const ALL: [Provider; 3] = [Provider::Google, Provider::Twitter, Provider::GitHub];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Google => "google",
            Self::Twitter => "twitter",
            Self::GitHub => "github",
        }
    }

    /// Column of `identities` holding this provider's external id
    pub(crate) fn id_column(&self) -> &'static str {
        match self {
            Self::Google => "google_id",
            Self::Twitter => "twitter_id",
            Self::GitHub => "github_id",
        }
    }

    /// Human-readable name for login pages
    pub fn label(&self) -> &'static str {
        match self {
            Self::Google => "Google",
            Self::Twitter => "Twitter",
            Self::GitHub => "GitHub",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Identity
// =============================================================================

/// One known external identity
///
/// Exactly one of the provider id columns is set; the record is created once
/// on first sign-in and never refreshed afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Identity {
    pub id: String,
    pub display_name: String,
    pub google_id: Option<String>,
    pub twitter_id: Option<String>,
    pub github_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Identity {
    /// Build a fresh record for a first-time sign-in
    pub fn new_for(provider: Provider, external_id: &str, display_name: &str) -> Self {
        let mut identity = Self {
            id: EntityId::new().0,
            display_name: display_name.to_string(),
            google_id: None,
            twitter_id: None,
            github_id: None,
            created_at: Utc::now(),
        };
        let external_id = Some(external_id.to_string());
        match provider {
            Provider::Google => identity.google_id = external_id,
            Provider::Twitter => identity.twitter_id = external_id,
            Provider::GitHub => identity.github_id = external_id,
        }
        identity
    }
}

// =============================================================================
// Session
// =============================================================================

/// Server-side session row
///
/// Only the hash of the session token is persisted.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct SessionRecord {
    pub token_hash: String,
    pub identity_id: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl SessionRecord {
    pub fn is_expired(&self) -> bool {
        self.expires_at <= Utc::now()
    }
}
