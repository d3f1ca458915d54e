//! Identity resolution
//!
//! Find-or-create of identity records keyed by provider identity.

use std::sync::Arc;

use crate::data::{Database, Identity, Provider};
use crate::error::AppError;

/// Identity resolver
pub struct IdentityResolver {
    db: Arc<Database>,
}

impl IdentityResolver {
    /// Create new identity resolver
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Resolve a provider identity to its record, creating it on first sight
    ///
    /// An existing record is returned unchanged; the display name is only
    /// used when a record is created.
    ///
    /// Concurrent first logins for the same identity race on the insert; the
    /// losers observe the unique violation and re-read the winner's record.
    ///
    /// # Errors
    /// - `Validation` if `external_id` is blank
    /// - `Database` if the store fails at any step
    pub async fn resolve(
        &self,
        provider: Provider,
        external_id: &str,
        fallback_display_name: &str,
    ) -> Result<Identity, AppError> {
        if external_id.trim().is_empty() {
            return Err(AppError::Validation(
                "external id cannot be empty".to_string(),
            ));
        }

        if let Some(existing) = self
            .db
            .find_identity_by_external_id(provider, external_id)
            .await?
        {
            tracing::debug!(%provider, identity_id = %existing.id, "Resolved existing identity");
            return Ok(existing);
        }

        let candidate = Identity::new_for(provider, external_id, fallback_display_name);
        if self.db.insert_identity_if_absent(&candidate).await? {
            crate::metrics::IDENTITIES_CREATED_TOTAL
                .with_label_values(&[provider.as_str()])
                .inc();
            tracing::info!(
                %provider,
                identity_id = %candidate.id,
                display_name = %candidate.display_name,
                "Identity created"
            );
            return Ok(candidate);
        }

        // Lost the insert race to a concurrent first login.
        let winner = self
            .db
            .find_identity_by_external_id(provider, external_id)
            .await?
            .ok_or_else(|| {
                AppError::Internal(anyhow::anyhow!(
                    "{provider} identity vanished after unique violation"
                ))
            })?;
        tracing::debug!(%provider, identity_id = %winner.id, "Reconciled concurrent identity creation");

        Ok(winner)
    }
}
