//! Bounded download entitlements.

use chrono::{DateTime, Utc};
use common::{GrantId, ProductId, UserId};
use serde::{Deserialize, Serialize};
use store::{DownloadGrant, GrantStore};

use crate::error::DomainError;

/// What a successful redemption hands back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetLocator {
    pub grant_id: GrantId,
    pub product_id: ProductId,
    pub url: String,
    pub downloads_remaining: u32,
}

impl From<&DownloadGrant> for AssetLocator {
    fn from(grant: &DownloadGrant) -> Self {
        Self {
            grant_id: grant.id,
            product_id: grant.product_id,
            url: grant.asset_url.clone(),
            downloads_remaining: grant.remaining(),
        }
    }
}

/// Service for redeeming download grants.
pub struct DownloadService<S> {
    store: S,
}

impl<S: GrantStore> DownloadService<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Redeems one download against the grant.
    pub async fn redeem(
        &self,
        grant_id: GrantId,
        user_id: UserId,
    ) -> Result<AssetLocator, DomainError> {
        self.redeem_at(grant_id, user_id, Utc::now()).await
    }

    /// Redeems one download as of `now`.
    ///
    /// The count increment is a single conditional write, so concurrent
    /// redemptions of a grant with `n` downloads left succeed at most `n`
    /// times.
    #[tracing::instrument(skip(self))]
    pub async fn redeem_at(
        &self,
        grant_id: GrantId,
        user_id: UserId,
        now: DateTime<Utc>,
    ) -> Result<AssetLocator, DomainError> {
        let result = self.try_redeem(grant_id, user_id, now).await;
        let outcome = match &result {
            Ok(_) => "granted",
            Err(e) => e.kind().as_str(),
        };
        metrics::counter!("download_redemptions_total", "outcome" => outcome).increment(1);
        result
    }

    async fn try_redeem(
        &self,
        grant_id: GrantId,
        user_id: UserId,
        now: DateTime<Utc>,
    ) -> Result<AssetLocator, DomainError> {
        let grant = self
            .store
            .get_grant(grant_id)
            .await?
            .ok_or_else(|| DomainError::not_found("download grant", grant_id))?;

        if grant.owner_id != user_id {
            return Err(DomainError::Forbidden(format!(
                "download grant {grant_id} belongs to another user"
            )));
        }
        if let Some(expired_at) = grant.expired_as_of(now) {
            return Err(DomainError::Expired {
                grant_id,
                expired_at,
            });
        }
        if grant.remaining() == 0 {
            return Err(DomainError::QuotaExceeded {
                grant_id,
                max_downloads: grant.max_downloads,
            });
        }

        // Another redemption may have taken the last slot since the read.
        let Some(updated) = self.store.increment_download_if_available(grant_id).await? else {
            tracing::debug!(%grant_id, "lost race for last download");
            return Err(DomainError::QuotaExceeded {
                grant_id,
                max_downloads: grant.max_downloads,
            });
        };

        tracing::info!(
            %grant_id,
            download_count = updated.download_count,
            max_downloads = updated.max_downloads,
            "download redeemed"
        );
        Ok(AssetLocator::from(&updated))
    }

    /// Lists the user's grants, including exhausted ones.
    pub async fn list_for_owner(
        &self,
        owner_id: UserId,
    ) -> Result<Vec<DownloadGrant>, DomainError> {
        Ok(self.store.grants_for_owner(owner_id).await?)
    }
}
