//! Race-safe wishlist toggling.

use chrono::Utc;
use common::{ProductId, UserId};
use serde::{Deserialize, Serialize};
use store::{StoreError, WishlistEntry, WishlistStore, WishlistToggle};

use crate::error::DomainError;

/// Result of a toggle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToggleOutcome {
    pub added: bool,
}

/// Service for wishlist presence toggles.
pub struct WishlistService<S> {
    store: S,
}

impl<S: WishlistStore> WishlistService<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Removes the entry if present, otherwise adds it.
    ///
    /// If a concurrent toggle created the entry first, the store's uniqueness
    /// constraint rejects ours and the product counts as added.
    #[tracing::instrument(skip(self))]
    pub async fn toggle(
        &self,
        owner_id: UserId,
        product_id: ProductId,
    ) -> Result<ToggleOutcome, DomainError> {
        let added = match self
            .store
            .toggle_wishlist_entry(owner_id, product_id, Utc::now())
            .await
        {
            Ok(WishlistToggle::Added(_)) => true,
            Ok(WishlistToggle::Removed) => false,
            Err(StoreError::UniqueViolation { constraint }) => {
                tracing::debug!(%constraint, "concurrent wishlist insert, treating as added");
                true
            }
            Err(e) => return Err(e.into()),
        };

        metrics::counter!(
            "wishlist_toggles_total",
            "result" => if added { "added" } else { "removed" }
        )
        .increment(1);
        Ok(ToggleOutcome { added })
    }

    /// Returns the owner's wishlist, newest first.
    pub async fn list(&self, owner_id: UserId) -> Result<Vec<WishlistEntry>, DomainError> {
        Ok(self.store.wishlist_entries(owner_id).await?)
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use chrono::DateTime;
    use store::InMemoryStore;

    use super::*;

    /// Store whose toggle always loses the insert race.
    struct RacingStore;

    #[async_trait]
    impl WishlistStore for RacingStore {
        async fn toggle_wishlist_entry(
            &self,
            _owner_id: UserId,
            _product_id: ProductId,
            _now: DateTime<Utc>,
        ) -> store::Result<WishlistToggle> {
            Err(StoreError::UniqueViolation {
                constraint: "wishlist_entries_owner_product".to_string(),
            })
        }

        async fn wishlist_entries(&self, _owner_id: UserId) -> store::Result<Vec<WishlistEntry>> {
            Ok(vec![])
        }
    }

    #[tokio::test]
    async fn toggle_is_its_own_inverse() {
        let service = WishlistService::new(InMemoryStore::new());
        let owner = UserId::new();
        let product = ProductId::new();

        assert!(service.toggle(owner, product).await.unwrap().added);
        assert!(!service.toggle(owner, product).await.unwrap().added);
        assert!(service.list(owner).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn unique_violation_counts_as_added() {
        let service = WishlistService::new(RacingStore);
        let outcome = service
            .toggle(UserId::new(), ProductId::new())
            .await
            .unwrap();
        assert!(outcome.added);
    }
}
