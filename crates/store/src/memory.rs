use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{CommissionId, GrantId, Money, ProductId, UserId};
use tokio::sync::RwLock;

use crate::{
    CartLine, Commission, CommissionUpdate, DownloadGrant, MAX_CART_QUANTITY, Product, Result,
    SettledOrderItem, StoreError, VendorAccount, Version, WishlistEntry, WishlistToggle,
    store::{CartStore, CatalogStore, CommissionStore, GrantStore, LedgerStore, WishlistStore},
};

type OwnedKey = (UserId, ProductId);

/// In-memory store implementation for tests and local runs.
///
/// Each primitive runs under a single write guard, which gives it the same
/// atomicity the PostgreSQL implementation gets from one statement.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    products: Arc<RwLock<HashMap<ProductId, Product>>>,
    cart: Arc<RwLock<HashMap<OwnedKey, CartLine>>>,
    wishlist: Arc<RwLock<HashMap<OwnedKey, WishlistEntry>>>,
    commissions: Arc<RwLock<HashMap<CommissionId, Commission>>>,
    grants: Arc<RwLock<HashMap<GrantId, DownloadGrant>>>,
    vendors: Arc<RwLock<HashMap<UserId, VendorAccount>>>,
    settled_items: Arc<RwLock<Vec<SettledOrderItem>>>,
}

impl InMemoryStore {
    /// Creates a new empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of wishlist entries across all owners.
    pub async fn wishlist_len(&self) -> usize {
        self.wishlist.read().await.len()
    }
}

#[async_trait]
impl CatalogStore for InMemoryStore {
    async fn upsert_product(&self, product: Product) -> Result<()> {
        self.products.write().await.insert(product.id, product);
        Ok(())
    }

    async fn get_product(&self, product_id: ProductId) -> Result<Option<Product>> {
        Ok(self.products.read().await.get(&product_id).cloned())
    }

    async fn live_prices(&self, product_ids: &[ProductId]) -> Result<HashMap<ProductId, Money>> {
        let products = self.products.read().await;
        Ok(product_ids
            .iter()
            .filter_map(|id| products.get(id))
            .filter(|p| p.active)
            .map(|p| (p.id, p.price))
            .collect())
    }
}

#[async_trait]
impl CartStore for InMemoryStore {
    async fn add_cart_quantity(
        &self,
        owner_id: UserId,
        product_id: ProductId,
        quantity: u32,
        now: DateTime<Utc>,
    ) -> Result<CartLine> {
        let limit = StoreError::QuantityLimit {
            max: MAX_CART_QUANTITY,
        };
        if quantity > MAX_CART_QUANTITY {
            return Err(limit);
        }

        let mut cart = self.cart.write().await;
        match cart.get_mut(&(owner_id, product_id)) {
            Some(line) => {
                let total = line.quantity + quantity;
                if total > MAX_CART_QUANTITY {
                    return Err(limit);
                }
                line.quantity = total;
                line.updated_at = now;
                Ok(line.clone())
            }
            None => {
                let line = CartLine {
                    owner_id,
                    product_id,
                    quantity,
                    created_at: now,
                    updated_at: now,
                };
                cart.insert((owner_id, product_id), line.clone());
                Ok(line)
            }
        }
    }

    async fn set_cart_quantity(
        &self,
        owner_id: UserId,
        product_id: ProductId,
        quantity: i64,
        now: DateTime<Utc>,
    ) -> Result<Option<CartLine>> {
        let mut cart = self.cart.write().await;
        if quantity <= 0 {
            cart.remove(&(owner_id, product_id));
            return Ok(None);
        }
        if quantity > i64::from(MAX_CART_QUANTITY) {
            return Err(StoreError::QuantityLimit {
                max: MAX_CART_QUANTITY,
            });
        }
        let quantity = quantity as u32;

        let line = cart
            .entry((owner_id, product_id))
            .and_modify(|line| {
                line.quantity = quantity;
                line.updated_at = now;
            })
            .or_insert_with(|| CartLine {
                owner_id,
                product_id,
                quantity,
                created_at: now,
                updated_at: now,
            });
        Ok(Some(line.clone()))
    }

    async fn remove_cart_line(&self, owner_id: UserId, product_id: ProductId) -> Result<bool> {
        Ok(self
            .cart
            .write()
            .await
            .remove(&(owner_id, product_id))
            .is_some())
    }

    async fn clear_cart(&self, owner_id: UserId) -> Result<u64> {
        let mut cart = self.cart.write().await;
        let before = cart.len();
        cart.retain(|(owner, _), _| *owner != owner_id);
        Ok((before - cart.len()) as u64)
    }

    async fn cart_lines(&self, owner_id: UserId) -> Result<Vec<CartLine>> {
        let cart = self.cart.read().await;
        let mut lines: Vec<_> = cart
            .values()
            .filter(|line| line.owner_id == owner_id)
            .cloned()
            .collect();
        lines.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then(a.product_id.cmp(&b.product_id))
        });
        Ok(lines)
    }
}

#[async_trait]
impl WishlistStore for InMemoryStore {
    async fn toggle_wishlist_entry(
        &self,
        owner_id: UserId,
        product_id: ProductId,
        now: DateTime<Utc>,
    ) -> Result<WishlistToggle> {
        let mut wishlist = self.wishlist.write().await;
        let key = (owner_id, product_id);

        if wishlist.remove(&key).is_some() {
            return Ok(WishlistToggle::Removed);
        }

        let entry = WishlistEntry {
            owner_id,
            product_id,
            created_at: now,
        };
        wishlist.insert(key, entry.clone());
        Ok(WishlistToggle::Added(entry))
    }

    async fn wishlist_entries(&self, owner_id: UserId) -> Result<Vec<WishlistEntry>> {
        let wishlist = self.wishlist.read().await;
        let mut entries: Vec<_> = wishlist
            .values()
            .filter(|e| e.owner_id == owner_id)
            .cloned()
            .collect();
        entries.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(entries)
    }
}

#[async_trait]
impl CommissionStore for InMemoryStore {
    async fn insert_commission(&self, commission: Commission) -> Result<()> {
        let mut commissions = self.commissions.write().await;
        if commissions.contains_key(&commission.id) {
            return Err(StoreError::UniqueViolation {
                constraint: "commissions_pkey".to_string(),
            });
        }
        commissions.insert(commission.id, commission);
        Ok(())
    }

    async fn get_commission(&self, id: CommissionId) -> Result<Option<Commission>> {
        Ok(self.commissions.read().await.get(&id).cloned())
    }

    async fn commissions_for_user(&self, user_id: UserId) -> Result<Vec<Commission>> {
        let commissions = self.commissions.read().await;
        let mut result: Vec<_> = commissions
            .values()
            .filter(|c| c.is_party(user_id))
            .cloned()
            .collect();
        result.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(result)
    }

    async fn update_commission_if_version(
        &self,
        id: CommissionId,
        expected: Version,
        update: CommissionUpdate,
    ) -> Result<Commission> {
        let mut commissions = self.commissions.write().await;
        let commission = commissions.get_mut(&id).ok_or_else(|| StoreError::NotFound {
            entity: "commission",
            id: id.to_string(),
        })?;

        if commission.version != expected {
            return Err(StoreError::ConcurrencyConflict {
                entity: "commission",
                id: id.to_string(),
                expected,
                actual: commission.version,
            });
        }

        commission.apply(&update);
        Ok(commission.clone())
    }
}

#[async_trait]
impl GrantStore for InMemoryStore {
    async fn insert_grant(&self, grant: DownloadGrant) -> Result<()> {
        let mut grants = self.grants.write().await;
        if grants.contains_key(&grant.id) {
            return Err(StoreError::UniqueViolation {
                constraint: "download_grants_pkey".to_string(),
            });
        }
        grants.insert(grant.id, grant);
        Ok(())
    }

    async fn get_grant(&self, id: GrantId) -> Result<Option<DownloadGrant>> {
        Ok(self.grants.read().await.get(&id).cloned())
    }

    async fn grants_for_owner(&self, owner_id: UserId) -> Result<Vec<DownloadGrant>> {
        let grants = self.grants.read().await;
        let mut result: Vec<_> = grants
            .values()
            .filter(|g| g.owner_id == owner_id)
            .cloned()
            .collect();
        result.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(result)
    }

    async fn increment_download_if_available(&self, id: GrantId) -> Result<Option<DownloadGrant>> {
        let mut grants = self.grants.write().await;
        match grants.get_mut(&id) {
            Some(grant) if grant.download_count < grant.max_downloads => {
                grant.download_count += 1;
                Ok(Some(grant.clone()))
            }
            _ => Ok(None),
        }
    }
}

#[async_trait]
impl LedgerStore for InMemoryStore {
    async fn upsert_vendor_account(&self, account: VendorAccount) -> Result<()> {
        self.vendors.write().await.insert(account.vendor_id, account);
        Ok(())
    }

    async fn vendor_account(&self, vendor_id: UserId) -> Result<Option<VendorAccount>> {
        Ok(self.vendors.read().await.get(&vendor_id).cloned())
    }

    async fn record_settled_item(&self, item: SettledOrderItem) -> Result<()> {
        self.settled_items.write().await.push(item);
        Ok(())
    }

    async fn settled_items_for_vendor(&self, vendor_id: UserId) -> Result<Vec<SettledOrderItem>> {
        let items = self.settled_items.read().await;
        Ok(items
            .iter()
            .filter(|item| item.vendor_id == vendor_id)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;
    use common::{CommissionRate, CommissionStatus, OrderId};

    use super::*;
    use crate::NewCommission;

    fn commission() -> Commission {
        Commission::requested(
            NewCommission {
                customer_id: UserId::new(),
                vendor_id: UserId::new(),
                service_id: None,
                title: "Logo".to_string(),
                description: "Vector logo".to_string(),
                budget: Money::new(3000),
                deadline: None,
            },
            Utc::now(),
        )
    }

    fn update(status: CommissionStatus) -> CommissionUpdate {
        CommissionUpdate {
            status,
            notes: None,
            delivery_files: vec![],
            updated_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn add_cart_quantity_increments_existing_line() {
        let store = InMemoryStore::new();
        let owner = UserId::new();
        let product = ProductId::new();

        store
            .add_cart_quantity(owner, product, 2, Utc::now())
            .await
            .unwrap();
        let line = store
            .add_cart_quantity(owner, product, 3, Utc::now())
            .await
            .unwrap();

        assert_eq!(line.quantity, 5);
        assert_eq!(store.cart_lines(owner).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn add_cart_quantity_past_limit_leaves_line_unchanged() {
        let store = InMemoryStore::new();
        let owner = UserId::new();
        let product = ProductId::new();

        store
            .add_cart_quantity(owner, product, MAX_CART_QUANTITY - 1, Utc::now())
            .await
            .unwrap();
        let result = store.add_cart_quantity(owner, product, 2, Utc::now()).await;
        assert!(matches!(
            result,
            Err(StoreError::QuantityLimit { max }) if max == MAX_CART_QUANTITY
        ));

        let huge = store
            .add_cart_quantity(owner, ProductId::new(), u32::MAX, Utc::now())
            .await;
        assert!(matches!(huge, Err(StoreError::QuantityLimit { .. })));

        let lines = store.cart_lines(owner).await.unwrap();
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].quantity, MAX_CART_QUANTITY - 1);
    }

    #[tokio::test]
    async fn set_cart_quantity_past_limit_is_rejected() {
        let store = InMemoryStore::new();
        let owner = UserId::new();
        let product = ProductId::new();

        let result = store
            .set_cart_quantity(owner, product, i64::from(MAX_CART_QUANTITY) + 1, Utc::now())
            .await;

        assert!(matches!(result, Err(StoreError::QuantityLimit { .. })));
        assert!(store.cart_lines(owner).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn set_cart_quantity_to_zero_deletes_line() {
        let store = InMemoryStore::new();
        let owner = UserId::new();
        let product = ProductId::new();

        store
            .add_cart_quantity(owner, product, 2, Utc::now())
            .await
            .unwrap();
        let result = store
            .set_cart_quantity(owner, product, 0, Utc::now())
            .await
            .unwrap();

        assert!(result.is_none());
        assert!(store.cart_lines(owner).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn clear_cart_only_touches_owner() {
        let store = InMemoryStore::new();
        let owner = UserId::new();
        let other = UserId::new();

        store
            .add_cart_quantity(owner, ProductId::new(), 1, Utc::now())
            .await
            .unwrap();
        store
            .add_cart_quantity(owner, ProductId::new(), 1, Utc::now())
            .await
            .unwrap();
        store
            .add_cart_quantity(other, ProductId::new(), 1, Utc::now())
            .await
            .unwrap();

        assert_eq!(store.clear_cart(owner).await.unwrap(), 2);
        assert_eq!(store.cart_lines(other).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn live_prices_skip_inactive_products() {
        let store = InMemoryStore::new();
        let vendor = UserId::new();
        let active = Product::new(vendor, "Print", Money::new(1200));
        let mut retired = Product::new(vendor, "Old print", Money::new(900));
        retired.active = false;

        store.upsert_product(active.clone()).await.unwrap();
        store.upsert_product(retired.clone()).await.unwrap();

        let prices = store
            .live_prices(&[active.id, retired.id, ProductId::new()])
            .await
            .unwrap();
        assert_eq!(prices.len(), 1);
        assert_eq!(prices.get(&active.id), Some(&Money::new(1200)));
    }

    #[tokio::test]
    async fn toggle_wishlist_alternates() {
        let store = InMemoryStore::new();
        let owner = UserId::new();
        let product = ProductId::new();

        let first = store
            .toggle_wishlist_entry(owner, product, Utc::now())
            .await
            .unwrap();
        assert!(matches!(first, WishlistToggle::Added(_)));

        let second = store
            .toggle_wishlist_entry(owner, product, Utc::now())
            .await
            .unwrap();
        assert_eq!(second, WishlistToggle::Removed);
        assert_eq!(store.wishlist_len().await, 0);
    }

    #[tokio::test]
    async fn commission_update_with_stale_version_conflicts() {
        let store = InMemoryStore::new();
        let commission = commission();
        let id = commission.id;
        store.insert_commission(commission).await.unwrap();

        let updated = store
            .update_commission_if_version(id, Version::first(), update(CommissionStatus::Accepted))
            .await
            .unwrap();
        assert_eq!(updated.version, Version::new(2));

        let result = store
            .update_commission_if_version(id, Version::first(), update(CommissionStatus::Cancelled))
            .await;
        assert!(matches!(
            result,
            Err(StoreError::ConcurrencyConflict { actual, .. }) if actual == Version::new(2)
        ));
    }

    #[tokio::test]
    async fn commission_update_missing_record_is_not_found() {
        let store = InMemoryStore::new();
        let result = store
            .update_commission_if_version(
                CommissionId::new(),
                Version::first(),
                update(CommissionStatus::Accepted),
            )
            .await;
        assert!(matches!(result, Err(StoreError::NotFound { .. })));
    }

    #[tokio::test]
    async fn increment_download_stops_at_max() {
        let store = InMemoryStore::new();
        let grant = DownloadGrant::new(UserId::new(), ProductId::new(), "s3://a", 2, None);
        let id = grant.id;
        store.insert_grant(grant).await.unwrap();

        for expected_some in [true, true, false] {
            let updated = store.increment_download_if_available(id).await.unwrap();
            assert_eq!(updated.is_some(), expected_some);
        }
        let stored = store.get_grant(id).await.unwrap().unwrap();
        assert_eq!(stored.download_count, 2);
    }

    #[tokio::test]
    async fn settled_items_are_scoped_to_vendor() {
        let store = InMemoryStore::new();
        let vendor = UserId::new();
        for (vendor_id, days) in [(vendor, 1), (UserId::new(), 2), (vendor, 3)] {
            store
                .record_settled_item(SettledOrderItem {
                    order_id: OrderId::new(),
                    product_id: ProductId::new(),
                    vendor_id,
                    product_name: "Mug".to_string(),
                    quantity: 1,
                    unit_price: Money::new(500),
                    commission_rate: CommissionRate::from_percent(15),
                    settled_at: Utc::now() - Duration::days(days),
                })
                .await
                .unwrap();
        }

        let items = store.settled_items_for_vendor(vendor).await.unwrap();
        assert_eq!(items.len(), 2);
    }
}
