use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{CommissionId, GrantId, Money, ProductId, UserId};

use crate::{
    CartLine, Commission, CommissionUpdate, DownloadGrant, Product, Result, SettledOrderItem,
    VendorAccount, Version, WishlistEntry, WishlistToggle,
};

/// Read access to live catalog prices.
#[async_trait]
pub trait CatalogStore: Send + Sync {
    /// Inserts or replaces a product.
    async fn upsert_product(&self, product: Product) -> Result<()>;

    /// Retrieves a product by id.
    async fn get_product(&self, product_id: ProductId) -> Result<Option<Product>>;

    /// Returns the current price of every requested product that is still
    /// active. Deleted or deactivated products are simply absent.
    async fn live_prices(&self, product_ids: &[ProductId]) -> Result<HashMap<ProductId, Money>>;
}

/// Cart lines keyed by `(owner, product)`.
#[async_trait]
pub trait CartStore: Send + Sync {
    /// Atomically creates the line with `quantity` or adds `quantity` to the
    /// existing line. Returns the resulting line, or `QuantityLimit` without
    /// writing if the result would exceed `MAX_CART_QUANTITY`.
    async fn add_cart_quantity(
        &self,
        owner_id: UserId,
        product_id: ProductId,
        quantity: u32,
        now: DateTime<Utc>,
    ) -> Result<CartLine>;

    /// Sets the line quantity, creating the line if needed. A quantity of
    /// zero or less deletes the line and returns `None`; one above
    /// `MAX_CART_QUANTITY` fails with `QuantityLimit`.
    async fn set_cart_quantity(
        &self,
        owner_id: UserId,
        product_id: ProductId,
        quantity: i64,
        now: DateTime<Utc>,
    ) -> Result<Option<CartLine>>;

    /// Deletes one line. Returns true if a line was removed.
    async fn remove_cart_line(&self, owner_id: UserId, product_id: ProductId) -> Result<bool>;

    /// Deletes every line for the owner. Returns the number removed.
    async fn clear_cart(&self, owner_id: UserId) -> Result<u64>;

    /// Returns the owner's lines ordered by creation time.
    async fn cart_lines(&self, owner_id: UserId) -> Result<Vec<CartLine>>;
}

/// Wishlist entries keyed by `(owner, product)`.
#[async_trait]
pub trait WishlistStore: Send + Sync {
    /// Removes the entry if present, otherwise inserts it, as one atomic unit.
    ///
    /// If a concurrent caller inserts the same entry between the two halves,
    /// fails with `UniqueViolation`.
    async fn toggle_wishlist_entry(
        &self,
        owner_id: UserId,
        product_id: ProductId,
        now: DateTime<Utc>,
    ) -> Result<WishlistToggle>;

    /// Returns the owner's entries, newest first.
    async fn wishlist_entries(&self, owner_id: UserId) -> Result<Vec<WishlistEntry>>;
}

/// Commission records with versioned compare-and-swap updates.
#[async_trait]
pub trait CommissionStore: Send + Sync {
    /// Inserts a new commission.
    async fn insert_commission(&self, commission: Commission) -> Result<()>;

    /// Retrieves a commission by id.
    async fn get_commission(&self, id: CommissionId) -> Result<Option<Commission>>;

    /// Returns commissions where the user is customer or vendor, newest first.
    async fn commissions_for_user(&self, user_id: UserId) -> Result<Vec<Commission>>;

    /// Writes `update` only if the stored version still equals `expected`.
    ///
    /// Fails with `ConcurrencyConflict` if another writer got there first and
    /// `NotFound` if the commission does not exist.
    async fn update_commission_if_version(
        &self,
        id: CommissionId,
        expected: Version,
        update: CommissionUpdate,
    ) -> Result<Commission>;
}

/// Digital download grants.
#[async_trait]
pub trait GrantStore: Send + Sync {
    /// Inserts a new grant. Called by order settlement.
    async fn insert_grant(&self, grant: DownloadGrant) -> Result<()>;

    /// Retrieves a grant by id.
    async fn get_grant(&self, id: GrantId) -> Result<Option<DownloadGrant>>;

    /// Returns the owner's grants, newest first.
    async fn grants_for_owner(&self, owner_id: UserId) -> Result<Vec<DownloadGrant>>;

    /// Increments `download_count` by one if and only if it is still below
    /// `max_downloads`. Returns `None` if no row changed.
    async fn increment_download_if_available(&self, id: GrantId) -> Result<Option<DownloadGrant>>;
}

/// Vendor accounts and settled order lines used for earnings.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Inserts or replaces a vendor account.
    async fn upsert_vendor_account(&self, account: VendorAccount) -> Result<()>;

    /// Retrieves a vendor account.
    async fn vendor_account(&self, vendor_id: UserId) -> Result<Option<VendorAccount>>;

    /// Records a settled order line.
    async fn record_settled_item(&self, item: SettledOrderItem) -> Result<()>;

    /// Returns every settled line belonging to the vendor.
    async fn settled_items_for_vendor(&self, vendor_id: UserId) -> Result<Vec<SettledOrderItem>>;
}

/// Everything the marketplace core needs from persistence.
pub trait MarketplaceStore:
    CatalogStore + CartStore + WishlistStore + CommissionStore + GrantStore + LedgerStore
{
}

// Blanket implementation for all full store implementations
impl<T> MarketplaceStore for T where
    T: CatalogStore + CartStore + WishlistStore + CommissionStore + GrantStore + LedgerStore
{
}
