//! Transactional store for the marketplace core.
//!
//! Every read-modify-write the core performs is exposed here as a single
//! atomic primitive (conditional update, compare-and-swap or unique insert)
//! so callers never pair a read with an unconditional write.

pub mod error;
pub mod memory;
pub mod postgres;
pub mod records;
pub mod store;
pub mod version;

pub use error::{Result, StoreError};
pub use memory::InMemoryStore;
pub use postgres::PostgresStore;
pub use records::{
    CartLine, Commission, CommissionUpdate, DownloadGrant, MAX_CART_QUANTITY, NewCommission,
    Product, SettledOrderItem, VendorAccount, WishlistEntry, WishlistToggle,
};
pub use store::{
    CartStore, CatalogStore, CommissionStore, GrantStore, LedgerStore, MarketplaceStore,
    WishlistStore,
};
pub use version::Version;
