//! Records persisted by the store.

use chrono::{DateTime, Utc};
use common::{
    CommissionId, CommissionRate, CommissionStatus, GrantId, Money, OrderId, ProductId, ServiceId,
    UserId,
};
use serde::{Deserialize, Serialize};

use crate::Version;

/// A catalog product as far as the core cares: its live price and whether it
/// can still be bought.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub vendor_id: UserId,
    pub name: String,
    pub price: Money,
    pub active: bool,
}

impl Product {
    pub fn new(vendor_id: UserId, name: impl Into<String>, price: Money) -> Self {
        Self {
            id: ProductId::new(),
            vendor_id,
            name: name.into(),
            price,
            active: true,
        }
    }
}

/// Largest quantity a single cart line may hold.
pub const MAX_CART_QUANTITY: u32 = 9_999;

/// One product in a user's cart. At most one line per `(owner, product)`.
///
/// The unit price is not stored; it is read live from the catalog whenever
/// the cart is priced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLine {
    pub owner_id: UserId,
    pub product_id: ProductId,
    pub quantity: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A product saved to a user's wishlist. At most one entry per `(owner, product)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WishlistEntry {
    pub owner_id: UserId,
    pub product_id: ProductId,
    pub created_at: DateTime<Utc>,
}

/// Outcome of an atomic wishlist toggle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WishlistToggle {
    Added(WishlistEntry),
    Removed,
}

/// Fields a customer supplies when requesting a commission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewCommission {
    pub customer_id: UserId,
    pub vendor_id: UserId,
    pub service_id: Option<ServiceId>,
    pub title: String,
    pub description: String,
    pub budget: Money,
    pub deadline: Option<DateTime<Utc>>,
}

/// A bespoke-work request between one customer and one vendor.
///
/// Commissions are never deleted; terminal ones are kept for dispute resolution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Commission {
    pub id: CommissionId,
    pub customer_id: UserId,
    pub vendor_id: UserId,
    pub service_id: Option<ServiceId>,
    pub title: String,
    pub description: String,
    pub budget: Money,
    pub deadline: Option<DateTime<Utc>>,
    pub status: CommissionStatus,
    pub notes: Option<String>,
    pub delivery_files: Vec<String>,
    pub version: Version,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Commission {
    /// Builds a freshly requested commission at version 1.
    pub fn requested(new: NewCommission, now: DateTime<Utc>) -> Self {
        Self {
            id: CommissionId::new(),
            customer_id: new.customer_id,
            vendor_id: new.vendor_id,
            service_id: new.service_id,
            title: new.title,
            description: new.description,
            budget: new.budget,
            deadline: new.deadline,
            status: CommissionStatus::Requested,
            notes: None,
            delivery_files: Vec::new(),
            version: Version::first(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Returns true if the user is the customer or the vendor on this commission.
    pub fn is_party(&self, user_id: UserId) -> bool {
        self.customer_id == user_id || self.vendor_id == user_id
    }

    /// Applies an update in place and bumps the version.
    pub fn apply(&mut self, update: &CommissionUpdate) {
        self.status = update.status;
        if let Some(notes) = &update.notes {
            self.notes = Some(notes.clone());
        }
        self.delivery_files
            .extend(update.delivery_files.iter().cloned());
        self.updated_at = update.updated_at;
        self.version = self.version.next();
    }
}

/// New status plus side data written by a single compare-and-swap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommissionUpdate {
    pub status: CommissionStatus,
    /// Replaces the stored notes when set.
    pub notes: Option<String>,
    /// Appended to the stored delivery files.
    pub delivery_files: Vec<String>,
    pub updated_at: DateTime<Utc>,
}

/// Bounded re-download entitlement for a purchased digital product.
///
/// `download_count` never exceeds `max_downloads` and is never decremented.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadGrant {
    pub id: GrantId,
    pub owner_id: UserId,
    pub product_id: ProductId,
    pub asset_url: String,
    pub download_count: u32,
    pub max_downloads: u32,
    pub expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl DownloadGrant {
    pub fn new(
        owner_id: UserId,
        product_id: ProductId,
        asset_url: impl Into<String>,
        max_downloads: u32,
        expires_at: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            id: GrantId::new(),
            owner_id,
            product_id,
            asset_url: asset_url.into(),
            download_count: 0,
            max_downloads,
            expires_at,
            created_at: Utc::now(),
        }
    }

    /// Returns the expiry if it is at or before `now`.
    pub fn expired_as_of(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.expires_at.filter(|expires_at| *expires_at <= now)
    }

    /// Returns the number of downloads left.
    pub fn remaining(&self) -> u32 {
        self.max_downloads.saturating_sub(self.download_count)
    }
}

/// Vendor-level settings maintained by admins and the settlement path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VendorAccount {
    pub vendor_id: UserId,
    pub commission_rate: CommissionRate,
    pub total_sales: Money,
}

/// One line of a paid order, as recorded at settlement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettledOrderItem {
    pub order_id: OrderId,
    pub product_id: ProductId,
    pub vendor_id: UserId,
    pub product_name: String,
    pub quantity: u32,
    pub unit_price: Money,
    /// Platform rate in force when the order settled. Later rate changes
    /// never touch it.
    pub commission_rate: CommissionRate,
    pub settled_at: DateTime<Utc>,
}

impl SettledOrderItem {
    /// Returns `unit_price * quantity`, or `None` on overflow.
    pub fn gross(&self) -> Option<Money> {
        self.unit_price.checked_multiply(self.quantity)
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;

    fn new_commission() -> NewCommission {
        NewCommission {
            customer_id: UserId::new(),
            vendor_id: UserId::new(),
            service_id: None,
            title: "Portrait".to_string(),
            description: "Oil on canvas".to_string(),
            budget: Money::new(4000),
            deadline: None,
        }
    }

    #[test]
    fn requested_commission_starts_at_first_version() {
        let commission = Commission::requested(new_commission(), Utc::now());
        assert_eq!(commission.status, CommissionStatus::Requested);
        assert_eq!(commission.version, Version::first());
        assert!(commission.delivery_files.is_empty());
    }

    #[test]
    fn apply_appends_files_and_bumps_version() {
        let mut commission = Commission::requested(new_commission(), Utc::now());
        commission.apply(&CommissionUpdate {
            status: CommissionStatus::Delivered,
            notes: Some("first cut".to_string()),
            delivery_files: vec!["a.png".to_string()],
            updated_at: Utc::now(),
        });
        commission.apply(&CommissionUpdate {
            status: CommissionStatus::Delivered,
            notes: None,
            delivery_files: vec!["b.png".to_string()],
            updated_at: Utc::now(),
        });

        assert_eq!(commission.delivery_files, vec!["a.png", "b.png"]);
        assert_eq!(commission.notes.as_deref(), Some("first cut"));
        assert_eq!(commission.version, Version::new(3));
    }

    #[test]
    fn is_party_checks_both_sides() {
        let commission = Commission::requested(new_commission(), Utc::now());
        assert!(commission.is_party(commission.customer_id));
        assert!(commission.is_party(commission.vendor_id));
        assert!(!commission.is_party(UserId::new()));
    }

    #[test]
    fn grant_expiry_is_inclusive() {
        let now = Utc::now();
        let grant = DownloadGrant::new(UserId::new(), ProductId::new(), "u", 3, Some(now));
        assert_eq!(grant.expired_as_of(now), Some(now));
        assert!(grant.expired_as_of(now - Duration::seconds(1)).is_none());

        let open = DownloadGrant::new(UserId::new(), ProductId::new(), "u", 3, None);
        assert!(open.expired_as_of(now).is_none());
    }

    #[test]
    fn settled_item_gross() {
        let item = SettledOrderItem {
            order_id: OrderId::new(),
            product_id: ProductId::new(),
            vendor_id: UserId::new(),
            product_name: "Print".to_string(),
            quantity: 3,
            unit_price: Money::new(250),
            commission_rate: CommissionRate::from_percent(15),
            settled_at: Utc::now(),
        };
        assert_eq!(item.gross(), Some(Money::new(750)));
    }
}
