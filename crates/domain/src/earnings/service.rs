//! Vendor earnings reads and commission-rate administration.

use common::{Actor, CommissionRate, Money, UserId};
use store::{LedgerStore, VendorAccount};

use crate::error::DomainError;

use super::ledger::{DEFAULT_PAGE_SIZE, EarningsSummary, summarize};

/// Read side of the vendor ledger.
pub struct EarningsService<S> {
    store: S,
    page_size: usize,
}

impl<S: LedgerStore> EarningsService<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }

    /// Overrides how many transactions a summary lists.
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }

    /// Summarizes a vendor's earnings. The vendor themself or an admin only.
    #[tracing::instrument(skip(self))]
    pub async fn summary(
        &self,
        vendor_id: UserId,
        actor: Actor,
    ) -> Result<EarningsSummary, DomainError> {
        if !actor.is_admin() && actor.user_id != vendor_id {
            return Err(DomainError::Forbidden(format!(
                "earnings of vendor {vendor_id} are private"
            )));
        }

        let account = self
            .store
            .vendor_account(vendor_id)
            .await?
            .ok_or_else(|| DomainError::not_found("vendor account", vendor_id))?;
        let items = self.store.settled_items_for_vendor(vendor_id).await?;

        tracing::debug!(items = items.len(), "summarizing vendor earnings");
        summarize(vendor_id, &items, account.commission_rate, self.page_size)
    }

    /// Sets the rate applied to future settlements. Admin only.
    ///
    /// Items already settled keep the rate captured at settlement.
    #[tracing::instrument(skip(self))]
    pub async fn set_commission_rate(
        &self,
        vendor_id: UserId,
        actor: Actor,
        rate: CommissionRate,
    ) -> Result<VendorAccount, DomainError> {
        if !actor.is_admin() {
            return Err(DomainError::Forbidden(format!(
                "{} may not change commission rates",
                actor.role
            )));
        }
        if !rate.is_valid() {
            return Err(DomainError::Validation(format!(
                "commission rate {rate} exceeds 100%"
            )));
        }

        let account = match self.store.vendor_account(vendor_id).await? {
            Some(existing) => VendorAccount {
                commission_rate: rate,
                ..existing
            },
            None => VendorAccount {
                vendor_id,
                commission_rate: rate,
                total_sales: Money::zero(),
            },
        };
        self.store.upsert_vendor_account(account.clone()).await?;

        tracing::info!(%vendor_id, %rate, "commission rate updated");
        Ok(account)
    }
}
