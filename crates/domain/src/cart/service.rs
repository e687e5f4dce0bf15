//! Cart service enforcing the one-line-per-product invariant.

use chrono::Utc;
use common::{ProductId, UserId};
use store::{CartLine, CartStore, CatalogStore, MAX_CART_QUANTITY};

use crate::error::DomainError;

use super::{CartSummary, PricingRules};

/// Service for cart mutations and pricing.
///
/// Quantities live only in the store; every mutation is one atomic store
/// primitive so concurrent adds of the same product accumulate instead of
/// duplicating the line.
pub struct CartService<S> {
    store: S,
    rules: PricingRules,
}

impl<S> CartService<S>
where
    S: CartStore + CatalogStore,
{
    /// Creates a new cart service with the given store and pricing rules.
    pub fn new(store: S, rules: PricingRules) -> Self {
        Self { store, rules }
    }

    /// Adds `quantity` of a product, incrementing the line if it exists.
    #[tracing::instrument(skip(self))]
    pub async fn add_line(
        &self,
        owner_id: UserId,
        product_id: ProductId,
        quantity: u32,
    ) -> Result<CartLine, DomainError> {
        if quantity == 0 {
            return Err(DomainError::Validation(
                "quantity must be at least 1".to_string(),
            ));
        }
        check_limit(i64::from(quantity))?;
        self.ensure_purchasable(product_id).await?;

        let line = self
            .store
            .add_cart_quantity(owner_id, product_id, quantity, Utc::now())
            .await?;
        metrics::counter!("cart_mutations_total", "op" => "add").increment(1);
        Ok(line)
    }

    /// Sets the quantity of a line. Zero or less removes it and returns `None`.
    #[tracing::instrument(skip(self))]
    pub async fn set_quantity(
        &self,
        owner_id: UserId,
        product_id: ProductId,
        quantity: i64,
    ) -> Result<Option<CartLine>, DomainError> {
        if quantity > 0 {
            check_limit(quantity)?;
            self.ensure_purchasable(product_id).await?;
        }

        let line = self
            .store
            .set_cart_quantity(owner_id, product_id, quantity, Utc::now())
            .await?;
        metrics::counter!("cart_mutations_total", "op" => "set").increment(1);
        Ok(line)
    }

    /// Removes a line. Removing an absent line is not an error.
    #[tracing::instrument(skip(self))]
    pub async fn remove_line(
        &self,
        owner_id: UserId,
        product_id: ProductId,
    ) -> Result<bool, DomainError> {
        let removed = self.store.remove_cart_line(owner_id, product_id).await?;
        metrics::counter!("cart_mutations_total", "op" => "remove").increment(1);
        Ok(removed)
    }

    /// Empties the cart. Returns the number of lines removed.
    #[tracing::instrument(skip(self))]
    pub async fn clear(&self, owner_id: UserId) -> Result<u64, DomainError> {
        let removed = self.store.clear_cart(owner_id).await?;
        metrics::counter!("cart_mutations_total", "op" => "clear").increment(1);
        Ok(removed)
    }

    /// Prices the owner's cart against live catalog prices.
    #[tracing::instrument(skip(self))]
    pub async fn summary(&self, owner_id: UserId) -> Result<CartSummary, DomainError> {
        let lines = self.store.cart_lines(owner_id).await?;
        let ids: Vec<ProductId> = lines.iter().map(|line| line.product_id).collect();
        let prices = self.store.live_prices(&ids).await?;

        let summary = self.rules.compute_summary(&lines, &prices)?;
        if !summary.warnings.is_empty() {
            tracing::info!(
                %owner_id,
                excluded = summary.warnings.len(),
                "cart lines excluded from pricing"
            );
        }
        Ok(summary)
    }

    async fn ensure_purchasable(&self, product_id: ProductId) -> Result<(), DomainError> {
        match self.store.get_product(product_id).await? {
            Some(product) if product.active => Ok(()),
            _ => Err(DomainError::not_found("product", product_id)),
        }
    }
}

fn check_limit(quantity: i64) -> Result<(), DomainError> {
    if quantity > i64::from(MAX_CART_QUANTITY) {
        return Err(DomainError::Validation(format!(
            "quantity must be at most {MAX_CART_QUANTITY}"
        )));
    }
    Ok(())
}
