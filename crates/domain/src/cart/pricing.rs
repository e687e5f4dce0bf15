//! Deterministic cart pricing.

use std::collections::HashMap;

use common::{Money, ProductId};
use serde::{Deserialize, Serialize};
use store::CartLine;

use crate::error::DomainError;

/// Shipping and tax rules applied to a cart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricingRules {
    /// Subtotals strictly above this ship free.
    pub free_shipping_threshold: Money,

    /// Shipping charged at or below the threshold.
    pub flat_shipping: Money,

    /// Tax rate in basis points (1800 = 18%).
    pub tax_rate_bps: u32,
}

impl Default for PricingRules {
    fn default() -> Self {
        Self {
            free_shipping_threshold: Money::new(5000),
            flat_shipping: Money::new(200),
            tax_rate_bps: 1800,
        }
    }
}

/// A cart line with the live price it was computed at.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricedLine {
    pub product_id: ProductId,
    pub quantity: u32,
    pub unit_price: Money,
    pub line_total: Money,
}

/// Non-fatal issue found while pricing a cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CartWarning {
    /// The product was deleted or deactivated; its line was left out.
    PriceUnavailable { product_id: ProductId },
}

/// Priced view of a cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartSummary {
    pub lines: Vec<PricedLine>,
    pub subtotal: Money,
    pub shipping: Money,
    pub tax: Money,
    pub total: Money,
    pub item_count: u64,
    pub warnings: Vec<CartWarning>,
}

impl PricingRules {
    /// Prices `lines` against `live_prices`.
    ///
    /// Pure and deterministic: the same lines and prices always produce the
    /// same summary, so a checkout total always matches the quote shown.
    /// Lines without a live price are excluded and reported as warnings.
    /// Amounts too large to represent are a `Validation` error.
    pub fn compute_summary(
        &self,
        lines: &[CartLine],
        live_prices: &HashMap<ProductId, Money>,
    ) -> Result<CartSummary, DomainError> {
        let mut priced = Vec::with_capacity(lines.len());
        let mut warnings = Vec::new();
        let mut subtotal = Money::zero();

        for line in lines {
            match live_prices.get(&line.product_id) {
                Some(&unit_price) => {
                    let line_total = unit_price
                        .checked_multiply(line.quantity)
                        .ok_or_else(|| overflow("line total"))?;
                    subtotal = subtotal
                        .checked_add(line_total)
                        .ok_or_else(|| overflow("subtotal"))?;
                    priced.push(PricedLine {
                        product_id: line.product_id,
                        quantity: line.quantity,
                        unit_price,
                        line_total,
                    });
                }
                None => warnings.push(CartWarning::PriceUnavailable {
                    product_id: line.product_id,
                }),
            }
        }

        let item_count = priced.iter().map(|line| u64::from(line.quantity)).sum();
        let shipping = self.shipping_for(subtotal, priced.is_empty());
        let tax = subtotal
            .apply_bps(self.tax_rate_bps)
            .ok_or_else(|| overflow("tax"))?;
        let total = subtotal
            .checked_add(shipping)
            .and_then(|sum| sum.checked_add(tax))
            .ok_or_else(|| overflow("total"))?;

        Ok(CartSummary {
            lines: priced,
            subtotal,
            shipping,
            tax,
            total,
            item_count,
            warnings,
        })
    }

    fn shipping_for(&self, subtotal: Money, nothing_to_ship: bool) -> Money {
        if nothing_to_ship || subtotal > self.free_shipping_threshold {
            Money::zero()
        } else {
            self.flat_shipping
        }
    }
}

fn overflow(what: &str) -> DomainError {
    DomainError::Validation(format!("cart {what} is too large"))
}
