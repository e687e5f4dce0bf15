//! Pure earnings aggregation over settled order items.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use common::{CommissionRate, Money, OrderId, ProductId, UserId, round_half_up_bps};
use serde::{Deserialize, Serialize};
use store::SettledOrderItem;

use crate::error::DomainError;

/// Transactions returned per summary unless the caller asks otherwise.
pub const DEFAULT_PAGE_SIZE: usize = 20;

/// One settled line's contribution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EarningsTransaction {
    pub order_id: OrderId,
    pub product_id: ProductId,
    pub product_name: String,
    pub quantity: u32,
    pub unit_price: Money,
    pub commission_rate: CommissionRate,
    pub gross: Money,
    pub platform_fee: Money,
    pub net: Money,
    pub settled_at: DateTime<Utc>,
}

/// Earnings for one calendar month, keyed `YYYY-MM`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonthlyEarnings {
    pub month: String,
    pub gross: Money,
    pub platform_fee: Money,
    pub net: Money,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EarningsSummary {
    pub vendor_id: UserId,
    /// Rate the vendor's next settlements will be charged.
    pub commission_rate: CommissionRate,
    pub gross_revenue: Money,
    pub platform_fee: Money,
    pub net_earnings: Money,
    pub monthly_series: Vec<MonthlyEarnings>,
    pub transactions: Vec<EarningsTransaction>,
}

/// Running gross and unrounded fee, scaled by basis points.
#[derive(Debug, Default, Clone, Copy)]
struct Split {
    gross: i128,
    scaled_fee: i128,
}

impl Split {
    fn add(&mut self, gross: Money, rate: CommissionRate) {
        self.gross += i128::from(gross.amount());
        self.scaled_fee += i128::from(gross.amount()) * i128::from(rate.bps());
    }

    /// Rounds the fee once; net is whatever gross the fee leaves.
    fn settle(self) -> Result<(Money, Money, Money), DomainError> {
        let gross = i64::try_from(self.gross).map_err(|_| overflow())?;
        let fee = round_half_up_bps(self.scaled_fee).ok_or_else(overflow)?;
        let net = gross.checked_sub(fee).ok_or_else(overflow)?;
        Ok((Money::new(gross), Money::new(fee), Money::new(net)))
    }
}

fn overflow() -> DomainError {
    DomainError::Validation("earnings exceed the representable amount".to_string())
}

/// Splits a vendor's settled sales into platform fee and net earnings.
///
/// Items belonging to other vendors are ignored. Each item is charged the
/// rate frozen on it at settlement; `current_rate` is only reported back.
/// Output depends only on the inputs: months are ascending, transactions are
/// newest first with ties broken by order and product id.
pub fn summarize(
    vendor_id: UserId,
    items: &[SettledOrderItem],
    current_rate: CommissionRate,
    page_size: usize,
) -> Result<EarningsSummary, DomainError> {
    let mut total = Split::default();
    let mut months: BTreeMap<String, Split> = BTreeMap::new();
    let mut transactions = Vec::new();

    for item in items.iter().filter(|item| item.vendor_id == vendor_id) {
        let rate = item.commission_rate;
        let gross = item.gross().ok_or_else(overflow)?;

        total.add(gross, rate);
        months
            .entry(item.settled_at.format("%Y-%m").to_string())
            .or_default()
            .add(gross, rate);

        let mut line = Split::default();
        line.add(gross, rate);
        let (gross, platform_fee, net) = line.settle()?;
        transactions.push(EarningsTransaction {
            order_id: item.order_id,
            product_id: item.product_id,
            product_name: item.product_name.clone(),
            quantity: item.quantity,
            unit_price: item.unit_price,
            commission_rate: rate,
            gross,
            platform_fee,
            net,
            settled_at: item.settled_at,
        });
    }

    transactions.sort_by(|a, b| {
        b.settled_at
            .cmp(&a.settled_at)
            .then_with(|| a.order_id.cmp(&b.order_id))
            .then_with(|| a.product_id.cmp(&b.product_id))
    });
    transactions.truncate(page_size);

    let monthly_series = months
        .into_iter()
        .map(|(month, split)| {
            let (gross, platform_fee, net) = split.settle()?;
            Ok(MonthlyEarnings {
                month,
                gross,
                platform_fee,
                net,
            })
        })
        .collect::<Result<Vec<_>, DomainError>>()?;

    let (gross_revenue, platform_fee, net_earnings) = total.settle()?;
    Ok(EarningsSummary {
        vendor_id,
        commission_rate: current_rate,
        gross_revenue,
        platform_fee,
        net_earnings,
        monthly_series,
        transactions,
    })
}
