//! Monetary amounts and percentage rates.

use serde::{Deserialize, Serialize};

/// Basis points in one whole (100%).
const BPS_SCALE: i64 = 10_000;

/// Money amount in whole currency units.
///
/// Prices, totals, fees and earnings are all integers; fractional results of
/// a percentage are rounded half-up to the nearest unit.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Money(i64);

impl Money {
    /// Creates a new amount.
    pub const fn new(amount: i64) -> Self {
        Self(amount)
    }

    /// Returns zero money.
    pub const fn zero() -> Self {
        Self(0)
    }

    /// Returns the raw amount.
    pub const fn amount(&self) -> i64 {
        self.0
    }

    /// Returns true if the amount is positive.
    pub const fn is_positive(&self) -> bool {
        self.0 > 0
    }

    /// Returns true if the amount is zero.
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Multiplies by a quantity. `None` on overflow.
    pub const fn checked_multiply(&self, quantity: u32) -> Option<Money> {
        match self.0.checked_mul(quantity as i64) {
            Some(amount) => Some(Money(amount)),
            None => None,
        }
    }

    /// Adds two amounts. `None` on overflow.
    pub const fn checked_add(&self, rhs: Money) -> Option<Money> {
        match self.0.checked_add(rhs.0) {
            Some(amount) => Some(Money(amount)),
            None => None,
        }
    }

    /// Applies a rate expressed in basis points, rounding half-up.
    ///
    /// `Money::new(1000).apply_bps(1800)` is 18% of 1000, i.e. 180. `None`
    /// if the result does not fit.
    pub fn apply_bps(&self, bps: u32) -> Option<Money> {
        round_half_up_bps(self.0 as i128 * bps as i128).map(Money)
    }
}

/// Rounds a value scaled by basis points back to whole units, half-up.
///
/// Accumulating `amount * bps` and rounding once keeps sums exact when
/// several amounts share a rate. `None` if the result does not fit in `i64`.
pub fn round_half_up_bps(scaled: i128) -> Option<i64> {
    let scale = BPS_SCALE as i128;
    let rounded = scaled.checked_add(scale / 2)?.div_euclid(scale);
    i64::try_from(rounded).ok()
}

impl std::fmt::Display for Money {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::ops::Add for Money {
    type Output = Money;

    fn add(self, rhs: Self) -> Self::Output {
        Money(self.0 + rhs.0)
    }
}

impl std::ops::Sub for Money {
    type Output = Money;

    fn sub(self, rhs: Self) -> Self::Output {
        Money(self.0 - rhs.0)
    }
}

impl std::iter::Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Self {
        iter.fold(Money::zero(), |acc, m| acc + m)
    }
}

/// Platform commission rate charged on a vendor's gross revenue.
///
/// Stored in basis points so fractional percentages such as 12.5% are exact.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct CommissionRate(u32);

impl CommissionRate {
    /// Creates a rate from a whole percentage (`15` → 15%).
    pub const fn from_percent(percent: u32) -> Self {
        Self(percent * 100)
    }

    /// Creates a rate from basis points (`1250` → 12.5%).
    pub const fn from_bps(bps: u32) -> Self {
        Self(bps)
    }

    /// Returns the rate in basis points.
    pub const fn bps(&self) -> u32 {
        self.0
    }

    /// Returns true if the rate is within 0..=100%.
    pub const fn is_valid(&self) -> bool {
        self.0 as i64 <= BPS_SCALE
    }
}

impl std::fmt::Display for CommissionRate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.0 % 100 == 0 {
            write!(f, "{}%", self.0 / 100)
        } else {
            write!(f, "{}.{:02}%", self.0 / 100, self.0 % 100)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_money_arithmetic() {
        let a = Money::new(1000);
        let b = Money::new(500);

        assert_eq!((a + b).amount(), 1500);
        assert_eq!((a - b).amount(), 500);
        assert_eq!(a.checked_multiply(3), Some(Money::new(3000)));
        assert_eq!(a.checked_add(b), Some(Money::new(1500)));
    }

    #[test]
    fn test_checked_arithmetic_overflow() {
        assert_eq!(Money::new(3_000_000_000).checked_multiply(u32::MAX), None);
        assert_eq!(Money::new(i64::MAX).checked_add(Money::new(1)), None);
        assert_eq!(Money::new(i64::MAX).apply_bps(20_000), None);
    }

    #[test]
    fn test_money_sum() {
        let total: Money = [Money::new(1), Money::new(2), Money::new(3)]
            .into_iter()
            .sum();
        assert_eq!(total, Money::new(6));
    }

    #[test]
    fn test_apply_bps_exact() {
        assert_eq!(Money::new(6000).apply_bps(1800), Some(Money::new(1080)));
        assert_eq!(Money::new(1000).apply_bps(1800), Some(Money::new(180)));
        assert_eq!(Money::new(10_000).apply_bps(1500), Some(Money::new(1500)));
    }

    #[test]
    fn test_apply_bps_rounds_half_up() {
        // 18% of 25 = 4.5
        assert_eq!(Money::new(25).apply_bps(1800), Some(Money::new(5)));
        // 18% of 24 = 4.32
        assert_eq!(Money::new(24).apply_bps(1800), Some(Money::new(4)));
        // 18% of 26 = 4.68
        assert_eq!(Money::new(26).apply_bps(1800), Some(Money::new(5)));
    }

    #[test]
    fn test_commission_rate_display() {
        assert_eq!(CommissionRate::from_percent(15).to_string(), "15%");
        assert_eq!(CommissionRate::from_bps(1250).to_string(), "12.50%");
    }

    #[test]
    fn test_commission_rate_validity() {
        assert!(CommissionRate::from_percent(100).is_valid());
        assert!(!CommissionRate::from_bps(10_001).is_valid());
    }
}
