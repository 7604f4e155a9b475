//! Money value object.
//!
//! Amounts are held in integer cents so that seat subtotals, discounts and
//! voucher credits add up exactly. Conversions from decimal dollars (as they
//! arrive in JSON) round to the nearest cent.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;

/// Represents money in cents to avoid floating-point arithmetic errors
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Money(u64);

impl Money {
    /// Zero amount
    pub const ZERO: Self = Self(0);

    /// Creates a `Money` value from cents
    #[must_use]
    pub const fn from_cents(cents: u64) -> Self {
        Self(cents)
    }

    /// Creates a `Money` value from whole dollars, saturating on overflow
    #[must_use]
    pub const fn from_dollars(dollars: u64) -> Self {
        Self(dollars.saturating_mul(100))
    }

    /// Creates a `Money` value from a decimal dollar amount, rounding to the
    /// nearest cent.
    ///
    /// Returns `None` for negative, NaN or infinite input.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn from_decimal(dollars: f64) -> Option<Self> {
        if !dollars.is_finite() || dollars < 0.0 {
            return None;
        }
        let cents = (dollars * 100.0).round();
        if cents > u64::MAX as f64 {
            return None;
        }
        Some(Self(cents as u64))
    }

    /// Returns the amount in cents
    #[must_use]
    pub const fn cents(&self) -> u64 {
        self.0
    }

    /// Returns the amount as decimal dollars (for JSON responses)
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn as_decimal(&self) -> f64 {
        self.0 as f64 / 100.0
    }

    /// Checks if the amount is zero
    #[must_use]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Adds two money amounts with overflow checking
    #[must_use]
    pub const fn checked_add(self, other: Self) -> Option<Self> {
        match self.0.checked_add(other.0) {
            Some(result) => Some(Self(result)),
            None => None,
        }
    }

    /// Adds two money amounts, saturating at the maximum
    #[must_use]
    pub const fn saturating_add(self, other: Self) -> Self {
        Self(self.0.saturating_add(other.0))
    }

    /// Subtracts two money amounts (returns None if result would be negative)
    #[must_use]
    pub const fn checked_sub(self, other: Self) -> Option<Self> {
        if self.0 >= other.0 {
            Some(Self(self.0 - other.0))
        } else {
            None
        }
    }

    /// Subtracts two money amounts, clamping at zero
    #[must_use]
    pub const fn saturating_sub(self, other: Self) -> Self {
        Self(self.0.saturating_sub(other.0))
    }

    /// Multiplies a unit price by a quantity
    #[must_use]
    pub const fn times(self, quantity: u32) -> Self {
        Self(self.0.saturating_mul(quantity as u64))
    }

    /// Returns `percent`% of this amount, rounded to the nearest cent.
    ///
    /// Negative or non-finite percentages yield zero.
    #[must_use]
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss
    )]
    pub fn percentage(self, percent: f64) -> Self {
        if !percent.is_finite() || percent <= 0.0 {
            return Self::ZERO;
        }
        let cents = (self.0 as f64 * percent / 100.0).round();
        if cents >= u64::MAX as f64 {
            return Self(u64::MAX);
        }
        Self(cents as u64)
    }

    /// Formats the amount as a plain decimal string (`"50.00"`)
    #[must_use]
    pub fn to_decimal_string(&self) -> String {
        format!("{}.{:02}", self.0 / 100, self.0 % 100)
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "${}.{:02}", self.0 / 100, self.0 % 100)
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::ZERO, Self::saturating_add)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_from_decimal_rounds_to_cents() {
        assert_eq!(Money::from_decimal(33.33).unwrap().cents(), 3333);
        assert_eq!(Money::from_decimal(0.01).unwrap().cents(), 1);
        assert_eq!(Money::from_decimal(19.95).unwrap().cents(), 1995);
        assert!(Money::from_decimal(-1.0).is_none());
        assert!(Money::from_decimal(f64::NAN).is_none());
    }

    #[test]
    fn test_percentage_rounds_half_cents() {
        // 15% of 99.99 is 14.9985
        assert_eq!(Money::from_cents(9999).percentage(15.0).cents(), 1500);
        assert_eq!(Money::from_cents(8000).percentage(12.5).cents(), 1000);
        assert_eq!(Money::from_cents(8000).percentage(0.0), Money::ZERO);
        assert_eq!(Money::from_cents(8000).percentage(-5.0), Money::ZERO);
    }

    #[test]
    fn test_formatting() {
        let money = Money::from_cents(5005);
        assert_eq!(money.to_string(), "$50.05");
        assert_eq!(money.to_decimal_string(), "50.05");
        assert_eq!(Money::ZERO.to_decimal_string(), "0.00");
    }

    #[test]
    fn test_saturating_sub_clamps_at_zero() {
        let price = Money::from_dollars(10);
        assert_eq!(price.saturating_sub(Money::from_dollars(15)), Money::ZERO);
        assert_eq!(price.checked_sub(Money::from_dollars(15)), None);
    }

    #[test]
    fn test_sum() {
        let total: Money = [Money::from_cents(150), Money::from_cents(250)]
            .into_iter()
            .sum();
        assert_eq!(total.cents(), 400);
    }

    proptest! {
        #[test]
        fn prop_decimal_string_round_trips(cents in 0u64..10_000_000) {
            let money = Money::from_cents(cents);
            let parsed: f64 = money.to_decimal_string().parse().unwrap();
            prop_assert_eq!(Money::from_decimal(parsed), Some(money));
        }

        #[test]
        fn prop_full_percentage_is_identity(cents in 0u64..10_000_000) {
            let money = Money::from_cents(cents);
            prop_assert_eq!(money.percentage(100.0), money);
        }
    }
}
