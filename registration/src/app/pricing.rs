//! Checkout pricing.
//!
//! Every reduction is computed against the original subtotal and then
//! subtracted; the total never goes below zero.

use crate::types::{DiscountType, EventDiscount};
use hub_core::Money;
use serde::{Deserialize, Serialize};

/// Discount entered by an administrator at payment time.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AdminDiscount {
    /// Percentage or fixed amount
    pub discount_type: DiscountType,
    /// Percent (0-100) or dollars, depending on `discount_type`
    pub value: f64,
    /// Free-text reason shown on the invoice line
    pub reason: Option<String>,
}

impl AdminDiscount {
    /// Whether the discount reduces anything.
    #[must_use]
    pub fn is_effective(&self) -> bool {
        self.value > 0.0
    }
}

/// Amount a discount of `discount_type`/`value` takes off `subtotal`.
///
/// Percentages round to the nearest cent. Unusable fixed amounts count as
/// zero.
#[must_use]
pub fn discount_amount(discount_type: DiscountType, value: f64, subtotal: Money) -> Money {
    match discount_type {
        DiscountType::Percentage => subtotal.percentage(value),
        DiscountType::FixedAmount => Money::from_decimal(value).unwrap_or(Money::ZERO),
    }
}

/// Every figure behind a checkout total.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct PriceBreakdown {
    /// Event seat price
    pub unit_price: Money,
    /// Seated attendees
    pub seats: u32,
    /// `unit_price × seats`
    pub subtotal: Money,
    /// Vouchers actually redeemed, capped at `seats`
    pub voucher_seats: u32,
    /// `unit_price × voucher_seats`
    pub voucher_credit: Money,
    /// Reduction from the discount code
    pub discount: Money,
    /// Reduction from the admin discount
    pub admin_discount: Money,
    /// Amount to charge
    pub total: Money,
}

/// Price a checkout.
#[must_use]
pub fn price_checkout(
    unit_price: Money,
    seats: u32,
    voucher_quantity: u32,
    discount: Option<&EventDiscount>,
    admin: Option<&AdminDiscount>,
) -> PriceBreakdown {
    let subtotal = unit_price.times(seats);
    let voucher_seats = voucher_quantity.min(seats);
    let voucher_credit = unit_price.times(voucher_seats);

    let discount = discount.map_or(Money::ZERO, |d| {
        discount_amount(d.discount_type, d.discount_value, subtotal)
    });
    let admin_discount = admin.map_or(Money::ZERO, |a| {
        discount_amount(a.discount_type, a.value, subtotal)
    });

    let total = subtotal
        .saturating_sub(voucher_credit)
        .saturating_sub(discount)
        .saturating_sub(admin_discount);

    PriceBreakdown {
        unit_price,
        seats,
        subtotal,
        voucher_seats,
        voucher_credit,
        discount,
        admin_discount,
        total,
    }
}
