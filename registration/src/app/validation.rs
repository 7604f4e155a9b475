//! Checkout validators.
//!
//! Each check either passes or returns the [`RegistrationError`] shown to the
//! user. Payment runs them in a fixed order and stops at the first failure;
//! checkout updates reuse the attendee checks.

use super::pricing::AdminDiscount;
use super::seating::remaining_capacity;
use crate::error::{RegistrationError, Result};
use crate::store::RegistrationTx;
use crate::types::{
    CheckoutId, CompanyId, Employee, Event, EventDiscount, EventSession, ROLE_SUPER_ADMIN,
};
use chrono::{DateTime, Utc};
use hub_core::Money;
use std::collections::HashSet;

/// Reject an email used by two attendees of the same request.
///
/// Emails are trimmed and compared case-sensitively. Missing or blank
/// emails are skipped.
///
/// # Errors
///
/// [`RegistrationError::DuplicateAttendeeEmail`] naming the repeated email.
pub fn ensure_unique_emails<'a>(emails: impl IntoIterator<Item = Option<&'a str>>) -> Result<()> {
    let mut seen = HashSet::new();
    for email in emails.into_iter().flatten() {
        let email = email.trim();
        if email.is_empty() {
            continue;
        }
        if !seen.insert(email) {
            return Err(RegistrationError::DuplicateAttendeeEmail {
                email: email.to_string(),
            });
        }
    }
    Ok(())
}

/// Reject attendees who already hold a confirmed seat in `session`.
///
/// An email belonging to an employee of `company` is checked by employee;
/// any other email is checked as given.
///
/// # Errors
///
/// [`RegistrationError::AttendeeAlreadyEnrolled`] for the first match.
pub async fn ensure_not_enrolled<T: RegistrationTx>(
    tx: &mut T,
    session: &EventSession,
    company: CompanyId,
    emails: &[String],
) -> Result<()> {
    for email in emails {
        let enrolled = match tx.find_employee_by_email(company, email).await? {
            Some(employee) => tx
                .find_enrollment_for_employee(session.id, employee.id)
                .await?
                .is_some(),
            None => tx.find_enrollment_for_email(session.id, email).await?.is_some(),
        };

        if enrolled {
            return Err(RegistrationError::AttendeeAlreadyEnrolled {
                email: email.clone(),
            });
        }
    }
    Ok(())
}

/// Reject attendees already waiting for a seat in `session`.
///
/// Matched the same way as [`ensure_not_enrolled`]. Promoted entries do
/// not count.
///
/// # Errors
///
/// [`RegistrationError::AttendeeAlreadyWaitlisted`] for the first match.
pub async fn ensure_not_waitlisted<T: RegistrationTx>(
    tx: &mut T,
    session: &EventSession,
    company: CompanyId,
    emails: &[String],
) -> Result<()> {
    for email in emails {
        let waitlisted = match tx.find_employee_by_email(company, email).await? {
            Some(employee) => tx
                .find_waitlist_for_employee(session.id, employee.id)
                .await?
                .is_some(),
            None => tx.find_waitlist_for_email(session.id, email).await?.is_some(),
        };

        if waitlisted {
            return Err(RegistrationError::AttendeeAlreadyWaitlisted {
                email: email.clone(),
            });
        }
    }
    Ok(())
}

/// Seats still open to `checkout`: the session maximum minus confirmed
/// enrollments and the live holds of every other cart.
///
/// # Errors
///
/// Storage errors only.
pub async fn seats_open_to<T: RegistrationTx>(
    tx: &mut T,
    session: &EventSession,
    checkout: Option<CheckoutId>,
    now: DateTime<Utc>,
) -> Result<u32> {
    let enrolled = tx.count_enrollments(session.id).await?;
    let held = tx.count_held_seats(session.id, checkout, now).await?;
    Ok(remaining_capacity(session.max_enrollments, enrolled, held))
}

/// Reject a request for more seats than remain.
///
/// # Errors
///
/// [`RegistrationError::NotEnoughSeatsAvailable`].
pub fn ensure_seats_available(requested: u32, available: u32) -> Result<()> {
    if requested > available {
        return Err(RegistrationError::NotEnoughSeatsAvailable {
            requested,
            available,
        });
    }
    Ok(())
}

/// Validate a discount code for `event` and return the stored discount.
///
/// Blank or missing codes pass with `None`.
///
/// # Errors
///
/// The first failing rule, checked in this order: unknown or inactive,
/// not started, expired, not mapped to `event`, usage exhausted, minimum
/// purchase not met.
pub async fn validate_discount_code<T: RegistrationTx>(
    tx: &mut T,
    code: Option<&str>,
    event: &Event,
    subtotal: Money,
    now: DateTime<Utc>,
) -> Result<Option<EventDiscount>> {
    let Some(code) = code.map(str::trim).filter(|c| !c.is_empty()) else {
        return Ok(None);
    };

    let discount = match tx.find_discount_by_code(code).await? {
        Some(discount) if discount.is_active => discount,
        _ => return Err(RegistrationError::InvalidDiscountCode(code.to_string())),
    };

    if discount.start_date.is_some_and(|start| start > now) {
        return Err(RegistrationError::DiscountNotYetActive(discount.code));
    }
    if discount.end_date.is_some_and(|end| end < now) {
        return Err(RegistrationError::DiscountExpired(discount.code));
    }
    if !discount.applies_to_event(event.id) {
        return Err(RegistrationError::DiscountNotValidForEvent(discount.code));
    }
    if let Some(maximum) = discount.maximum_uses {
        if tx.count_discount_uses(&discount.code).await? >= maximum {
            return Err(RegistrationError::DiscountReachedMaxUsage(discount.code));
        }
    }
    if let Some(minimum) = discount.minimum_purchase {
        if subtotal < minimum {
            return Err(RegistrationError::DiscountMinimumPurchaseNotMet {
                code: discount.code,
                minimum,
            });
        }
    }

    Ok(Some(discount))
}

/// Voucher seats `company` can still redeem: the seats of its active,
/// in-window vouchers minus those already used.
///
/// # Errors
///
/// Storage errors only.
pub async fn available_voucher_seats<T: RegistrationTx>(
    tx: &mut T,
    company: CompanyId,
    now: DateTime<Utc>,
) -> Result<u32> {
    let total: u32 = tx
        .list_active_vouchers(company, now)
        .await?
        .iter()
        .filter(|voucher| voucher.is_redeemable_at(now))
        .fold(0_u32, |sum, voucher| sum.saturating_add(voucher.total_seats));
    let used = tx.count_voucher_seats_used(company).await?;
    Ok(total.saturating_sub(used))
}

/// Validate a voucher redemption. A quantity of zero always passes.
///
/// # Errors
///
/// [`RegistrationError::EventNotEligibleForVoucher`] or
/// [`RegistrationError::InsufficientVoucherSeats`].
pub async fn validate_voucher_redemption<T: RegistrationTx>(
    tx: &mut T,
    quantity: u32,
    event: &Event,
    company: CompanyId,
    now: DateTime<Utc>,
) -> Result<()> {
    if quantity == 0 {
        return Ok(());
    }
    if !event.is_voucher_eligible {
        return Err(RegistrationError::EventNotEligibleForVoucher);
    }

    let available = available_voucher_seats(tx, company, now).await?;
    if quantity > available {
        return Err(RegistrationError::InsufficientVoucherSeats {
            requested: quantity,
            available,
        });
    }
    Ok(())
}

/// Only super admins may apply a nonzero admin discount.
///
/// # Errors
///
/// [`RegistrationError::NoPermissionToApplyAdminDiscount`].
pub fn ensure_admin_discount_permitted(
    employee: &Employee,
    admin: Option<&AdminDiscount>,
) -> Result<()> {
    match admin {
        Some(discount) if discount.is_effective() && !employee.has_role(ROLE_SUPER_ADMIN) => {
            Err(RegistrationError::NoPermissionToApplyAdminDiscount)
        }
        _ => Ok(()),
    }
}

/// The amount the client submitted must equal the computed total to the
/// cent.
///
/// # Errors
///
/// [`RegistrationError::InvalidAmount`] for negative or non-finite input,
/// [`RegistrationError::PaymentAmountMismatch`] otherwise.
pub fn ensure_amount_matches(expected: Money, submitted: f64) -> Result<()> {
    let submitted = Money::from_decimal(submitted)
        .ok_or_else(|| RegistrationError::InvalidAmount(submitted.to_string()))?;

    if submitted != expected {
        return Err(RegistrationError::PaymentAmountMismatch {
            expected,
            submitted,
        });
    }
    Ok(())
}
