//! Error type for the registration services.

use crate::payment_gateway::PaymentGatewayError;
use crate::types::{CheckoutId, SessionId, WaitlistEntryId};
use hub_core::Money;
use hub_core::lock::LockError;
use thiserror::Error;

/// Result alias used across the crate.
pub type Result<T> = std::result::Result<T, RegistrationError>;

/// Everything that can go wrong while checking out, paying or promoting.
#[derive(Debug, Error)]
pub enum RegistrationError {
    // ------------------------------------------------------------------
    // Missing records
    // ------------------------------------------------------------------
    /// The checkout does not exist or belongs to someone else.
    #[error("Event checkout {0} not found")]
    CheckoutNotFound(CheckoutId),

    /// The checkout points at no session, or the session does not exist.
    #[error("No event session found")]
    NoEventSession,

    /// The session exists but its event does not.
    #[error("No event found for this session")]
    NoEventFound,

    /// The session id from the request does not exist.
    #[error("Event session {0} not found")]
    SessionNotFound(SessionId),

    /// The acting employee does not exist.
    #[error("Employee not found")]
    EmployeeNotFound,

    /// The acting company does not exist.
    #[error("Company not found")]
    CompanyNotFound,

    /// The waitlist entry does not exist.
    #[error("Waitlist entry {0} not found")]
    WaitlistEntryNotFound(WaitlistEntryId),

    // ------------------------------------------------------------------
    // Checkout state
    // ------------------------------------------------------------------
    /// The checkout was already paid.
    #[error("Event checkout {0} is no longer in progress")]
    CheckoutNotInProgress(CheckoutId),

    // ------------------------------------------------------------------
    // Attendee rules
    // ------------------------------------------------------------------
    /// Two attendees in one request share an email.
    #[error("Attendee email {email} appears more than once.")]
    DuplicateAttendeeEmail {
        /// Offending email
        email: String,
    },

    /// An attendee already holds a confirmed seat.
    #[error("Employee with email {email} is already enrolled in this session.")]
    AttendeeAlreadyEnrolled {
        /// Offending email
        email: String,
    },

    /// An attendee is already on the session's waitlist.
    #[error("Attendee with email {email} is already waitlisted for this session.")]
    AttendeeAlreadyWaitlisted {
        /// Offending email
        email: String,
    },

    /// More seats requested than remain.
    #[error("Not enough seats available: requested {requested}, available {available}")]
    NotEnoughSeatsAvailable {
        /// Seats requested
        requested: u32,
        /// Seats remaining
        available: u32,
    },

    // ------------------------------------------------------------------
    // Discount and voucher rules
    // ------------------------------------------------------------------
    /// Unknown or inactive discount code.
    #[error("Invalid discount code: {0}")]
    InvalidDiscountCode(String),

    /// The discount's start date is in the future.
    #[error("Discount code {0} is not active yet")]
    DiscountNotYetActive(String),

    /// The discount's end date has passed.
    #[error("Discount code {0} has expired")]
    DiscountExpired(String),

    /// The discount is mapped to other events.
    #[error("Discount code {0} is not valid for this event")]
    DiscountNotValidForEvent(String),

    /// The discount has been used its maximum number of times.
    #[error("Discount code {0} has reached its maximum usage")]
    DiscountReachedMaxUsage(String),

    /// The subtotal is below the discount's minimum purchase.
    #[error("Discount code {code} requires a minimum purchase of {minimum}")]
    DiscountMinimumPurchaseNotMet {
        /// Discount code
        code: String,
        /// Required subtotal
        minimum: Money,
    },

    /// Vouchers requested on an event that does not accept them.
    #[error("This event is not eligible for voucher redemption")]
    EventNotEligibleForVoucher,

    /// More vouchers requested than the company has left.
    #[error("Insufficient voucher seats: requested {requested}, available {available}")]
    InsufficientVoucherSeats {
        /// Vouchers requested
        requested: u32,
        /// Vouchers remaining
        available: u32,
    },

    // ------------------------------------------------------------------
    // Permissions
    // ------------------------------------------------------------------
    /// Admin discounts need `ROLE_SUPER_ADMIN`.
    #[error("You do not have permission to apply an admin discount")]
    NoPermissionToApplyAdminDiscount,

    /// Waitlist promotion needs an admin role.
    #[error("You do not have permission to manage the waitlist")]
    NoPermissionToManageWaitlist,

    // ------------------------------------------------------------------
    // Payment
    // ------------------------------------------------------------------
    /// Client-computed amount disagrees with the server.
    #[error("Payment amount mismatch: expected {expected}, received {submitted}")]
    PaymentAmountMismatch {
        /// Server-side total
        expected: Money,
        /// Amount in the request
        submitted: Money,
    },

    /// The request carried an unusable amount (negative, NaN).
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    /// A card token is needed but the request carried none.
    #[error("Payment information is required")]
    MissingPaymentToken,

    /// The gateway could not be reached or refused the transaction.
    #[error(transparent)]
    Payment(#[from] PaymentGatewayError),

    /// Promotion needs a stored card and the employee has none.
    #[error("No stored payment profile for this attendee")]
    NoStoredPaymentProfile,

    /// The entry was promoted already.
    #[error("Waitlist entry {0} was already promoted")]
    WaitlistAlreadyPromoted(WaitlistEntryId),

    // ------------------------------------------------------------------
    // Infrastructure
    // ------------------------------------------------------------------
    /// The named lock could not be taken.
    #[error(transparent)]
    Lock(#[from] LockError),

    /// Storage failure.
    #[error("Database error: {0}")]
    Database(String),
}

impl RegistrationError {
    /// Stable machine-readable code for API clients.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::CheckoutNotFound(_) => "CHECKOUT_NOT_FOUND",
            Self::NoEventSession | Self::SessionNotFound(_) => "NO_EVENT_SESSION",
            Self::NoEventFound => "NO_EVENT_FOUND",
            Self::EmployeeNotFound => "EMPLOYEE_NOT_FOUND",
            Self::CompanyNotFound => "COMPANY_NOT_FOUND",
            Self::WaitlistEntryNotFound(_) => "WAITLIST_ENTRY_NOT_FOUND",
            Self::CheckoutNotInProgress(_) => "CHECKOUT_NOT_IN_PROGRESS",
            Self::DuplicateAttendeeEmail { .. } => "DUPLICATE_ATTENDEE_EMAIL",
            Self::AttendeeAlreadyEnrolled { .. } => "ATTENDEE_ALREADY_ENROLLED",
            Self::AttendeeAlreadyWaitlisted { .. } => "ATTENDEE_ALREADY_WAITLISTED",
            Self::NotEnoughSeatsAvailable { .. } => "NOT_ENOUGH_SEATS_AVAILABLE",
            Self::InvalidDiscountCode(_) => "INVALID_DISCOUNT_CODE",
            Self::DiscountNotYetActive(_) => "DISCOUNT_NOT_YET_ACTIVE",
            Self::DiscountExpired(_) => "DISCOUNT_EXPIRED",
            Self::DiscountNotValidForEvent(_) => "DISCOUNT_NOT_VALID_FOR_EVENT",
            Self::DiscountReachedMaxUsage(_) => "DISCOUNT_REACHED_MAX_USAGE",
            Self::DiscountMinimumPurchaseNotMet { .. } => "DISCOUNT_MINIMUM_PURCHASE_NOT_MET",
            Self::EventNotEligibleForVoucher => "EVENT_NOT_ELIGIBLE_FOR_VOUCHER",
            Self::InsufficientVoucherSeats { .. } => "INSUFFICIENT_VOUCHER_SEATS",
            Self::NoPermissionToApplyAdminDiscount => "NO_PERMISSION_TO_APPLY_ADMIN_DISCOUNT",
            Self::NoPermissionToManageWaitlist => "NO_PERMISSION_TO_MANAGE_WAITLIST",
            Self::PaymentAmountMismatch { .. } => "PAYMENT_AMOUNT_MISMATCH",
            Self::InvalidAmount(_) => "INVALID_AMOUNT",
            Self::MissingPaymentToken => "MISSING_PAYMENT_TOKEN",
            Self::Payment(_) => "PAYMENT_FAILED",
            Self::NoStoredPaymentProfile => "NO_STORED_PAYMENT_PROFILE",
            Self::WaitlistAlreadyPromoted(_) => "WAITLIST_ALREADY_PROMOTED",
            Self::Lock(_) => "LOCK_UNAVAILABLE",
            Self::Database(_) => "DATABASE_ERROR",
        }
    }
}

impl From<sqlx::Error> for RegistrationError {
    fn from(err: sqlx::Error) -> Self {
        Self::Database(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_enrollment_message_names_the_email() {
        let err = RegistrationError::AttendeeAlreadyEnrolled {
            email: "pat@example.com".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Employee with email pat@example.com is already enrolled in this session."
        );
        assert_eq!(err.code(), "ATTENDEE_ALREADY_ENROLLED");
    }

    #[test]
    fn test_amount_mismatch_formats_money() {
        let err = RegistrationError::PaymentAmountMismatch {
            expected: Money::from_cents(9999),
            submitted: Money::from_cents(10001),
        };
        assert_eq!(
            err.to_string(),
            "Payment amount mismatch: expected $99.99, received $100.01"
        );
    }
}
