//! Business metrics for event registration.
//!
//! # Exported Metrics
//!
//! ## Counters
//! - `registration_checkouts_started_total` - Checkout carts opened
//! - `registration_checkouts_updated_total` - Attendee list updates
//! - `registration_seats_reserved_total` - Attendees seated by an update
//! - `registration_attendees_waitlisted_total` - Attendees pushed over capacity
//! - `registration_payments_total{status}` - Payments by status
//! - `registration_payment_revenue_cents_total` - Captured revenue in cents
//! - `registration_waitlist_promotions_total` - Waitlist entries promoted
//!
//! ## Histograms
//! - `registration_payment_duration_seconds` - Payment processing time

use metrics::{describe_counter, describe_histogram};

/// Initialize and register all business metrics descriptions.
///
/// This should be called once at application startup, before any metrics are recorded.
pub fn register_business_metrics() {
    describe_counter!(
        "registration_checkouts_started_total",
        "Total number of checkout carts opened"
    );
    describe_counter!(
        "registration_checkouts_updated_total",
        "Total number of checkout attendee updates"
    );
    describe_counter!(
        "registration_seats_reserved_total",
        "Attendees seated by checkout updates"
    );
    describe_counter!(
        "registration_attendees_waitlisted_total",
        "Attendees marked for the waitlist by checkout updates"
    );

    describe_counter!(
        "registration_payments_total",
        "Total number of payments by status (succeeded, failed, profile_stored, no_charge)"
    );
    describe_counter!(
        "registration_payment_revenue_cents_total",
        "Total revenue from captured payments in cents"
    );
    describe_histogram!(
        "registration_payment_duration_seconds",
        "Time taken to process a checkout payment"
    );

    describe_counter!(
        "registration_waitlist_promotions_total",
        "Total number of waitlist entries promoted to enrollments"
    );

    tracing::info!("Business metrics registered");
}

// ============================================================================
// Metric Recording Functions
// ============================================================================

/// Record a newly opened checkout.
pub fn record_checkout_started() {
    metrics::counter!("registration_checkouts_started_total").increment(1);
}

/// Record a checkout update and the seating it produced.
pub fn record_checkout_updated(seated: u32, waitlisted: u32) {
    metrics::counter!("registration_checkouts_updated_total").increment(1);
    metrics::counter!("registration_seats_reserved_total").increment(u64::from(seated));
    metrics::counter!("registration_attendees_waitlisted_total").increment(u64::from(waitlisted));
    tracing::debug!(seated, waitlisted, "Recorded checkout_updated metric");
}

/// Record a captured payment.
///
/// # Arguments
///
/// * `amount_cents` - Amount captured in cents
/// * `duration_secs` - Time taken to process payment in seconds
pub fn record_payment_succeeded(amount_cents: u64, duration_secs: f64) {
    metrics::counter!("registration_payments_total", "status" => "succeeded").increment(1);
    metrics::counter!("registration_payment_revenue_cents_total").increment(amount_cents);
    metrics::histogram!("registration_payment_duration_seconds").record(duration_secs);
    tracing::debug!(amount_cents, duration_secs, "Recorded payment_succeeded metric");
}

/// Record a completed checkout that captured no money.
///
/// `status` is `profile_stored` for waitlist-only carts and `no_charge` otherwise.
pub fn record_payment_without_charge(status: &'static str, duration_secs: f64) {
    metrics::counter!("registration_payments_total", "status" => status).increment(1);
    metrics::histogram!("registration_payment_duration_seconds").record(duration_secs);
}

/// Record a failed payment.
///
/// # Arguments
///
/// * `reason` - Error code of the failure (e.g., `PAYMENT_FAILED`, `PAYMENT_AMOUNT_MISMATCH`)
pub fn record_payment_failed(reason: &'static str) {
    metrics::counter!("registration_payments_total", "status" => "failed", "reason" => reason)
        .increment(1);
    tracing::debug!(reason, "Recorded payment_failed metric");
}

/// Record a waitlist promotion.
pub fn record_waitlist_promoted(amount_cents: u64) {
    metrics::counter!("registration_waitlist_promotions_total").increment(1);
    if amount_cents > 0 {
        metrics::counter!("registration_payment_revenue_cents_total").increment(amount_cents);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recording_without_recorder_is_noop() {
        register_business_metrics();
        record_checkout_started();
        record_checkout_updated(2, 1);
        record_payment_succeeded(10_000, 0.25);
        record_payment_without_charge("profile_stored", 0.1);
        record_payment_failed("PAYMENT_FAILED");
        record_waitlist_promoted(5_000);
    }
}
