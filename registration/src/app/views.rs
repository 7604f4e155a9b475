//! Request and response bodies exchanged with the hub front end.
//!
//! Field names are camelCase on the wire. Prices leave the service as
//! decimal dollars.

use crate::types::{
    AttendeeId, CheckoutAttendee, CheckoutId, CheckoutStatus, DiscountType, EventCheckout,
    EventDiscount, EventId, EventSession, SessionId, Venue, WaitlistEntry, WaitlistEntryId,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ============================================================================
// Requests
// ============================================================================

/// Attendee as submitted by the checkout form.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendeeInput {
    /// Existing attendee id, absent for new rows
    #[serde(default)]
    pub id: Option<AttendeeId>,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub email: Option<String>,
    /// Left untouched on existing attendees when absent
    #[serde(default)]
    pub special_requests: Option<String>,
    /// Defaults to selected
    #[serde(default)]
    pub is_selected: Option<bool>,
}

/// Body of `PUT /api/event-checkout-sessions/:id`.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateCheckoutRequest {
    #[serde(default)]
    pub contact_name: Option<String>,
    #[serde(default)]
    pub contact_email: Option<String>,
    #[serde(default)]
    pub contact_phone: Option<String>,
    #[serde(default)]
    pub group_notes: Option<String>,
    /// Full attendee list; rows missing from it are deleted
    #[serde(default)]
    pub attendees: Vec<AttendeeInput>,
}

/// Body of `POST /api/event-checkout-sessions/:id/payment`.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessPaymentRequest {
    /// Tokenized card descriptor
    #[serde(default)]
    pub data_descriptor: Option<String>,
    /// Tokenized card value
    #[serde(default)]
    pub data_value: Option<String>,
    /// Total computed by the client, in dollars
    pub amount: f64,
    #[serde(default)]
    pub invoice_number: Option<String>,
    #[serde(default)]
    pub voucher_quantity: Option<u32>,
    #[serde(default)]
    pub discount_code: Option<String>,
    /// Display value only; the stored discount decides the reduction
    #[serde(default)]
    pub discount_amount: Option<f64>,
    #[serde(default)]
    pub admin_discount_type: Option<DiscountType>,
    #[serde(default)]
    pub admin_discount_value: Option<f64>,
    #[serde(default)]
    pub admin_discount_reason: Option<String>,
}

// ============================================================================
// Responses
// ============================================================================

/// Attendee row in a checkout response.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendeeView {
    /// `None` for the suggested default attendee
    pub id: Option<AttendeeId>,
    pub first_name: String,
    pub last_name: String,
    pub email: Option<String>,
    pub special_requests: Option<String>,
    pub is_selected: bool,
    pub is_waitlist: bool,
    pub is_default: bool,
}

impl From<&CheckoutAttendee> for AttendeeView {
    fn from(attendee: &CheckoutAttendee) -> Self {
        Self {
            id: Some(attendee.id),
            first_name: attendee.first_name.clone(),
            last_name: attendee.last_name.clone(),
            email: attendee.email.clone(),
            special_requests: attendee.special_requests.clone(),
            is_selected: attendee.is_selected,
            is_waitlist: attendee.is_waitlist,
            is_default: false,
        }
    }
}

/// Checkout cart as returned by start, update and details.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutView {
    pub id: CheckoutId,
    pub event_session_id: SessionId,
    pub status: CheckoutStatus,
    pub reservation_expires_at: Option<DateTime<Utc>>,
    pub contact_name: Option<String>,
    pub contact_email: Option<String>,
    pub contact_phone: Option<String>,
    pub group_notes: Option<String>,
    pub confirmation_number: Option<String>,
    pub attendees: Vec<AttendeeView>,
}

impl CheckoutView {
    /// Build the view from a checkout and its attendees.
    #[must_use]
    pub fn new(checkout: &EventCheckout, attendees: &[CheckoutAttendee]) -> Self {
        Self {
            id: checkout.id,
            event_session_id: checkout.session_id,
            status: checkout.status,
            reservation_expires_at: checkout.reservation_expires_at,
            contact_name: checkout.contact_name.clone(),
            contact_email: checkout.contact_email.clone(),
            contact_phone: checkout.contact_phone.clone(),
            group_notes: checkout.group_notes.clone(),
            confirmation_number: checkout.confirmation_number.clone(),
            attendees: attendees.iter().map(AttendeeView::from).collect(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventSummary {
    pub id: EventId,
    pub name: String,
    pub price: f64,
    pub is_voucher_eligible: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSummary {
    pub id: SessionId,
    pub name: Option<String>,
    pub max_enrollments: u32,
    pub notes: Option<String>,
    /// RFC 3339
    pub start_date: String,
    /// RFC 3339
    pub end_date: String,
    pub venue: Option<Venue>,
    pub timezone: Option<String>,
    pub timezone_short_name: Option<String>,
    pub is_virtual_only: bool,
}

impl From<&EventSession> for SessionSummary {
    fn from(session: &EventSession) -> Self {
        Self {
            id: session.id,
            name: session.name.clone(),
            max_enrollments: session.max_enrollments,
            notes: session.notes.clone(),
            start_date: session.start_date.to_rfc3339(),
            end_date: session.end_date.to_rfc3339(),
            venue: session.venue.clone(),
            timezone: session.timezone.as_ref().map(|tz| tz.identifier.clone()),
            timezone_short_name: session.timezone.as_ref().map(|tz| tz.short_name.clone()),
            is_virtual_only: session.is_virtual_only,
        }
    }
}

/// Discount the current cart qualifies for.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscountView {
    pub code: String,
    pub description: Option<String>,
    pub discount_type: DiscountType,
    pub discount_value: f64,
    pub minimum_purchase: Option<f64>,
}

impl From<&EventDiscount> for DiscountView {
    fn from(discount: &EventDiscount) -> Self {
        Self {
            code: discount.code.clone(),
            description: discount.description.clone(),
            discount_type: discount.discount_type,
            discount_value: discount.discount_value,
            minimum_purchase: discount.minimum_purchase.map(|m| m.as_decimal()),
        }
    }
}

/// Everything the checkout page renders.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutDetails {
    pub event: EventSummary,
    pub session: SessionSummary,
    pub checkout: CheckoutView,
    pub available_seats: u32,
    pub occupied_attendee_seats_by_current_user: u32,
    /// Present only for voucher-eligible events
    pub company_available_voucher_seats: Option<u32>,
    pub applicable_discounts: Vec<DiscountView>,
}

/// Result of a successful payment.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentReceipt {
    pub checkout_id: CheckoutId,
    pub status: CheckoutStatus,
    pub confirmation_number: String,
    pub invoice_number: String,
    pub subtotal: f64,
    pub total: f64,
    /// Gateway transaction, absent when nothing was captured
    pub transaction_id: Option<String>,
    pub seats_enrolled: u32,
    pub attendees_waitlisted: u32,
}

/// Waitlist entry as listed for administrators.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WaitlistEntryView {
    pub id: WaitlistEntryId,
    pub waitlist_position: u32,
    pub first_name: String,
    pub last_name: String,
    pub email: Option<String>,
    pub special_requests: Option<String>,
    pub waitlisted_at: DateTime<Utc>,
    pub seat_price: f64,
    pub promoted_at: Option<DateTime<Utc>>,
}

impl From<&WaitlistEntry> for WaitlistEntryView {
    fn from(entry: &WaitlistEntry) -> Self {
        Self {
            id: entry.id,
            waitlist_position: entry.position,
            first_name: entry.first_name.clone(),
            last_name: entry.last_name.clone(),
            email: entry.email.clone(),
            special_requests: entry.special_requests.clone(),
            waitlisted_at: entry.waitlisted_at,
            seat_price: entry.seat_price.as_decimal(),
            promoted_at: entry.promoted_at,
        }
    }
}

/// Result of promoting a waitlist entry.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PromotionReceipt {
    pub entry: WaitlistEntryView,
    pub amount_charged: f64,
    pub transaction_id: Option<String>,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_update_request_accepts_front_end_payload() {
        let request: UpdateCheckoutRequest = serde_json::from_value(json!({
            "contactName": "Pat Lee",
            "contactEmail": "pat@example.com",
            "attendees": [
                { "firstName": "Pat", "lastName": "Lee", "email": "pat@example.com" },
                { "firstName": "Sam", "lastName": "Ruiz", "isSelected": false }
            ]
        }))
        .unwrap();

        assert_eq!(request.contact_name.as_deref(), Some("Pat Lee"));
        assert_eq!(request.attendees.len(), 2);
        assert_eq!(request.attendees[0].is_selected, None);
        assert_eq!(request.attendees[1].is_selected, Some(false));
        assert!(request.group_notes.is_none());
    }

    #[test]
    fn test_payment_request_admin_discount_type() {
        let request: ProcessPaymentRequest = serde_json::from_value(json!({
            "dataDescriptor": "COMMON.ACCEPT.INAPP.PAYMENT",
            "dataValue": "token",
            "amount": 55.0,
            "invoiceNumber": "INV-1001",
            "voucherQuantity": 2,
            "discountCode": "SPRING",
            "adminDiscountType": "fixed_amount",
            "adminDiscountValue": 10
        }))
        .unwrap();

        assert_eq!(request.admin_discount_type, Some(DiscountType::FixedAmount));
        assert_eq!(request.admin_discount_value, Some(10.0));
        assert_eq!(request.voucher_quantity, Some(2));
    }

    #[test]
    fn test_default_attendee_serializes_without_id() {
        let view = AttendeeView {
            id: None,
            first_name: "Pat".to_string(),
            last_name: "Lee".to_string(),
            email: None,
            special_requests: None,
            is_selected: true,
            is_waitlist: false,
            is_default: true,
        };
        let value = serde_json::to_value(&view).unwrap();
        assert_eq!(value["id"], serde_json::Value::Null);
        assert_eq!(value["isDefault"], true);
        assert_eq!(value["firstName"], "Pat");
    }
}
