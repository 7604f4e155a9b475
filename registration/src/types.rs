//! Domain types for event registration.
//!
//! Identifiers, catalog records (companies, employees, events, sessions),
//! the checkout cart and its attendees, confirmed enrollments, the waitlist,
//! discounts, vouchers and billing documents.

use chrono::{DateTime, Utc};
use hub_core::Money;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

// ============================================================================
// Identifiers
// ============================================================================

macro_rules! entity_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            /// Creates a new random id
            #[must_use]
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// Wraps an existing UUID
            #[must_use]
            pub const fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            /// Get the inner UUID
            #[must_use]
            pub const fn as_uuid(&self) -> &Uuid {
                &self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<Uuid> for $name {
            fn from(uuid: Uuid) -> Self {
                Self(uuid)
            }
        }
    };
}

entity_id!(
    /// Member company
    CompanyId
);
entity_id!(
    /// Employee of a member company
    EmployeeId
);
entity_id!(
    /// Catalog event (course)
    EventId
);
entity_id!(
    /// Scheduled session of an event
    SessionId
);
entity_id!(
    /// Venue hosting a session
    VenueId
);
entity_id!(
    /// Checkout cart
    CheckoutId
);
entity_id!(
    /// Attendee row inside a checkout
    AttendeeId
);
entity_id!(
    /// Confirmed seat
    EnrollmentId
);
entity_id!(
    /// Waitlist entry
    WaitlistEntryId
);
entity_id!(
    /// Discount code
    DiscountId
);
entity_id!(
    /// Company voucher allotment
    VoucherId
);
entity_id!(
    /// Invoice
    InvoiceId
);
entity_id!(
    /// Credit memo
    CreditMemoId
);
entity_id!(
    /// Recorded gateway payment
    PaymentId
);
entity_id!(
    /// Stored gateway profile
    PaymentProfileId
);

/// Role that may apply admin discounts and promote the waitlist.
pub const ROLE_SUPER_ADMIN: &str = "ROLE_SUPER_ADMIN";

/// Role that may promote the waitlist.
pub const ROLE_ADMIN: &str = "ROLE_ADMIN";

// ============================================================================
// Catalog
// ============================================================================

/// Member company.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Company {
    /// Company id
    pub id: CompanyId,
    /// Display name
    pub name: String,
}

/// Employee of a company. `role` is the internal name of their business role.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Employee {
    /// Employee id
    pub id: EmployeeId,
    /// Employer
    pub company_id: CompanyId,
    /// First name
    pub first_name: String,
    /// Last name
    pub last_name: String,
    /// Work email
    pub work_email: Option<String>,
    /// Business role internal name, e.g. `ROLE_SUPER_ADMIN`
    pub role: Option<String>,
}

impl Employee {
    /// Whether the employee's business role is `role`.
    #[must_use]
    pub fn has_role(&self, role: &str) -> bool {
        self.role.as_deref() == Some(role)
    }
}

/// Catalog event. Every session of the event sells seats at `price`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    /// Event id
    pub id: EventId,
    /// Event name
    pub name: String,
    /// Price per seat
    pub price: Money,
    /// Whether company vouchers may pay for seats
    pub is_voucher_eligible: bool,
    /// Published flag
    pub is_published: bool,
}

/// Venue of an in-person session.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Venue {
    /// Venue id
    pub id: VenueId,
    /// Venue name
    pub name: String,
    /// Street address
    pub address: Option<String>,
    /// City
    pub city: Option<String>,
    /// State
    pub state: Option<String>,
    /// Postal code
    pub postal_code: Option<String>,
}

/// Timezone a session is scheduled in.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Timezone {
    /// IANA identifier, e.g. `America/Chicago`
    pub identifier: String,
    /// Short label, e.g. `CT`
    pub short_name: String,
}

/// Scheduled session of an event.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventSession {
    /// Session id
    pub id: SessionId,
    /// Parent event
    pub event_id: EventId,
    /// Optional session label
    pub name: Option<String>,
    /// Start
    pub start_date: DateTime<Utc>,
    /// End
    pub end_date: DateTime<Utc>,
    /// Seat capacity
    pub max_enrollments: u32,
    /// Free-form notes
    pub notes: Option<String>,
    /// Meeting link for virtual sessions
    pub virtual_link: Option<String>,
    /// Published flag
    pub is_published: bool,
    /// No physical venue
    pub is_virtual_only: bool,
    /// Venue
    pub venue: Option<Venue>,
    /// Timezone
    pub timezone: Option<Timezone>,
}

// ============================================================================
// Checkout
// ============================================================================

/// Lifecycle of a checkout cart.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckoutStatus {
    /// Open cart
    InProgress,
    /// Paid
    Completed,
}

impl CheckoutStatus {
    /// Database representation
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
        }
    }
}

impl FromStr for CheckoutStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "in_progress" => Ok(Self::InProgress),
            "completed" => Ok(Self::Completed),
            other => Err(format!("unknown checkout status: {other}")),
        }
    }
}

/// A checkout cart for one employee, session and company.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventCheckout {
    /// Checkout id
    pub id: CheckoutId,
    /// Session being purchased
    pub session_id: SessionId,
    /// Company paying
    pub company_id: CompanyId,
    /// Employee who opened the cart
    pub created_by: EmployeeId,
    /// Status
    pub status: CheckoutStatus,
    /// Contact name
    pub contact_name: Option<String>,
    /// Contact email
    pub contact_email: Option<String>,
    /// Contact phone
    pub contact_phone: Option<String>,
    /// Notes for the whole group
    pub group_notes: Option<String>,
    /// Seats held by this cart stop counting after this instant
    pub reservation_expires_at: Option<DateTime<Utc>>,
    /// `CN-XXXXXXXX`, assigned at payment
    pub confirmation_number: Option<String>,
    /// Amount charged
    pub amount: Option<Money>,
    /// Payment time
    pub finalized_at: Option<DateTime<Utc>>,
    /// Gateway customer profile
    pub customer_profile_id: Option<String>,
    /// Gateway payment profile
    pub payment_profile_id: Option<String>,
    /// Last four digits of the card
    pub card_last4: Option<String>,
    /// Card brand
    pub card_type: Option<String>,
    /// Created
    pub created_at: DateTime<Utc>,
    /// Last modified
    pub updated_at: DateTime<Utc>,
}

impl EventCheckout {
    /// A fresh in-progress cart with no contact info and no hold.
    #[must_use]
    pub fn open(
        session_id: SessionId,
        company_id: CompanyId,
        created_by: EmployeeId,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: CheckoutId::new(),
            session_id,
            company_id,
            created_by,
            status: CheckoutStatus::InProgress,
            contact_name: None,
            contact_email: None,
            contact_phone: None,
            group_notes: None,
            reservation_expires_at: None,
            confirmation_number: None,
            amount: None,
            finalized_at: None,
            customer_profile_id: None,
            payment_profile_id: None,
            card_last4: None,
            card_type: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Whether the cart can still be edited or paid.
    #[must_use]
    pub fn is_in_progress(&self) -> bool {
        self.status == CheckoutStatus::InProgress
    }

    /// Whether the cart's seats currently count against capacity.
    #[must_use]
    pub fn has_live_reservation(&self, now: DateTime<Utc>) -> bool {
        self.is_in_progress() && self.reservation_expires_at.is_some_and(|at| at > now)
    }

    /// Whether `employee` acting for `company` owns this cart.
    #[must_use]
    pub fn is_owned_by(&self, employee: EmployeeId, company: CompanyId) -> bool {
        self.created_by == employee && self.company_id == company
    }
}

/// Seat request inside a checkout.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutAttendee {
    /// Attendee id
    pub id: AttendeeId,
    /// Owning checkout
    pub checkout_id: CheckoutId,
    /// Order within the checkout
    pub position: u32,
    /// First name
    pub first_name: String,
    /// Last name
    pub last_name: String,
    /// Email
    pub email: Option<String>,
    /// Dietary needs, accessibility and the like
    pub special_requests: Option<String>,
    /// Included in the purchase
    pub is_selected: bool,
    /// Over capacity, goes to the waitlist on payment
    pub is_waitlist: bool,
}

impl CheckoutAttendee {
    /// Selected and seated.
    #[must_use]
    pub const fn holds_seat(&self) -> bool {
        self.is_selected && !self.is_waitlist
    }

    /// Selected but over capacity.
    #[must_use]
    pub const fn is_waitlisted(&self) -> bool {
        self.is_selected && self.is_waitlist
    }
}

// ============================================================================
// Enrollment & waitlist
// ============================================================================

/// A confirmed seat.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Enrollment {
    /// Enrollment id
    pub id: EnrollmentId,
    /// Checkout that paid for it
    pub checkout_id: Option<CheckoutId>,
    /// Session
    pub session_id: SessionId,
    /// Matched employee
    pub employee_id: Option<EmployeeId>,
    /// First name
    pub first_name: String,
    /// Last name
    pub last_name: String,
    /// Email
    pub email: Option<String>,
    /// Special requests
    pub special_requests: Option<String>,
    /// Enrollment time
    pub enrolled_at: DateTime<Utc>,
}

/// A seat request waiting for capacity.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WaitlistEntry {
    /// Entry id
    pub id: WaitlistEntryId,
    /// Session
    #[serde(rename = "eventSessionId")]
    pub session_id: SessionId,
    /// Matched employee
    pub employee_id: Option<EmployeeId>,
    /// Checkout the request came from
    pub original_checkout_id: Option<CheckoutId>,
    /// First name
    pub first_name: String,
    /// Last name
    pub last_name: String,
    /// Email
    pub email: Option<String>,
    /// Special requests
    pub special_requests: Option<String>,
    /// Time added
    pub waitlisted_at: DateTime<Utc>,
    /// 1-based position within the session
    #[serde(rename = "waitlistPosition")]
    pub position: u32,
    /// Price to charge on promotion
    pub seat_price: Money,
    /// Promotion time
    pub promoted_at: Option<DateTime<Utc>>,
}

impl WaitlistEntry {
    /// Whether the entry already received a seat.
    #[must_use]
    pub const fn is_promoted(&self) -> bool {
        self.promoted_at.is_some()
    }
}

// ============================================================================
// Discounts & vouchers
// ============================================================================

/// How a discount value is interpreted.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscountType {
    /// Percent of the subtotal
    Percentage,
    /// Dollar amount
    FixedAmount,
}

impl DiscountType {
    /// Database representation
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Percentage => "percentage",
            Self::FixedAmount => "fixed_amount",
        }
    }
}

impl FromStr for DiscountType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "percentage" => Ok(Self::Percentage),
            "fixed_amount" => Ok(Self::FixedAmount),
            other => Err(format!("unknown discount type: {other}")),
        }
    }
}

/// Discount code.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventDiscount {
    /// Discount id
    pub id: DiscountId,
    /// Code typed at checkout
    pub code: String,
    /// Description
    pub description: Option<String>,
    /// Interpretation of `discount_value`
    pub discount_type: DiscountType,
    /// Percent (0-100) or dollars
    pub discount_value: f64,
    /// Subtotal required to use the code
    pub minimum_purchase: Option<Money>,
    /// Redemption cap
    pub maximum_uses: Option<u32>,
    /// Valid from
    pub start_date: Option<DateTime<Utc>>,
    /// Valid until
    pub end_date: Option<DateTime<Utc>>,
    /// Active flag
    pub is_active: bool,
    /// Events the code is restricted to; empty means all events
    pub event_ids: Vec<EventId>,
}

impl EventDiscount {
    /// Whether the code can be used for `event`.
    #[must_use]
    pub fn applies_to_event(&self, event: EventId) -> bool {
        self.event_ids.is_empty() || self.event_ids.contains(&event)
    }

    /// Whether `now` falls inside the validity window.
    #[must_use]
    pub fn is_within_window(&self, now: DateTime<Utc>) -> bool {
        self.start_date.is_none_or(|start| start <= now)
            && self.end_date.is_none_or(|end| end >= now)
    }
}

/// Prepaid seats a company may redeem on voucher-eligible events.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventVoucher {
    /// Voucher id
    pub id: VoucherId,
    /// Owning company
    pub company_id: CompanyId,
    /// Label
    pub name: String,
    /// Seats granted
    pub total_seats: u32,
    /// Valid from
    pub start_date: Option<DateTime<Utc>>,
    /// Valid until
    pub end_date: Option<DateTime<Utc>>,
    /// Active flag
    pub is_active: bool,
}

impl EventVoucher {
    /// Active and inside its window.
    #[must_use]
    pub fn is_redeemable_at(&self, now: DateTime<Utc>) -> bool {
        self.is_active
            && self.start_date.is_none_or(|start| start <= now)
            && self.end_date.is_none_or(|end| end >= now)
    }
}

// ============================================================================
// Billing
// ============================================================================

/// Invoice lifecycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvoiceStatus {
    /// Not yet settled
    Draft,
    /// Settled
    Paid,
    /// Cancelled
    Void,
}

impl InvoiceStatus {
    /// Database representation
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Paid => "paid",
            Self::Void => "void",
        }
    }
}

impl FromStr for InvoiceStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "draft" => Ok(Self::Draft),
            "paid" => Ok(Self::Paid),
            "void" => Ok(Self::Void),
            other => Err(format!("unknown invoice status: {other}")),
        }
    }
}

/// What an invoice line charges or credits.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LineItemKind {
    /// Seats purchased
    EventSeat,
    /// Discount code credit
    DiscountCode,
    /// Admin override credit
    AdminDiscount,
    /// Voucher seats credit
    Voucher,
}

impl LineItemKind {
    /// Database representation
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::EventSeat => "event_seat",
            Self::DiscountCode => "discount_code",
            Self::AdminDiscount => "admin_discount",
            Self::Voucher => "voucher",
        }
    }

    /// Credits reduce the invoice total.
    #[must_use]
    pub const fn is_credit(self) -> bool {
        !matches!(self, Self::EventSeat)
    }
}

impl FromStr for LineItemKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "event_seat" => Ok(Self::EventSeat),
            "discount_code" => Ok(Self::DiscountCode),
            "admin_discount" => Ok(Self::AdminDiscount),
            "voucher" => Ok(Self::Voucher),
            other => Err(format!("unknown line item kind: {other}")),
        }
    }
}

/// Invoice line. `line_total` is unsigned; [`LineItemKind::is_credit`] gives the sign.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceLineItem {
    /// Kind
    pub kind: LineItemKind,
    /// Description
    pub description: String,
    /// Quantity
    pub quantity: u32,
    /// Unit price
    pub unit_price: Money,
    /// Line total
    pub line_total: Money,
    /// Redeemed code for [`LineItemKind::DiscountCode`] lines
    pub discount_code: Option<String>,
}

impl InvoiceLineItem {
    /// Line total in cents, negative for credits.
    #[must_use]
    pub fn signed_total_cents(&self) -> i64 {
        let cents = i64::try_from(self.line_total.cents()).unwrap_or(i64::MAX);
        if self.kind.is_credit() { -cents } else { cents }
    }
}

/// Invoice issued at payment.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Invoice {
    /// Invoice id
    pub id: InvoiceId,
    /// Number supplied by the client
    pub invoice_number: String,
    /// Billed company
    pub company_id: CompanyId,
    /// Session purchased
    pub session_id: Option<SessionId>,
    /// Issue date
    pub invoice_date: DateTime<Utc>,
    /// Status
    pub status: InvoiceStatus,
    /// Amount due after credits
    pub total_amount: Money,
    /// Notes (admin discount reason)
    pub notes: Option<String>,
    /// Lines in display order
    pub line_items: Vec<InvoiceLineItem>,
}

/// Why a credit memo was issued.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CreditType {
    /// Voucher seats redeemed
    Voucher,
    /// Money returned
    Refund,
}

impl CreditType {
    /// Database representation
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Voucher => "voucher",
            Self::Refund => "refund",
        }
    }
}

impl FromStr for CreditType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "voucher" => Ok(Self::Voucher),
            "refund" => Ok(Self::Refund),
            other => Err(format!("unknown credit type: {other}")),
        }
    }
}

/// Credit memo line.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreditMemoLineItem {
    /// Description
    pub description: String,
    /// Amount credited
    pub amount: Money,
}

/// Credit memo against an invoice.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreditMemo {
    /// Memo id
    pub id: CreditMemoId,
    /// Invoice credited
    pub invoice_id: InvoiceId,
    /// Company credited
    pub company_id: CompanyId,
    /// Issue date
    pub memo_date: DateTime<Utc>,
    /// Kind of credit
    pub credit_type: CreditType,
    /// Sum of the lines
    pub total_amount: Money,
    /// Reason
    pub reason: Option<String>,
    /// Lines
    pub line_items: Vec<CreditMemoLineItem>,
}

/// A settled gateway transaction.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentRecord {
    /// Payment id
    pub id: PaymentId,
    /// Invoice settled
    pub invoice_id: InvoiceId,
    /// Gateway transaction id
    pub transaction_id: Option<String>,
    /// Amount captured
    pub amount: Money,
    /// Gateway response code
    pub response_code: Option<String>,
    /// Authorization code
    pub auth_code: Option<String>,
    /// Last four digits
    pub card_last4: Option<String>,
    /// Card brand
    pub card_type: Option<String>,
    /// Customer profile charged
    pub customer_profile_id: Option<String>,
    /// Payment profile charged
    pub payment_profile_id: Option<String>,
    /// Capture time
    pub created_at: DateTime<Utc>,
}

/// Reusable card stored at the gateway for an employee.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentProfile {
    /// Profile id
    pub id: PaymentProfileId,
    /// Card owner
    pub employee_id: EmployeeId,
    /// Gateway customer profile
    pub customer_profile_id: String,
    /// Gateway payment profile
    pub payment_profile_id: String,
    /// Last four digits
    pub card_last4: Option<String>,
    /// Card brand
    pub card_type: Option<String>,
    /// Last stored or updated
    pub updated_at: DateTime<Utc>,
}
