//! Persistence boundary for registration.
//!
//! Services talk to storage only through [`RegistrationStore`] and the
//! transaction it hands out. Every read and write happens on a
//! [`RegistrationTx`]; nothing is visible to other transactions until
//! [`RegistrationTx::commit`]. Dropping a transaction without committing
//! discards its writes.
//!
//! Two implementations ship with the crate:
//!
//! - [`InMemoryRegistrationStore`]: single-writer in-memory store for tests
//!   and local development
//! - [`PostgresRegistrationStore`]: `sqlx` over the `hub-postgres` schema

use crate::error::Result;
use crate::types::{
    AttendeeId, CheckoutAttendee, CheckoutId, Company, CompanyId, CreditMemo, Employee,
    EmployeeId, Enrollment, Event, EventCheckout, EventDiscount, EventId, EventSession,
    EventVoucher, Invoice, PaymentProfile, PaymentRecord, SessionId, WaitlistEntry,
    WaitlistEntryId,
};
use chrono::{DateTime, Utc};
use std::future::Future;

pub mod memory;
pub mod postgres;

pub use memory::InMemoryRegistrationStore;
pub use postgres::PostgresRegistrationStore;

/// Opens transactions against the registration schema.
pub trait RegistrationStore: Clone + Send + Sync + 'static {
    /// Transaction handle
    type Tx: RegistrationTx;

    /// Begin a transaction.
    fn begin(&self) -> impl Future<Output = Result<Self::Tx>> + Send;

    /// Cheap connectivity probe for readiness checks.
    fn ping(&self) -> impl Future<Output = Result<()>> + Send;
}

/// Reads and writes inside one transaction.
///
/// Email lookups against enrollments and the waitlist ignore case.
pub trait RegistrationTx: Send {
    // ------------------------------------------------------------------
    // Catalog
    // ------------------------------------------------------------------

    /// Company by id.
    fn find_company(&mut self, id: CompanyId)
    -> impl Future<Output = Result<Option<Company>>> + Send;

    /// Employee by id, with their business role.
    fn find_employee(
        &mut self,
        id: EmployeeId,
    ) -> impl Future<Output = Result<Option<Employee>>> + Send;

    /// Employee of `company` whose work email matches, ignoring case.
    fn find_employee_by_email(
        &mut self,
        company: CompanyId,
        email: &str,
    ) -> impl Future<Output = Result<Option<Employee>>> + Send;

    /// Event by id.
    fn find_event(&mut self, id: EventId) -> impl Future<Output = Result<Option<Event>>> + Send;

    /// Session by id, with venue and timezone.
    fn find_session(
        &mut self,
        id: SessionId,
    ) -> impl Future<Output = Result<Option<EventSession>>> + Send;

    // ------------------------------------------------------------------
    // Checkouts
    // ------------------------------------------------------------------

    /// Checkout by id.
    fn find_checkout(
        &mut self,
        id: CheckoutId,
    ) -> impl Future<Output = Result<Option<EventCheckout>>> + Send;

    /// The open cart for an employee, session and company.
    fn find_in_progress_checkout(
        &mut self,
        employee: EmployeeId,
        session: SessionId,
        company: CompanyId,
    ) -> impl Future<Output = Result<Option<EventCheckout>>> + Send;

    /// Checkout carrying `confirmation_number`.
    fn find_checkout_by_confirmation_number(
        &mut self,
        confirmation_number: &str,
    ) -> impl Future<Output = Result<Option<EventCheckout>>> + Send;

    /// Insert a checkout. Fails if another in-progress cart exists for the triple.
    fn insert_checkout(&mut self, checkout: &EventCheckout)
    -> impl Future<Output = Result<()>> + Send;

    /// Overwrite a checkout.
    fn update_checkout(&mut self, checkout: &EventCheckout)
    -> impl Future<Output = Result<()>> + Send;

    /// Attendees of a checkout ordered by position.
    fn list_attendees(
        &mut self,
        checkout: CheckoutId,
    ) -> impl Future<Output = Result<Vec<CheckoutAttendee>>> + Send;

    /// Insert an attendee.
    fn insert_attendee(
        &mut self,
        attendee: &CheckoutAttendee,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Overwrite an attendee.
    fn update_attendee(
        &mut self,
        attendee: &CheckoutAttendee,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Delete an attendee.
    fn delete_attendee(&mut self, id: AttendeeId) -> impl Future<Output = Result<()>> + Send;

    /// Selected, non-waitlisted attendees of in-progress checkouts for
    /// `session` whose reservation is still live at `now`, excluding `exclude`.
    fn count_held_seats(
        &mut self,
        session: SessionId,
        exclude: Option<CheckoutId>,
        now: DateTime<Utc>,
    ) -> impl Future<Output = Result<u32>> + Send;

    // ------------------------------------------------------------------
    // Enrollments
    // ------------------------------------------------------------------

    /// Confirmed seats in a session.
    fn count_enrollments(&mut self, session: SessionId) -> impl Future<Output = Result<u32>> + Send;

    /// Enrollment of `employee` in `session`.
    fn find_enrollment_for_employee(
        &mut self,
        session: SessionId,
        employee: EmployeeId,
    ) -> impl Future<Output = Result<Option<Enrollment>>> + Send;

    /// Enrollment in `session` under `email`.
    fn find_enrollment_for_email(
        &mut self,
        session: SessionId,
        email: &str,
    ) -> impl Future<Output = Result<Option<Enrollment>>> + Send;

    /// Insert an enrollment.
    fn insert_enrollment(&mut self, enrollment: &Enrollment)
    -> impl Future<Output = Result<()>> + Send;

    // ------------------------------------------------------------------
    // Waitlist
    // ------------------------------------------------------------------

    /// Pending (unpromoted) waitlist entry of `employee` in `session`.
    fn find_waitlist_for_employee(
        &mut self,
        session: SessionId,
        employee: EmployeeId,
    ) -> impl Future<Output = Result<Option<WaitlistEntry>>> + Send;

    /// Pending (unpromoted) waitlist entry in `session` under `email`.
    fn find_waitlist_for_email(
        &mut self,
        session: SessionId,
        email: &str,
    ) -> impl Future<Output = Result<Option<WaitlistEntry>>> + Send;

    /// Highest position used in `session`, `None` for an empty waitlist.
    fn max_waitlist_position(
        &mut self,
        session: SessionId,
    ) -> impl Future<Output = Result<Option<u32>>> + Send;

    /// All entries of a session ordered by position.
    fn list_waitlist(
        &mut self,
        session: SessionId,
    ) -> impl Future<Output = Result<Vec<WaitlistEntry>>> + Send;

    /// Entry by id.
    fn find_waitlist_entry(
        &mut self,
        id: WaitlistEntryId,
    ) -> impl Future<Output = Result<Option<WaitlistEntry>>> + Send;

    /// Insert an entry.
    fn insert_waitlist_entry(
        &mut self,
        entry: &WaitlistEntry,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Overwrite an entry.
    fn update_waitlist_entry(
        &mut self,
        entry: &WaitlistEntry,
    ) -> impl Future<Output = Result<()>> + Send;

    // ------------------------------------------------------------------
    // Discounts & vouchers
    // ------------------------------------------------------------------

    /// Discount by exact code, active or not.
    fn find_discount_by_code(
        &mut self,
        code: &str,
    ) -> impl Future<Output = Result<Option<EventDiscount>>> + Send;

    /// Active discounts.
    fn list_active_discounts(&mut self) -> impl Future<Output = Result<Vec<EventDiscount>>> + Send;

    /// Invoice lines that redeemed `code`.
    fn count_discount_uses(&mut self, code: &str) -> impl Future<Output = Result<u32>> + Send;

    /// Vouchers of `company` redeemable at `now`.
    fn list_active_vouchers(
        &mut self,
        company: CompanyId,
        now: DateTime<Utc>,
    ) -> impl Future<Output = Result<Vec<EventVoucher>>> + Send;

    /// Voucher seats already redeemed by `company`.
    fn count_voucher_seats_used(
        &mut self,
        company: CompanyId,
    ) -> impl Future<Output = Result<u32>> + Send;

    // ------------------------------------------------------------------
    // Billing
    // ------------------------------------------------------------------

    /// Insert an invoice with its lines.
    fn insert_invoice(&mut self, invoice: &Invoice) -> impl Future<Output = Result<()>> + Send;

    /// Insert a credit memo with its lines.
    fn insert_credit_memo(&mut self, memo: &CreditMemo) -> impl Future<Output = Result<()>> + Send;

    /// Record a captured payment.
    fn insert_payment(&mut self, payment: &PaymentRecord)
    -> impl Future<Output = Result<()>> + Send;

    /// Stored profile of `employee` for a gateway profile pair.
    fn find_payment_profile(
        &mut self,
        employee: EmployeeId,
        customer_profile_id: &str,
        payment_profile_id: &str,
    ) -> impl Future<Output = Result<Option<PaymentProfile>>> + Send;

    /// Most recently updated stored profile of `employee`.
    fn find_latest_payment_profile(
        &mut self,
        employee: EmployeeId,
    ) -> impl Future<Output = Result<Option<PaymentProfile>>> + Send;

    /// Insert a stored profile.
    fn insert_payment_profile(
        &mut self,
        profile: &PaymentProfile,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Overwrite a stored profile.
    fn update_payment_profile(
        &mut self,
        profile: &PaymentProfile,
    ) -> impl Future<Output = Result<()>> + Send;

    // ------------------------------------------------------------------
    // Transaction control
    // ------------------------------------------------------------------

    /// Make every write visible.
    fn commit(self) -> impl Future<Output = Result<()>> + Send;

    /// Discard every write.
    fn rollback(self) -> impl Future<Output = Result<()>> + Send;
}
