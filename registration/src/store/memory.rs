//! In-memory registration store.
//!
//! A transaction takes the store's mutex for its whole lifetime and works on
//! a copy of the state; commit writes the copy back. Transactions are
//! therefore fully serialized, which is enough for tests and single-node
//! development. The unique constraints of the Postgres schema are enforced
//! here too so tests observe the same failures.

use super::{RegistrationStore, RegistrationTx};
use crate::error::{RegistrationError, Result};
use crate::types::{
    AttendeeId, CheckoutAttendee, CheckoutId, Company, CompanyId, CreditMemo, CreditType,
    Employee, EmployeeId, Enrollment, Event, EventCheckout, EventDiscount, EventId, EventSession,
    EventVoucher, Invoice, PaymentProfile, PaymentRecord, SessionId, WaitlistEntry,
    WaitlistEntryId,
};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::{Mutex, OwnedMutexGuard};

#[derive(Debug, Clone, Default)]
struct MemoryState {
    companies: HashMap<CompanyId, Company>,
    employees: HashMap<EmployeeId, Employee>,
    events: HashMap<EventId, Event>,
    sessions: HashMap<SessionId, EventSession>,
    checkouts: HashMap<CheckoutId, EventCheckout>,
    attendees: HashMap<AttendeeId, CheckoutAttendee>,
    enrollments: Vec<Enrollment>,
    waitlist: Vec<WaitlistEntry>,
    discounts: Vec<EventDiscount>,
    vouchers: Vec<EventVoucher>,
    invoices: Vec<Invoice>,
    credit_memos: Vec<CreditMemo>,
    payments: Vec<PaymentRecord>,
    payment_profiles: Vec<PaymentProfile>,
}

fn email_matches(stored: Option<&str>, wanted: &str) -> bool {
    stored.is_some_and(|s| s.to_lowercase() == wanted.to_lowercase())
}

fn count(n: usize) -> u32 {
    u32::try_from(n).unwrap_or(u32::MAX)
}

fn constraint(message: &str) -> RegistrationError {
    RegistrationError::Database(format!("unique constraint violated: {message}"))
}

/// In-memory [`RegistrationStore`].
#[derive(Debug, Clone, Default)]
pub struct InMemoryRegistrationStore {
    state: Arc<Mutex<MemoryState>>,
    fail_invoice_inserts: Arc<AtomicBool>,
}

impl InMemoryRegistrationStore {
    /// Creates an empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent `insert_invoice` fail, to exercise rollback.
    pub fn fail_invoice_inserts(&self) {
        self.fail_invoice_inserts.store(true, Ordering::SeqCst);
    }

    // ------------------------------------------------------------------
    // Seeding
    // ------------------------------------------------------------------

    /// Add a company.
    pub async fn seed_company(&self, company: Company) {
        self.state.lock().await.companies.insert(company.id, company);
    }

    /// Add an employee.
    pub async fn seed_employee(&self, employee: Employee) {
        self.state.lock().await.employees.insert(employee.id, employee);
    }

    /// Add an event.
    pub async fn seed_event(&self, event: Event) {
        self.state.lock().await.events.insert(event.id, event);
    }

    /// Add a session.
    pub async fn seed_session(&self, session: EventSession) {
        self.state.lock().await.sessions.insert(session.id, session);
    }

    /// Add a checkout with its attendees.
    pub async fn seed_checkout(&self, checkout: EventCheckout, attendees: Vec<CheckoutAttendee>) {
        let mut state = self.state.lock().await;
        for attendee in attendees {
            state.attendees.insert(attendee.id, attendee);
        }
        state.checkouts.insert(checkout.id, checkout);
    }

    /// Add a confirmed enrollment.
    pub async fn seed_enrollment(&self, enrollment: Enrollment) {
        self.state.lock().await.enrollments.push(enrollment);
    }

    /// Add a waitlist entry.
    pub async fn seed_waitlist_entry(&self, entry: WaitlistEntry) {
        self.state.lock().await.waitlist.push(entry);
    }

    /// Add a discount code.
    pub async fn seed_discount(&self, discount: EventDiscount) {
        self.state.lock().await.discounts.push(discount);
    }

    /// Add a voucher allotment.
    pub async fn seed_voucher(&self, voucher: EventVoucher) {
        self.state.lock().await.vouchers.push(voucher);
    }

    /// Add a stored payment profile.
    pub async fn seed_payment_profile(&self, profile: PaymentProfile) {
        self.state.lock().await.payment_profiles.push(profile);
    }

    /// Add an invoice (counts toward discount usage).
    pub async fn seed_invoice(&self, invoice: Invoice) {
        self.state.lock().await.invoices.push(invoice);
    }

    /// Add a credit memo (voucher memos count toward voucher usage).
    pub async fn seed_credit_memo(&self, memo: CreditMemo) {
        self.state.lock().await.credit_memos.push(memo);
    }

    // ------------------------------------------------------------------
    // Inspection
    // ------------------------------------------------------------------

    /// Committed checkout by id.
    pub async fn checkout(&self, id: CheckoutId) -> Option<EventCheckout> {
        self.state.lock().await.checkouts.get(&id).cloned()
    }

    /// Committed attendees of a checkout, by position.
    pub async fn attendees(&self, checkout: CheckoutId) -> Vec<CheckoutAttendee> {
        let state = self.state.lock().await;
        let mut attendees: Vec<_> = state
            .attendees
            .values()
            .filter(|a| a.checkout_id == checkout)
            .cloned()
            .collect();
        attendees.sort_by_key(|a| a.position);
        attendees
    }

    /// Committed enrollments.
    pub async fn enrollments(&self) -> Vec<Enrollment> {
        self.state.lock().await.enrollments.clone()
    }

    /// Committed waitlist entries, by position.
    pub async fn waitlist(&self) -> Vec<WaitlistEntry> {
        let mut entries = self.state.lock().await.waitlist.clone();
        entries.sort_by_key(|e| e.position);
        entries
    }

    /// Committed invoices.
    pub async fn invoices(&self) -> Vec<Invoice> {
        self.state.lock().await.invoices.clone()
    }

    /// Committed credit memos.
    pub async fn credit_memos(&self) -> Vec<CreditMemo> {
        self.state.lock().await.credit_memos.clone()
    }

    /// Committed payments.
    pub async fn payments(&self) -> Vec<PaymentRecord> {
        self.state.lock().await.payments.clone()
    }

    /// Committed payment profiles.
    pub async fn payment_profiles(&self) -> Vec<PaymentProfile> {
        self.state.lock().await.payment_profiles.clone()
    }
}

impl RegistrationStore for InMemoryRegistrationStore {
    type Tx = InMemoryTx;

    async fn begin(&self) -> Result<InMemoryTx> {
        let guard = Arc::clone(&self.state).lock_owned().await;
        let working = guard.clone();
        Ok(InMemoryTx {
            guard,
            working,
            fail_invoice_inserts: self.fail_invoice_inserts.load(Ordering::SeqCst),
        })
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}

/// Transaction over [`InMemoryRegistrationStore`].
#[derive(Debug)]
pub struct InMemoryTx {
    guard: OwnedMutexGuard<MemoryState>,
    working: MemoryState,
    fail_invoice_inserts: bool,
}

impl RegistrationTx for InMemoryTx {
    async fn find_company(&mut self, id: CompanyId) -> Result<Option<Company>> {
        Ok(self.working.companies.get(&id).cloned())
    }

    async fn find_employee(&mut self, id: EmployeeId) -> Result<Option<Employee>> {
        Ok(self.working.employees.get(&id).cloned())
    }

    async fn find_employee_by_email(
        &mut self,
        company: CompanyId,
        email: &str,
    ) -> Result<Option<Employee>> {
        Ok(self
            .working
            .employees
            .values()
            .find(|e| e.company_id == company && email_matches(e.work_email.as_deref(), email))
            .cloned())
    }

    async fn find_event(&mut self, id: EventId) -> Result<Option<Event>> {
        Ok(self.working.events.get(&id).cloned())
    }

    async fn find_session(&mut self, id: SessionId) -> Result<Option<EventSession>> {
        Ok(self.working.sessions.get(&id).cloned())
    }

    async fn find_checkout(&mut self, id: CheckoutId) -> Result<Option<EventCheckout>> {
        Ok(self.working.checkouts.get(&id).cloned())
    }

    async fn find_in_progress_checkout(
        &mut self,
        employee: EmployeeId,
        session: SessionId,
        company: CompanyId,
    ) -> Result<Option<EventCheckout>> {
        Ok(self
            .working
            .checkouts
            .values()
            .find(|c| {
                c.is_in_progress()
                    && c.created_by == employee
                    && c.session_id == session
                    && c.company_id == company
            })
            .cloned())
    }

    async fn find_checkout_by_confirmation_number(
        &mut self,
        confirmation_number: &str,
    ) -> Result<Option<EventCheckout>> {
        Ok(self
            .working
            .checkouts
            .values()
            .find(|c| c.confirmation_number.as_deref() == Some(confirmation_number))
            .cloned())
    }

    async fn insert_checkout(&mut self, checkout: &EventCheckout) -> Result<()> {
        let duplicate_open_cart = checkout.is_in_progress()
            && self.working.checkouts.values().any(|c| {
                c.is_in_progress()
                    && c.created_by == checkout.created_by
                    && c.session_id == checkout.session_id
                    && c.company_id == checkout.company_id
            });
        if duplicate_open_cart {
            return Err(constraint("uniq_event_checkout_in_progress"));
        }
        self.working.checkouts.insert(checkout.id, checkout.clone());
        Ok(())
    }

    async fn update_checkout(&mut self, checkout: &EventCheckout) -> Result<()> {
        if let Some(number) = checkout.confirmation_number.as_deref() {
            let taken = self
                .working
                .checkouts
                .values()
                .any(|c| c.id != checkout.id && c.confirmation_number.as_deref() == Some(number));
            if taken {
                return Err(constraint("event_checkouts_confirmation_number_key"));
            }
        }
        self.working.checkouts.insert(checkout.id, checkout.clone());
        Ok(())
    }

    async fn list_attendees(&mut self, checkout: CheckoutId) -> Result<Vec<CheckoutAttendee>> {
        let mut attendees: Vec<_> = self
            .working
            .attendees
            .values()
            .filter(|a| a.checkout_id == checkout)
            .cloned()
            .collect();
        attendees.sort_by_key(|a| a.position);
        Ok(attendees)
    }

    async fn insert_attendee(&mut self, attendee: &CheckoutAttendee) -> Result<()> {
        self.working.attendees.insert(attendee.id, attendee.clone());
        Ok(())
    }

    async fn update_attendee(&mut self, attendee: &CheckoutAttendee) -> Result<()> {
        self.working.attendees.insert(attendee.id, attendee.clone());
        Ok(())
    }

    async fn delete_attendee(&mut self, id: AttendeeId) -> Result<()> {
        self.working.attendees.remove(&id);
        Ok(())
    }

    async fn count_held_seats(
        &mut self,
        session: SessionId,
        exclude: Option<CheckoutId>,
        now: DateTime<Utc>,
    ) -> Result<u32> {
        let state = &self.working;
        let held = state
            .attendees
            .values()
            .filter(|a| a.holds_seat() && Some(a.checkout_id) != exclude)
            .filter(|a| {
                state
                    .checkouts
                    .get(&a.checkout_id)
                    .is_some_and(|c| c.session_id == session && c.has_live_reservation(now))
            })
            .count();
        Ok(count(held))
    }

    async fn count_enrollments(&mut self, session: SessionId) -> Result<u32> {
        Ok(count(
            self.working
                .enrollments
                .iter()
                .filter(|e| e.session_id == session)
                .count(),
        ))
    }

    async fn find_enrollment_for_employee(
        &mut self,
        session: SessionId,
        employee: EmployeeId,
    ) -> Result<Option<Enrollment>> {
        Ok(self
            .working
            .enrollments
            .iter()
            .find(|e| e.session_id == session && e.employee_id == Some(employee))
            .cloned())
    }

    async fn find_enrollment_for_email(
        &mut self,
        session: SessionId,
        email: &str,
    ) -> Result<Option<Enrollment>> {
        Ok(self
            .working
            .enrollments
            .iter()
            .find(|e| e.session_id == session && email_matches(e.email.as_deref(), email))
            .cloned())
    }

    async fn insert_enrollment(&mut self, enrollment: &Enrollment) -> Result<()> {
        let duplicate = self.working.enrollments.iter().any(|e| {
            e.session_id == enrollment.session_id
                && ((enrollment.employee_id.is_some() && e.employee_id == enrollment.employee_id)
                    || enrollment
                        .email
                        .as_deref()
                        .is_some_and(|email| email_matches(e.email.as_deref(), email)))
        });
        if duplicate {
            return Err(constraint("uniq_event_enrollment"));
        }
        self.working.enrollments.push(enrollment.clone());
        Ok(())
    }

    async fn find_waitlist_for_employee(
        &mut self,
        session: SessionId,
        employee: EmployeeId,
    ) -> Result<Option<WaitlistEntry>> {
        Ok(self
            .working
            .waitlist
            .iter()
            .find(|w| {
                w.session_id == session && w.employee_id == Some(employee) && !w.is_promoted()
            })
            .cloned())
    }

    async fn find_waitlist_for_email(
        &mut self,
        session: SessionId,
        email: &str,
    ) -> Result<Option<WaitlistEntry>> {
        Ok(self
            .working
            .waitlist
            .iter()
            .find(|w| {
                w.session_id == session
                    && email_matches(w.email.as_deref(), email)
                    && !w.is_promoted()
            })
            .cloned())
    }

    async fn max_waitlist_position(&mut self, session: SessionId) -> Result<Option<u32>> {
        Ok(self
            .working
            .waitlist
            .iter()
            .filter(|w| w.session_id == session)
            .map(|w| w.position)
            .max())
    }

    async fn list_waitlist(&mut self, session: SessionId) -> Result<Vec<WaitlistEntry>> {
        let mut entries: Vec<_> = self
            .working
            .waitlist
            .iter()
            .filter(|w| w.session_id == session)
            .cloned()
            .collect();
        entries.sort_by_key(|w| w.position);
        Ok(entries)
    }

    async fn find_waitlist_entry(&mut self, id: WaitlistEntryId) -> Result<Option<WaitlistEntry>> {
        Ok(self.working.waitlist.iter().find(|w| w.id == id).cloned())
    }

    async fn insert_waitlist_entry(&mut self, entry: &WaitlistEntry) -> Result<()> {
        let taken = self
            .working
            .waitlist
            .iter()
            .any(|w| w.session_id == entry.session_id && w.position == entry.position);
        if taken {
            return Err(constraint("event_enrollment_waitlist_position"));
        }
        self.working.waitlist.push(entry.clone());
        Ok(())
    }

    async fn update_waitlist_entry(&mut self, entry: &WaitlistEntry) -> Result<()> {
        match self.working.waitlist.iter_mut().find(|w| w.id == entry.id) {
            Some(existing) => {
                *existing = entry.clone();
                Ok(())
            }
            None => Err(RegistrationError::WaitlistEntryNotFound(entry.id)),
        }
    }

    async fn find_discount_by_code(&mut self, code: &str) -> Result<Option<EventDiscount>> {
        Ok(self
            .working
            .discounts
            .iter()
            .find(|d| d.code == code)
            .cloned())
    }

    async fn list_active_discounts(&mut self) -> Result<Vec<EventDiscount>> {
        Ok(self
            .working
            .discounts
            .iter()
            .filter(|d| d.is_active)
            .cloned()
            .collect())
    }

    async fn count_discount_uses(&mut self, code: &str) -> Result<u32> {
        Ok(count(
            self.working
                .invoices
                .iter()
                .flat_map(|i| &i.line_items)
                .filter(|l| l.discount_code.as_deref() == Some(code))
                .count(),
        ))
    }

    async fn list_active_vouchers(
        &mut self,
        company: CompanyId,
        now: DateTime<Utc>,
    ) -> Result<Vec<EventVoucher>> {
        Ok(self
            .working
            .vouchers
            .iter()
            .filter(|v| v.company_id == company && v.is_redeemable_at(now))
            .cloned()
            .collect())
    }

    async fn count_voucher_seats_used(&mut self, company: CompanyId) -> Result<u32> {
        Ok(count(
            self.working
                .credit_memos
                .iter()
                .filter(|m| m.company_id == company && m.credit_type == CreditType::Voucher)
                .map(|m| m.line_items.len())
                .sum(),
        ))
    }

    async fn insert_invoice(&mut self, invoice: &Invoice) -> Result<()> {
        if self.fail_invoice_inserts {
            return Err(RegistrationError::Database(
                "invoice insert failed (injected)".to_string(),
            ));
        }
        if self
            .working
            .invoices
            .iter()
            .any(|i| i.invoice_number == invoice.invoice_number)
        {
            return Err(constraint("invoices_invoice_number_key"));
        }
        self.working.invoices.push(invoice.clone());
        Ok(())
    }

    async fn insert_credit_memo(&mut self, memo: &CreditMemo) -> Result<()> {
        self.working.credit_memos.push(memo.clone());
        Ok(())
    }

    async fn insert_payment(&mut self, payment: &PaymentRecord) -> Result<()> {
        self.working.payments.push(payment.clone());
        Ok(())
    }

    async fn find_payment_profile(
        &mut self,
        employee: EmployeeId,
        customer_profile_id: &str,
        payment_profile_id: &str,
    ) -> Result<Option<PaymentProfile>> {
        Ok(self
            .working
            .payment_profiles
            .iter()
            .find(|p| {
                p.employee_id == employee
                    && p.customer_profile_id == customer_profile_id
                    && p.payment_profile_id == payment_profile_id
            })
            .cloned())
    }

    async fn find_latest_payment_profile(
        &mut self,
        employee: EmployeeId,
    ) -> Result<Option<PaymentProfile>> {
        Ok(self
            .working
            .payment_profiles
            .iter()
            .filter(|p| p.employee_id == employee)
            .max_by_key(|p| p.updated_at)
            .cloned())
    }

    async fn insert_payment_profile(&mut self, profile: &PaymentProfile) -> Result<()> {
        self.working.payment_profiles.push(profile.clone());
        Ok(())
    }

    async fn update_payment_profile(&mut self, profile: &PaymentProfile) -> Result<()> {
        if let Some(existing) = self
            .working
            .payment_profiles
            .iter_mut()
            .find(|p| p.id == profile.id)
        {
            *existing = profile.clone();
        }
        Ok(())
    }

    async fn commit(self) -> Result<()> {
        let Self {
            mut guard, working, ..
        } = self;
        *guard = working;
        Ok(())
    }

    async fn rollback(self) -> Result<()> {
        Ok(())
    }
}
