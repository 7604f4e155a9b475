//! Session waitlist: listing and promotion.

use super::validation::seats_open_to;
use super::views::{PromotionReceipt, WaitlistEntryView};
use super::{Actor, RegistrationService};
use crate::error::{RegistrationError, Result};
use crate::metrics;
use crate::payment_gateway::ProfileChargeRequest;
use crate::store::{RegistrationStore, RegistrationTx};
use crate::types::{
    CompanyId, Employee, EmployeeId, Enrollment, EnrollmentId, Invoice, InvoiceId, InvoiceLineItem,
    InvoiceStatus, LineItemKind, PaymentId, PaymentRecord, ROLE_ADMIN, ROLE_SUPER_ADMIN,
    SessionId, WaitlistEntry, WaitlistEntryId,
};
use hub_core::Money;

fn can_manage_waitlist(employee: &Employee) -> bool {
    employee.has_role(ROLE_SUPER_ADMIN) || employee.has_role(ROLE_ADMIN)
}

fn promotion_invoice_number(entry: &WaitlistEntry) -> String {
    format!("WL-{}", entry.id.as_uuid().simple()).to_uppercase()
}

impl<S: RegistrationStore> RegistrationService<S> {
    /// Waitlist of a session ordered by position, promoted entries included.
    ///
    /// # Errors
    ///
    /// Returns error if the session does not exist.
    pub async fn list_waitlist(&self, session: SessionId) -> Result<Vec<WaitlistEntryView>> {
        let mut tx = self.store.begin().await?;
        let result = async {
            tx.find_session(session)
                .await?
                .ok_or(RegistrationError::SessionNotFound(session))?;
            let entries = tx.list_waitlist(session).await?;
            Ok(entries.iter().map(WaitlistEntryView::from).collect())
        }
        .await;
        Self::finish(tx, result).await
    }

    /// Give a waitlisted attendee a confirmed seat.
    ///
    /// Charges the entry's seat price to the employee's stored card when it
    /// is nonzero, records the invoice and payment, enrolls the attendee and
    /// stamps `promoted_at`. Runs under the same session lock as checkout
    /// updates and payments.
    ///
    /// # Errors
    ///
    /// Returns error if the actor is not an administrator, the entry is
    /// missing or already promoted, the session is full, no card is stored,
    /// or the charge is declined.
    pub async fn promote_waitlist_entry(
        &self,
        actor: Actor,
        entry: WaitlistEntryId,
    ) -> Result<PromotionReceipt> {
        let session = {
            let mut tx = self.store.begin().await?;
            let found = tx.find_waitlist_entry(entry).await;
            tx.rollback().await?;
            found?
                .ok_or(RegistrationError::WaitlistEntryNotFound(entry))?
                .session_id
        };

        let _guard = self.lock(&Self::session_lock_name(session)).await?;
        let mut tx = self.store.begin().await?;
        let result = self.promote_in_tx(&mut tx, actor, entry).await;
        let (receipt, charged) = Self::finish(tx, result).await?;

        metrics::record_waitlist_promoted(charged.cents());
        tracing::info!(
            waitlist_entry_id = %entry,
            session_id = %session,
            amount = %charged,
            "Waitlist entry promoted"
        );
        Ok(receipt)
    }

    async fn promote_in_tx(
        &self,
        tx: &mut S::Tx,
        actor: Actor,
        id: WaitlistEntryId,
    ) -> Result<(PromotionReceipt, Money)> {
        let now = self.env.clock.now();

        let admin = tx
            .find_employee(actor.employee_id)
            .await?
            .ok_or(RegistrationError::EmployeeNotFound)?;
        if !can_manage_waitlist(&admin) {
            return Err(RegistrationError::NoPermissionToManageWaitlist);
        }

        let mut entry = tx
            .find_waitlist_entry(id)
            .await?
            .ok_or(RegistrationError::WaitlistEntryNotFound(id))?;
        if entry.is_promoted() {
            return Err(RegistrationError::WaitlistAlreadyPromoted(id));
        }

        let session = tx
            .find_session(entry.session_id)
            .await?
            .ok_or(RegistrationError::NoEventSession)?;
        let available = seats_open_to(tx, &session, None, now).await?;
        if available == 0 {
            return Err(RegistrationError::NotEnoughSeatsAvailable {
                requested: 1,
                available,
            });
        }

        // The card on file belongs to whoever paid for the original checkout.
        let original = match entry.original_checkout_id {
            Some(checkout) => tx.find_checkout(checkout).await?,
            None => None,
        };
        let company = original.as_ref().map_or(actor.company_id, |c| c.company_id);
        let payer = original.as_ref().map(|c| c.created_by).or(entry.employee_id);

        let mut transaction_id = None;
        if !entry.seat_price.is_zero() {
            let payer = payer.ok_or(RegistrationError::NoStoredPaymentProfile)?;
            transaction_id = self
                .charge_stored_card(tx, &entry, payer, company, now)
                .await?;
        }

        tx.insert_enrollment(&Enrollment {
            id: EnrollmentId::new(),
            checkout_id: entry.original_checkout_id,
            session_id: entry.session_id,
            employee_id: entry.employee_id,
            first_name: entry.first_name.clone(),
            last_name: entry.last_name.clone(),
            email: entry.email.clone(),
            special_requests: entry.special_requests.clone(),
            enrolled_at: now,
        })
        .await?;

        entry.promoted_at = Some(now);
        tx.update_waitlist_entry(&entry).await?;

        let receipt = PromotionReceipt {
            entry: WaitlistEntryView::from(&entry),
            amount_charged: if transaction_id.is_some() {
                entry.seat_price.as_decimal()
            } else {
                0.0
            },
            transaction_id,
        };
        let charged = if receipt.transaction_id.is_some() {
            entry.seat_price
        } else {
            Money::ZERO
        };
        Ok((receipt, charged))
    }

    /// Charge the seat price to the payer's most recent stored card and
    /// record the invoice and payment. Returns the transaction id.
    async fn charge_stored_card(
        &self,
        tx: &mut S::Tx,
        entry: &WaitlistEntry,
        payer: EmployeeId,
        company: CompanyId,
        now: chrono::DateTime<chrono::Utc>,
    ) -> Result<Option<String>> {
        let profile = tx
            .find_latest_payment_profile(payer)
            .await?
            .ok_or(RegistrationError::NoStoredPaymentProfile)?;

        let invoice_number = promotion_invoice_number(entry);
        let response = self
            .env
            .gateway
            .charge_profile(ProfileChargeRequest {
                customer_profile_id: profile.customer_profile_id.clone(),
                payment_profile_id: profile.payment_profile_id.clone(),
                amount: entry.seat_price,
                invoice_number: Some(invoice_number.clone()),
            })
            .await?;

        let invoice = Invoice {
            id: InvoiceId::new(),
            invoice_number,
            company_id: company,
            session_id: Some(entry.session_id),
            invoice_date: now,
            status: InvoiceStatus::Paid,
            total_amount: entry.seat_price,
            notes: Some(format!(
                "Waitlist promotion for {} {}",
                entry.first_name, entry.last_name
            )),
            line_items: vec![InvoiceLineItem {
                kind: LineItemKind::EventSeat,
                description: "Waitlist seat".to_string(),
                quantity: 1,
                unit_price: entry.seat_price,
                line_total: entry.seat_price,
                discount_code: None,
            }],
        };
        tx.insert_invoice(&invoice).await?;

        tx.insert_payment(&PaymentRecord {
            id: PaymentId::new(),
            invoice_id: invoice.id,
            transaction_id: response.transaction_id.clone(),
            amount: entry.seat_price,
            response_code: response.response_code,
            auth_code: response.auth_code,
            card_last4: profile.card_last4,
            card_type: profile.card_type,
            customer_profile_id: Some(profile.customer_profile_id),
            payment_profile_id: Some(profile.payment_profile_id),
            created_at: now,
        })
        .await?;

        Ok(response.transaction_id)
    }
}
