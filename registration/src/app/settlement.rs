//! Persistence after an approved payment.
//!
//! Runs inside the payment transaction in a fixed order: billing documents,
//! checkout finalization, stored card details, enrollments, waitlist entries.

use super::pricing::{AdminDiscount, PriceBreakdown};
use crate::error::{RegistrationError, Result};
use crate::payment_gateway::GatewayResponse;
use crate::store::RegistrationTx;
use crate::types::{
    CheckoutAttendee, CheckoutStatus, CreditMemo, CreditMemoId, CreditMemoLineItem, CreditType,
    EmployeeId, Enrollment, EnrollmentId, Event, EventCheckout, EventDiscount, Invoice, InvoiceId,
    InvoiceLineItem, InvoiceStatus, LineItemKind, PaymentId, PaymentProfile, PaymentProfileId,
    PaymentRecord, WaitlistEntry, WaitlistEntryId,
};
use chrono::{DateTime, Utc};
use hub_core::Money;

const CONFIRMATION_ATTEMPTS: usize = 10;

/// Everything settlement needs from the payment step.
pub(super) struct Settlement<'a> {
    pub event: &'a Event,
    pub attendees: &'a [CheckoutAttendee],
    pub price: &'a PriceBreakdown,
    pub discount: Option<&'a EventDiscount>,
    pub admin: Option<&'a AdminDiscount>,
    pub invoice_number: &'a str,
    pub response: Option<&'a GatewayResponse>,
    pub payer: EmployeeId,
    pub now: DateTime<Utc>,
}

/// Counts reported back to the caller.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub(super) struct Settled {
    pub enrolled: u32,
    pub waitlisted: u32,
}

impl Settlement<'_> {
    /// Run every step against `checkout`, which is written back at the end.
    pub async fn apply<T: RegistrationTx>(
        &self,
        tx: &mut T,
        checkout: &mut EventCheckout,
    ) -> Result<Settled> {
        self.record_billing(tx, checkout).await?;
        self.finalize(tx, checkout).await?;
        self.save_payment_information(tx, checkout).await?;
        let enrolled = self.enroll_seated(tx, checkout).await?;
        let waitlisted = self.waitlist_overflow(tx, checkout).await?;
        tx.update_checkout(checkout).await?;

        Ok(Settled {
            enrolled,
            waitlisted,
        })
    }

    /// Invoice lines and, when vouchers were redeemed, the matching credit
    /// memo.
    pub fn build_invoice(&self, checkout: &EventCheckout) -> (Invoice, Option<CreditMemo>) {
        let price = self.price;
        let mut line_items = vec![InvoiceLineItem {
            kind: LineItemKind::EventSeat,
            description: format!("{} registration", self.event.name),
            quantity: price.seats,
            unit_price: price.unit_price,
            line_total: price.subtotal,
            discount_code: None,
        }];

        if let Some(discount) = self.discount {
            line_items.push(InvoiceLineItem {
                kind: LineItemKind::DiscountCode,
                description: discount
                    .description
                    .clone()
                    .unwrap_or_else(|| format!("Discount code {}", discount.code)),
                quantity: 1,
                unit_price: price.discount,
                line_total: price.discount,
                discount_code: Some(discount.code.clone()),
            });
        }

        if let Some(admin) = self.admin.filter(|_| !price.admin_discount.is_zero()) {
            line_items.push(InvoiceLineItem {
                kind: LineItemKind::AdminDiscount,
                description: admin
                    .reason
                    .clone()
                    .unwrap_or_else(|| "Admin discount".to_string()),
                quantity: 1,
                unit_price: price.admin_discount,
                line_total: price.admin_discount,
                discount_code: None,
            });
        }

        if price.voucher_seats > 0 {
            line_items.push(InvoiceLineItem {
                kind: LineItemKind::Voucher,
                description: "Voucher redemption".to_string(),
                quantity: price.voucher_seats,
                unit_price: price.unit_price,
                line_total: price.voucher_credit,
                discount_code: None,
            });
        }

        let invoice = Invoice {
            id: InvoiceId::new(),
            invoice_number: self.invoice_number.to_string(),
            company_id: checkout.company_id,
            session_id: Some(checkout.session_id),
            invoice_date: self.now,
            status: InvoiceStatus::Paid,
            total_amount: price.total,
            notes: checkout.group_notes.clone(),
            line_items,
        };

        let memo = (price.voucher_seats > 0).then(|| CreditMemo {
            id: CreditMemoId::new(),
            invoice_id: invoice.id,
            company_id: checkout.company_id,
            memo_date: self.now,
            credit_type: CreditType::Voucher,
            total_amount: price.voucher_credit,
            reason: Some(format!("Voucher seats for {}", self.event.name)),
            line_items: (1..=price.voucher_seats)
                .map(|seat| CreditMemoLineItem {
                    description: format!("Voucher seat {seat} - {}", self.event.name),
                    amount: price.unit_price,
                })
                .collect(),
        });

        (invoice, memo)
    }

    async fn record_billing<T: RegistrationTx>(
        &self,
        tx: &mut T,
        checkout: &EventCheckout,
    ) -> Result<()> {
        let (invoice, memo) = self.build_invoice(checkout);
        tx.insert_invoice(&invoice).await?;
        if let Some(memo) = memo {
            tx.insert_credit_memo(&memo).await?;
        }

        if let Some(response) = self.response.filter(|r| r.charged()) {
            tx.insert_payment(&PaymentRecord {
                id: PaymentId::new(),
                invoice_id: invoice.id,
                transaction_id: response.transaction_id.clone(),
                amount: self.price.total,
                response_code: response.response_code.clone(),
                auth_code: response.auth_code.clone(),
                card_last4: response.account_last4.clone(),
                card_type: response.account_type.clone(),
                customer_profile_id: response.customer_profile_id.clone(),
                payment_profile_id: response.payment_profile_id.clone(),
                created_at: self.now,
            })
            .await?;
        }
        Ok(())
    }

    async fn finalize<T: RegistrationTx>(
        &self,
        tx: &mut T,
        checkout: &mut EventCheckout,
    ) -> Result<()> {
        checkout.status = CheckoutStatus::Completed;
        checkout.amount = Some(self.price.total);
        checkout.finalized_at = Some(self.now);
        checkout.reservation_expires_at = None;
        checkout.updated_at = self.now;

        if checkout.confirmation_number.is_none() {
            checkout.confirmation_number = Some(unique_confirmation_number(tx).await?);
        }
        Ok(())
    }

    async fn save_payment_information<T: RegistrationTx>(
        &self,
        tx: &mut T,
        checkout: &mut EventCheckout,
    ) -> Result<()> {
        let Some(response) = self.response else {
            return Ok(());
        };

        checkout.customer_profile_id.clone_from(&response.customer_profile_id);
        checkout.payment_profile_id.clone_from(&response.payment_profile_id);
        if response.account_last4.is_some() {
            checkout.card_last4.clone_from(&response.account_last4);
            checkout.card_type.clone_from(&response.account_type);
        }

        let (Some(customer), Some(payment)) = (
            response.customer_profile_id.as_deref(),
            response.payment_profile_id.as_deref(),
        ) else {
            return Ok(());
        };

        match tx.find_payment_profile(self.payer, customer, payment).await? {
            Some(mut profile) => {
                if response.account_last4.is_some() {
                    profile.card_last4.clone_from(&response.account_last4);
                    profile.card_type.clone_from(&response.account_type);
                }
                profile.updated_at = self.now;
                tx.update_payment_profile(&profile).await?;
            }
            None => {
                tx.insert_payment_profile(&PaymentProfile {
                    id: PaymentProfileId::new(),
                    employee_id: self.payer,
                    customer_profile_id: customer.to_string(),
                    payment_profile_id: payment.to_string(),
                    card_last4: response.account_last4.clone(),
                    card_type: response.account_type.clone(),
                    updated_at: self.now,
                })
                .await?;
            }
        }
        Ok(())
    }

    async fn enroll_seated<T: RegistrationTx>(
        &self,
        tx: &mut T,
        checkout: &EventCheckout,
    ) -> Result<u32> {
        let mut enrolled = 0;
        for attendee in self.attendees.iter().filter(|a| a.holds_seat()) {
            let employee_id = match attendee.email.as_deref() {
                Some(email) => tx
                    .find_employee_by_email(checkout.company_id, email)
                    .await?
                    .map(|e| e.id),
                None => None,
            };

            tx.insert_enrollment(&Enrollment {
                id: EnrollmentId::new(),
                checkout_id: Some(checkout.id),
                session_id: checkout.session_id,
                employee_id,
                first_name: attendee.first_name.clone(),
                last_name: attendee.last_name.clone(),
                email: attendee.email.clone(),
                special_requests: attendee.special_requests.clone(),
                enrolled_at: self.now,
            })
            .await?;
            enrolled += 1;
        }
        Ok(enrolled)
    }

    async fn waitlist_overflow<T: RegistrationTx>(
        &self,
        tx: &mut T,
        checkout: &EventCheckout,
    ) -> Result<u32> {
        let mut position = tx
            .max_waitlist_position(checkout.session_id)
            .await?
            .unwrap_or(0);
        let mut waitlisted = 0;

        for attendee in self.attendees.iter().filter(|a| a.is_waitlisted()) {
            let employee_id = match attendee.email.as_deref() {
                Some(email) => tx
                    .find_employee_by_email(checkout.company_id, email)
                    .await?
                    .map(|e| e.id),
                None => None,
            };
            position += 1;

            tx.insert_waitlist_entry(&WaitlistEntry {
                id: WaitlistEntryId::new(),
                session_id: checkout.session_id,
                employee_id,
                original_checkout_id: Some(checkout.id),
                first_name: attendee.first_name.clone(),
                last_name: attendee.last_name.clone(),
                email: attendee.email.clone(),
                special_requests: attendee.special_requests.clone(),
                waitlisted_at: self.now,
                position,
                seat_price: self.event.price,
                promoted_at: None,
            })
            .await?;
            waitlisted += 1;
        }
        Ok(waitlisted)
    }
}

/// `CN-` followed by 8 uppercase hex digits.
pub(super) fn confirmation_number() -> String {
    format!("CN-{:08X}", rand::random::<u32>())
}

async fn unique_confirmation_number<T: RegistrationTx>(tx: &mut T) -> Result<String> {
    for _ in 0..CONFIRMATION_ATTEMPTS {
        let candidate = confirmation_number();
        if tx
            .find_checkout_by_confirmation_number(&candidate)
            .await?
            .is_none()
        {
            return Ok(candidate);
        }
        tracing::debug!(%candidate, "Confirmation number taken, retrying");
    }
    Err(RegistrationError::Database(
        "Could not generate a unique confirmation number".to_string(),
    ))
}

/// Invoice number for requests that did not supply one.
pub(super) fn fallback_invoice_number(checkout: &EventCheckout) -> String {
    format!("EVT-{}", checkout.id.as_uuid().simple()).to_uppercase()
}

/// Signed total of an invoice's lines, in cents.
#[cfg(test)]
fn lines_total(invoice: &Invoice) -> i64 {
    invoice
        .line_items
        .iter()
        .map(InvoiceLineItem::signed_total_cents)
        .sum()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::app::pricing::price_checkout;
    use crate::types::{CompanyId, DiscountId, DiscountType, EventId, SessionId};
    use hub_core::Clock;
    use hub_testing::test_clock;

    fn event() -> Event {
        Event {
            id: EventId::new(),
            name: "First Aid".to_string(),
            price: Money::from_dollars(40),
            is_voucher_eligible: true,
            is_published: true,
        }
    }

    fn discount() -> EventDiscount {
        EventDiscount {
            id: DiscountId::new(),
            code: "SAVE15".to_string(),
            description: None,
            discount_type: DiscountType::FixedAmount,
            discount_value: 15.0,
            minimum_purchase: None,
            maximum_uses: None,
            start_date: None,
            end_date: None,
            is_active: true,
            event_ids: vec![],
        }
    }

    #[test]
    fn test_confirmation_number_format() {
        let number = confirmation_number();
        assert_eq!(number.len(), 11);
        assert!(number.starts_with("CN-"));
        assert!(
            number[3..]
                .chars()
                .all(|c| c.is_ascii_digit() || ('A'..='F').contains(&c))
        );
    }

    #[test]
    fn test_invoice_lines_balance_to_total() {
        let event = event();
        let discount = discount();
        let admin = AdminDiscount {
            discount_type: DiscountType::Percentage,
            value: 25.0,
            reason: Some("Board member".to_string()),
        };
        let price = price_checkout(event.price, 5, 2, Some(&discount), Some(&admin));
        let now = test_clock().now();
        let checkout = EventCheckout::open(SessionId::new(), CompanyId::new(), EmployeeId::new(), now);

        let settlement = Settlement {
            event: &event,
            attendees: &[],
            price: &price,
            discount: Some(&discount),
            admin: Some(&admin),
            invoice_number: "INV-1001",
            response: None,
            payer: checkout.created_by,
            now,
        };
        let (invoice, memo) = settlement.build_invoice(&checkout);

        let kinds: Vec<_> = invoice.line_items.iter().map(|l| l.kind).collect();
        assert_eq!(
            kinds,
            vec![
                LineItemKind::EventSeat,
                LineItemKind::DiscountCode,
                LineItemKind::AdminDiscount,
                LineItemKind::Voucher
            ]
        );
        assert_eq!(invoice.total_amount, Money::from_dollars(55));
        assert_eq!(lines_total(&invoice), 5_500);
        assert_eq!(invoice.line_items[1].discount_code.as_deref(), Some("SAVE15"));
        assert_eq!(invoice.line_items[2].description, "Board member");

        let memo = memo.unwrap();
        assert_eq!(memo.invoice_id, invoice.id);
        assert_eq!(memo.credit_type, CreditType::Voucher);
        assert_eq!(memo.line_items.len(), 2);
        assert_eq!(memo.total_amount, Money::from_dollars(80));
    }

    #[test]
    fn test_plain_invoice_has_no_memo() {
        let event = event();
        let price = price_checkout(event.price, 2, 0, None, None);
        let now = test_clock().now();
        let checkout = EventCheckout::open(SessionId::new(), CompanyId::new(), EmployeeId::new(), now);

        let settlement = Settlement {
            event: &event,
            attendees: &[],
            price: &price,
            discount: None,
            admin: None,
            invoice_number: "INV-1002",
            response: None,
            payer: checkout.created_by,
            now,
        };
        let (invoice, memo) = settlement.build_invoice(&checkout);

        assert_eq!(invoice.line_items.len(), 1);
        assert_eq!(invoice.status, InvoiceStatus::Paid);
        assert!(memo.is_none());
    }

    #[test]
    fn test_fallback_invoice_number_uses_checkout() {
        let checkout = EventCheckout::open(
            SessionId::new(),
            CompanyId::new(),
            EmployeeId::new(),
            test_clock().now(),
        );
        let number = fallback_invoice_number(&checkout);
        assert!(number.starts_with("EVT-"));
        assert_eq!(number.len(), 36);
    }
}
