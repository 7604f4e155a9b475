//! Checkout payment.

use super::checkout::{attendee_emails, load_open_checkout};
use super::pricing::{AdminDiscount, price_checkout};
use super::settlement::{Settlement, fallback_invoice_number};
use super::validation::{
    ensure_admin_discount_permitted, ensure_amount_matches, ensure_not_enrolled,
    ensure_not_waitlisted, ensure_seats_available, ensure_unique_emails, seats_open_to,
    validate_discount_code, validate_voucher_redemption,
};
use super::views::{PaymentReceipt, ProcessPaymentRequest};
use super::{Actor, RegistrationService};
use crate::error::{RegistrationError, Result};
use crate::metrics;
use crate::payment_gateway::{CardToken, ChargeRequest, GatewayResponse};
use crate::store::{RegistrationStore, RegistrationTx};
use crate::types::{CheckoutAttendee, CheckoutId, Employee, EmployeeId};
use hub_core::Money;
use std::time::Instant;

/// What the payment step asks of the gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GatewayAction {
    /// Capture the total on the submitted card
    Charge,
    /// Keep the card on file for later waitlist promotion
    StoreProfile,
    /// Nothing to charge and nothing to keep
    Skip,
}

impl GatewayAction {
    /// Charge only when someone is seated and money is owed. Waitlist-only
    /// carts store the card instead.
    #[must_use]
    pub fn decide(seated: u32, waitlisted: u32, total: Money) -> Self {
        if seated > 0 && !total.is_zero() {
            Self::Charge
        } else if waitlisted > 0 {
            Self::StoreProfile
        } else {
            Self::Skip
        }
    }

    const fn metric_status(self) -> &'static str {
        match self {
            Self::Charge => "succeeded",
            Self::StoreProfile => "profile_stored",
            Self::Skip => "no_charge",
        }
    }
}

/// Merchant-side customer id; the processor caps it at 20 characters.
fn merchant_customer_id(employee: EmployeeId) -> String {
    let mut id = employee.as_uuid().simple().to_string();
    id.truncate(20);
    id
}

fn card_token(employee: &Employee, request: &ProcessPaymentRequest) -> Result<CardToken> {
    let descriptor = request.data_descriptor.as_deref().map(str::trim).unwrap_or_default();
    let value = request.data_value.as_deref().map(str::trim).unwrap_or_default();
    if descriptor.is_empty() || value.is_empty() {
        return Err(RegistrationError::MissingPaymentToken);
    }

    Ok(CardToken {
        customer_id: merchant_customer_id(employee.id),
        customer_email: employee.work_email.clone(),
        data_descriptor: descriptor.to_string(),
        data_value: value.to_string(),
    })
}

fn admin_discount(request: &ProcessPaymentRequest) -> Option<AdminDiscount> {
    let discount_type = request.admin_discount_type?;
    let value = request.admin_discount_value?;
    Some(AdminDiscount {
        discount_type,
        value,
        reason: request
            .admin_discount_reason
            .as_deref()
            .map(str::trim)
            .filter(|r| !r.is_empty())
            .map(str::to_string),
    })
}

fn count(attendees: &[CheckoutAttendee], pred: impl Fn(&CheckoutAttendee) -> bool) -> u32 {
    u32::try_from(attendees.iter().filter(|a| pred(*a)).count()).unwrap_or(u32::MAX)
}

impl<S: RegistrationStore> RegistrationService<S> {
    /// Validate, price, charge and finalize a checkout.
    ///
    /// 1. Lock the checkout's session, begin a transaction
    /// 2. Run the validators in order; the first failure aborts
    /// 3. Charge the card, or store it for a waitlist-only cart
    /// 4. Write billing, finalize the checkout, save the card, enroll seated
    ///    attendees and waitlist the rest
    /// 5. Commit
    ///
    /// Any failure rolls the transaction back and returns the original error,
    /// gateway declines included.
    ///
    /// # Errors
    ///
    /// Validation, gateway and storage errors.
    pub async fn process_payment(
        &self,
        actor: Actor,
        checkout: CheckoutId,
        request: ProcessPaymentRequest,
    ) -> Result<PaymentReceipt> {
        let started = Instant::now();
        let session = self.session_of_checkout(checkout).await?;
        let _guard = self.lock(&Self::session_lock_name(session)).await?;

        let mut tx = self.store.begin().await?;
        let result = self.pay_in_tx(&mut tx, actor, checkout, request).await;

        match Self::finish(tx, result).await {
            Ok((receipt, action, charged)) => {
                let elapsed = started.elapsed().as_secs_f64();
                match action {
                    GatewayAction::Charge => {
                        metrics::record_payment_succeeded(charged.cents(), elapsed);
                    }
                    other => metrics::record_payment_without_charge(other.metric_status(), elapsed),
                }
                tracing::info!(
                    checkout_id = %checkout,
                    confirmation_number = %receipt.confirmation_number,
                    total = receipt.total,
                    transaction_id = ?receipt.transaction_id,
                    enrolled = receipt.seats_enrolled,
                    waitlisted = receipt.attendees_waitlisted,
                    "Checkout payment completed"
                );
                Ok(receipt)
            }
            Err(err) => {
                metrics::record_payment_failed(err.code());
                tracing::warn!(
                    checkout_id = %checkout,
                    code = err.code(),
                    error = %err,
                    "Checkout payment failed"
                );
                Err(err)
            }
        }
    }

    async fn pay_in_tx(
        &self,
        tx: &mut S::Tx,
        actor: Actor,
        id: CheckoutId,
        request: ProcessPaymentRequest,
    ) -> Result<(PaymentReceipt, GatewayAction, Money)> {
        let now = self.env.clock.now();
        let mut checkout = load_open_checkout(tx, actor, id).await?;

        let session = tx
            .find_session(checkout.session_id)
            .await?
            .ok_or(RegistrationError::NoEventSession)?;
        let event = tx
            .find_event(session.event_id)
            .await?
            .ok_or(RegistrationError::NoEventFound)?;
        let attendees = tx.list_attendees(id).await?;

        ensure_unique_emails(attendees.iter().map(|a| a.email.as_deref()))?;
        let emails = attendee_emails(attendees.iter().map(|a| a.email.as_deref()));
        ensure_not_enrolled(tx, &session, checkout.company_id, &emails).await?;
        ensure_not_waitlisted(tx, &session, checkout.company_id, &emails).await?;

        let seated = count(&attendees, CheckoutAttendee::holds_seat);
        let waitlisted = count(&attendees, CheckoutAttendee::is_waitlisted);
        let available = seats_open_to(tx, &session, Some(id), now).await?;
        ensure_seats_available(seated, available)?;

        let subtotal = event.price.times(seated);
        let discount =
            validate_discount_code(tx, request.discount_code.as_deref(), &event, subtotal, now)
                .await?;

        let voucher_quantity = request.voucher_quantity.unwrap_or(0);
        validate_voucher_redemption(tx, voucher_quantity, &event, checkout.company_id, now).await?;

        let employee = tx
            .find_employee(actor.employee_id)
            .await?
            .ok_or(RegistrationError::EmployeeNotFound)?;
        let admin = admin_discount(&request).filter(AdminDiscount::is_effective);
        ensure_admin_discount_permitted(&employee, admin.as_ref())?;

        let price = price_checkout(
            event.price,
            seated,
            voucher_quantity,
            discount.as_ref(),
            admin.as_ref(),
        );
        ensure_amount_matches(price.total, request.amount)?;

        let invoice_number = request
            .invoice_number
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .map_or_else(|| fallback_invoice_number(&checkout), str::to_string);

        let action = GatewayAction::decide(seated, waitlisted, price.total);
        tracing::debug!(
            checkout_id = %id,
            ?action,
            subtotal = %price.subtotal,
            total = %price.total,
            "Checkout priced"
        );
        let response: Option<GatewayResponse> = match action {
            GatewayAction::Charge => Some(
                self.env
                    .gateway
                    .charge(ChargeRequest {
                        card: card_token(&employee, &request)?,
                        amount: price.total,
                        invoice_number: Some(invoice_number.clone()),
                    })
                    .await?,
            ),
            GatewayAction::StoreProfile => Some(
                self.env
                    .gateway
                    .store_payment_profile(card_token(&employee, &request)?)
                    .await?,
            ),
            GatewayAction::Skip => None,
        };

        let settled = Settlement {
            event: &event,
            attendees: &attendees,
            price: &price,
            discount: discount.as_ref(),
            admin: admin.as_ref(),
            invoice_number: &invoice_number,
            response: response.as_ref(),
            payer: employee.id,
            now,
        }
        .apply(tx, &mut checkout)
        .await
        .inspect_err(|err| {
            if let Some(transaction_id) = response.as_ref().and_then(|r| r.transaction_id.as_deref()) {
                tracing::error!(
                    checkout_id = %id,
                    transaction_id,
                    error = %err,
                    "Card captured but checkout could not be recorded"
                );
            }
        })?;

        let receipt = PaymentReceipt {
            checkout_id: checkout.id,
            status: checkout.status,
            confirmation_number: checkout.confirmation_number.clone().unwrap_or_default(),
            invoice_number,
            subtotal: price.subtotal.as_decimal(),
            total: price.total.as_decimal(),
            transaction_id: response.and_then(|r| r.transaction_id),
            seats_enrolled: settled.enrolled,
            attendees_waitlisted: settled.waitlisted,
        };
        Ok((receipt, action, price.total))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::CompanyId;

    #[test]
    fn test_gateway_action() {
        let ten = Money::from_dollars(10);
        assert_eq!(GatewayAction::decide(2, 0, ten), GatewayAction::Charge);
        assert_eq!(GatewayAction::decide(2, 1, ten), GatewayAction::Charge);
        assert_eq!(GatewayAction::decide(0, 2, Money::ZERO), GatewayAction::StoreProfile);
        assert_eq!(GatewayAction::decide(2, 1, Money::ZERO), GatewayAction::StoreProfile);
        assert_eq!(GatewayAction::decide(3, 0, Money::ZERO), GatewayAction::Skip);
        assert_eq!(GatewayAction::decide(0, 0, Money::ZERO), GatewayAction::Skip);
    }

    #[test]
    fn test_merchant_customer_id_fits_processor_limit() {
        let id = merchant_customer_id(EmployeeId::new());
        assert_eq!(id.len(), 20);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_card_token_requires_both_parts() {
        let employee = Employee {
            id: EmployeeId::new(),
            company_id: CompanyId::new(),
            first_name: "Pat".to_string(),
            last_name: "Lee".to_string(),
            work_email: Some("pat@example.com".to_string()),
            role: None,
        };
        let mut request = ProcessPaymentRequest {
            data_descriptor: Some("COMMON.ACCEPT.INAPP.PAYMENT".to_string()),
            ..ProcessPaymentRequest::default()
        };
        assert!(matches!(
            card_token(&employee, &request),
            Err(RegistrationError::MissingPaymentToken)
        ));

        request.data_value = Some("opaque".to_string());
        let token = card_token(&employee, &request);
        assert!(matches!(token, Ok(ref t) if t.customer_email.as_deref() == Some("pat@example.com")));
    }

    #[test]
    fn test_admin_discount_needs_type_and_value() {
        let mut request = ProcessPaymentRequest {
            admin_discount_value: Some(10.0),
            admin_discount_reason: Some("  ".to_string()),
            ..ProcessPaymentRequest::default()
        };
        assert!(admin_discount(&request).is_none());

        request.admin_discount_type = Some(crate::types::DiscountType::Percentage);
        let discount = admin_discount(&request);
        assert!(matches!(discount, Some(ref d) if (d.value - 10.0).abs() < f64::EPSILON && d.reason.is_none()));
    }
}
