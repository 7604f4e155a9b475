//! Checkout page data.

use super::checkout::load_owned_checkout;
use super::validation::{available_voucher_seats, seats_open_to};
use super::views::{
    AttendeeView, CheckoutDetails, CheckoutView, DiscountView, EventSummary, SessionSummary,
};
use super::{Actor, RegistrationService};
use crate::error::{RegistrationError, Result};
use crate::store::{RegistrationStore, RegistrationTx};
use crate::types::{CheckoutAttendee, CheckoutId, Employee, EventCheckout, EventDiscount, EventId};
use chrono::{DateTime, Utc};
use hub_core::Money;

/// Whether `discount` would be accepted for this cart right now.
fn is_applicable(
    discount: &EventDiscount,
    event: EventId,
    subtotal: Money,
    uses: u32,
    now: DateTime<Utc>,
) -> bool {
    discount.is_active
        && discount.is_within_window(now)
        && discount.applies_to_event(event)
        && discount.maximum_uses.is_none_or(|max| uses < max)
        && discount.minimum_purchase.is_none_or(|min| subtotal >= min)
}

/// Pre-filled attendee offered when the cart is still empty.
fn default_attendee(employee: &Employee) -> AttendeeView {
    AttendeeView {
        id: None,
        first_name: employee.first_name.clone(),
        last_name: employee.last_name.clone(),
        email: employee.work_email.clone(),
        special_requests: None,
        is_selected: true,
        is_waitlist: false,
        is_default: true,
    }
}

impl<S: RegistrationStore> RegistrationService<S> {
    /// Everything the checkout page shows: event, session, cart, seat and
    /// voucher availability, and the discounts the cart qualifies for.
    ///
    /// # Errors
    ///
    /// Returns error if the checkout is not the actor's or its session or
    /// event is missing.
    pub async fn checkout_details(
        &self,
        actor: Actor,
        checkout: CheckoutId,
    ) -> Result<CheckoutDetails> {
        let mut tx = self.store.begin().await?;
        let result = self.details_in_tx(&mut tx, actor, checkout).await;
        Self::finish(tx, result).await
    }

    async fn details_in_tx(
        &self,
        tx: &mut S::Tx,
        actor: Actor,
        id: CheckoutId,
    ) -> Result<CheckoutDetails> {
        let now = self.env.clock.now();
        let checkout = load_owned_checkout(tx, actor, id).await?;
        let session = tx
            .find_session(checkout.session_id)
            .await?
            .ok_or(RegistrationError::NoEventSession)?;
        let event = tx
            .find_event(session.event_id)
            .await?
            .ok_or(RegistrationError::NoEventFound)?;
        let attendees = tx.list_attendees(id).await?;

        let available_seats = seats_open_to(tx, &session, Some(id), now).await?;
        let seated = seated_count(&attendees);
        let occupied = if checkout.has_live_reservation(now) { seated } else { 0 };

        let company_available_voucher_seats = if event.is_voucher_eligible {
            Some(available_voucher_seats(tx, checkout.company_id, now).await?)
        } else {
            None
        };

        let subtotal = event.price.times(seated);
        let mut applicable_discounts = Vec::new();
        for discount in tx.list_active_discounts().await? {
            let uses = match discount.maximum_uses {
                Some(_) => tx.count_discount_uses(&discount.code).await?,
                None => 0,
            };
            if is_applicable(&discount, event.id, subtotal, uses, now) {
                applicable_discounts.push(DiscountView::from(&discount));
            }
        }

        let mut view = CheckoutView::new(&checkout, &attendees);
        if attendees.is_empty() {
            if let Some(attendee) = self.suggested_attendee(tx, &checkout, actor).await? {
                view.attendees.push(attendee);
            }
        }

        Ok(CheckoutDetails {
            event: EventSummary {
                id: event.id,
                name: event.name,
                price: event.price.as_decimal(),
                is_voucher_eligible: event.is_voucher_eligible,
            },
            session: SessionSummary::from(&session),
            checkout: view,
            available_seats,
            occupied_attendee_seats_by_current_user: occupied,
            company_available_voucher_seats,
            applicable_discounts,
        })
    }

    /// The acting employee as a default attendee, unless they are already
    /// enrolled or belong to another company.
    async fn suggested_attendee(
        &self,
        tx: &mut S::Tx,
        checkout: &EventCheckout,
        actor: Actor,
    ) -> Result<Option<AttendeeView>> {
        let Some(employee) = tx.find_employee(actor.employee_id).await? else {
            return Ok(None);
        };
        if employee.company_id != checkout.company_id {
            return Ok(None);
        }
        if let Some(email) = employee.work_email.as_deref() {
            if tx
                .find_enrollment_for_email(checkout.session_id, email)
                .await?
                .is_some()
            {
                return Ok(None);
            }
        }
        Ok(Some(default_attendee(&employee)))
    }
}

fn seated_count(attendees: &[CheckoutAttendee]) -> u32 {
    let seated = attendees.iter().filter(|a| a.holds_seat()).count();
    u32::try_from(seated).unwrap_or(u32::MAX)
}
