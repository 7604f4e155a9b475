//! Starting and updating checkout carts.

use super::seating::{Seating, allocate_seats, next_reservation_expiry};
use super::validation::{
    ensure_not_enrolled, ensure_not_waitlisted, ensure_unique_emails, seats_open_to,
};
use super::views::{AttendeeInput, CheckoutView, UpdateCheckoutRequest};
use super::{Actor, RegistrationService};
use crate::error::{RegistrationError, Result};
use crate::metrics;
use crate::store::{RegistrationStore, RegistrationTx};
use crate::types::{AttendeeId, CheckoutAttendee, CheckoutId, EventCheckout, SessionId};

/// Load a checkout the actor owns. Other people's carts read as missing.
pub(super) async fn load_owned_checkout<T: RegistrationTx>(
    tx: &mut T,
    actor: Actor,
    id: CheckoutId,
) -> Result<EventCheckout> {
    tx.find_checkout(id)
        .await?
        .filter(|c| c.is_owned_by(actor.employee_id, actor.company_id))
        .ok_or(RegistrationError::CheckoutNotFound(id))
}

/// Load a checkout the actor owns and can still change.
pub(super) async fn load_open_checkout<T: RegistrationTx>(
    tx: &mut T,
    actor: Actor,
    id: CheckoutId,
) -> Result<EventCheckout> {
    let checkout = load_owned_checkout(tx, actor, id).await?;
    if !checkout.is_in_progress() {
        return Err(RegistrationError::CheckoutNotInProgress(id));
    }
    Ok(checkout)
}

/// Trimmed, non-blank emails in list order.
pub(super) fn attendee_emails<'a>(emails: impl IntoIterator<Item = Option<&'a str>>) -> Vec<String> {
    emails
        .into_iter()
        .flatten()
        .map(str::trim)
        .filter(|email| !email.is_empty())
        .map(str::to_string)
        .collect()
}

/// Attendee list after applying an update.
#[derive(Debug, Default)]
struct Reconciled {
    /// Attendees in request order, flagged `true` when not yet stored
    attendees: Vec<(CheckoutAttendee, bool)>,
    /// Stored attendees the request dropped
    removed: Vec<AttendeeId>,
}

/// Match incoming rows to stored attendees by id, then by email ignoring
/// case, and create the rest.
fn reconcile_attendees(
    checkout: CheckoutId,
    existing: Vec<CheckoutAttendee>,
    incoming: Vec<AttendeeInput>,
) -> Reconciled {
    let mut pool: Vec<Option<CheckoutAttendee>> = existing.into_iter().map(Some).collect();
    let mut attendees = Vec::with_capacity(incoming.len());

    for (position, input) in (0_u32..).zip(incoming) {
        let email = input
            .email
            .as_deref()
            .map(str::trim)
            .filter(|e| !e.is_empty())
            .map(str::to_string);

        let by_id = input.id.and_then(|id| {
            pool.iter()
                .position(|slot| slot.as_ref().is_some_and(|a| a.id == id))
        });
        let by_email = || {
            let wanted = email.as_ref()?.to_lowercase();
            pool.iter().position(|slot| {
                slot.as_ref()
                    .and_then(|a| a.email.as_deref())
                    .is_some_and(|e| e.trim().to_lowercase() == wanted)
            })
        };
        let matched = by_id
            .or_else(by_email)
            .and_then(|index| pool.get_mut(index).and_then(Option::take));

        let (mut attendee, is_new) = match matched {
            Some(attendee) => (attendee, false),
            None => (
                CheckoutAttendee {
                    id: AttendeeId::new(),
                    checkout_id: checkout,
                    position,
                    first_name: String::new(),
                    last_name: String::new(),
                    email: None,
                    special_requests: None,
                    is_selected: true,
                    is_waitlist: false,
                },
                true,
            ),
        };

        attendee.position = position;
        attendee.first_name = input.first_name.trim().to_string();
        attendee.last_name = input.last_name.trim().to_string();
        attendee.email = email;
        if input.special_requests.is_some() {
            attendee.special_requests = input.special_requests;
        }
        attendee.is_selected = input.is_selected.unwrap_or(true);

        attendees.push((attendee, is_new));
    }

    Reconciled {
        attendees,
        removed: pool.into_iter().flatten().map(|a| a.id).collect(),
    }
}

impl<S: RegistrationStore> RegistrationService<S> {
    /// Open a cart for `session`, or return the one the actor already has
    /// in progress.
    ///
    /// # Errors
    ///
    /// Returns error if the session, employee or company does not exist.
    pub async fn start_checkout(&self, actor: Actor, session: SessionId) -> Result<CheckoutView> {
        let mut tx = self.store.begin().await?;
        let result = self.start_in_tx(&mut tx, actor, session).await;
        let (view, created) = Self::finish(tx, result).await?;

        if created {
            metrics::record_checkout_started();
            tracing::info!(
                checkout_id = %view.id,
                session_id = %session,
                employee_id = %actor.employee_id,
                "Checkout started"
            );
        }
        Ok(view)
    }

    async fn start_in_tx(
        &self,
        tx: &mut S::Tx,
        actor: Actor,
        session: SessionId,
    ) -> Result<(CheckoutView, bool)> {
        tx.find_session(session)
            .await?
            .ok_or(RegistrationError::SessionNotFound(session))?;

        if let Some(existing) = tx
            .find_in_progress_checkout(actor.employee_id, session, actor.company_id)
            .await?
        {
            let attendees = tx.list_attendees(existing.id).await?;
            return Ok((CheckoutView::new(&existing, &attendees), false));
        }

        tx.find_employee(actor.employee_id)
            .await?
            .ok_or(RegistrationError::EmployeeNotFound)?;
        tx.find_company(actor.company_id)
            .await?
            .ok_or(RegistrationError::CompanyNotFound)?;

        let checkout = EventCheckout::open(
            session,
            actor.company_id,
            actor.employee_id,
            self.env.clock.now(),
        );
        tx.insert_checkout(&checkout).await?;

        Ok((CheckoutView::new(&checkout, &[]), true))
    }

    /// Replace the contact details and attendee list of a cart, then
    /// reserve seats.
    ///
    /// 1. Lock the checkout's session, begin a transaction
    /// 2. Reject duplicate, enrolled and waitlisted attendee emails
    /// 3. Reconcile attendees (by id, then email, else create; drop the rest)
    /// 4. Seat selected attendees in order up to remaining capacity and
    ///    waitlist the overflow
    /// 5. Start, keep or release the reservation hold
    ///
    /// # Errors
    ///
    /// Returns the first failing rule; nothing is persisted in that case.
    pub async fn update_checkout(
        &self,
        actor: Actor,
        checkout: CheckoutId,
        request: UpdateCheckoutRequest,
    ) -> Result<CheckoutView> {
        let session = self.session_of_checkout(checkout).await?;
        let _guard = self.lock(&Self::session_lock_name(session)).await?;

        let mut tx = self.store.begin().await?;
        let result = self.update_in_tx(&mut tx, actor, checkout, request).await;
        let (view, seating) = Self::finish(tx, result).await?;

        metrics::record_checkout_updated(seating.seated, seating.waitlisted);
        tracing::info!(
            checkout_id = %checkout,
            seated = seating.seated,
            waitlisted = seating.waitlisted,
            reservation_expires_at = ?view.reservation_expires_at,
            "Checkout updated"
        );
        Ok(view)
    }

    async fn update_in_tx(
        &self,
        tx: &mut S::Tx,
        actor: Actor,
        id: CheckoutId,
        request: UpdateCheckoutRequest,
    ) -> Result<(CheckoutView, Seating)> {
        let now = self.env.clock.now();
        let mut checkout = load_open_checkout(tx, actor, id).await?;
        let session = tx
            .find_session(checkout.session_id)
            .await?
            .ok_or(RegistrationError::NoEventSession)?;

        ensure_unique_emails(request.attendees.iter().map(|a| a.email.as_deref()))?;
        let emails = attendee_emails(request.attendees.iter().map(|a| a.email.as_deref()));
        ensure_not_enrolled(tx, &session, checkout.company_id, &emails).await?;
        ensure_not_waitlisted(tx, &session, checkout.company_id, &emails).await?;

        checkout.contact_name = request.contact_name;
        checkout.contact_email = request.contact_email;
        checkout.contact_phone = request.contact_phone;
        checkout.group_notes = request.group_notes;

        let existing = tx.list_attendees(id).await?;
        let Reconciled { attendees, removed } = reconcile_attendees(id, existing, request.attendees);
        let (mut attendees, is_new): (Vec<_>, Vec<_>) = attendees.into_iter().unzip();

        let remaining = seats_open_to(tx, &session, Some(id), now).await?;
        let seating = allocate_seats(&mut attendees, remaining);
        checkout.reservation_expires_at = next_reservation_expiry(
            checkout.reservation_expires_at,
            seating.seated,
            now,
            self.env.settings.reservation_hold(),
        );
        checkout.updated_at = now;

        for attendee in removed {
            tx.delete_attendee(attendee).await?;
        }
        for (attendee, is_new) in attendees.iter().zip(is_new) {
            if is_new {
                tx.insert_attendee(attendee).await?;
            } else {
                tx.update_attendee(attendee).await?;
            }
        }
        tx.update_checkout(&checkout).await?;

        Ok((CheckoutView::new(&checkout, &attendees), seating))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stored(checkout: CheckoutId, position: u32, email: &str) -> CheckoutAttendee {
        CheckoutAttendee {
            id: AttendeeId::new(),
            checkout_id: checkout,
            position,
            first_name: "Stored".to_string(),
            last_name: "Attendee".to_string(),
            email: Some(email.to_string()),
            special_requests: Some("Aisle seat".to_string()),
            is_selected: true,
            is_waitlist: false,
        }
    }

    fn input(id: Option<AttendeeId>, email: Option<&str>) -> AttendeeInput {
        AttendeeInput {
            id,
            first_name: " New ".to_string(),
            last_name: "Name".to_string(),
            email: email.map(str::to_string),
            special_requests: None,
            is_selected: None,
        }
    }

    #[test]
    fn test_reconcile_matches_by_id_then_email() {
        let checkout = CheckoutId::new();
        let first = stored(checkout, 0, "one@example.com");
        let second = stored(checkout, 1, "Two@Example.com");
        let dropped = stored(checkout, 2, "three@example.com");

        let result = reconcile_attendees(
            checkout,
            vec![first.clone(), second.clone(), dropped.clone()],
            vec![
                input(None, Some("two@example.com")),
                input(Some(first.id), Some("renamed@example.com")),
                input(None, Some("four@example.com")),
            ],
        );

        let ids: Vec<_> = result.attendees.iter().map(|(a, _)| a.id).collect();
        assert_eq!(ids[0], second.id);
        assert_eq!(ids[1], first.id);
        assert!(result.attendees[2].1);
        assert_eq!(result.removed, vec![dropped.id]);

        let (renamed, is_new) = &result.attendees[1];
        assert!(!is_new);
        assert_eq!(renamed.position, 1);
        assert_eq!(renamed.first_name, "New");
        assert_eq!(renamed.email.as_deref(), Some("renamed@example.com"));
    }

    #[test]
    fn test_special_requests_kept_unless_provided() {
        let checkout = CheckoutId::new();
        let existing = stored(checkout, 0, "one@example.com");

        let kept = reconcile_attendees(
            checkout,
            vec![existing.clone()],
            vec![input(Some(existing.id), Some("one@example.com"))],
        );
        assert_eq!(
            kept.attendees[0].0.special_requests.as_deref(),
            Some("Aisle seat")
        );

        let mut replace = input(Some(existing.id), Some("one@example.com"));
        replace.special_requests = Some("Vegetarian".to_string());
        let replaced = reconcile_attendees(checkout, vec![existing], vec![replace]);
        assert_eq!(
            replaced.attendees[0].0.special_requests.as_deref(),
            Some("Vegetarian")
        );
    }

    #[test]
    fn test_empty_list_removes_everyone() {
        let checkout = CheckoutId::new();
        let a = stored(checkout, 0, "a@example.com");
        let b = stored(checkout, 1, "b@example.com");

        let result = reconcile_attendees(checkout, vec![a.clone(), b.clone()], vec![]);

        assert!(result.attendees.is_empty());
        assert_eq!(result.removed, vec![a.id, b.id]);
    }

    #[test]
    fn test_new_attendees_default_to_selected() {
        let checkout = CheckoutId::new();
        let mut unselected = input(None, None);
        unselected.is_selected = Some(false);

        let result = reconcile_attendees(checkout, vec![], vec![input(None, None), unselected]);

        assert!(result.attendees[0].0.is_selected);
        assert!(!result.attendees[1].0.is_selected);
        assert!(result.attendees.iter().all(|(a, new)| *new && a.checkout_id == checkout));
    }

    #[test]
    fn test_attendee_emails_skip_blanks() {
        let emails = attendee_emails([Some(" a@example.com "), None, Some("  ")]);
        assert_eq!(emails, vec!["a@example.com".to_string()]);
    }
}
