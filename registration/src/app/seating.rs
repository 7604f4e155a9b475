//! Seat allocation and reservation expiry.
//!
//! Pure functions: callers load capacity figures from the store and persist
//! the resulting flags.

use crate::types::CheckoutAttendee;
use chrono::{DateTime, Duration, Utc};

/// Outcome of [`allocate_seats`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Seating {
    /// Attendees holding a seat
    pub seated: u32,
    /// Selected attendees pushed to the waitlist
    pub waitlisted: u32,
}

/// Seats left once confirmed enrollments and other carts' live holds are
/// subtracted from the session maximum.
#[must_use]
pub const fn remaining_capacity(max_enrollments: u32, enrolled: u32, held_elsewhere: u32) -> u32 {
    max_enrollments.saturating_sub(enrolled.saturating_add(held_elsewhere))
}

/// Walk attendees in list order and seat the first `remaining` selected
/// ones. Later selected attendees are waitlisted; unselected attendees are
/// neither.
pub fn allocate_seats(attendees: &mut [CheckoutAttendee], remaining: u32) -> Seating {
    let mut seating = Seating::default();

    for attendee in attendees.iter_mut() {
        if !attendee.is_selected {
            attendee.is_waitlist = false;
            continue;
        }
        if seating.seated < remaining {
            attendee.is_waitlist = false;
            seating.seated += 1;
        } else {
            attendee.is_waitlist = true;
            seating.waitlisted += 1;
        }
    }

    seating
}

/// Expiry to store after seating.
///
/// With nobody seated the hold is released. Otherwise an expiry still in the
/// future is kept, and a missing or lapsed one restarts at `now + hold`.
#[must_use]
pub fn next_reservation_expiry(
    current: Option<DateTime<Utc>>,
    seated: u32,
    now: DateTime<Utc>,
    hold: Duration,
) -> Option<DateTime<Utc>> {
    if seated == 0 {
        return None;
    }
    match current {
        Some(expires_at) if expires_at > now => Some(expires_at),
        _ => Some(now + hold),
    }
}
