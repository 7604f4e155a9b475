//! HTTP API for event checkout.
//!
//! - Checkouts: start, view, update and pay for a cart
//! - Waitlist: list a session's waitlist and promote entries
//!
//! Every route except the health probes requires the `X-Employee-Id` and
//! `X-Company-Id` headers set by the upstream gateway.

pub mod checkouts;
mod errors;
pub mod waitlist;

use crate::app::Actor;
use crate::types::{CompanyId, EmployeeId};
use hub_web::ActingEmployee;

pub use checkouts::{checkout_details, process_payment, start_checkout, update_checkout};
pub use waitlist::{list_waitlist, promote_waitlist_entry};

impl From<ActingEmployee> for Actor {
    fn from(acting: ActingEmployee) -> Self {
        Self {
            employee_id: EmployeeId::from_uuid(acting.employee_id),
            company_id: CompanyId::from_uuid(acting.company_id),
        }
    }
}
