//! Event registration for the hub.
//!
//! Employees buy seats at scheduled event sessions on behalf of their
//! company. A checkout moves through three steps:
//!
//! ```text
//! start_checkout ──► update_checkout ──► process_payment
//!   (open cart)      (seat or waitlist,    (validate, price, charge,
//!                     30 min hold)          invoice, enroll, waitlist)
//! ```
//!
//! - **Seating**: attendees take seats in list order while capacity lasts;
//!   the rest go to the waitlist. Seats held by other live carts count
//!   against capacity until their reservation expires.
//! - **Pricing**: discount codes, company voucher seats and admin discounts
//!   stack in that order and never push the total below zero.
//! - **Consistency**: every mutation runs under a named lock and one
//!   database transaction. A declined card leaves nothing behind.
//! - **Waitlist**: administrators promote entries when seats free up,
//!   charging the attendee's stored card.
//!
//! # Crate layout
//!
//! - [`types`]: domain records and identifiers
//! - [`store`]: persistence traits with in-memory and `PostgreSQL` backends
//! - [`payment_gateway`] / [`authnet`]: card processing
//! - [`app`]: the checkout, payment and waitlist services
//! - [`api`] / [`server`]: the axum HTTP surface

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod api;
pub mod app;
pub mod authnet;
pub mod config;
pub mod error;
pub mod metrics;
pub mod payment_gateway;
pub mod server;
pub mod store;
pub mod types;

pub use app::{Actor, RegistrationEnvironment, RegistrationService};
pub use config::Config;
pub use error::{RegistrationError, Result};
pub use store::{InMemoryRegistrationStore, PostgresRegistrationStore, RegistrationStore};
