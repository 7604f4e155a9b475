//! Registration services.
//!
//! [`RegistrationService`] owns the checkout workflow end to end:
//!
//! - [`start_checkout`](RegistrationService::start_checkout) opens (or
//!   resumes) a cart
//! - [`update_checkout`](RegistrationService::update_checkout) reconciles
//!   attendees and reserves seats
//! - [`checkout_details`](RegistrationService::checkout_details) renders the
//!   checkout page
//! - [`process_payment`](RegistrationService::process_payment) validates,
//!   prices, charges and finalizes
//! - [`list_waitlist`](RegistrationService::list_waitlist) and
//!   [`promote_waitlist_entry`](RegistrationService::promote_waitlist_entry)
//!   manage a session's waitlist
//!
//! Mutations take the session's named lock first, then run in one store
//! transaction that commits on success and rolls back on any error. The caller always sees the
//! original error, never a rollback failure.

mod checkout;
mod details;
mod payment;
pub mod pricing;
pub mod seating;
mod settlement;
pub mod validation;
pub mod views;
mod waitlist;

use crate::config::CheckoutConfig;
use crate::error::{RegistrationError, Result};
use crate::payment_gateway::PaymentGateway;
use crate::store::{RegistrationStore, RegistrationTx};
use crate::types::{CheckoutId, CompanyId, EmployeeId, SessionId};
use hub_core::environment::Clock;
use hub_core::lock::{NamedLockGuard, NamedLocks};
use std::sync::Arc;

pub use pricing::{AdminDiscount, PriceBreakdown};
pub use views::{
    AttendeeInput, AttendeeView, CheckoutDetails, CheckoutView, PaymentReceipt,
    ProcessPaymentRequest, PromotionReceipt, UpdateCheckoutRequest, WaitlistEntryView,
};

/// Who is making the request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Actor {
    /// Acting employee
    pub employee_id: EmployeeId,
    /// Company the employee is acting for
    pub company_id: CompanyId,
}

/// Dependencies injected into [`RegistrationService`].
#[derive(Clone)]
pub struct RegistrationEnvironment {
    /// Time source
    pub clock: Arc<dyn Clock>,
    /// Payment processor
    pub gateway: Arc<dyn PaymentGateway>,
    /// Process-wide named locks
    pub locks: Arc<NamedLocks>,
    /// Hold duration and lock timeout
    pub settings: CheckoutConfig,
}

impl RegistrationEnvironment {
    /// Environment with a fresh lock registry and default settings.
    #[must_use]
    pub fn new(clock: Arc<dyn Clock>, gateway: Arc<dyn PaymentGateway>) -> Self {
        Self {
            clock,
            gateway,
            locks: NamedLocks::shared(),
            settings: CheckoutConfig::default(),
        }
    }

    /// Replace the checkout settings.
    #[must_use]
    pub fn with_settings(mut self, settings: CheckoutConfig) -> Self {
        self.settings = settings;
        self
    }

    /// Share an existing lock registry.
    #[must_use]
    pub fn with_locks(mut self, locks: Arc<NamedLocks>) -> Self {
        self.locks = locks;
        self
    }
}

/// Event checkout, payment and waitlist operations over a store.
pub struct RegistrationService<S: RegistrationStore> {
    store: S,
    env: RegistrationEnvironment,
}

impl<S: RegistrationStore> Clone for RegistrationService<S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            env: self.env.clone(),
        }
    }
}

impl<S: RegistrationStore> RegistrationService<S> {
    /// Create a new service
    #[must_use]
    pub const fn new(store: S, env: RegistrationEnvironment) -> Self {
        Self { store, env }
    }

    /// The underlying store.
    #[must_use]
    pub const fn store(&self) -> &S {
        &self.store
    }

    /// Named lock guarding every seat-affecting change to a session: cart
    /// updates, payments and waitlist promotions.
    fn session_lock_name(session: SessionId) -> String {
        format!("update_event_checkout_{session}")
    }

    /// Session of `checkout`, read in its own short transaction so the
    /// session lock can be taken before the real one begins.
    async fn session_of_checkout(&self, checkout: CheckoutId) -> Result<SessionId> {
        let mut tx = self.store.begin().await?;
        let found = tx.find_checkout(checkout).await;
        tx.rollback().await?;
        Ok(found?
            .ok_or(RegistrationError::CheckoutNotFound(checkout))?
            .session_id)
    }

    async fn lock(&self, name: &str) -> Result<NamedLockGuard> {
        Ok(self
            .env
            .locks
            .acquire_timeout(name, self.env.settings.lock_timeout())
            .await?)
    }

    /// Commit `tx` if `result` is `Ok`, otherwise roll it back and return the
    /// original error.
    async fn finish<T>(tx: S::Tx, result: Result<T>) -> Result<T> {
        match result {
            Ok(value) => {
                tx.commit().await?;
                Ok(value)
            }
            Err(err) => {
                if let Err(rollback_err) = tx.rollback().await {
                    tracing::warn!(error = %rollback_err, "Rollback failed");
                }
                Err(err)
            }
        }
    }
}
