//! Application state for the registration HTTP server.

use crate::app::RegistrationService;
use crate::store::RegistrationStore;

/// State shared across all HTTP handlers.
///
/// Cloned per request; the service only holds handles.
pub struct AppState<S: RegistrationStore> {
    /// Checkout, payment and waitlist operations
    pub service: RegistrationService<S>,
}

impl<S: RegistrationStore> AppState<S> {
    /// Create a new application state.
    #[must_use]
    pub const fn new(service: RegistrationService<S>) -> Self {
        Self { service }
    }
}

impl<S: RegistrationStore> Clone for AppState<S> {
    fn clone(&self) -> Self {
        Self {
            service: self.service.clone(),
        }
    }
}
