//! Mapping of service errors onto HTTP responses.

use crate::error::RegistrationError;
use crate::payment_gateway::PaymentGatewayError;
use axum::http::StatusCode;
use hub_core::lock::LockError;
use hub_web::AppError;

impl From<RegistrationError> for AppError {
    fn from(err: RegistrationError) -> Self {
        let code = err.code();
        let message = err.to_string();

        let app = match &err {
            RegistrationError::CheckoutNotFound(_)
            | RegistrationError::NoEventSession
            | RegistrationError::SessionNotFound(_)
            | RegistrationError::NoEventFound
            | RegistrationError::EmployeeNotFound
            | RegistrationError::CompanyNotFound
            | RegistrationError::WaitlistEntryNotFound(_) => {
                Self::new(StatusCode::NOT_FOUND, message, code)
            }

            RegistrationError::CheckoutNotInProgress(_)
            | RegistrationError::WaitlistAlreadyPromoted(_) => Self::conflict(message),

            RegistrationError::NoPermissionToApplyAdminDiscount
            | RegistrationError::NoPermissionToManageWaitlist => Self::forbidden(message),

            RegistrationError::Payment(PaymentGatewayError::Timeout) => {
                Self::unavailable(message)
            }
            RegistrationError::Payment(PaymentGatewayError::Other { .. }) => {
                Self::internal("Payment processor error").with_source(anyhow::Error::msg(message))
            }
            RegistrationError::Payment(_) => Self::payment_required(message),

            RegistrationError::Lock(LockError::Timeout { .. }) => {
                Self::timeout("The checkout is busy, please retry")
            }
            RegistrationError::Lock(LockError::Poisoned) | RegistrationError::Database(_) => {
                Self::internal("An internal error occurred").with_source(anyhow::Error::msg(message))
            }

            _ => Self::validation(message),
        };

        app.with_code(code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::CheckoutId;
    use std::time::Duration;

    #[test]
    fn test_not_found_keeps_domain_code() {
        let err = AppError::from(RegistrationError::CheckoutNotFound(CheckoutId::new()));
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
        assert_eq!(err.code(), "CHECKOUT_NOT_FOUND");
    }

    #[test]
    fn test_rule_violations_are_unprocessable() {
        let err = AppError::from(RegistrationError::NotEnoughSeatsAvailable {
            requested: 3,
            available: 1,
        });
        assert_eq!(err.status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(err.code(), "NOT_ENOUGH_SEATS_AVAILABLE");

        let err = AppError::from(RegistrationError::MissingPaymentToken);
        assert_eq!(err.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[test]
    fn test_decline_is_payment_required() {
        let err = AppError::from(RegistrationError::Payment(PaymentGatewayError::Declined {
            reason: "This transaction has been declined.".to_string(),
        }));
        assert_eq!(err.status(), StatusCode::PAYMENT_REQUIRED);
        assert_eq!(err.code(), "PAYMENT_FAILED");
        assert_eq!(err.message(), "This transaction has been declined.");
    }

    #[test]
    fn test_infrastructure_errors_hide_details() {
        let err = AppError::from(RegistrationError::Database("connection reset".to_string()));
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.message(), "An internal error occurred");

        let err = AppError::from(RegistrationError::Lock(LockError::Timeout {
            name: "update_event_checkout_x".to_string(),
            timeout: Duration::from_secs(10),
        }));
        assert_eq!(err.status(), StatusCode::REQUEST_TIMEOUT);
        assert_eq!(err.code(), "LOCK_UNAVAILABLE");
    }

    #[test]
    fn test_permission_errors_are_forbidden() {
        let err = AppError::from(RegistrationError::NoPermissionToManageWaitlist);
        assert_eq!(err.status(), StatusCode::FORBIDDEN);
    }
}
