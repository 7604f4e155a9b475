//! Checkout endpoints.
//!
//! - POST /api/event-sessions/:session_id/checkout - Open or resume a cart
//! - GET /api/event-checkout-sessions/:checkout_id - Checkout page data
//! - PUT /api/event-checkout-sessions/:checkout_id - Save contact and attendees
//! - POST /api/event-checkout-sessions/:checkout_id/payment - Pay and finalize

use crate::app::{
    CheckoutDetails, CheckoutView, PaymentReceipt, ProcessPaymentRequest, UpdateCheckoutRequest,
};
use crate::server::AppState;
use crate::store::RegistrationStore;
use crate::types::{CheckoutId, SessionId};
use axum::{
    Json,
    extract::{Path, State},
};
use hub_web::{ActingEmployee, AppError};
use uuid::Uuid;

/// Open a checkout for the session, or return the caller's open one.
///
/// ```bash
/// curl -X POST http://localhost:8080/api/event-sessions/$SESSION/checkout \
///   -H "X-Employee-Id: $EMPLOYEE" -H "X-Company-Id: $COMPANY"
/// ```
///
/// # Errors
///
/// 404 if the session, employee or company does not exist.
pub async fn start_checkout<S: RegistrationStore>(
    State(state): State<AppState<S>>,
    acting: ActingEmployee,
    Path(session_id): Path<Uuid>,
) -> Result<Json<CheckoutView>, AppError> {
    let view = state
        .service
        .start_checkout(acting.into(), SessionId::from_uuid(session_id))
        .await?;
    Ok(Json(view))
}

/// Checkout page data.
///
/// # Errors
///
/// 404 if the checkout is missing or belongs to someone else.
pub async fn checkout_details<S: RegistrationStore>(
    State(state): State<AppState<S>>,
    acting: ActingEmployee,
    Path(checkout_id): Path<Uuid>,
) -> Result<Json<CheckoutDetails>, AppError> {
    let details = state
        .service
        .checkout_details(acting.into(), CheckoutId::from_uuid(checkout_id))
        .await?;
    Ok(Json(details))
}

/// Save contact details and the attendee list, reserving seats.
///
/// ```json
/// {
///   "contactName": "Pat Lee",
///   "contactEmail": "pat@example.com",
///   "attendees": [
///     {"firstName": "Pat", "lastName": "Lee", "email": "pat@example.com", "isSelected": true}
///   ]
/// }
/// ```
///
/// # Errors
///
/// 404 for an unknown checkout, 409 once it is completed, 422 for duplicate
/// or already-registered attendees.
pub async fn update_checkout<S: RegistrationStore>(
    State(state): State<AppState<S>>,
    acting: ActingEmployee,
    Path(checkout_id): Path<Uuid>,
    Json(request): Json<UpdateCheckoutRequest>,
) -> Result<Json<CheckoutView>, AppError> {
    let view = state
        .service
        .update_checkout(acting.into(), CheckoutId::from_uuid(checkout_id), request)
        .await?;
    Ok(Json(view))
}

/// Validate, charge and finalize the checkout.
///
/// # Errors
///
/// 422 for validation failures, 402 when the card is declined, 403 when an
/// admin discount is applied without permission.
pub async fn process_payment<S: RegistrationStore>(
    State(state): State<AppState<S>>,
    acting: ActingEmployee,
    Path(checkout_id): Path<Uuid>,
    Json(request): Json<ProcessPaymentRequest>,
) -> Result<Json<PaymentReceipt>, AppError> {
    let receipt = state
        .service
        .process_payment(acting.into(), CheckoutId::from_uuid(checkout_id), request)
        .await?;
    Ok(Json(receipt))
}
