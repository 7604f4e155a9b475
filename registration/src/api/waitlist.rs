//! Waitlist endpoints.
//!
//! - GET /api/event-sessions/:session_id/waitlist - Entries by position
//! - POST /api/waitlist/:entry_id/promote - Seat a waitlisted attendee (admin)

use crate::app::{PromotionReceipt, WaitlistEntryView};
use crate::server::AppState;
use crate::store::RegistrationStore;
use crate::types::{SessionId, WaitlistEntryId};
use axum::{
    Json,
    extract::{Path, State},
};
use hub_web::{ActingEmployee, AppError};
use uuid::Uuid;

/// List the session's waitlist.
///
/// # Errors
///
/// 404 if the session does not exist.
pub async fn list_waitlist<S: RegistrationStore>(
    State(state): State<AppState<S>>,
    _acting: ActingEmployee,
    Path(session_id): Path<Uuid>,
) -> Result<Json<Vec<WaitlistEntryView>>, AppError> {
    let entries = state
        .service
        .list_waitlist(SessionId::from_uuid(session_id))
        .await?;
    Ok(Json(entries))
}

/// Promote a waitlist entry into a confirmed seat.
///
/// # Errors
///
/// 403 for non-admins, 409 if already promoted, 422 when the session is full
/// or no card is stored, 402 when the stored card is declined.
pub async fn promote_waitlist_entry<S: RegistrationStore>(
    State(state): State<AppState<S>>,
    acting: ActingEmployee,
    Path(entry_id): Path<Uuid>,
) -> Result<Json<PromotionReceipt>, AppError> {
    let receipt = state
        .service
        .promote_waitlist_entry(acting.into(), WaitlistEntryId::from_uuid(entry_id))
        .await?;
    Ok(Json(receipt))
}
