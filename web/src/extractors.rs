//! Custom Axum extractors.
//!
//! - [`CorrelationId`]: the request correlation ID (header or freshly generated)
//! - [`ActingEmployee`]: who is making the request and on behalf of which company
//!
//! Authentication happens upstream of this service. The gateway in front of
//! it resolves the session and forwards the employee and active company as
//! `X-Employee-Id` / `X-Company-Id` headers.
//!
//! ```ignore
//! async fn handler(
//!     actor: ActingEmployee,
//!     correlation_id: CorrelationId,
//! ) -> Result<Json<Response>, AppError> {
//!     tracing::info!(
//!         employee_id = %actor.employee_id,
//!         correlation_id = %correlation_id.0,
//!         "Processing request"
//!     );
//!     Ok(Json(response))
//! }
//! ```

use crate::error::AppError;
use crate::middleware::CORRELATION_ID_HEADER;
use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{HeaderMap, request::Parts},
};
use uuid::Uuid;

/// Header carrying the acting employee's id.
pub const EMPLOYEE_ID_HEADER: &str = "X-Employee-Id";

/// Header carrying the active company's id.
pub const COMPANY_ID_HEADER: &str = "X-Company-Id";

/// Correlation ID for the current request.
#[derive(Debug, Clone, Copy)]
pub struct CorrelationId(pub Uuid);

#[async_trait]
impl<S> FromRequestParts<S> for CorrelationId
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        // Prefer the id the middleware already chose
        if let Some(id) = parts.extensions.get::<Uuid>() {
            return Ok(Self(*id));
        }

        let correlation_id = parts
            .headers
            .get(CORRELATION_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| Uuid::parse_str(s).ok())
            .unwrap_or_else(Uuid::new_v4);

        Ok(Self(correlation_id))
    }
}

/// The employee making the request and their active company.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActingEmployee {
    /// Employee id
    pub employee_id: Uuid,
    /// Active company id
    pub company_id: Uuid,
}

fn uuid_header(headers: &HeaderMap, name: &str) -> Result<Uuid, AppError> {
    let raw = headers
        .get(name)
        .ok_or_else(|| AppError::unauthorized(format!("Missing {name} header")))?;

    raw.to_str()
        .ok()
        .and_then(|s| Uuid::parse_str(s.trim()).ok())
        .ok_or_else(|| AppError::unauthorized(format!("Invalid {name} header")))
}

#[async_trait]
impl<S> FromRequestParts<S> for ActingEmployee
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self {
            employee_id: uuid_header(&parts.headers, EMPLOYEE_ID_HEADER)?,
            company_id: uuid_header(&parts.headers, COMPANY_ID_HEADER)?,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use axum::http::{Request, StatusCode};

    #[tokio::test]
    async fn test_correlation_id_from_header() {
        let uuid = Uuid::new_v4();
        let req = Request::builder()
            .header(CORRELATION_ID_HEADER, uuid.to_string())
            .body(())
            .unwrap();

        let (mut parts, ()) = req.into_parts();
        let correlation_id = CorrelationId::from_request_parts(&mut parts, &())
            .await
            .unwrap();

        assert_eq!(correlation_id.0, uuid);
    }

    #[tokio::test]
    async fn test_acting_employee_from_headers() {
        let employee_id = Uuid::new_v4();
        let company_id = Uuid::new_v4();
        let req = Request::builder()
            .header(EMPLOYEE_ID_HEADER, employee_id.to_string())
            .header(COMPANY_ID_HEADER, company_id.to_string())
            .body(())
            .unwrap();

        let (mut parts, ()) = req.into_parts();
        let actor = ActingEmployee::from_request_parts(&mut parts, &())
            .await
            .unwrap();

        assert_eq!(actor.employee_id, employee_id);
        assert_eq!(actor.company_id, company_id);
    }

    #[tokio::test]
    async fn test_acting_employee_missing_header_is_unauthorized() {
        let req = Request::builder()
            .header(EMPLOYEE_ID_HEADER, Uuid::new_v4().to_string())
            .body(())
            .unwrap();

        let (mut parts, ()) = req.into_parts();
        let err = ActingEmployee::from_request_parts(&mut parts, &())
            .await
            .unwrap_err();

        assert_eq!(err.status(), StatusCode::UNAUTHORIZED);
        assert!(err.message().contains(COMPANY_ID_HEADER));
    }

    #[tokio::test]
    async fn test_acting_employee_rejects_garbage() {
        let req = Request::builder()
            .header(EMPLOYEE_ID_HEADER, "42")
            .header(COMPANY_ID_HEADER, Uuid::new_v4().to_string())
            .body(())
            .unwrap();

        let (mut parts, ()) = req.into_parts();
        let err = ActingEmployee::from_request_parts(&mut parts, &())
            .await
            .unwrap_err();

        assert_eq!(err.status(), StatusCode::UNAUTHORIZED);
    }
}
