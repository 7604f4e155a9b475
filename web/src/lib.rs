//! Axum integration shared by the hub services.
//!
//! # Request Flow
//!
//! 1. [`middleware::correlation_id_layer`] tags the request and opens a span
//! 2. Extractors pull the acting employee and JSON body
//! 3. The handler calls an application service
//! 4. Domain errors convert into [`AppError`] and render as JSON
//!
//! # Example
//!
//! ```ignore
//! use hub_web::{ActingEmployee, AppError, correlation_id_layer};
//! use axum::{Router, routing::get, Json};
//!
//! async fn details(actor: ActingEmployee) -> Result<Json<Details>, AppError> {
//!     Ok(Json(load(actor).await?))
//! }
//!
//! let app = Router::new()
//!     .route("/api/event-checkout-sessions/:id", get(details))
//!     .layer(correlation_id_layer());
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod error;
pub mod extractors;
pub mod handlers;
pub mod middleware;

// Re-export key types for convenience
pub use error::{AppError, ErrorResponse};
pub use extractors::{ActingEmployee, COMPANY_ID_HEADER, CorrelationId, EMPLOYEE_ID_HEADER};
pub use middleware::{CORRELATION_ID_HEADER, CorrelationIdExt, correlation_id_layer};

/// Result type alias for web handlers.
pub type WebResult<T> = Result<T, AppError>;
