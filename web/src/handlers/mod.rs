//! HTTP request handlers shared by every hub service.

pub mod health;

pub use health::{ComponentHealth, HealthResponse, ReadinessResponse, health_check, readiness};
