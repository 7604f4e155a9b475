//! HTTP server for the registration service.
//!
//! - Application state shared by handlers
//! - Health and readiness probes
//! - Router configuration

pub mod health;
pub mod routes;
pub mod state;

pub use health::readiness_check;
pub use routes::build_router;
pub use state::AppState;
