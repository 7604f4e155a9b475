//! # Hub Core
//!
//! Core types shared by the hub services.
//!
//! ## Contents
//!
//! - [`environment`]: injected dependencies (`Clock`) so services stay testable
//! - [`money`]: cent-based `Money` value object
//! - [`lock`]: process-wide named locks guarding critical sections
//!
//! ## Example
//!
//! ```ignore
//! use hub_core::environment::{Clock, SystemClock};
//! use hub_core::lock::NamedLocks;
//! use hub_core::money::Money;
//!
//! let locks = NamedLocks::new();
//! let _guard = locks.acquire("update_event_checkout_abc").await;
//! let price = Money::from_dollars(50);
//! let now = SystemClock.now();
//! ```

pub mod environment;
pub mod lock;
pub mod money;

pub use environment::{Clock, SystemClock};
pub use lock::{LockError, NamedLockGuard, NamedLocks};
pub use money::Money;
