//! Process-wide named locks.
//!
//! A [`NamedLocks`] registry hands out one async mutex per name. Holding the
//! returned [`NamedLockGuard`] serializes every task that asks for the same
//! name; dropping it releases the lock on every exit path, including early
//! returns via `?`.
//!
//! The registry is in-process only. Two server instances sharing one database
//! do not see each other's locks.
//!
//! # Example
//!
//! ```
//! use hub_core::lock::NamedLocks;
//!
//! # tokio_test::block_on(async {
//! let locks = NamedLocks::new();
//! {
//!     let _guard = locks.acquire("update_event_checkout_42").await.unwrap();
//!     assert!(locks.try_acquire("update_event_checkout_42").unwrap().is_none());
//! }
//! assert!(locks.try_acquire("update_event_checkout_42").unwrap().is_some());
//! # });
//! ```

use std::collections::HashMap;
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// Errors raised while acquiring a named lock.
#[derive(Debug, Error)]
pub enum LockError {
    /// The lock was not acquired before the deadline.
    #[error("Timed out after {timeout:?} waiting for lock '{name}'")]
    Timeout {
        /// Lock name
        name: String,
        /// How long we waited
        timeout: Duration,
    },

    /// The registry mutex was poisoned by a panicking holder.
    #[error("Lock registry poisoned")]
    Poisoned,
}

/// Registry of named async mutexes.
#[derive(Debug, Default)]
pub struct NamedLocks {
    entries: Mutex<HashMap<String, Weak<AsyncMutex<()>>>>,
}

impl NamedLocks {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an Arc-wrapped registry for sharing between services.
    #[must_use]
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    fn entry(&self, name: &str) -> Result<Arc<AsyncMutex<()>>, LockError> {
        let mut entries = self.entries.lock().map_err(|_| LockError::Poisoned)?;

        // Drop names nobody holds or waits on anymore
        entries.retain(|_, weak| weak.strong_count() > 0);

        if let Some(existing) = entries.get(name).and_then(Weak::upgrade) {
            return Ok(existing);
        }

        let lock = Arc::new(AsyncMutex::new(()));
        entries.insert(name.to_string(), Arc::downgrade(&lock));
        Ok(lock)
    }

    /// Waits until the named lock is free and takes it.
    ///
    /// # Errors
    ///
    /// Returns [`LockError::Poisoned`] if the registry itself is poisoned.
    pub async fn acquire(&self, name: &str) -> Result<NamedLockGuard, LockError> {
        let lock = self.entry(name)?;
        let guard = lock.lock_owned().await;

        tracing::debug!(lock = %name, "Acquired named lock");

        Ok(NamedLockGuard {
            name: name.to_string(),
            _guard: guard,
        })
    }

    /// Like [`acquire`](Self::acquire) but gives up after `timeout`.
    ///
    /// # Errors
    ///
    /// Returns [`LockError::Timeout`] when the deadline passes first.
    pub async fn acquire_timeout(
        &self,
        name: &str,
        timeout: Duration,
    ) -> Result<NamedLockGuard, LockError> {
        match tokio::time::timeout(timeout, self.acquire(name)).await {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!(lock = %name, ?timeout, "Timed out waiting for named lock");
                Err(LockError::Timeout {
                    name: name.to_string(),
                    timeout,
                })
            }
        }
    }

    /// Takes the named lock only if it is currently free.
    ///
    /// # Errors
    ///
    /// Returns [`LockError::Poisoned`] if the registry itself is poisoned.
    pub fn try_acquire(&self, name: &str) -> Result<Option<NamedLockGuard>, LockError> {
        let lock = self.entry(name)?;
        Ok(lock.try_lock_owned().ok().map(|guard| NamedLockGuard {
            name: name.to_string(),
            _guard: guard,
        }))
    }

    /// Number of names currently held or awaited.
    #[must_use]
    pub fn active_locks(&self) -> usize {
        self.entries.lock().map_or(0, |entries| {
            entries
                .values()
                .filter(|weak| weak.strong_count() > 0)
                .count()
        })
    }
}

/// Holds a named lock until dropped.
#[derive(Debug)]
pub struct NamedLockGuard {
    name: String,
    _guard: OwnedMutexGuard<()>,
}

impl NamedLockGuard {
    /// Name of the held lock.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl Drop for NamedLockGuard {
    fn drop(&mut self) {
        tracing::debug!(lock = %self.name, "Released named lock");
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn test_same_name_is_exclusive() {
        let locks = NamedLocks::new();
        let guard = locks.acquire("session-a").await.unwrap();

        assert!(locks.try_acquire("session-a").unwrap().is_none());
        assert_eq!(guard.name(), "session-a");

        drop(guard);
        assert!(locks.try_acquire("session-a").unwrap().is_some());
    }

    #[tokio::test]
    async fn test_different_names_do_not_block() {
        let locks = NamedLocks::new();
        let _a = locks.acquire("session-a").await.unwrap();
        let b = locks.try_acquire("session-b").unwrap();
        assert!(b.is_some());
    }

    #[tokio::test]
    async fn test_timeout_when_held() {
        let locks = NamedLocks::new();
        let _held = locks.acquire("busy").await.unwrap();

        let result = locks
            .acquire_timeout("busy", Duration::from_millis(20))
            .await;

        assert!(matches!(result, Err(LockError::Timeout { .. })));
    }

    #[tokio::test]
    async fn test_released_on_error_path() {
        async fn failing(locks: &NamedLocks) -> Result<(), String> {
            let _guard = locks.acquire("fallible").await.map_err(|e| e.to_string())?;
            Err("boom".to_string())
        }

        let locks = NamedLocks::new();
        assert!(failing(&locks).await.is_err());
        assert!(locks.try_acquire("fallible").unwrap().is_some());
    }

    #[tokio::test]
    async fn test_serializes_concurrent_holders() {
        let locks = NamedLocks::shared();
        let inside = Arc::new(AtomicUsize::new(0));
        let max_seen = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let locks = Arc::clone(&locks);
            let inside = Arc::clone(&inside);
            let max_seen = Arc::clone(&max_seen);
            handles.push(tokio::spawn(async move {
                let _guard = locks.acquire("shared").await.unwrap();
                let now = inside.fetch_add(1, Ordering::SeqCst) + 1;
                max_seen.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(2)).await;
                inside.fetch_sub(1, Ordering::SeqCst);
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(max_seen.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_entries_pruned_after_release() {
        let locks = NamedLocks::new();
        {
            let _guard = locks.acquire("temporary").await.unwrap();
            assert_eq!(locks.active_locks(), 1);
        }
        assert_eq!(locks.active_locks(), 0);
    }
}
