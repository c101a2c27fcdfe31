// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Scoped ownership of a transaction's coordinator leases

use crate::error::WriteError;
use ds_coordinator::{AcquireOutcome, Coordinator};
use ds_core::{LockKey, TransactionId};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Leases held for one transaction
///
/// Call [`LockGuard::release`] on every path. If the guard is dropped
/// instead, for example because the request future was cancelled, release
/// is spawned onto the runtime and the lease TTL covers the rest.
pub struct LockGuard<C: Coordinator> {
    coordinator: Arc<C>,
    keys: Vec<LockKey>,
    holder: TransactionId,
    released: bool,
}

impl<C: Coordinator> LockGuard<C> {
    /// Lease every key or fail without holding any
    pub async fn acquire(
        coordinator: Arc<C>,
        keys: Vec<LockKey>,
        holder: TransactionId,
        ttl: Duration,
        timeout: Duration,
    ) -> Result<Self, WriteError> {
        let attempt = tokio::time::timeout(timeout, coordinator.acquire(&keys, &holder, ttl)).await;
        let guard = Self {
            coordinator,
            keys,
            holder,
            released: false,
        };
        match attempt {
            Ok(Ok(AcquireOutcome::Acquired)) => {
                debug!(holder = %guard.holder, keys = guard.keys.len(), "locks acquired");
                Ok(guard)
            }
            Ok(Ok(AcquireOutcome::Busy { key, holder })) => {
                // Nothing was granted; no release needed.
                let mut guard = guard;
                guard.released = true;
                Err(WriteError::LockConflict { key, holder })
            }
            Ok(Err(e)) => {
                guard.release().await;
                Err(WriteError::CoordinatorUnavailable(e))
            }
            Err(_) => {
                // The coordinator may have granted the leases after we gave up.
                guard.release().await;
                Err(WriteError::LockTimeout)
            }
        }
    }

    pub fn keys(&self) -> &[LockKey] {
        &self.keys
    }

    pub fn holder(&self) -> &TransactionId {
        &self.holder
    }

    /// Release every lease; failures are logged, leases then expire
    pub async fn release(mut self) {
        self.released = true;
        if let Err(e) = self.coordinator.release(&self.keys, &self.holder).await {
            warn!(holder = %self.holder, "failed to release locks: {}", e);
        }
    }
}

impl<C: Coordinator> Drop for LockGuard<C> {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        let coordinator = Arc::clone(&self.coordinator);
        let keys = std::mem::take(&mut self.keys);
        let holder = self.holder.clone();
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                debug!(%holder, "releasing locks of an abandoned transaction");
                handle.spawn(async move {
                    if let Err(e) = coordinator.release(&keys, &holder).await {
                        warn!(%holder, "failed to release locks: {}", e);
                    }
                });
            }
            Err(_) => warn!(%holder, "no runtime to release locks, leaving them to expire"),
        }
    }
}

#[cfg(test)]
#[path = "guard_tests.rs"]
mod tests;
