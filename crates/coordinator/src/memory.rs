// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-process coordinator

use async_trait::async_trait;
use ds_core::{Clock, LockKey, Notification, SystemClock, TransactionId};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::debug;

use crate::bus::NotificationBus;
use crate::coordinator::{AcquireOutcome, Coordinator, CoordinatorError, NotificationStream};
use crate::lease::LeaseTable;

/// A [`Coordinator`] living inside one process; clones share state
#[derive(Clone)]
pub struct MemoryCoordinator<C: Clock = SystemClock> {
    leases: Arc<Mutex<LeaseTable<C>>>,
    bus: NotificationBus,
}

impl MemoryCoordinator<SystemClock> {
    pub fn new() -> Self {
        Self::with_clock(SystemClock)
    }
}

impl Default for MemoryCoordinator<SystemClock> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Clock> MemoryCoordinator<C> {
    pub fn with_clock(clock: C) -> Self {
        Self {
            leases: Arc::new(Mutex::new(LeaseTable::new(clock))),
            bus: NotificationBus::new(),
        }
    }

    /// Current holder of exactly `key`
    pub fn holder(&self, key: &LockKey) -> Option<TransactionId> {
        let leases = self.leases.lock().unwrap_or_else(|e| e.into_inner());
        leases.holder(key).cloned()
    }

    pub fn lease_count(&self) -> usize {
        self.leases.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn subscriber_count(&self) -> usize {
        self.bus.subscriber_count()
    }
}

#[async_trait]
impl<C: Clock> Coordinator for MemoryCoordinator<C> {
    async fn acquire(
        &self,
        keys: &[LockKey],
        holder: &TransactionId,
        ttl: Duration,
    ) -> Result<AcquireOutcome, CoordinatorError> {
        let mut leases = self.leases.lock().unwrap_or_else(|e| e.into_inner());
        Ok(leases.acquire(keys, holder, ttl))
    }

    async fn release(
        &self,
        keys: &[LockKey],
        holder: &TransactionId,
    ) -> Result<(), CoordinatorError> {
        let mut leases = self.leases.lock().unwrap_or_else(|e| e.into_inner());
        leases.release(keys, holder);
        Ok(())
    }

    async fn publish(&self, notification: Notification) -> Result<(), CoordinatorError> {
        let delivered = self.bus.publish(&notification);
        debug!(
            position = notification.position,
            fields = notification.fields.len(),
            delivered,
            "published"
        );
        Ok(())
    }

    async fn subscribe(&self) -> Result<NotificationStream, CoordinatorError> {
        let (_, rx) = self.bus.subscribe();
        Ok(rx)
    }
}
