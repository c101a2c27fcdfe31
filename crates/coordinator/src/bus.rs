// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fan-out of change notifications to subscribers

use ds_core::Notification;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use tokio::sync::mpsc;

use crate::coordinator::NotificationStream;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriberId(pub u64);

type NotificationSender = mpsc::UnboundedSender<Notification>;

/// Routes every published notification to every live subscriber
#[derive(Clone, Default)]
pub struct NotificationBus {
    subscribers: Arc<RwLock<HashMap<SubscriberId, NotificationSender>>>,
    next_id: Arc<AtomicU64>,
}

impl NotificationBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self) -> (SubscriberId, NotificationStream) {
        let (tx, rx) = mpsc::unbounded_channel();
        let id = SubscriberId(self.next_id.fetch_add(1, Ordering::Relaxed));

        let mut subs = self.subscribers.write().unwrap_or_else(|e| e.into_inner());
        subs.insert(id, tx);

        (id, rx)
    }

    pub fn unsubscribe(&self, id: SubscriberId) {
        let mut subs = self.subscribers.write().unwrap_or_else(|e| e.into_inner());
        subs.remove(&id);
    }

    /// Send to every subscriber, dropping those whose receiver is gone;
    /// returns how many received it
    pub fn publish(&self, notification: &Notification) -> usize {
        let mut closed = Vec::new();
        let mut delivered = 0;
        {
            let subs = self.subscribers.read().unwrap_or_else(|e| e.into_inner());
            for (id, tx) in subs.iter() {
                if tx.send(notification.clone()).is_ok() {
                    delivered += 1;
                } else {
                    closed.push(*id);
                }
            }
        }
        if !closed.is_empty() {
            let mut subs = self.subscribers.write().unwrap_or_else(|e| e.into_inner());
            for id in closed {
                subs.remove(&id);
            }
        }
        delivered
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .len()
    }
}

#[cfg(test)]
#[path = "bus_tests.rs"]
mod tests;
