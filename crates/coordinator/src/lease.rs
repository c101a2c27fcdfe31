// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Lease table with expiry-based reclaim
//!
//! A lease lasts until its deadline. Expired leases are swept by the next
//! acquire and reported, since they mean a holder crashed or stalled past
//! its TTL.

use ds_core::{Clock, LockKey, TransactionId};
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use crate::coordinator::AcquireOutcome;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Lease {
    pub holder: TransactionId,
    pub deadline: Instant,
}

/// Exclusive leases keyed by [`LockKey`]
#[derive(Debug)]
pub struct LeaseTable<C: Clock> {
    clock: C,
    leases: HashMap<LockKey, Lease>,
}

impl<C: Clock> LeaseTable<C> {
    pub fn new(clock: C) -> Self {
        Self {
            clock,
            leases: HashMap::new(),
        }
    }

    /// All-or-nothing acquire; renews keys `holder` already has
    pub fn acquire(
        &mut self,
        keys: &[LockKey],
        holder: &TransactionId,
        ttl: Duration,
    ) -> AcquireOutcome {
        self.reclaim_expired(holder);

        for key in keys {
            let conflict = self
                .leases
                .iter()
                .find(|(held, lease)| &lease.holder != holder && held.overlaps(key));
            if let Some((held, lease)) = conflict {
                debug!(%key, held = %held, holder = %lease.holder, "lock busy");
                return AcquireOutcome::Busy {
                    key: held.clone(),
                    holder: lease.holder.clone(),
                };
            }
        }

        let deadline = self.clock.deadline(ttl);
        for key in keys {
            self.leases.insert(
                key.clone(),
                Lease {
                    holder: holder.clone(),
                    deadline,
                },
            );
        }
        AcquireOutcome::Acquired
    }

    /// Release the keys `holder` owns; returns how many were dropped
    pub fn release(&mut self, keys: &[LockKey], holder: &TransactionId) -> usize {
        let mut released = 0;
        for key in keys {
            match self.leases.get(key) {
                Some(lease) if &lease.holder == holder => {
                    if self.clock.is_past(lease.deadline) {
                        warn!(%key, %holder, "released a lease after it expired");
                    }
                    self.leases.remove(key);
                    released += 1;
                }
                Some(lease) => {
                    warn!(
                        %key,
                        %holder,
                        current = %lease.holder,
                        "lease was reclaimed by another holder before release"
                    );
                }
                None => {}
            }
        }
        released
    }

    /// Current unexpired holder of exactly `key`
    pub fn holder(&self, key: &LockKey) -> Option<&TransactionId> {
        self.leases
            .get(key)
            .filter(|lease| !self.clock.is_past(lease.deadline))
            .map(|lease| &lease.holder)
    }

    pub fn len(&self) -> usize {
        self.leases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.leases.is_empty()
    }

    fn reclaim_expired(&mut self, acquirer: &TransactionId) {
        let clock = &self.clock;
        self.leases.retain(|key, lease| {
            if !clock.is_past(lease.deadline) {
                return true;
            }
            if &lease.holder != acquirer {
                warn!(
                    %key,
                    previous = %lease.holder,
                    acquirer = %acquirer,
                    "reclaimed expired lease"
                );
            }
            false
        });
    }
}

#[cfg(test)]
#[path = "lease_tests.rs"]
mod tests;
