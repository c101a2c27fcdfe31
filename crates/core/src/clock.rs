// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Monotonic time source for lease expiry
//!
//! Lock leases are stamped with deadlines from a [`Clock`] so that tests can
//! expire them without sleeping.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// A monotonic clock
pub trait Clock: Clone + Send + Sync + 'static {
    fn now(&self) -> Instant;

    /// Instant `ttl` from now
    fn deadline(&self, ttl: Duration) -> Instant {
        self.now() + ttl
    }

    /// True once `deadline` has been reached
    fn is_past(&self, deadline: Instant) -> bool {
        self.now() >= deadline
    }
}

/// Wall-clock-backed monotonic clock
#[derive(Clone, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Manually advanced clock, shared between clones
#[derive(Clone, Debug)]
pub struct FakeClock {
    current: Arc<Mutex<Instant>>,
}

impl FakeClock {
    pub fn new() -> Self {
        Self {
            current: Arc::new(Mutex::new(Instant::now())),
        }
    }

    /// Move time forward
    pub fn advance(&self, duration: Duration) {
        let mut current = self.current.lock().unwrap_or_else(|e| e.into_inner());
        *current += duration;
    }
}

impl Default for FakeClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for FakeClock {
    fn now(&self) -> Instant {
        *self.current.lock().unwrap_or_else(|e| e.into_inner())
    }
}
