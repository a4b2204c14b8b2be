//! services/api/src/adapters/rate_counters.rs
//!
//! In-memory implementation of the `RateCounterStore` port. Counters live for
//! the lifetime of the process only; a multi-process deployment needs a shared
//! store behind the same port.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::Mutex;
use unimate_core::ports::{RateCounterStore, RateDecision};

/// Fixed-window counters keyed by an opaque string. A window resets entirely
/// at its boundary, which admits up to 2x the max across a boundary straddle;
/// that approximation is part of the contract, not something to correct here.
pub struct InMemoryCounterStore {
    windows: Mutex<HashMap<String, Window>>,
}

struct Window {
    started_at: DateTime<Utc>,
    count: u32,
}

impl InMemoryCounterStore {
    pub fn new() -> Self {
        Self {
            windows: Mutex::new(HashMap::new()),
        }
    }

    /// Internal: increment with an explicit clock (for testing).
    fn increment_at(
        &self,
        key: &str,
        window: Duration,
        max: u32,
        now: DateTime<Utc>,
    ) -> RateDecision {
        let mut windows = self
            .windows
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);

        let entry = windows.entry(key.to_string()).or_insert(Window {
            started_at: now,
            count: 0,
        });
        if now - entry.started_at >= window {
            entry.started_at = now;
            entry.count = 0;
        }
        entry.count += 1;

        RateDecision {
            allowed: entry.count <= max,
            remaining: max.saturating_sub(entry.count),
            reset_at: entry.started_at + window,
        }
    }
}

impl Default for InMemoryCounterStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RateCounterStore for InMemoryCounterStore {
    async fn increment(&self, key: &str, window: Duration, max: u32) -> RateDecision {
        self.increment_at(key, window, max, Utc::now())
    }
}
