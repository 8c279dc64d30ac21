//! Per-auditor sliding-window rate limiter.
//!
//! Each auditor has a window of settlement slots. A check counts the slots
//! newer than `now - window`; older ones are pruned on the way. A slot is
//! either committed or held by an in-flight settlement through a
//! [`RateReservation`]. Windows live only as long as the process.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

/// Default number of settlements per auditor per window.
pub const DEFAULT_MAX_PER_WINDOW: u32 = 10;

/// Default window length (one hour).
pub const DEFAULT_WINDOW: Duration = Duration::from_secs(3600);

#[derive(Debug, Clone, Copy)]
struct Slot {
    id: u64,
    at: Instant,
}

/// Sliding-window counter keyed by auditor id.
#[derive(Debug)]
pub struct RateLimiter {
    max_per_window: u32,
    window: Duration,
    attempts: Mutex<HashMap<String, Vec<Slot>>>,
    next_slot: AtomicU64,
}

impl RateLimiter {
    /// Create a limiter allowing `max_per_window` settlements per hour.
    #[must_use]
    pub fn new(max_per_window: u32) -> Self {
        Self::with_window(max_per_window, DEFAULT_WINDOW)
    }

    /// Create a limiter with a custom window length.
    #[must_use]
    pub fn with_window(max_per_window: u32, window: Duration) -> Self {
        Self {
            max_per_window,
            window,
            attempts: Mutex::new(HashMap::new()),
            next_slot: AtomicU64::new(0),
        }
    }

    /// Returns `true` if the auditor may settle another payout now.
    ///
    /// Read-only: slots held by in-flight settlements count as used.
    pub fn check_rate_limit(&self, auditor_id: &str) -> bool {
        let count = self.current_count(auditor_id);
        let allowed = count < self.max_per_window as usize;
        if !allowed {
            debug!(auditor_id, count, "Rate limit reached");
        }
        allowed
    }

    /// Check the limit and claim a slot under one lock.
    ///
    /// Returns `None` when the window is full. The slot is released when the
    /// reservation is dropped unless [`RateReservation::confirm`] was called,
    /// so settlements that stop before committing never count.
    pub fn try_reserve(&self, auditor_id: &str) -> Option<RateReservation<'_>> {
        let now = Instant::now();
        let mut attempts = self.attempts.lock();
        let window = attempts.entry(auditor_id.to_string()).or_default();
        self.prune(window, now);

        if window.len() >= self.max_per_window as usize {
            debug!(auditor_id, count = window.len(), "Rate limit reached");
            if window.is_empty() {
                attempts.remove(auditor_id);
            }
            return None;
        }

        let id = self.next_slot.fetch_add(1, Ordering::Relaxed);
        window.push(Slot { id, at: now });
        Some(RateReservation {
            limiter: self,
            auditor_id: auditor_id.to_string(),
            slot: id,
            confirmed: false,
        })
    }

    /// Record a settlement outright.
    pub fn record_attempt(&self, auditor_id: &str) {
        let now = Instant::now();
        let mut attempts = self.attempts.lock();
        let window = attempts.entry(auditor_id.to_string()).or_default();
        self.prune(window, now);
        let id = self.next_slot.fetch_add(1, Ordering::Relaxed);
        window.push(Slot { id, at: now });
    }

    /// Slots counted for the auditor in the current window, in-flight ones
    /// included.
    #[must_use]
    pub fn current_count(&self, auditor_id: &str) -> usize {
        let now = Instant::now();
        let mut attempts = self.attempts.lock();
        let Some(window) = attempts.get_mut(auditor_id) else {
            return 0;
        };
        self.prune(window, now);
        let count = window.len();
        if count == 0 {
            attempts.remove(auditor_id);
        }
        count
    }

    /// Configured per-window maximum.
    #[must_use]
    pub fn max_per_window(&self) -> u32 {
        self.max_per_window
    }

    fn prune(&self, window: &mut Vec<Slot>, now: Instant) {
        window.retain(|slot| now.saturating_duration_since(slot.at) < self.window);
    }

    // The slot restarts its window at commit time
    fn confirm_slot(&self, auditor_id: &str, slot: u64) {
        let now = Instant::now();
        let mut attempts = self.attempts.lock();
        let window = attempts.entry(auditor_id.to_string()).or_default();
        window.retain(|s| s.id != slot);
        window.push(Slot { id: slot, at: now });
    }

    fn release_slot(&self, auditor_id: &str, slot: u64) {
        let mut attempts = self.attempts.lock();
        if let Some(window) = attempts.get_mut(auditor_id) {
            window.retain(|s| s.id != slot);
            if window.is_empty() {
                attempts.remove(auditor_id);
            }
        }
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_PER_WINDOW)
    }
}

/// A rate-limit slot held by an in-flight settlement.
#[derive(Debug)]
#[must_use = "dropping the reservation releases the slot"]
pub struct RateReservation<'a> {
    limiter: &'a RateLimiter,
    auditor_id: String,
    slot: u64,
    confirmed: bool,
}

impl RateReservation<'_> {
    /// Keep the slot: the settlement committed.
    pub fn confirm(mut self) {
        self.limiter.confirm_slot(&self.auditor_id, self.slot);
        self.confirmed = true;
    }
}

impl Drop for RateReservation<'_> {
    fn drop(&mut self) {
        if !self.confirmed {
            debug!(auditor_id = %self.auditor_id, "Releasing rate-limit slot");
            self.limiter.release_slot(&self.auditor_id, self.slot);
        }
    }
}
