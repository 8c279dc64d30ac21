//! Treasury-wide daily payout cap.
//!
//! Tokens paid out are totalled per UTC calendar day. In-flight settlements
//! hold their amount through a [`DailyReservation`] so concurrent payouts
//! cannot overshoot the cap together. The total lives only as long as the
//! process.

use chrono::{NaiveDate, Utc};
use parking_lot::Mutex;
use tracing::{debug, info};

/// Default cap on tokens paid out per day.
pub const DEFAULT_DAILY_BOUNTY_CAP: u64 = 10_000;

#[derive(Debug)]
struct DayTotal {
    day: NaiveDate,
    reserved: u64,
}

impl DayTotal {
    fn roll_over(&mut self, today: NaiveDate) {
        if today > self.day {
            info!(previous = %self.day, paid = self.reserved, "Daily bounty total reset");
            self.day = today;
            self.reserved = 0;
        }
    }
}

/// Running total of tokens paid out today.
#[derive(Debug)]
pub struct DailyBountyCap {
    cap: u64,
    state: Mutex<DayTotal>,
}

impl DailyBountyCap {
    /// Create a tracker allowing `cap` tokens per UTC day.
    #[must_use]
    pub fn new(cap: u64) -> Self {
        Self {
            cap,
            state: Mutex::new(DayTotal {
                day: Utc::now().date_naive(),
                reserved: 0,
            }),
        }
    }

    /// Configured cap.
    #[must_use]
    pub fn cap(&self) -> u64 {
        self.cap
    }

    /// Tokens still available today.
    #[must_use]
    pub fn remaining(&self) -> u64 {
        self.remaining_on(Utc::now().date_naive())
    }

    /// Claim up to `requested` tokens from today's allowance.
    ///
    /// The reservation holds `min(requested, remaining)`; `None` means the
    /// cap is used up. Dropping the reservation without confirming returns
    /// the amount.
    pub fn try_reserve(&self, requested: u64) -> Option<DailyReservation<'_>> {
        self.try_reserve_on(Utc::now().date_naive(), requested)
    }

    fn try_reserve_on(&self, today: NaiveDate, requested: u64) -> Option<DailyReservation<'_>> {
        let mut state = self.state.lock();
        state.roll_over(today);

        let available = self.cap.saturating_sub(state.reserved);
        let amount = requested.min(available);
        if amount == 0 {
            debug!(cap = self.cap, reserved = state.reserved, "Daily bounty cap reached");
            return None;
        }
        state.reserved += amount;

        Some(DailyReservation {
            tracker: self,
            day: today,
            amount,
            confirmed: false,
        })
    }

    fn remaining_on(&self, today: NaiveDate) -> u64 {
        let mut state = self.state.lock();
        state.roll_over(today);
        self.cap.saturating_sub(state.reserved)
    }

    fn release(&self, day: NaiveDate, amount: u64) {
        let mut state = self.state.lock();
        // A reservation from before the reset no longer counts
        if state.day == day {
            state.reserved = state.reserved.saturating_sub(amount);
        }
    }
}

impl Default for DailyBountyCap {
    fn default() -> Self {
        Self::new(DEFAULT_DAILY_BOUNTY_CAP)
    }
}

/// Part of today's allowance held by an in-flight settlement.
#[derive(Debug)]
#[must_use = "dropping the reservation returns the amount"]
pub struct DailyReservation<'a> {
    tracker: &'a DailyBountyCap,
    day: NaiveDate,
    amount: u64,
    confirmed: bool,
}

impl DailyReservation<'_> {
    /// Amount granted, possibly less than requested.
    #[must_use]
    pub fn amount(&self) -> u64 {
        self.amount
    }

    /// Keep the amount: the settlement committed.
    pub fn confirm(mut self) {
        self.confirmed = true;
    }
}

impl Drop for DailyReservation<'_> {
    fn drop(&mut self) {
        if !self.confirmed {
            self.tracker.release(self.day, self.amount);
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2100, 3, d).unwrap()
    }

    #[test]
    fn test_reduces_to_remaining_then_refuses() {
        let cap = DailyBountyCap::new(600);
        cap.try_reserve_on(day(1), 500).unwrap().confirm();

        let partial = cap.try_reserve_on(day(1), 250).unwrap();
        assert_eq!(partial.amount(), 100);
        partial.confirm();

        assert!(cap.try_reserve_on(day(1), 100).is_none());
        assert_eq!(cap.remaining_on(day(1)), 0);
    }

    #[test]
    fn test_unconfirmed_reservation_is_returned() {
        let cap = DailyBountyCap::new(500);
        {
            let held = cap.try_reserve_on(day(1), 500).unwrap();
            assert!(cap.try_reserve_on(day(1), 100).is_none());
            assert_eq!(held.amount(), 500);
        }
        assert_eq!(cap.remaining_on(day(1)), 500);
    }

    #[test]
    fn test_total_resets_on_a_new_day() {
        let cap = DailyBountyCap::new(500);
        let stale = cap.try_reserve_on(day(1), 500).unwrap();
        assert!(cap.try_reserve_on(day(1), 1).is_none());

        let fresh = cap.try_reserve_on(day(2), 400).unwrap();
        assert_eq!(fresh.amount(), 400);
        fresh.confirm();

        // Releasing yesterday's hold leaves today's total alone
        drop(stale);
        assert_eq!(cap.remaining_on(day(2)), 100);
    }

    #[test]
    fn test_zero_request_is_refused() {
        let cap = DailyBountyCap::default();
        assert_eq!(cap.cap(), DEFAULT_DAILY_BOUNTY_CAP);
        assert!(cap.try_reserve(0).is_none());
        assert_eq!(cap.remaining(), DEFAULT_DAILY_BOUNTY_CAP);
    }
}
