//! Settlement engine integration tests.
//!
//! Every test drives a full [`bounty_settlement::SettlementEngine`] over
//! in-memory stores with scripted verification and payment collaborators.

#![allow(clippy::unwrap_used, clippy::expect_used, dead_code)]

mod harness;
mod payout_tests;
mod registry_tests;
