//! Treasury solvency check ahead of a transfer.

use crate::error::Result;
use crate::payout::network::PaymentNetwork;
use crate::payout::retry::with_timeout;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Outcome of a balance check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BalanceDecision {
    /// The treasury holds at least the required amount.
    Sufficient {
        /// Reported balance.
        balance: u64,
    },
    /// The treasury cannot cover the payout.
    Insufficient {
        /// Reported balance.
        balance: u64,
        /// Amount that was needed.
        required: u64,
    },
    /// The query failed and the guard is configured to fail open.
    AssumedSufficient,
}

impl BalanceDecision {
    /// Whether settlement may proceed.
    #[must_use]
    pub fn can_proceed(&self) -> bool {
        !matches!(self, Self::Insufficient { .. })
    }
}

/// Queries treasury solvency before committing to a transfer.
pub struct BalanceGuard {
    network: Arc<dyn PaymentNetwork>,
    treasury_wallet: String,
    timeout: Duration,
    fail_open: bool,
}

impl BalanceGuard {
    /// Create a guard for `treasury_wallet`.
    ///
    /// With `fail_open` set, a failed or timed-out query lets the payout
    /// proceed; otherwise the error is returned to the caller.
    #[must_use]
    pub fn new(
        network: Arc<dyn PaymentNetwork>,
        treasury_wallet: String,
        timeout: Duration,
        fail_open: bool,
    ) -> Self {
        Self {
            network,
            treasury_wallet,
            timeout,
            fail_open,
        }
    }

    /// Check that the treasury can pay `required`.
    ///
    /// # Errors
    ///
    /// Returns the query error when the guard fails closed.
    pub async fn check(&self, required: u64) -> Result<BalanceDecision> {
        let query = self.network.balance(&self.treasury_wallet);
        match with_timeout("balance_query", self.timeout, query).await {
            Ok(balance) if balance >= required => {
                debug!(balance, required, "Treasury balance sufficient");
                Ok(BalanceDecision::Sufficient { balance })
            }
            Ok(balance) => {
                warn!(balance, required, "Treasury balance insufficient");
                Ok(BalanceDecision::Insufficient { balance, required })
            }
            Err(e) if self.fail_open => {
                warn!("Balance query failed, assuming sufficient funds: {e}");
                Ok(BalanceDecision::AssumedSufficient)
            }
            Err(e) => {
                warn!("Balance query failed: {e}");
                Err(e)
            }
        }
    }

    /// Whether query failures are treated as sufficient funds.
    #[must_use]
    pub fn fails_open(&self) -> bool {
        self.fail_open
    }
}
