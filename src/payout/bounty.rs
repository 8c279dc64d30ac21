//! Risk score to reward tier mapping.

use serde::{Deserialize, Serialize};

/// Reward tiers by risk score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BountyTier {
    /// Risk score 100 and above.
    Critical,
    /// Risk score 96 to 99.
    High,
    /// Risk score 90 to 95.
    Medium,
    /// Below 90: not eligible for a reward.
    Ineligible,
}

impl BountyTier {
    /// Classify a risk score.
    #[must_use]
    pub const fn from_risk_score(risk_score: u32) -> Self {
        match risk_score {
            100..=u32::MAX => Self::Critical,
            96..=99 => Self::High,
            90..=95 => Self::Medium,
            _ => Self::Ineligible,
        }
    }

    /// Reward paid for this tier, in token units.
    #[must_use]
    pub const fn amount(self) -> u64 {
        match self {
            Self::Critical => 500,
            Self::High => 250,
            Self::Medium => 100,
            Self::Ineligible => 0,
        }
    }
}

/// Reward for a risk score. Zero means "not eligible", never a tiny reward.
#[must_use]
pub const fn calculate_bounty(risk_score: u32) -> u64 {
    BountyTier::from_risk_score(risk_score).amount()
}
