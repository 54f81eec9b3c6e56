//! Points ledger audit records.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::{Timestamp, UnknownVariant, WalletAddress};

/// Why a balance changed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PointsReason {
    SignupBonus,
    ReferralBonus,
    Redemption,
    /// Manual compensating entry, e.g. reversing a redemption by hand.
    Adjustment,
}

impl PointsReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            PointsReason::SignupBonus => "signup_bonus",
            PointsReason::ReferralBonus => "referral_bonus",
            PointsReason::Redemption => "redemption",
            PointsReason::Adjustment => "adjustment",
        }
    }
}

impl fmt::Display for PointsReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PointsReason {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "signup_bonus" => Ok(PointsReason::SignupBonus),
            "referral_bonus" => Ok(PointsReason::ReferralBonus),
            "redemption" => Ok(PointsReason::Redemption),
            "adjustment" => Ok(PointsReason::Adjustment),
            other => Err(UnknownVariant {
                kind: "points reason",
                value: other.to_string(),
            }),
        }
    }
}

/// One append-only ledger row. The deltas of a wallet sum to its balance.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PointsTransaction {
    pub id: i64,
    pub user_wallet: WalletAddress,
    pub delta: i64,
    pub reason: PointsReason,
    pub created_at: Timestamp,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reason_round_trip_names() {
        for reason in [
            PointsReason::SignupBonus,
            PointsReason::ReferralBonus,
            PointsReason::Redemption,
            PointsReason::Adjustment,
        ] {
            assert_eq!(reason.as_str().parse::<PointsReason>(), Ok(reason));
        }
    }

    #[test]
    fn test_unknown_reason() {
        let err = "airdrop".parse::<PointsReason>().expect_err("unknown");
        assert_eq!(err.value, "airdrop");
        assert_eq!(err.to_string(), "unknown points reason: airdrop");
    }
}
