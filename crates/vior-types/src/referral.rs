//! Referral graph records and derived views.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::{Timestamp, UnknownVariant, WalletAddress};

/// Lifecycle state of a referral edge. Edges are written already confirmed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeStatus {
    Pending,
    Confirmed,
    Reversed,
}

impl EdgeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EdgeStatus::Pending => "pending",
            EdgeStatus::Confirmed => "confirmed",
            EdgeStatus::Reversed => "reversed",
        }
    }
}

impl fmt::Display for EdgeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EdgeStatus {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(EdgeStatus::Pending),
            "confirmed" => Ok(EdgeStatus::Confirmed),
            "reversed" => Ok(EdgeStatus::Reversed),
            other => Err(UnknownVariant {
                kind: "edge status",
                value: other.to_string(),
            }),
        }
    }
}

/// A confirmed referrer -> referred relationship.
///
/// At most one edge exists per `referred_wallet`, and the two wallets differ.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferralEdge {
    pub referrer_wallet: WalletAddress,
    pub referred_wallet: WalletAddress,
    pub status: EdgeStatus,
    /// Points granted to the referrer when the edge was written.
    pub points_awarded: u64,
    pub created_at: Timestamp,
}

/// Result of attempting to record a referral.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReferralOutcome {
    /// A new edge was written and the referrer credited.
    Confirmed,
    /// The referred wallet already has an edge, from any referrer.
    AlreadyReferred,
    /// The referred wallet owns the referrer code.
    SelfReferral,
    /// No user holds the presented code.
    UnknownReferrerCode,
}

impl ReferralOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReferralOutcome::Confirmed => "confirmed",
            ReferralOutcome::AlreadyReferred => "already_referred",
            ReferralOutcome::SelfReferral => "self_referral",
            ReferralOutcome::UnknownReferrerCode => "unknown_referrer_code",
        }
    }
}

/// Public statistics for one referral code.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferralStats {
    pub referral_code: String,
    pub points_balance: u64,
    pub referral_count: u64,
}

/// One ranked row of the leaderboard. Ranks start at 1.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaderboardEntry {
    pub rank: u32,
    pub referral_code: String,
    pub points_balance: u64,
    pub referral_count: u64,
}
