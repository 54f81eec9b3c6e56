//! # vior-types
//!
//! Shared domain records for the VIOR referral rewards ledger.
//! These are the shapes the store persists and the daemon returns over
//! JSON-RPC; they carry no behavior beyond string conversions.

pub mod identity;
pub mod ledger;
pub mod redemption;
pub mod referral;

pub use identity::User;
pub use ledger::{PointsReason, PointsTransaction};
pub use redemption::{Redemption, RedemptionOption, RedemptionReceipt};
pub use referral::{EdgeStatus, LeaderboardEntry, ReferralEdge, ReferralOutcome, ReferralStats};

/// A wallet address after trimming and lower-casing.
pub type WalletAddress = String;

/// Unix timestamp in seconds.
pub type Timestamp = u64;

/// A stored enum column held a value this build does not know.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind}: {value}")]
pub struct UnknownVariant {
    /// Which enum was being parsed.
    pub kind: &'static str,
    /// The offending text.
    pub value: String,
}
