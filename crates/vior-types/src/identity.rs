//! Identity records.

use serde::{Deserialize, Serialize};

use crate::{Timestamp, WalletAddress};

/// One participant, keyed by normalized wallet address.
///
/// `referral_code` is assigned once at creation and never changes.
/// `points_balance` and `referral_count` only move through the ledger.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub wallet_address: WalletAddress,
    pub referral_code: String,
    pub points_balance: u64,
    pub referral_count: u64,
    pub created_at: Timestamp,
}
