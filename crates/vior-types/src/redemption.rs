//! Redemption records handed to the fulfillment side.

use serde::{Deserialize, Serialize};

use crate::{Timestamp, WalletAddress};

/// A point-to-reward conversion that has been debited but not necessarily
/// fulfilled yet.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Redemption {
    /// 128-bit random id, hex encoded.
    pub id: String,
    pub wallet_address: WalletAddress,
    pub option_id: String,
    pub points: u64,
    /// Balance immediately after the debit.
    pub balance_after: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub idempotency_key: Option<String>,
    pub created_at: Timestamp,
    pub fulfilled_at: Option<Timestamp>,
}

/// What `redeem` returns to the caller.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RedemptionReceipt {
    pub redemption_id: String,
    pub remaining_balance: u64,
    /// True when an idempotency key matched an earlier redemption and
    /// nothing was debited this time.
    pub replayed: bool,
}

/// An entry in the reward catalog.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RedemptionOption {
    pub id: String,
    pub name: String,
    /// Price of the option, or the floor when `custom_amount` is set.
    pub points_required: u64,
    /// Any amount at or above `points_required` is accepted. Otherwise the
    /// amount must equal the price.
    pub custom_amount: bool,
}
