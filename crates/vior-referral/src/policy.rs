//! Reward policy: how many points things are worth.
//!
//! Loaded from the `[rewards]` section of the daemon config. Every field
//! has a default so an empty section is valid.

use serde::{Deserialize, Serialize};
use vior_types::RedemptionOption;

use crate::{ReferralError, Result};

/// Points credited to a referrer per confirmed referral.
pub const REFERRAL_BONUS: u64 = 100;

/// Smallest redemption accepted.
pub const MIN_REDEMPTION: u64 = 50;

/// Length of generated referral codes.
pub const DEFAULT_CODE_LENGTH: usize = 8;

/// Insert attempts before giving up on a unique referral code.
pub const DEFAULT_CODE_ATTEMPTS: u32 = 5;

/// Bonus amounts, redemption floor and reward catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewardPolicy {
    /// Credited to the referrer when an edge is confirmed.
    #[serde(default = "default_referral_bonus")]
    pub referral_bonus: u64,
    /// Credited to a new user on creation. 0 disables it.
    #[serde(default)]
    pub signup_bonus: u64,
    /// Floor for every redemption, applied before the catalog price.
    #[serde(default = "default_min_redemption")]
    pub min_redemption: u64,
    /// Characters per generated referral code.
    #[serde(default = "default_code_length")]
    pub code_length: usize,
    /// Collision retries when issuing a code.
    #[serde(default = "default_code_attempts")]
    pub code_attempts: u32,
    /// What points can be redeemed for.
    #[serde(default = "default_catalog")]
    pub options: Vec<RedemptionOption>,
}

fn default_referral_bonus() -> u64 {
    REFERRAL_BONUS
}

fn default_min_redemption() -> u64 {
    MIN_REDEMPTION
}

fn default_code_length() -> usize {
    DEFAULT_CODE_LENGTH
}

fn default_code_attempts() -> u32 {
    DEFAULT_CODE_ATTEMPTS
}

fn option(id: &str, name: &str, points_required: u64, custom_amount: bool) -> RedemptionOption {
    RedemptionOption {
        id: id.to_string(),
        name: name.to_string(),
        points_required,
        custom_amount,
    }
}

/// The standard reward catalog.
pub fn default_catalog() -> Vec<RedemptionOption> {
    vec![
        option("token-discount", "Token Discount", 100, false),
        option("exclusive-nft", "Exclusive NFTs", 500, false),
        option("airdrop-boost", "Airdrop Boost", 250, false),
        option("early-access", "Early Access", 150, false),
        option("referral-bonus", "Referral Bonus", 300, false),
        option("custom-amount", "Custom Redemption", MIN_REDEMPTION, true),
    ]
}

impl Default for RewardPolicy {
    fn default() -> Self {
        Self {
            referral_bonus: REFERRAL_BONUS,
            signup_bonus: 0,
            min_redemption: MIN_REDEMPTION,
            code_length: DEFAULT_CODE_LENGTH,
            code_attempts: DEFAULT_CODE_ATTEMPTS,
            options: default_catalog(),
        }
    }
}

impl RewardPolicy {
    /// Reject configurations the ledger cannot honor.
    ///
    /// A fixed-price option below `min_redemption` could never be
    /// redeemed and is refused. A custom option's floor is the larger of
    /// its own price and `min_redemption`.
    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: String| Err(ReferralError::InvalidPolicy(msg));

        if !(4..=32).contains(&self.code_length) {
            return invalid(format!("code_length {} outside 4..=32", self.code_length));
        }
        if self.code_attempts == 0 {
            return invalid("code_attempts must be at least 1".into());
        }
        if self.min_redemption == 0 {
            return invalid("min_redemption must be positive".into());
        }
        for amount in [self.referral_bonus, self.signup_bonus, self.min_redemption] {
            if i64::try_from(amount).is_err() {
                return invalid(format!("amount {amount} exceeds the ledger range"));
            }
        }
        for (i, opt) in self.options.iter().enumerate() {
            if opt.id.is_empty() {
                return invalid(format!("option #{i} has an empty id"));
            }
            if self.options[..i].iter().any(|o| o.id == opt.id) {
                return invalid(format!("duplicate option id {}", opt.id));
            }
            if !opt.custom_amount && opt.points_required < self.min_redemption {
                return invalid(format!(
                    "option {} costs {} points, below min_redemption {}",
                    opt.id, opt.points_required, self.min_redemption
                ));
            }
        }
        Ok(())
    }

    /// Catalog entry for `id`.
    pub fn option(&self, id: &str) -> Option<&RedemptionOption> {
        self.options.iter().find(|o| o.id == id)
    }

    /// Smallest amount `option` can be redeemed for.
    pub fn floor(&self, option: &RedemptionOption) -> u64 {
        if option.custom_amount {
            option.points_required.max(self.min_redemption)
        } else {
            option.points_required
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_policy_is_valid() {
        let policy = RewardPolicy::default();
        policy.validate().expect("valid");
        assert_eq!(policy.referral_bonus, 100);
        assert_eq!(policy.signup_bonus, 0);
        assert_eq!(policy.min_redemption, 50);
        assert_eq!(policy.option("exclusive-nft").map(|o| o.points_required), Some(500));
        assert!(policy.option("custom-amount").is_some_and(|o| o.custom_amount));
        assert!(policy.option("nope").is_none());
    }

    #[test]
    fn test_empty_section_uses_defaults() {
        let policy: RewardPolicy = serde_json::from_str("{}").expect("parse");
        assert_eq!(policy, RewardPolicy::default());
    }

    #[test]
    fn test_invalid_policies() {
        let mut policy = RewardPolicy {
            code_length: 2,
            ..RewardPolicy::default()
        };
        assert!(policy.validate().is_err());

        policy.code_length = 8;
        policy.code_attempts = 0;
        assert!(policy.validate().is_err());

        policy.code_attempts = 5;
        policy.options.push(option("token-discount", "Again", 100, false));
        assert!(policy.validate().is_err());

        policy.options.pop();
        policy.referral_bonus = u64::MAX;
        assert!(policy.validate().is_err());
    }

    #[test]
    fn test_fixed_option_below_floor_rejected() {
        let mut policy = RewardPolicy {
            min_redemption: 200,
            ..RewardPolicy::default()
        };
        let err = policy.validate().expect_err("token-discount is unredeemable");
        assert!(err.to_string().contains("token-discount"), "{err}");

        policy.options.retain(|o| o.custom_amount || o.points_required >= 200);
        policy.validate().expect("remaining options are redeemable");

        let custom = policy.option("custom-amount").cloned().expect("custom option");
        assert_eq!(custom.points_required, MIN_REDEMPTION);
        assert_eq!(policy.floor(&custom), 200);
        let nft = policy.option("exclusive-nft").cloned().expect("nft");
        assert_eq!(policy.floor(&nft), 500);
    }
}
