//! # vior-referral
//!
//! The referral rewards ledger: issues referral codes, records each
//! referred wallet at most once, and moves points only through atomic
//! ledger operations.
//!
//! Every operation takes the store handle (`rusqlite::Connection`) from
//! its caller. Mutating operations run inside a single `BEGIN IMMEDIATE`
//! transaction and touch rows in a fixed order: identity, then referral
//! edge, then ledger. Exactly-once guarantees come from the schema's
//! unique keys, never from a read followed by a conditional write.
//!
//! ## Modules
//!
//! - [`identity`]: wallet -> referral code, created once
//! - [`graph`]: referral edges and the referrer bonus
//! - [`ledger`]: credit/debit with an append-only audit trail
//! - [`redemption`]: point-to-reward conversions
//! - [`query`]: stats and the cached leaderboard
//! - [`policy`]: bonus amounts, redemption floor, reward catalog
//! - [`code`]: referral code generation

pub mod code;
pub mod graph;
pub mod identity;
pub mod ledger;
pub mod policy;
pub mod query;
pub mod redemption;

use vior_db::DbError;

pub use code::{CodeGenerator, RandomCodes};
pub use policy::RewardPolicy;

/// Shortest wallet address accepted.
pub const MIN_WALLET_LEN: usize = 32;

/// Longest wallet address accepted.
pub const MAX_WALLET_LEN: usize = 64;

/// Error types for referral and ledger operations.
#[derive(Debug, thiserror::Error)]
pub enum ReferralError {
    /// Unknown wallet or code in a lookup.
    #[error("not found: {0}")]
    NotFound(String),

    /// The wallet has no identity record.
    #[error("user not found: {0}")]
    UserNotFound(String),

    /// The wallet address is malformed.
    #[error("invalid wallet address: {0:?}")]
    InvalidWallet(String),

    /// Ledger amounts must be positive and fit the store's integer type.
    #[error("invalid amount: {0}")]
    InvalidAmount(u64),

    /// A debit exceeded the balance.
    #[error("insufficient balance: required {required}, available {available}")]
    InsufficientBalance {
        /// Amount asked for.
        required: u64,
        /// Balance at the time of the attempt.
        available: u64,
    },

    /// A redemption exceeded the balance.
    #[error("insufficient points: requested {requested}, available {available}, short by {shortfall}")]
    InsufficientPoints {
        /// Points the caller tried to redeem.
        requested: u64,
        /// Balance at the time of the attempt.
        available: u64,
        /// `requested - available`.
        shortfall: u64,
    },

    /// Redemption below the configured floor.
    #[error("redemption of {amount} points is below the minimum of {minimum}")]
    BelowMinimumRedemption {
        /// Points requested.
        amount: u64,
        /// The floor.
        minimum: u64,
    },

    /// The option id is not in the catalog.
    #[error("unknown redemption option: {0}")]
    UnknownRedemptionOption(String),

    /// The amount does not match what the option costs.
    #[error("option {option} costs {price} points, got {amount}")]
    OptionPriceMismatch {
        /// Option id.
        option: String,
        /// Price or floor of the option.
        price: u64,
        /// Points requested.
        amount: u64,
    },

    /// An idempotency key was reused for a different redemption.
    #[error("idempotency key {0:?} already used for a different redemption")]
    IdempotencyConflict(String),

    /// Idempotency keys are 1..=128 printable ASCII characters.
    #[error("invalid idempotency key")]
    InvalidIdempotencyKey,

    /// No redemption with this id.
    #[error("redemption not found: {0}")]
    RedemptionNotFound(String),

    /// Every generated referral code collided with an existing one.
    #[error("referral code generation exhausted after {attempts} attempts")]
    CodeGenerationExhausted {
        /// Attempts made.
        attempts: u32,
    },

    /// The reward policy is unusable.
    #[error("invalid reward policy: {0}")]
    InvalidPolicy(String),

    /// Transient store failure (lock timeout). Safe to retry.
    #[error("store unavailable: {0}")]
    StoreUnavailable(String),

    /// Non-transient store failure.
    #[error("store error: {0}")]
    Store(DbError),
}

impl ReferralError {
    /// Only [`ReferralError::StoreUnavailable`] may be retried by the caller.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ReferralError::StoreUnavailable(_))
    }
}

impl From<DbError> for ReferralError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound(what) => ReferralError::NotFound(what),
            other if other.is_transient() => ReferralError::StoreUnavailable(other.to_string()),
            other => ReferralError::Store(other),
        }
    }
}

impl From<rusqlite::Error> for ReferralError {
    fn from(err: rusqlite::Error) -> Self {
        DbError::from(err).into()
    }
}

/// Convenience result type for referral operations.
pub type Result<T> = std::result::Result<T, ReferralError>;

/// Trim, validate and lower-case a wallet address.
pub fn normalize_wallet(wallet: &str) -> Result<String> {
    let trimmed = wallet.trim();
    let valid = (MIN_WALLET_LEN..=MAX_WALLET_LEN).contains(&trimmed.len())
        && trimmed.bytes().all(|b| b.is_ascii_alphanumeric());
    if !valid {
        return Err(ReferralError::InvalidWallet(wallet.to_string()));
    }
    Ok(trimmed.to_ascii_lowercase())
}

/// Trim and upper-case a referral code.
///
/// Returns `None` for text that can never be a code, so lookups can
/// short-circuit.
pub fn normalize_code(code: &str) -> Option<String> {
    let trimmed = code.trim();
    if trimmed.is_empty() || !trimmed.bytes().all(|b| b.is_ascii_alphanumeric()) {
        return None;
    }
    Some(trimmed.to_ascii_uppercase())
}

/// Current Unix time in seconds.
pub fn unix_now() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

/// Ledger amounts are stored as SQLite integers.
pub(crate) fn checked_amount(amount: u64) -> Result<i64> {
    match i64::try_from(amount) {
        Ok(value) if value > 0 => Ok(value),
        _ => Err(ReferralError::InvalidAmount(amount)),
    }
}

#[cfg(test)]
pub(crate) mod testutil {
    use rusqlite::Connection;

    use crate::CodeGenerator;

    pub const NOW: u64 = 1_700_000_000;

    pub fn test_db() -> Connection {
        vior_db::open_memory().expect("open test db")
    }

    /// A 44-character wallet address unique to `n`.
    pub fn wallet(n: u32) -> String {
        format!("Wa11et{n:0>38}")
    }

    /// Hands out a fixed list of codes, then repeats the last one.
    pub struct ScriptedCodes(pub Vec<&'static str>);

    impl CodeGenerator for ScriptedCodes {
        fn next_code(&mut self) -> String {
            if self.0.len() > 1 {
                self.0.remove(0).to_string()
            } else {
                self.0.first().copied().unwrap_or("FALLBACK").to_string()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_wallet() {
        let raw = "  7xKXtg2CW87d97TXJSDpbD5jBkheTqA83TZRuJosgAsU ";
        let wallet = normalize_wallet(raw).expect("valid");
        assert_eq!(wallet, "7xkxtg2cw87d97txjsdpbd5jbkhetqa83tzrujosgasu");
        assert_eq!(normalize_wallet(&wallet.to_uppercase()).expect("valid"), wallet);
    }

    #[test]
    fn test_normalize_wallet_rejects_malformed() {
        let too_long = "a".repeat(MAX_WALLET_LEN + 1);
        for bad in ["", "short", "0x-not-alphanumeric-but-long-enough-000000", too_long.as_str()] {
            assert!(
                matches!(normalize_wallet(bad), Err(ReferralError::InvalidWallet(_))),
                "{bad:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_normalize_code() {
        assert_eq!(normalize_code(" abc123 "), Some("ABC123".to_string()));
        assert_eq!(normalize_code(""), None);
        assert_eq!(normalize_code("AB-12"), None);
    }

    #[test]
    fn test_checked_amount() {
        assert_eq!(checked_amount(5).expect("ok"), 5);
        assert!(matches!(checked_amount(0), Err(ReferralError::InvalidAmount(0))));
        assert!(checked_amount(u64::MAX).is_err());
    }

    #[test]
    fn test_error_classification() {
        let busy: ReferralError = DbError::Busy("locked".into()).into();
        assert!(busy.is_retryable());

        let missing: ReferralError = DbError::NotFound("x".into()).into();
        assert!(matches!(missing, ReferralError::NotFound(_)));
        assert!(!missing.is_retryable());

        let constraint: ReferralError = DbError::Constraint("c".into()).into();
        assert!(matches!(constraint, ReferralError::Store(_)));
    }
}
