//! Redemption processor: converts points into off-ledger rewards.
//!
//! A redemption debits the ledger and writes a redemption record in the
//! same transaction. Fulfillment happens elsewhere; it polls
//! [`pending`] and stamps records with [`mark_fulfilled`].

use rusqlite::Connection;
use tracing::{info, warn};
use vior_db::queries::{redemptions, users};
use vior_db::DbError;
use vior_types::{PointsReason, Redemption, RedemptionReceipt};

use crate::{ledger, normalize_wallet, ReferralError, Result, RewardPolicy};

/// Longest idempotency key accepted.
pub const MAX_IDEMPOTENCY_KEY_LEN: usize = 128;

/// A request to spend points.
#[derive(Debug, Clone, Copy)]
pub struct RedeemRequest<'a> {
    pub wallet: &'a str,
    pub option_id: &'a str,
    pub points: u64,
    /// Client-generated key; a retry with the same key is not debited again.
    pub idempotency_key: Option<&'a str>,
}

/// Redeem points for a catalog option.
///
/// Checks, in order: the redemption floor, the option and its price, the
/// user, then the balance. On success the debit, the audit row and the
/// redemption record commit together.
pub fn redeem(
    conn: &mut Connection,
    request: &RedeemRequest<'_>,
    policy: &RewardPolicy,
    now: u64,
) -> Result<RedemptionReceipt> {
    let wallet = normalize_wallet(request.wallet)?;
    let points = request.points;

    if points < policy.min_redemption {
        return Err(ReferralError::BelowMinimumRedemption {
            amount: points,
            minimum: policy.min_redemption,
        });
    }

    let option = policy
        .option(request.option_id)
        .ok_or_else(|| ReferralError::UnknownRedemptionOption(request.option_id.to_string()))?;
    let price = policy.floor(option);
    let price_ok = if option.custom_amount {
        points >= price
    } else {
        points == price
    };
    if !price_ok {
        return Err(ReferralError::OptionPriceMismatch {
            option: option.id.clone(),
            price,
            amount: points,
        });
    }

    if let Some(key) = request.idempotency_key {
        validate_key(key)?;
    }

    vior_db::with_immediate(conn, |tx| {
        if users::find_by_wallet(tx, &wallet)?.is_none() {
            return Err(ReferralError::UserNotFound(wallet.clone()));
        }

        if let Some(key) = request.idempotency_key {
            if let Some(prior) = redemptions::find_by_key(tx, &wallet, key)? {
                if prior.option_id != option.id || prior.points != points {
                    return Err(ReferralError::IdempotencyConflict(key.to_string()));
                }
                info!(wallet = %wallet, redemption = %prior.id, "redemption replayed");
                return Ok(RedemptionReceipt {
                    redemption_id: prior.id,
                    remaining_balance: prior.balance_after,
                    replayed: true,
                });
            }
        }

        let remaining = ledger::debit_in(tx, &wallet, points, PointsReason::Redemption, now)
            .map_err(|e| match e {
                ReferralError::InsufficientBalance {
                    required,
                    available,
                } => ReferralError::InsufficientPoints {
                    requested: required,
                    available,
                    shortfall: required - available,
                },
                other => other,
            })?;

        let record = Redemption {
            id: hex::encode(rand::random::<[u8; 16]>()),
            wallet_address: wallet.clone(),
            option_id: option.id.clone(),
            points,
            balance_after: remaining,
            idempotency_key: request.idempotency_key.map(str::to_string),
            created_at: now,
            fulfilled_at: None,
        };
        redemptions::insert(tx, &record)?;

        info!(
            wallet = %wallet,
            redemption = %record.id,
            option = %record.option_id,
            points,
            remaining,
            "points redeemed"
        );
        Ok(RedemptionReceipt {
            redemption_id: record.id,
            remaining_balance: remaining,
            replayed: false,
        })
    })
}

fn validate_key(key: &str) -> Result<()> {
    let ok = !key.is_empty()
        && key.len() <= MAX_IDEMPOTENCY_KEY_LEN
        && key.bytes().all(|b| b.is_ascii_graphic());
    if ok {
        Ok(())
    } else {
        Err(ReferralError::InvalidIdempotencyKey)
    }
}

/// Unfulfilled redemptions, oldest first.
pub fn pending(conn: &Connection, limit: u32) -> Result<Vec<Redemption>> {
    Ok(redemptions::pending(conn, limit)?)
}

/// Stamp a redemption as fulfilled. Stamping twice keeps the first time.
pub fn mark_fulfilled(conn: &Connection, id: &str, now: u64) -> Result<Redemption> {
    redemptions::mark_fulfilled(conn, id, now).map_err(|e| match e {
        DbError::NotFound(_) => {
            warn!(redemption = %id, "fulfillment for unknown redemption");
            ReferralError::RedemptionNotFound(id.to_string())
        }
        other => other.into(),
    })
}

/// Look up a redemption by id.
pub fn get(conn: &Connection, id: &str) -> Result<Redemption> {
    redemptions::get(conn, id).map_err(|e| match e {
        DbError::NotFound(_) => ReferralError::RedemptionNotFound(id.to_string()),
        other => other.into(),
    })
}
