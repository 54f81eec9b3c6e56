//! Points ledger.
//!
//! A balance only changes together with an audit row in the same
//! transaction, so the deltas of a wallet always sum to its balance.
//! Debits check and apply in one conditional UPDATE; a balance can never
//! be observed below zero.

use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use vior_db::queries::{ledger, users};
use vior_db::DbError;
use vior_types::{PointsReason, PointsTransaction};

use crate::{checked_amount, normalize_wallet, ReferralError, Result};

/// Result of replaying a wallet's audit trail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerAudit {
    pub wallet_address: String,
    /// Balance column as stored.
    pub balance: u64,
    /// Sum of every recorded delta.
    pub replayed: i64,
    pub consistent: bool,
}

/// Credit `amount` points and return the new balance.
pub fn credit(
    conn: &mut Connection,
    wallet: &str,
    amount: u64,
    reason: PointsReason,
    now: u64,
) -> Result<u64> {
    let wallet = normalize_wallet(wallet)?;
    checked_amount(amount)?;
    vior_db::with_immediate(conn, |tx| credit_in(tx, &wallet, amount, reason, now))
}

/// Debit `amount` points and return the new balance.
///
/// Fails with [`ReferralError::InsufficientBalance`] if the balance does
/// not cover `amount`; nothing is written in that case.
pub fn debit(
    conn: &mut Connection,
    wallet: &str,
    amount: u64,
    reason: PointsReason,
    now: u64,
) -> Result<u64> {
    let wallet = normalize_wallet(wallet)?;
    checked_amount(amount)?;
    vior_db::with_immediate(conn, |tx| debit_in(tx, &wallet, amount, reason, now))
}

/// Credit inside a transaction the caller already holds.
pub(crate) fn credit_in(
    tx: &Connection,
    wallet: &str,
    amount: u64,
    reason: PointsReason,
    now: u64,
) -> Result<u64> {
    let delta = checked_amount(amount)?;
    let current = users::find_by_wallet(tx, wallet)?
        .ok_or_else(|| ReferralError::UserNotFound(wallet.to_string()))?
        .points_balance;
    // Balances are SQLite integers; past i64::MAX the column turns REAL.
    if current.checked_add(amount).and_then(|b| i64::try_from(b).ok()).is_none() {
        debug!(wallet = %wallet, amount, balance = current, "credit would overflow");
        return Err(ReferralError::InvalidAmount(amount));
    }
    let balance = users::add_points(tx, wallet, amount).map_err(|e| user_not_found(e, wallet))?;
    ledger::append(tx, wallet, delta, reason, now)?;
    info!(wallet = %wallet, amount, reason = %reason, balance, "points credited");
    Ok(balance)
}

/// Debit inside a transaction the caller already holds.
pub(crate) fn debit_in(
    tx: &Connection,
    wallet: &str,
    amount: u64,
    reason: PointsReason,
    now: u64,
) -> Result<u64> {
    let delta = checked_amount(amount)?;
    match users::take_points(tx, wallet, amount)? {
        Some(balance) => {
            ledger::append(tx, wallet, -delta, reason, now)?;
            info!(wallet = %wallet, amount, reason = %reason, balance, "points debited");
            Ok(balance)
        }
        None => {
            let user = users::find_by_wallet(tx, wallet)?
                .ok_or_else(|| ReferralError::UserNotFound(wallet.to_string()))?;
            debug!(wallet = %wallet, amount, available = user.points_balance, "debit refused");
            Err(ReferralError::InsufficientBalance {
                required: amount,
                available: user.points_balance,
            })
        }
    }
}

fn user_not_found(err: DbError, wallet: &str) -> ReferralError {
    match err {
        DbError::NotFound(_) => ReferralError::UserNotFound(wallet.to_string()),
        other => other.into(),
    }
}

/// Most recent ledger entries for a wallet, newest first.
pub fn history(conn: &Connection, wallet: &str, limit: u32) -> Result<Vec<PointsTransaction>> {
    let wallet = normalize_wallet(wallet)?;
    Ok(ledger::history(conn, &wallet, limit)?)
}

/// Replay a wallet's audit trail against its stored balance.
pub fn verify(conn: &Connection, wallet: &str) -> Result<LedgerAudit> {
    let wallet = normalize_wallet(wallet)?;
    let user = users::find_by_wallet(conn, &wallet)?
        .ok_or_else(|| ReferralError::UserNotFound(wallet.clone()))?;
    let replayed = ledger::sum_deltas(conn, &wallet)?;
    Ok(LedgerAudit {
        consistent: i64::try_from(user.points_balance).is_ok_and(|b| b == replayed),
        wallet_address: wallet,
        balance: user.points_balance,
        replayed,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{test_db, wallet, NOW};

    fn with_user(conn: &Connection, n: u32) -> String {
        let w = normalize_wallet(&wallet(n)).expect("wallet");
        users::insert_if_absent(conn, &w, &format!("CODE{n:04}"), NOW).expect("insert");
        w
    }

    #[test]
    fn test_credit_and_debit() {
        let mut conn = test_db();
        let alice = with_user(&conn, 1);

        assert_eq!(credit(&mut conn, &alice, 80, PointsReason::ReferralBonus, NOW).expect("credit"), 80);
        assert_eq!(debit(&mut conn, &alice, 50, PointsReason::Redemption, NOW).expect("debit"), 30);

        let audit = verify(&conn, &alice).expect("verify");
        assert!(audit.consistent);
        assert_eq!(audit.replayed, 30);
    }

    #[test]
    fn test_wallet_is_normalized() {
        let mut conn = test_db();
        let alice = with_user(&conn, 1);
        let shouted = alice.to_uppercase();

        credit(&mut conn, &shouted, 10, PointsReason::Adjustment, NOW).expect("credit");
        assert_eq!(users::get_by_wallet(&conn, &alice).expect("get").points_balance, 10);
    }

    #[test]
    fn test_zero_amount_rejected() {
        let mut conn = test_db();
        let alice = with_user(&conn, 1);
        assert!(matches!(
            credit(&mut conn, &alice, 0, PointsReason::Adjustment, NOW),
            Err(ReferralError::InvalidAmount(0))
        ));
        assert!(matches!(
            debit(&mut conn, &alice, 0, PointsReason::Redemption, NOW),
            Err(ReferralError::InvalidAmount(0))
        ));
        assert!(history(&conn, &alice, 10).expect("history").is_empty());
    }

    #[test]
    fn test_overdraft_refused_without_side_effects() {
        let mut conn = test_db();
        let alice = with_user(&conn, 1);
        credit(&mut conn, &alice, 40, PointsReason::SignupBonus, NOW).expect("credit");

        let err = debit(&mut conn, &alice, 41, PointsReason::Redemption, NOW).expect_err("overdraft");
        assert!(matches!(
            err,
            ReferralError::InsufficientBalance { required: 41, available: 40 }
        ));
        assert_eq!(users::get_by_wallet(&conn, &alice).expect("get").points_balance, 40);
        assert_eq!(history(&conn, &alice, 10).expect("history").len(), 1);
    }

    #[test]
    fn test_credit_past_ledger_range_rejected() {
        let mut conn = test_db();
        let alice = with_user(&conn, 1);
        let top = i64::MAX as u64;
        assert_eq!(credit(&mut conn, &alice, top, PointsReason::Adjustment, NOW).expect("credit"), top);

        assert!(matches!(
            credit(&mut conn, &alice, 1, PointsReason::Adjustment, NOW),
            Err(ReferralError::InvalidAmount(1))
        ));
        assert_eq!(users::get_by_wallet(&conn, &alice).expect("get").points_balance, top);
        assert_eq!(history(&conn, &alice, 10).expect("history").len(), 1);
        assert!(verify(&conn, &alice).expect("verify").consistent);
    }

    #[test]
    fn test_unknown_wallet() {
        let mut conn = test_db();
        let ghost = wallet(9);
        assert!(matches!(
            credit(&mut conn, &ghost, 10, PointsReason::Adjustment, NOW),
            Err(ReferralError::UserNotFound(_))
        ));
        assert!(matches!(
            debit(&mut conn, &ghost, 10, PointsReason::Redemption, NOW),
            Err(ReferralError::UserNotFound(_))
        ));
        assert!(matches!(verify(&conn, &ghost), Err(ReferralError::UserNotFound(_))));
    }

    #[test]
    fn test_history_records_reasons() {
        let mut conn = test_db();
        let alice = with_user(&conn, 1);
        credit(&mut conn, &alice, 100, PointsReason::ReferralBonus, NOW).expect("credit");
        debit(&mut conn, &alice, 60, PointsReason::Redemption, NOW + 1).expect("debit");
        credit(&mut conn, &alice, 60, PointsReason::Adjustment, NOW + 2).expect("reversal");

        let rows = history(&conn, &alice, 10).expect("history");
        let deltas: Vec<_> = rows.iter().map(|r| (r.delta, r.reason)).collect();
        assert_eq!(
            deltas,
            [
                (60, PointsReason::Adjustment),
                (-60, PointsReason::Redemption),
                (100, PointsReason::ReferralBonus),
            ]
        );
        assert!(verify(&conn, &alice).expect("verify").consistent);
    }
}
