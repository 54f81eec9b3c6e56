//! Referral graph: who referred whom, recorded once per referred wallet.

use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use vior_db::queries::{referrals, users};
use vior_types::{EdgeStatus, PointsReason, ReferralEdge, ReferralOutcome, User};

use crate::identity::{self, Registration};
use crate::{ledger, normalize_code, normalize_wallet, CodeGenerator, Result, RewardPolicy};

/// Record that the holder of `referrer_code` referred `referred_wallet`.
///
/// Runs as one transaction: resolve the code, write the edge keyed by the
/// referred wallet, then credit the referrer and bump its referral count.
/// If an edge for the wallet already exists nothing else happens, so a
/// retried call never credits twice.
pub fn record_referral(
    conn: &mut Connection,
    referrer_code: &str,
    referred_wallet: &str,
    policy: &RewardPolicy,
    now: u64,
) -> Result<ReferralOutcome> {
    let referred = normalize_wallet(referred_wallet)?;
    let Some(code) = normalize_code(referrer_code) else {
        warn!(code = %referrer_code, "malformed referrer code");
        return Ok(ReferralOutcome::UnknownReferrerCode);
    };

    vior_db::with_immediate(conn, |tx| {
        let Some(referrer) = users::find_by_code(tx, &code)? else {
            warn!(code = %code, referred = %referred, "unknown referrer code");
            return Ok(ReferralOutcome::UnknownReferrerCode);
        };

        if referrer.wallet_address == referred {
            warn!(wallet = %referred, "self-referral refused");
            return Ok(ReferralOutcome::SelfReferral);
        }

        let edge = ReferralEdge {
            referrer_wallet: referrer.wallet_address.clone(),
            referred_wallet: referred.clone(),
            status: EdgeStatus::Confirmed,
            points_awarded: policy.referral_bonus,
            created_at: now,
        };
        if !referrals::insert_if_absent(tx, &edge)? {
            warn!(wallet = %referred, code = %code, "wallet already referred");
            return Ok(ReferralOutcome::AlreadyReferred);
        }

        if policy.referral_bonus > 0 {
            ledger::credit_in(
                tx,
                &referrer.wallet_address,
                policy.referral_bonus,
                PointsReason::ReferralBonus,
                now,
            )?;
        }
        let count = users::increment_referral_count(tx, &referrer.wallet_address)?;

        info!(
            referrer = %referrer.wallet_address,
            referred = %referred,
            bonus = policy.referral_bonus,
            referral_count = count,
            "referral confirmed"
        );
        Ok(ReferralOutcome::Confirmed)
    })
}

/// Edges owned by the holder of `code`, oldest first.
pub fn referrals_by_code(conn: &Connection, code: &str) -> Result<Vec<ReferralEdge>> {
    let referrer = identity::find_by_code(conn, code)?;
    Ok(referrals::list_by_referrer(conn, &referrer.wallet_address)?)
}

/// The edge recorded for `wallet`, if it was ever referred.
pub fn referrer_of(conn: &Connection, wallet: &str) -> Result<Option<ReferralEdge>> {
    let wallet = normalize_wallet(wallet)?;
    Ok(referrals::find_by_referred(conn, &wallet)?)
}

/// What happened when a wallet connected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalletConnection {
    pub user: User,
    pub is_new_user: bool,
    /// Present only when a referrer code was supplied.
    pub referral: Option<ReferralOutcome>,
}

/// Get or create the user, then apply a captured referrer code if any.
///
/// The two steps are separate transactions; each is idempotent, so the
/// whole call can be retried.
pub fn connect_wallet(
    conn: &mut Connection,
    wallet: &str,
    referrer_code: Option<&str>,
    policy: &RewardPolicy,
    codes: &mut dyn CodeGenerator,
    now: u64,
) -> Result<WalletConnection> {
    let Registration { user, created } = identity::register(conn, wallet, policy, codes, now)?;

    let referral = match referrer_code {
        Some(code) => Some(record_referral(conn, code, &user.wallet_address, policy, now)?),
        None => None,
    };

    Ok(WalletConnection {
        user,
        is_new_user: created,
        referral,
    })
}
