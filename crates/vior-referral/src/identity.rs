//! Identity store: one user per wallet, one immutable code per user.

use rusqlite::Connection;
use tracing::{info, warn};
use vior_db::queries::users;
use vior_types::{PointsReason, User};

use crate::{ledger, normalize_code, normalize_wallet, CodeGenerator, ReferralError, Result, RewardPolicy};

/// Outcome of [`register`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Registration {
    pub user: User,
    /// True if this call created the user.
    pub created: bool,
}

/// Return the user for `wallet`, creating it on first sight.
///
/// Repeated calls return the same record and write nothing.
pub fn get_or_create(
    conn: &mut Connection,
    wallet: &str,
    policy: &RewardPolicy,
    codes: &mut dyn CodeGenerator,
    now: u64,
) -> Result<User> {
    register(conn, wallet, policy, codes, now).map(|r| r.user)
}

/// Like [`get_or_create`], also reporting whether the user is new.
///
/// Creation inserts with `ON CONFLICT(wallet_address) DO NOTHING`: a
/// concurrent creator of the same wallet wins and this call reads its
/// row. A clash on the referral code retries with a new candidate, up to
/// `policy.code_attempts` times. The signup bonus, if any, is credited
/// in the same transaction as the insert.
pub fn register(
    conn: &mut Connection,
    wallet: &str,
    policy: &RewardPolicy,
    codes: &mut dyn CodeGenerator,
    now: u64,
) -> Result<Registration> {
    let wallet = normalize_wallet(wallet)?;

    if let Some(user) = users::find_by_wallet(conn, &wallet)? {
        return Ok(Registration {
            user,
            created: false,
        });
    }

    vior_db::with_immediate(conn, |tx| {
        for attempt in 1..=policy.code_attempts {
            let code = codes.next_code();
            match users::insert_if_absent(tx, &wallet, &code, now) {
                Ok(true) => {
                    if policy.signup_bonus > 0 {
                        ledger::credit_in(tx, &wallet, policy.signup_bonus, PointsReason::SignupBonus, now)?;
                    }
                    let user = users::get_by_wallet(tx, &wallet)?;
                    info!(wallet = %wallet, code = %user.referral_code, "user created");
                    return Ok(Registration {
                        user,
                        created: true,
                    });
                }
                Ok(false) => {
                    return Ok(Registration {
                        user: users::get_by_wallet(tx, &wallet)?,
                        created: false,
                    });
                }
                Err(e) if e.is_unique_violation("users.referral_code") => {
                    warn!(attempt, "referral code collision, retrying");
                }
                Err(e) => return Err(e.into()),
            }
        }
        Err(ReferralError::CodeGenerationExhausted {
            attempts: policy.code_attempts,
        })
    })
}

/// Look up a user by referral code.
pub fn find_by_code(conn: &Connection, code: &str) -> Result<User> {
    normalize_code(code)
        .map(|code| users::find_by_code(conn, &code))
        .transpose()?
        .flatten()
        .ok_or_else(|| ReferralError::NotFound(format!("referral code {code}")))
}

/// Look up a user by wallet.
pub fn find_by_wallet(conn: &Connection, wallet: &str) -> Result<User> {
    let wallet = normalize_wallet(wallet)?;
    users::find_by_wallet(conn, &wallet)?.ok_or(ReferralError::UserNotFound(wallet))
}
