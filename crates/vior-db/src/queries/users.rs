//! Identity query functions.

use rusqlite::{Connection, OptionalExtension, Row};
use vior_types::User;

use crate::{DbError, Result};

const USER_COLUMNS: &str =
    "wallet_address, referral_code, points_balance, referral_count, created_at";

fn user_from_row(row: &Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        wallet_address: row.get(0)?,
        referral_code: row.get(1)?,
        points_balance: row.get::<_, i64>(2)? as u64,
        referral_count: row.get::<_, i64>(3)? as u64,
        created_at: row.get::<_, i64>(4)? as u64,
    })
}

/// Insert a user unless the wallet already has one.
///
/// Returns `false` when a row for `wallet` already exists. A clash on
/// `referral_code` is not absorbed and surfaces as [`DbError::Constraint`].
pub fn insert_if_absent(
    conn: &Connection,
    wallet: &str,
    referral_code: &str,
    created_at: u64,
) -> Result<bool> {
    let inserted = conn.execute(
        "INSERT INTO users (wallet_address, referral_code, created_at)
         VALUES (?1, ?2, ?3)
         ON CONFLICT(wallet_address) DO NOTHING",
        rusqlite::params![wallet, referral_code, created_at as i64],
    )?;
    Ok(inserted == 1)
}

/// Get a user by normalized wallet address.
pub fn get_by_wallet(conn: &Connection, wallet: &str) -> Result<User> {
    find_by_wallet(conn, wallet)?.ok_or_else(|| DbError::NotFound(format!("wallet {wallet}")))
}

/// Look up a user by normalized wallet address.
pub fn find_by_wallet(conn: &Connection, wallet: &str) -> Result<Option<User>> {
    let user = conn
        .query_row(
            &format!("SELECT {USER_COLUMNS} FROM users WHERE wallet_address = ?1"),
            [wallet],
            user_from_row,
        )
        .optional()?;
    Ok(user)
}

/// Look up a user by referral code.
pub fn find_by_code(conn: &Connection, code: &str) -> Result<Option<User>> {
    let user = conn
        .query_row(
            &format!("SELECT {USER_COLUMNS} FROM users WHERE referral_code = ?1"),
            [code],
            user_from_row,
        )
        .optional()?;
    Ok(user)
}

/// Add `amount` to a balance and return the new balance.
pub fn add_points(conn: &Connection, wallet: &str, amount: u64) -> Result<u64> {
    conn.query_row(
        "UPDATE users SET points_balance = points_balance + ?1
         WHERE wallet_address = ?2
         RETURNING points_balance",
        rusqlite::params![amount as i64, wallet],
        |row| row.get::<_, i64>(0),
    )
    .optional()?
    .map(|balance| balance as u64)
    .ok_or_else(|| DbError::NotFound(format!("wallet {wallet}")))
}

/// Subtract `amount` from a balance if it covers it.
///
/// The comparison and the update are a single statement. Returns `None`
/// when the wallet is unknown or its balance is below `amount`.
pub fn take_points(conn: &Connection, wallet: &str, amount: u64) -> Result<Option<u64>> {
    let balance = conn
        .query_row(
            "UPDATE users SET points_balance = points_balance - ?1
             WHERE wallet_address = ?2 AND points_balance >= ?1
             RETURNING points_balance",
            rusqlite::params![amount as i64, wallet],
            |row| row.get::<_, i64>(0),
        )
        .optional()?;
    Ok(balance.map(|b| b as u64))
}

/// Bump the confirmed-referral counter.
pub fn increment_referral_count(conn: &Connection, wallet: &str) -> Result<u64> {
    conn.query_row(
        "UPDATE users SET referral_count = referral_count + 1
         WHERE wallet_address = ?1
         RETURNING referral_count",
        [wallet],
        |row| row.get::<_, i64>(0),
    )
    .optional()?
    .map(|count| count as u64)
    .ok_or_else(|| DbError::NotFound(format!("wallet {wallet}")))
}

/// Top users by balance; ties go to the earlier account.
pub fn top_by_points(conn: &Connection, limit: u32) -> Result<Vec<User>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {USER_COLUMNS} FROM users
         ORDER BY points_balance DESC, created_at ASC, id ASC
         LIMIT ?1"
    ))?;

    let rows = stmt
        .query_map([limit], user_from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(rows)
}

/// Number of users.
pub fn count(conn: &Connection) -> Result<u64> {
    let count: i64 = conn.query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))?;
    Ok(count as u64)
}
