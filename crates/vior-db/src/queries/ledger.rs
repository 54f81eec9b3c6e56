//! Points ledger query functions. The table is append-only.

use rusqlite::types::Type;
use rusqlite::{Connection, Row};
use vior_types::{PointsReason, PointsTransaction};

use crate::Result;

fn tx_from_row(row: &Row<'_>) -> rusqlite::Result<PointsTransaction> {
    let reason: String = row.get(3)?;
    Ok(PointsTransaction {
        id: row.get(0)?,
        user_wallet: row.get(1)?,
        delta: row.get(2)?,
        reason: reason
            .parse::<PointsReason>()
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(3, Type::Text, Box::new(e)))?,
        created_at: row.get::<_, i64>(4)? as u64,
    })
}

/// Append one audit row. Returns its id.
pub fn append(
    conn: &Connection,
    wallet: &str,
    delta: i64,
    reason: PointsReason,
    created_at: u64,
) -> Result<i64> {
    conn.execute(
        "INSERT INTO points_transactions (user_wallet, delta, reason, created_at)
         VALUES (?1, ?2, ?3, ?4)",
        rusqlite::params![wallet, delta, reason.as_str(), created_at as i64],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Most recent entries for a wallet, newest first.
pub fn history(conn: &Connection, wallet: &str, limit: u32) -> Result<Vec<PointsTransaction>> {
    let mut stmt = conn.prepare(
        "SELECT id, user_wallet, delta, reason, created_at
         FROM points_transactions WHERE user_wallet = ?1
         ORDER BY id DESC LIMIT ?2",
    )?;

    let rows = stmt
        .query_map(rusqlite::params![wallet, limit], tx_from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(rows)
}

/// Sum of every delta ever recorded for a wallet.
pub fn sum_deltas(conn: &Connection, wallet: &str) -> Result<i64> {
    let sum: i64 = conn.query_row(
        "SELECT COALESCE(SUM(delta), 0) FROM points_transactions WHERE user_wallet = ?1",
        [wallet],
        |row| row.get(0),
    )?;
    Ok(sum)
}
