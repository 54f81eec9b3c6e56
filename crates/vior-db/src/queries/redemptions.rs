//! Redemption record query functions.

use rusqlite::{Connection, OptionalExtension, Row};
use vior_types::Redemption;

use crate::{DbError, Result};

const REDEMPTION_COLUMNS: &str = "id, wallet_address, option_id, points, balance_after, \
                                  idempotency_key, created_at, fulfilled_at";

fn redemption_from_row(row: &Row<'_>) -> rusqlite::Result<Redemption> {
    Ok(Redemption {
        id: row.get(0)?,
        wallet_address: row.get(1)?,
        option_id: row.get(2)?,
        points: row.get::<_, i64>(3)? as u64,
        balance_after: row.get::<_, i64>(4)? as u64,
        idempotency_key: row.get(5)?,
        created_at: row.get::<_, i64>(6)? as u64,
        fulfilled_at: row.get::<_, Option<i64>>(7)?.map(|t| t as u64),
    })
}

/// Insert a redemption record.
pub fn insert(conn: &Connection, redemption: &Redemption) -> Result<()> {
    conn.execute(
        "INSERT INTO redemptions
             (id, wallet_address, option_id, points, balance_after,
              idempotency_key, created_at, fulfilled_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        rusqlite::params![
            redemption.id,
            redemption.wallet_address,
            redemption.option_id,
            redemption.points as i64,
            redemption.balance_after as i64,
            redemption.idempotency_key,
            redemption.created_at as i64,
            redemption.fulfilled_at.map(|t| t as i64),
        ],
    )?;
    Ok(())
}

/// Get a redemption by id.
pub fn get(conn: &Connection, id: &str) -> Result<Redemption> {
    conn.query_row(
        &format!("SELECT {REDEMPTION_COLUMNS} FROM redemptions WHERE id = ?1"),
        [id],
        redemption_from_row,
    )
    .map_err(|e| match e {
        rusqlite::Error::QueryReturnedNoRows => DbError::NotFound(format!("redemption {id}")),
        other => DbError::from(other),
    })
}

/// The redemption a wallet previously made under `key`, if any.
pub fn find_by_key(conn: &Connection, wallet: &str, key: &str) -> Result<Option<Redemption>> {
    let redemption = conn
        .query_row(
            &format!(
                "SELECT {REDEMPTION_COLUMNS} FROM redemptions
                 WHERE wallet_address = ?1 AND idempotency_key = ?2"
            ),
            [wallet, key],
            redemption_from_row,
        )
        .optional()?;
    Ok(redemption)
}

/// Unfulfilled redemptions, oldest first.
pub fn pending(conn: &Connection, limit: u32) -> Result<Vec<Redemption>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {REDEMPTION_COLUMNS} FROM redemptions
         WHERE fulfilled_at IS NULL
         ORDER BY created_at ASC, rowid ASC
         LIMIT ?1"
    ))?;

    let rows = stmt
        .query_map([limit], redemption_from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(rows)
}

/// Stamp a redemption as fulfilled. An earlier stamp is kept.
pub fn mark_fulfilled(conn: &Connection, id: &str, fulfilled_at: u64) -> Result<Redemption> {
    let updated = conn.execute(
        "UPDATE redemptions SET fulfilled_at = COALESCE(fulfilled_at, ?1) WHERE id = ?2",
        rusqlite::params![fulfilled_at as i64, id],
    )?;
    if updated == 0 {
        return Err(DbError::NotFound(format!("redemption {id}")));
    }
    get(conn, id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queries::users;

    fn test_db() -> Connection {
        let conn = crate::open_memory().expect("open test db");
        users::insert_if_absent(&conn, "alice", "ALICE000", 1).expect("alice");
        conn
    }

    fn redemption(id: &str, key: Option<&str>, at: u64) -> Redemption {
        Redemption {
            id: id.into(),
            wallet_address: "alice".into(),
            option_id: "token-discount".into(),
            points: 100,
            balance_after: 0,
            idempotency_key: key.map(str::to_string),
            created_at: at,
            fulfilled_at: None,
        }
    }

    #[test]
    fn test_insert_and_get() {
        let conn = test_db();
        insert(&conn, &redemption("r1", None, 10)).expect("insert");
        assert_eq!(get(&conn, "r1").expect("get"), redemption("r1", None, 10));
        assert!(matches!(get(&conn, "r2"), Err(DbError::NotFound(_))));
    }

    #[test]
    fn test_idempotency_key_unique_per_wallet() {
        let conn = test_db();
        insert(&conn, &redemption("r1", Some("k1"), 10)).expect("insert");
        let err = insert(&conn, &redemption("r2", Some("k1"), 11)).expect_err("dup key");
        assert!(err.is_unique_violation("redemptions.wallet_address"));

        // Keyless redemptions never collide.
        insert(&conn, &redemption("r3", None, 12)).expect("insert");
        insert(&conn, &redemption("r4", None, 13)).expect("insert");

        let found = find_by_key(&conn, "alice", "k1").expect("find").expect("present");
        assert_eq!(found.id, "r1");
        assert!(find_by_key(&conn, "alice", "k2").expect("find").is_none());
    }

    #[test]
    fn test_pending_and_fulfill() {
        let conn = test_db();
        insert(&conn, &redemption("r2", None, 20)).expect("insert");
        insert(&conn, &redemption("r1", None, 10)).expect("insert");

        let ids: Vec<_> = pending(&conn, 10).expect("pending").into_iter().map(|r| r.id).collect();
        assert_eq!(ids, ["r1", "r2"]);

        let done = mark_fulfilled(&conn, "r1", 30).expect("fulfill");
        assert_eq!(done.fulfilled_at, Some(30));
        let again = mark_fulfilled(&conn, "r1", 40).expect("fulfill again");
        assert_eq!(again.fulfilled_at, Some(30));

        let ids: Vec<_> = pending(&conn, 10).expect("pending").into_iter().map(|r| r.id).collect();
        assert_eq!(ids, ["r2"]);

        assert!(matches!(mark_fulfilled(&conn, "missing", 50), Err(DbError::NotFound(_))));
    }
}
