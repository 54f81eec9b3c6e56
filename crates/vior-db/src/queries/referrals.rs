//! Referral graph query functions.

use rusqlite::types::Type;
use rusqlite::{Connection, OptionalExtension, Row};
use vior_types::{EdgeStatus, ReferralEdge};

use crate::Result;

fn edge_from_row(row: &Row<'_>) -> rusqlite::Result<ReferralEdge> {
    let status: String = row.get(2)?;
    Ok(ReferralEdge {
        referrer_wallet: row.get(0)?,
        referred_wallet: row.get(1)?,
        status: status
            .parse::<EdgeStatus>()
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(2, Type::Text, Box::new(e)))?,
        points_awarded: row.get::<_, i64>(3)? as u64,
        created_at: row.get::<_, i64>(4)? as u64,
    })
}

/// Insert an edge unless the referred wallet already has one.
///
/// `referred_wallet` is the primary key, so this is the single point
/// where exactly-once referral is decided. Returns `false` if an edge for
/// that wallet already exists, whoever the referrer was.
pub fn insert_if_absent(conn: &Connection, edge: &ReferralEdge) -> Result<bool> {
    let inserted = conn.execute(
        "INSERT INTO referral_edges
             (referred_wallet, referrer_wallet, status, points_awarded, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5)
         ON CONFLICT(referred_wallet) DO NOTHING",
        rusqlite::params![
            edge.referred_wallet,
            edge.referrer_wallet,
            edge.status.as_str(),
            edge.points_awarded as i64,
            edge.created_at as i64,
        ],
    )?;
    Ok(inserted == 1)
}

/// The edge pointing at `referred_wallet`, if any.
pub fn find_by_referred(conn: &Connection, referred_wallet: &str) -> Result<Option<ReferralEdge>> {
    let edge = conn
        .query_row(
            "SELECT referrer_wallet, referred_wallet, status, points_awarded, created_at
             FROM referral_edges WHERE referred_wallet = ?1",
            [referred_wallet],
            edge_from_row,
        )
        .optional()?;
    Ok(edge)
}

/// All edges owned by a referrer, oldest first.
pub fn list_by_referrer(conn: &Connection, referrer_wallet: &str) -> Result<Vec<ReferralEdge>> {
    let mut stmt = conn.prepare(
        "SELECT referrer_wallet, referred_wallet, status, points_awarded, created_at
         FROM referral_edges WHERE referrer_wallet = ?1
         ORDER BY created_at ASC, rowid ASC",
    )?;

    let rows = stmt
        .query_map([referrer_wallet], edge_from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queries::users;

    fn test_db() -> Connection {
        let conn = crate::open_memory().expect("open test db");
        users::insert_if_absent(&conn, "alice", "ALICE000", 1).expect("alice");
        users::insert_if_absent(&conn, "bob", "BOB00000", 2).expect("bob");
        conn
    }

    fn edge(referrer: &str, referred: &str, at: u64) -> ReferralEdge {
        ReferralEdge {
            referrer_wallet: referrer.into(),
            referred_wallet: referred.into(),
            status: EdgeStatus::Confirmed,
            points_awarded: 100,
            created_at: at,
        }
    }

    #[test]
    fn test_insert_and_find() {
        let conn = test_db();
        assert!(insert_if_absent(&conn, &edge("alice", "carol", 10)).expect("insert"));

        let found = find_by_referred(&conn, "carol").expect("find").expect("present");
        assert_eq!(found, edge("alice", "carol", 10));
        assert!(find_by_referred(&conn, "dave").expect("find").is_none());
    }

    #[test]
    fn test_second_referrer_rejected() {
        let conn = test_db();
        assert!(insert_if_absent(&conn, &edge("alice", "carol", 10)).expect("insert"));
        assert!(!insert_if_absent(&conn, &edge("bob", "carol", 11)).expect("dup"));
        assert!(!insert_if_absent(&conn, &edge("alice", "carol", 12)).expect("dup"));

        let found = find_by_referred(&conn, "carol").expect("find").expect("present");
        assert_eq!(found.referrer_wallet, "alice");
    }

    #[test]
    fn test_self_edge_rejected_by_schema() {
        let conn = test_db();
        let err = insert_if_absent(&conn, &edge("alice", "alice", 10)).expect_err("self");
        assert!(matches!(err, crate::DbError::Constraint(_)));
    }

    #[test]
    fn test_unknown_referrer_rejected_by_schema() {
        let conn = test_db();
        let err = insert_if_absent(&conn, &edge("ghost", "carol", 10)).expect_err("fk");
        assert!(matches!(err, crate::DbError::Constraint(_)));
    }

    #[test]
    fn test_list_by_referrer() {
        let conn = test_db();
        insert_if_absent(&conn, &edge("alice", "dave", 20)).expect("insert");
        insert_if_absent(&conn, &edge("alice", "carol", 10)).expect("insert");
        insert_if_absent(&conn, &edge("bob", "erin", 15)).expect("insert");

        let edges = list_by_referrer(&conn, "alice").expect("list");
        let referred: Vec<_> = edges.iter().map(|e| e.referred_wallet.as_str()).collect();
        assert_eq!(referred, ["carol", "dave"]);
        assert_eq!(list_by_referrer(&conn, "bob").expect("list").len(), 1);
    }
}
