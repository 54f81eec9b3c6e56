//! Read-only views: per-code stats and the leaderboard.
//!
//! The leaderboard may be served from a snapshot at most `staleness` old.
//! Reads never take the write lock and never block writers.

use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use rusqlite::Connection;
use tracing::debug;
use vior_db::queries::users;
use vior_types::{LeaderboardEntry, ReferralStats};

use crate::{identity, Result};

/// Default maximum age of a served leaderboard snapshot.
pub const DEFAULT_STALENESS: Duration = Duration::from_secs(5);

/// Largest leaderboard a caller may ask for.
pub const DEFAULT_MAX_LIMIT: u32 = 100;

/// Public stats for a referral code.
pub fn stats_by_code(conn: &Connection, code: &str) -> Result<ReferralStats> {
    let user = identity::find_by_code(conn, code)?;
    Ok(ReferralStats {
        referral_code: user.referral_code,
        points_balance: user.points_balance,
        referral_count: user.referral_count,
    })
}

/// Users ranked by balance, ties to the earlier account. Uncached.
pub fn leaderboard(conn: &Connection, limit: u32) -> Result<Vec<LeaderboardEntry>> {
    let entries = users::top_by_points(conn, limit)?
        .into_iter()
        .zip(1u32..)
        .map(|(user, rank)| LeaderboardEntry {
            rank,
            referral_code: user.referral_code,
            points_balance: user.points_balance,
            referral_count: user.referral_count,
        })
        .collect();
    Ok(entries)
}

struct Snapshot {
    taken_at: Instant,
    limit: u32,
    entries: Vec<LeaderboardEntry>,
}

/// Leaderboard with a bounded-staleness snapshot.
pub struct Leaderboard {
    staleness: Duration,
    max_limit: u32,
    snapshot: Mutex<Option<Snapshot>>,
}

impl Default for Leaderboard {
    fn default() -> Self {
        Self::new(DEFAULT_STALENESS, DEFAULT_MAX_LIMIT)
    }
}

impl Leaderboard {
    pub fn new(staleness: Duration, max_limit: u32) -> Self {
        Self {
            staleness,
            max_limit,
            snapshot: Mutex::new(None),
        }
    }

    /// Top `limit` entries, capped at `max_limit`.
    pub fn top(&self, conn: &Connection, limit: u32) -> Result<Vec<LeaderboardEntry>> {
        self.top_with_clock(conn, limit, Instant::now)
    }

    /// The snapshot lock is held only to read or swap the snapshot, never
    /// across the query. `clock` is read after the lock is taken.
    fn top_with_clock(
        &self,
        conn: &Connection,
        limit: u32,
        clock: impl Fn() -> Instant,
    ) -> Result<Vec<LeaderboardEntry>> {
        let limit = limit.min(self.max_limit);
        if limit == 0 {
            return Ok(Vec::new());
        }

        {
            let snapshot = self.lock_snapshot();
            if let Some(snap) = snapshot.as_ref() {
                let fresh = clock().saturating_duration_since(snap.taken_at) < self.staleness;
                if fresh && snap.limit >= limit {
                    return Ok(snap.entries.iter().take(limit as usize).cloned().collect());
                }
            }
        }

        let taken_at = clock();
        let entries = leaderboard(conn, limit)?;
        debug!(limit, rows = entries.len(), "leaderboard refreshed");

        let mut snapshot = self.lock_snapshot();
        // A concurrent refresh may have stored a newer or wider snapshot.
        let keep_existing = snapshot
            .as_ref()
            .is_some_and(|snap| snap.taken_at > taken_at && snap.limit >= limit);
        if !keep_existing {
            *snapshot = Some(Snapshot {
                taken_at,
                limit,
                entries: entries.clone(),
            });
        }
        Ok(entries)
    }

    fn lock_snapshot(&self) -> MutexGuard<'_, Option<Snapshot>> {
        self.snapshot.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
