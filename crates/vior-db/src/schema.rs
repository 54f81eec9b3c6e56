//! SQL schema definitions.

/// Complete schema for the v1 database.
pub const SCHEMA_V1: &str = r#"
-- ============================================================
-- Identity
-- ============================================================

CREATE TABLE IF NOT EXISTS users (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    wallet_address TEXT NOT NULL UNIQUE,
    referral_code TEXT NOT NULL UNIQUE,
    points_balance INTEGER NOT NULL DEFAULT 0 CHECK (points_balance >= 0),
    referral_count INTEGER NOT NULL DEFAULT 0 CHECK (referral_count >= 0),
    created_at INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_users_leaderboard
    ON users(points_balance DESC, created_at, id);

-- ============================================================
-- Referral graph
-- ============================================================

CREATE TABLE IF NOT EXISTS referral_edges (
    referred_wallet TEXT PRIMARY KEY,
    referrer_wallet TEXT NOT NULL REFERENCES users(wallet_address),
    status TEXT NOT NULL DEFAULT 'confirmed',
    points_awarded INTEGER NOT NULL CHECK (points_awarded >= 0),
    created_at INTEGER NOT NULL,
    CHECK (referrer_wallet <> referred_wallet)
);

CREATE INDEX IF NOT EXISTS idx_edges_referrer ON referral_edges(referrer_wallet);

-- ============================================================
-- Points ledger (append-only)
-- ============================================================

CREATE TABLE IF NOT EXISTS points_transactions (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_wallet TEXT NOT NULL REFERENCES users(wallet_address),
    delta INTEGER NOT NULL CHECK (delta <> 0),
    reason TEXT NOT NULL,
    created_at INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_points_wallet ON points_transactions(user_wallet, id);

-- ============================================================
-- Redemptions
-- ============================================================

CREATE TABLE IF NOT EXISTS redemptions (
    id TEXT PRIMARY KEY,
    wallet_address TEXT NOT NULL REFERENCES users(wallet_address),
    option_id TEXT NOT NULL,
    points INTEGER NOT NULL CHECK (points > 0),
    balance_after INTEGER NOT NULL CHECK (balance_after >= 0),
    idempotency_key TEXT,
    created_at INTEGER NOT NULL,
    fulfilled_at INTEGER,
    UNIQUE (wallet_address, idempotency_key)
);

CREATE INDEX IF NOT EXISTS idx_redemptions_pending
    ON redemptions(created_at) WHERE fulfilled_at IS NULL;
"#;
