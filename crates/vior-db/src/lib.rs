//! # vior-db
//!
//! Durable store for the referral rewards ledger.
//! A single SQLite database at `$VIOR_DATA_DIR/vior.db`.
//!
//! ## Schema
//!
//! - WAL mode, foreign keys enforced
//! - All timestamps are Unix epoch seconds
//! - Uniqueness lives in the schema: `users.wallet_address`,
//!   `users.referral_code`, `referral_edges.referred_wallet`
//! - Schema version stored in `PRAGMA user_version`
//!
//! Every write the ledger performs goes through [`with_immediate`], which
//! takes the database write lock up front so concurrent writers queue on
//! the busy handler instead of failing mid-transaction.

pub mod migrations;
pub mod queries;
pub mod schema;

use std::path::Path;
use std::time::Duration;

use rusqlite::{ffi, Connection, ErrorCode, Transaction, TransactionBehavior};

/// Current schema version.
pub const SCHEMA_VERSION: u32 = 1;

/// Default time a statement waits on a held write lock before giving up.
pub const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_millis(750);

/// Database error types.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("SQLite error: {0}")]
    Sqlite(rusqlite::Error),

    #[error("migration failed: {0}")]
    Migration(String),

    #[error("not found: {0}")]
    NotFound(String),

    /// A UNIQUE, CHECK or foreign key constraint rejected the write.
    /// Carries SQLite's message, e.g. `UNIQUE constraint failed: users.referral_code`.
    #[error("constraint violation: {0}")]
    Constraint(String),

    /// The database stayed locked past the busy timeout.
    #[error("database busy: {0}")]
    Busy(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

impl DbError {
    /// True if this is a uniqueness failure on `table.column`.
    pub fn is_unique_violation(&self, column: &str) -> bool {
        match self {
            DbError::Constraint(msg) => {
                msg.starts_with("UNIQUE constraint failed") && msg.contains(column)
            }
            _ => false,
        }
    }

    /// True for failures a caller may retry verbatim.
    pub fn is_transient(&self) -> bool {
        matches!(self, DbError::Busy(_))
    }
}

impl From<rusqlite::Error> for DbError {
    fn from(err: rusqlite::Error) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(e, msg) => match e.code {
                ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked => {
                    DbError::Busy(err.to_string())
                }
                ErrorCode::ConstraintViolation => DbError::Constraint(
                    msg.clone()
                        .unwrap_or_else(|| constraint_name(e.extended_code).to_string()),
                ),
                _ => DbError::Sqlite(err),
            },
            _ => DbError::Sqlite(err),
        }
    }
}

fn constraint_name(extended_code: std::os::raw::c_int) -> &'static str {
    match extended_code {
        ffi::SQLITE_CONSTRAINT_UNIQUE | ffi::SQLITE_CONSTRAINT_PRIMARYKEY => {
            "UNIQUE constraint failed"
        }
        ffi::SQLITE_CONSTRAINT_CHECK => "CHECK constraint failed",
        ffi::SQLITE_CONSTRAINT_FOREIGNKEY => "FOREIGN KEY constraint failed",
        _ => "constraint failed",
    }
}

pub type Result<T> = std::result::Result<T, DbError>;

/// Open or create the database at the given path.
///
/// Configures WAL mode, foreign keys, and runs any pending migrations.
pub fn open(path: &Path) -> Result<Connection> {
    open_with_timeout(path, DEFAULT_BUSY_TIMEOUT)
}

/// Like [`open`], with an explicit busy timeout.
pub fn open_with_timeout(path: &Path, busy_timeout: Duration) -> Result<Connection> {
    let conn = Connection::open(path)?;
    configure(&conn, busy_timeout)?;
    migrations::run(&conn)?;
    Ok(conn)
}

/// Open an additional connection to an already migrated database.
///
/// Used by the daemon for per-request connections; fails if the schema
/// is missing or from another version.
pub fn connect(path: &Path, busy_timeout: Duration) -> Result<Connection> {
    let conn = Connection::open(path)?;
    configure(&conn, busy_timeout)?;
    let version: u32 = conn.pragma_query_value(None, "user_version", |row| row.get(0))?;
    if version != SCHEMA_VERSION {
        return Err(DbError::Migration(format!(
            "expected schema v{SCHEMA_VERSION}, found v{version}"
        )));
    }
    Ok(conn)
}

/// Open an in-memory database (for testing).
pub fn open_memory() -> Result<Connection> {
    let conn = Connection::open_in_memory()?;
    configure(&conn, DEFAULT_BUSY_TIMEOUT)?;
    migrations::run(&conn)?;
    Ok(conn)
}

/// Configure SQLite pragmas.
fn configure(conn: &Connection, busy_timeout: Duration) -> Result<()> {
    conn.execute_batch(
        "PRAGMA journal_mode = WAL;
         PRAGMA foreign_keys = ON;
         PRAGMA synchronous = NORMAL;
         PRAGMA cache_size = -8000;",
    )?;
    conn.busy_timeout(busy_timeout)?;
    Ok(())
}

/// Run `f` inside a `BEGIN IMMEDIATE` transaction.
///
/// Commits when `f` returns `Ok`; any error rolls the transaction back.
pub fn with_immediate<T, E, F>(conn: &mut Connection, f: F) -> std::result::Result<T, E>
where
    F: FnOnce(&Transaction<'_>) -> std::result::Result<T, E>,
    E: From<DbError>,
{
    let tx = conn
        .transaction_with_behavior(TransactionBehavior::Immediate)
        .map_err(DbError::from)?;
    let value = f(&tx)?;
    tx.commit().map_err(DbError::from)?;
    Ok(value)
}
