//! Helpers shared by the integration tests.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::time::Duration;

use rusqlite::Connection;
use vior_referral::CodeGenerator;

pub const NOW: u64 = 1_700_000_000;

/// Generous lock wait so contended tests never see a timeout.
pub const TEST_BUSY_TIMEOUT: Duration = Duration::from_secs(10);

/// A migrated ledger file in the temp directory, removed on drop.
pub struct TempLedger {
    path: PathBuf,
}

impl TempLedger {
    pub fn new(tag: &str) -> Self {
        let name = format!("vior-{tag}-{}.db", hex::encode(rand::random::<[u8; 8]>()));
        let path = std::env::temp_dir().join(name);
        drop(vior_db::open_with_timeout(&path, TEST_BUSY_TIMEOUT).expect("migrate ledger"));
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// A fresh connection, as each request worker would open.
    pub fn connect(&self) -> Connection {
        vior_db::connect(&self.path, TEST_BUSY_TIMEOUT).expect("connect")
    }
}

impl Drop for TempLedger {
    fn drop(&mut self) {
        for suffix in ["", "-wal", "-shm"] {
            let mut file = self.path.clone().into_os_string();
            file.push(suffix);
            let _ = std::fs::remove_file(file);
        }
    }
}

/// A 44-character wallet address unique to `n`.
pub fn wallet(n: u32) -> String {
    format!("Wa11et{n:0>38}")
}

/// Hands out a fixed list of codes, then repeats the last one.
pub struct FixedCodes(pub Vec<&'static str>);

impl CodeGenerator for FixedCodes {
    fn next_code(&mut self) -> String {
        if self.0.len() > 1 {
            self.0.remove(0).to_string()
        } else {
            self.0.first().copied().unwrap_or("FIXED0").to_string()
        }
    }
}
