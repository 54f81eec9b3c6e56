//! Integration test crate for the VIOR referral ledger.
//!
//! This crate has no library code. It only contains integration tests
//! that drive the identity, referral, ledger and redemption flows against
//! a real on-disk store, including several connections writing at once.
//!
//! Run all integration tests:
//! ```sh
//! cargo test -p vior-integration-tests
//! ```
