//! Database query functions organized by domain.

pub mod ledger;
pub mod redemptions;
pub mod referrals;
pub mod users;
