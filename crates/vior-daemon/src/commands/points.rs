//! Points ledger and redemption command handlers.

use std::sync::Arc;

use serde_json::Value;
use vior_referral::redemption::{self, RedeemRequest};
use vior_referral::{ledger, unix_now};

use super::{limit_param, opt_str_param, opt_u64_param, str_param};
use crate::rpc::RpcError;
use crate::DaemonState;

type Result = std::result::Result<Value, RpcError>;

/// Default page size for history and pending listings.
const DEFAULT_PAGE: u32 = 100;

/// Spend points on a catalog option.
pub async fn redeem(state: &Arc<DaemonState>, params: &Value) -> Result {
    let wallet = str_param(params, "wallet_address")?;
    let option_id = str_param(params, "option_id")?;
    let points = opt_u64_param(params, "points")?
        .ok_or_else(|| RpcError::invalid_params("points required"))?;
    let idempotency_key = opt_str_param(params, "idempotency_key")?;
    let policy = state.config.rewards.clone();

    let receipt = state
        .with_conn(move |conn| {
            let request = RedeemRequest {
                wallet: &wallet,
                option_id: &option_id,
                points,
                idempotency_key: idempotency_key.as_deref(),
            };
            redemption::redeem(conn, &request, &policy, unix_now())
        })
        .await?;

    Ok(serde_json::json!(receipt))
}

/// The configured redemption catalog.
pub async fn redemption_options(state: &Arc<DaemonState>) -> Result {
    Ok(serde_json::json!({
        "min_redemption": state.config.rewards.min_redemption,
        "options": state.config.rewards.options,
    }))
}

/// Most recent ledger entries for a wallet.
pub async fn points_history(state: &Arc<DaemonState>, params: &Value) -> Result {
    let wallet = str_param(params, "wallet_address")?;
    let limit = limit_param(params, DEFAULT_PAGE)?;

    let history = state
        .with_conn(move |conn| ledger::history(conn, &wallet, limit))
        .await?;

    Ok(serde_json::json!({
        "transactions": history,
    }))
}

/// Replay a wallet's ledger against its stored balance.
pub async fn verify_ledger(state: &Arc<DaemonState>, params: &Value) -> Result {
    let wallet = str_param(params, "wallet_address")?;

    let audit = state
        .with_conn(move |conn| ledger::verify(conn, &wallet))
        .await?;

    Ok(serde_json::json!(audit))
}

/// Redemptions not yet fulfilled, oldest first.
pub async fn pending_redemptions(state: &Arc<DaemonState>, params: &Value) -> Result {
    let limit = limit_param(params, DEFAULT_PAGE)?;

    let pending = state
        .with_conn(move |conn| redemption::pending(conn, limit))
        .await?;

    Ok(serde_json::json!({
        "redemptions": pending,
    }))
}

/// Stamp a redemption as fulfilled.
pub async fn mark_redemption_fulfilled(state: &Arc<DaemonState>, params: &Value) -> Result {
    let id = str_param(params, "redemption_id")?;

    let record = state
        .with_conn(move |conn| redemption::mark_fulfilled(conn, &id, unix_now()))
        .await?;

    Ok(serde_json::json!(record))
}
