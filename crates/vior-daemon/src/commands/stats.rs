//! Read-only stats and leaderboard handlers.

use std::sync::Arc;

use serde_json::Value;
use vior_referral::query;

use super::{limit_param, str_param};
use crate::rpc::RpcError;
use crate::DaemonState;

type Result = std::result::Result<Value, RpcError>;

/// Stats for a referral code.
pub async fn stats_by_code(state: &Arc<DaemonState>, params: &Value) -> Result {
    let code = str_param(params, "referral_code")?;

    let stats = state
        .with_conn(move |conn| query::stats_by_code(conn, &code))
        .await?;

    Ok(serde_json::json!({
        "referral_code": stats.referral_code,
        "points_balance": stats.points_balance,
        "referral_count": stats.referral_count,
        "referral_url": state.config.referral_url(&stats.referral_code),
    }))
}

/// Top users by balance, served from the shared snapshot.
pub async fn leaderboard(state: &Arc<DaemonState>, params: &Value) -> Result {
    let limit = limit_param(params, state.config.leaderboard.default_limit)?;
    let shared = Arc::clone(state);

    let entries = state
        .with_conn(move |conn| shared.leaderboard.top(conn, limit))
        .await?;

    Ok(serde_json::json!({
        "leaderboard": entries,
    }))
}
