//! Identity and referral graph command handlers.

use std::sync::Arc;

use serde_json::Value;
use vior_referral::{graph, identity, unix_now, RandomCodes};

use super::{opt_str_param, str_param};
use crate::rpc::RpcError;
use crate::DaemonState;

type Result = std::result::Result<Value, RpcError>;

/// Return the user for a wallet, creating it on first sight.
pub async fn get_or_create(state: &Arc<DaemonState>, params: &Value) -> Result {
    let wallet = str_param(params, "wallet_address")?;
    let policy = state.config.rewards.clone();

    // ThreadRng is not Send; build the generator on the worker thread.
    let registration = state
        .with_conn(move |conn| {
            let mut codes = RandomCodes::new(policy.code_length);
            identity::register(conn, &wallet, &policy, &mut codes, unix_now())
        })
        .await?;

    let user = registration.user;
    Ok(serde_json::json!({
        "wallet_address": user.wallet_address,
        "referral_code": user.referral_code,
        "referral_url": state.config.referral_url(&user.referral_code),
        "points_balance": user.points_balance,
        "referral_count": user.referral_count,
        "created_at": user.created_at,
        "is_new_user": registration.created,
    }))
}

/// Get or create the user, then apply a captured referrer code.
pub async fn connect_wallet(state: &Arc<DaemonState>, params: &Value) -> Result {
    let wallet = str_param(params, "wallet_address")?;
    let referrer_code = opt_str_param(params, "referrer_code")?;
    let policy = state.config.rewards.clone();

    let connection = state
        .with_conn(move |conn| {
            let mut codes = RandomCodes::new(policy.code_length);
            graph::connect_wallet(
                conn,
                &wallet,
                referrer_code.as_deref(),
                &policy,
                &mut codes,
                unix_now(),
            )
        })
        .await?;

    let mut result = serde_json::to_value(&connection)
        .map_err(|e| RpcError::internal_error(&format!("serialize: {e}")))?;
    result["referral_url"] = serde_json::json!(state
        .config
        .referral_url(&connection.user.referral_code));
    Ok(result)
}

/// Record that the holder of `referrer_code` referred a wallet.
pub async fn record_referral(state: &Arc<DaemonState>, params: &Value) -> Result {
    let referrer_code = str_param(params, "referrer_code")?;
    let referred_wallet = str_param(params, "referred_wallet")?;
    let policy = state.config.rewards.clone();

    let outcome = state
        .with_conn(move |conn| {
            graph::record_referral(conn, &referrer_code, &referred_wallet, &policy, unix_now())
        })
        .await?;

    Ok(serde_json::json!({
        "status": outcome.as_str(),
    }))
}

/// List the edges owned by a referral code, oldest first.
pub async fn referrals_by_code(state: &Arc<DaemonState>, params: &Value) -> Result {
    let code = str_param(params, "referral_code")?;

    let edges = state
        .with_conn(move |conn| graph::referrals_by_code(conn, &code))
        .await?;

    Ok(serde_json::json!({
        "referrals": edges,
    }))
}
