//! IPC command handlers.
//!
//! Each submodule implements the commands for one IPC category.

pub mod points;
pub mod referral;
pub mod stats;

use serde_json::Value;

use crate::rpc::RpcError;

/// Required string parameter.
fn str_param(params: &Value, key: &str) -> Result<String, RpcError> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .map(str::to_string)
        .ok_or_else(|| RpcError::invalid_params(&format!("{key} required")))
}

/// Optional string parameter. Absent, null and empty all read as `None`.
fn opt_str_param(params: &Value, key: &str) -> Result<Option<String>, RpcError> {
    match params.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) if s.trim().is_empty() => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(_) => Err(RpcError::invalid_params(&format!("{key} must be a string"))),
    }
}

/// Optional non-negative integer parameter.
fn opt_u64_param(params: &Value, key: &str) -> Result<Option<u64>, RpcError> {
    match params.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(v) => v
            .as_u64()
            .map(Some)
            .ok_or_else(|| RpcError::invalid_params(&format!("{key} must be a non-negative integer"))),
    }
}

/// Optional limit, clamped into `u32`.
fn limit_param(params: &Value, default: u32) -> Result<u32, RpcError> {
    Ok(opt_u64_param(params, "limit")?
        .map(|l| u32::try_from(l).unwrap_or(u32::MAX))
        .unwrap_or(default))
}
