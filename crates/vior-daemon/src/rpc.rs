//! JSON-RPC server over Unix socket.
//!
//! Listens on a Unix domain socket, accepts connections, and dispatches
//! newline-delimited JSON-RPC 2.0 calls to the command handlers.

use std::path::PathBuf;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::UnixListener;
use tracing::{debug, error, info, warn};
use vior_referral::ReferralError;

use crate::commands;
use crate::DaemonState;

/// JSON-RPC request.
#[derive(Debug, Deserialize)]
pub struct RpcRequest {
    /// JSON-RPC version (must be "2.0").
    pub jsonrpc: String,
    /// Request ID.
    pub id: serde_json::Value,
    /// Method name.
    pub method: String,
    /// Parameters.
    #[serde(default)]
    pub params: serde_json::Value,
}

/// JSON-RPC response.
#[derive(Debug, Serialize)]
pub struct RpcResponse {
    /// JSON-RPC version.
    pub jsonrpc: String,
    /// Request ID.
    pub id: serde_json::Value,
    /// Result or error.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcError>,
}

/// JSON-RPC error object.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct RpcError {
    /// Stable numeric code.
    pub code: i32,
    /// Error name.
    pub message: String,
    /// Optional structured data.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl RpcResponse {
    /// Create a success response.
    pub fn success(id: serde_json::Value, result: serde_json::Value) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            result: Some(result),
            error: None,
        }
    }

    /// Create an error response.
    pub fn error(id: serde_json::Value, error: RpcError) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            result: None,
            error: Some(error),
        }
    }
}

impl RpcError {
    fn new(code: i32, message: &str, data: Option<serde_json::Value>) -> Self {
        Self {
            code,
            message: message.to_string(),
            data,
        }
    }

    // Standard JSON-RPC errors

    /// Parse error (-32700).
    pub fn parse_error() -> Self {
        Self::new(-32700, "PARSE_ERROR", None)
    }

    /// Invalid request (-32600).
    pub fn invalid_request() -> Self {
        Self::new(-32600, "INVALID_REQUEST", None)
    }

    /// Method not found (-32601).
    pub fn method_not_found(method: &str) -> Self {
        Self::new(-32601, "METHOD_NOT_FOUND", Some(serde_json::json!({"method": method})))
    }

    /// Invalid params (-32602).
    pub fn invalid_params(detail: &str) -> Self {
        Self::new(-32602, "INVALID_PARAMS", Some(serde_json::json!({"detail": detail})))
    }

    /// Internal error (-32603).
    pub fn internal_error(detail: &str) -> Self {
        Self::new(-32603, "INTERNAL_ERROR", Some(serde_json::json!({"detail": detail})))
    }

    /// Unknown wallet, code or redemption (-32004).
    pub fn not_found(detail: &str) -> Self {
        Self::new(-32004, "NOT_FOUND", Some(serde_json::json!({"detail": detail})))
    }

    /// Insufficient balance on a raw debit (-32040).
    pub fn insufficient_balance(required: u64, available: u64) -> Self {
        Self::new(
            -32040,
            "INSUFFICIENT_BALANCE",
            Some(serde_json::json!({"required": required, "available": available})),
        )
    }

    /// Redemption larger than the balance (-32041).
    pub fn insufficient_points(requested: u64, available: u64, shortfall: u64) -> Self {
        Self::new(
            -32041,
            "INSUFFICIENT_POINTS",
            Some(serde_json::json!({
                "requested": requested,
                "available": available,
                "shortfall": shortfall,
            })),
        )
    }

    /// Store locked past its timeout (-32070). The only retryable error.
    pub fn store_unavailable(detail: &str) -> Self {
        Self::new(
            -32070,
            "STORE_UNAVAILABLE",
            Some(serde_json::json!({"detail": detail, "retryable": true})),
        )
    }
}

impl From<ReferralError> for RpcError {
    fn from(err: ReferralError) -> Self {
        use serde_json::json;

        let detail = err.to_string();
        match err {
            ReferralError::NotFound(_)
            | ReferralError::UserNotFound(_)
            | ReferralError::RedemptionNotFound(_) => RpcError::not_found(&detail),
            ReferralError::InvalidWallet(wallet) => {
                RpcError::new(-32030, "INVALID_WALLET", Some(json!({"wallet": wallet})))
            }
            ReferralError::InvalidAmount(amount) => {
                RpcError::new(-32031, "INVALID_AMOUNT", Some(json!({"amount": amount})))
            }
            ReferralError::BelowMinimumRedemption { amount, minimum } => RpcError::new(
                -32032,
                "BELOW_MINIMUM_REDEMPTION",
                Some(json!({"amount": amount, "minimum": minimum})),
            ),
            ReferralError::UnknownRedemptionOption(option) => RpcError::new(
                -32033,
                "UNKNOWN_REDEMPTION_OPTION",
                Some(json!({"option_id": option})),
            ),
            ReferralError::OptionPriceMismatch {
                option,
                price,
                amount,
            } => RpcError::new(
                -32034,
                "OPTION_PRICE_MISMATCH",
                Some(json!({"option_id": option, "price": price, "amount": amount})),
            ),
            ReferralError::InvalidIdempotencyKey => {
                RpcError::new(-32035, "INVALID_IDEMPOTENCY_KEY", None)
            }
            ReferralError::IdempotencyConflict(key) => RpcError::new(
                -32036,
                "IDEMPOTENCY_CONFLICT",
                Some(json!({"idempotency_key": key})),
            ),
            ReferralError::InsufficientBalance {
                required,
                available,
            } => RpcError::insufficient_balance(required, available),
            ReferralError::InsufficientPoints {
                requested,
                available,
                shortfall,
            } => RpcError::insufficient_points(requested, available, shortfall),
            ReferralError::CodeGenerationExhausted { attempts } => RpcError::new(
                -32050,
                "CODE_GENERATION_EXHAUSTED",
                Some(json!({"attempts": attempts})),
            ),
            ReferralError::StoreUnavailable(_) => RpcError::store_unavailable(&detail),
            ReferralError::InvalidPolicy(_) | ReferralError::Store(_) => {
                error!("store failure: {detail}");
                RpcError::internal_error(&detail)
            }
        }
    }
}

/// The RPC server.
pub struct RpcServer {
    state: Arc<DaemonState>,
    socket_path: PathBuf,
}

impl RpcServer {
    /// Create a new RPC server.
    pub fn new(state: Arc<DaemonState>, socket_path: PathBuf) -> Self {
        Self { state, socket_path }
    }

    /// Run the server, accepting connections.
    pub async fn run(&self) -> anyhow::Result<()> {
        // Remove stale socket file
        let _ = std::fs::remove_file(&self.socket_path);

        let listener = UnixListener::bind(&self.socket_path)?;
        info!("RPC server listening on {:?}", self.socket_path);

        loop {
            match listener.accept().await {
                Ok((stream, _addr)) => {
                    let state = self.state.clone();
                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(state, stream).await {
                            warn!("Connection error: {}", e);
                        }
                    });
                }
                Err(e) => {
                    error!("Accept error: {}", e);
                }
            }
        }
    }
}

/// Handle a single client connection.
async fn handle_connection(
    state: Arc<DaemonState>,
    stream: tokio::net::UnixStream,
) -> anyhow::Result<()> {
    let (reader, mut writer) = stream.into_split();
    let mut reader = BufReader::new(reader);
    let mut line = String::new();

    loop {
        line.clear();
        let bytes_read = reader.read_line(&mut line).await?;
        if bytes_read == 0 {
            break; // EOF
        }
        if line.trim().is_empty() {
            continue;
        }

        let response = match serde_json::from_str::<RpcRequest>(&line) {
            Ok(request) => dispatch_request(state.clone(), request).await,
            Err(_) => RpcResponse::error(serde_json::Value::Null, RpcError::parse_error()),
        };

        let mut response_json = serde_json::to_string(&response)?;
        response_json.push('\n');
        writer.write_all(response_json.as_bytes()).await?;
        writer.flush().await?;
    }

    Ok(())
}

/// Dispatch a JSON-RPC request to the appropriate command handler.
pub async fn dispatch_request(state: Arc<DaemonState>, request: RpcRequest) -> RpcResponse {
    let id = request.id.clone();
    let method = request.method.as_str();

    if request.jsonrpc != "2.0" {
        return RpcResponse::error(id, RpcError::invalid_request());
    }

    debug!("Dispatching RPC method: {}", method);

    let params = &request.params;
    let result = match method {
        // Identity & referral graph
        "get_or_create" => commands::referral::get_or_create(&state, params).await,
        "connect_wallet" => commands::referral::connect_wallet(&state, params).await,
        "record_referral" => commands::referral::record_referral(&state, params).await,
        "referrals_by_code" => commands::referral::referrals_by_code(&state, params).await,

        // Read-only views
        "stats_by_code" => commands::stats::stats_by_code(&state, params).await,
        "leaderboard" => commands::stats::leaderboard(&state, params).await,

        // Ledger & redemption
        "redeem" => commands::points::redeem(&state, params).await,
        "redemption_options" => commands::points::redemption_options(&state).await,
        "points_history" => commands::points::points_history(&state, params).await,
        "verify_ledger" => commands::points::verify_ledger(&state, params).await,

        // Fulfillment hand-off
        "pending_redemptions" => commands::points::pending_redemptions(&state, params).await,
        "mark_redemption_fulfilled" => {
            commands::points::mark_redemption_fulfilled(&state, params).await
        }

        _ => Err(RpcError::method_not_found(method)),
    };

    match result {
        Ok(value) => RpcResponse::success(id, value),
        Err(err) => RpcResponse::error(id, err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rpc_error_codes() {
        let err = RpcError::insufficient_balance(100, 50);
        assert_eq!(err.code, -32040);

        let err = RpcError::method_not_found("unknown");
        assert_eq!(err.code, -32601);

        let err = RpcError::store_unavailable("locked");
        assert_eq!(err.message, "STORE_UNAVAILABLE");
    }

    #[test]
    fn test_domain_errors_keep_their_kind() {
        let err = RpcError::from(ReferralError::InsufficientPoints {
            requested: 50,
            available: 30,
            shortfall: 20,
        });
        assert_eq!(err.code, -32041);
        assert_eq!(err.message, "INSUFFICIENT_POINTS");
        assert_eq!(err.data.as_ref().and_then(|d| d.get("shortfall")), Some(&serde_json::json!(20)));

        let err = RpcError::from(ReferralError::BelowMinimumRedemption {
            amount: 10,
            minimum: 50,
        });
        assert_eq!(err.message, "BELOW_MINIMUM_REDEMPTION");

        let err = RpcError::from(ReferralError::UserNotFound("w".into()));
        assert_eq!(err.code, -32004);

        let err = RpcError::from(ReferralError::StoreUnavailable("busy".into()));
        assert_eq!(
            err.data.as_ref().and_then(|d| d.get("retryable")),
            Some(&serde_json::json!(true))
        );
    }

    #[test]
    fn test_rpc_response_success() {
        let resp = RpcResponse::success(serde_json::json!(1), serde_json::json!({"points": 10}));
        assert!(resp.result.is_some());
        assert!(resp.error.is_none());
    }

    fn test_state() -> Arc<DaemonState> {
        let name = format!("vior-rpc-{}.db", hex::encode(rand::random::<[u8; 8]>()));
        let path = std::env::temp_dir().join(name);
        drop(vior_db::open(&path).expect("migrate"));
        let mut config = crate::config::DaemonConfig::default();
        config.server.public_url = "https://vior.example".to_string();
        Arc::new(DaemonState::new(config, path))
    }

    async fn call(state: &Arc<DaemonState>, method: &str, params: serde_json::Value) -> RpcResponse {
        let request: RpcRequest = serde_json::from_value(serde_json::json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": method,
            "params": params,
        }))
        .expect("request");
        dispatch_request(state.clone(), request).await
    }

    fn wallet(n: u32) -> String {
        format!("Wa11et{n:0>38}")
    }

    #[tokio::test]
    async fn test_dispatch_referral_flow() {
        let state = test_state();

        let resp = call(&state, "get_or_create", serde_json::json!({"wallet_address": wallet(1)})).await;
        let alice = resp.result.expect("alice");
        assert_eq!(alice["is_new_user"], serde_json::json!(true));
        let code = alice["referral_code"].as_str().expect("code").to_string();
        assert_eq!(code.len(), 8);
        assert_eq!(
            alice["referral_url"].as_str(),
            Some(format!("https://vior.example/?ref={code}").as_str())
        );

        let resp = call(
            &state,
            "connect_wallet",
            serde_json::json!({"wallet_address": wallet(2), "referrer_code": code}),
        )
        .await;
        let bob = resp.result.expect("bob");
        assert_eq!(bob["referral"], serde_json::json!("confirmed"));

        let resp = call(
            &state,
            "record_referral",
            serde_json::json!({"referrer_code": code, "referred_wallet": wallet(2)}),
        )
        .await;
        assert_eq!(resp.result.expect("repeat")["status"], serde_json::json!("already_referred"));

        let resp = call(&state, "stats_by_code", serde_json::json!({"referral_code": code})).await;
        let stats = resp.result.expect("stats");
        assert_eq!(stats["points_balance"], serde_json::json!(100));
        assert_eq!(stats["referral_count"], serde_json::json!(1));

        let resp = call(&state, "leaderboard", serde_json::json!({"limit": 5})).await;
        let board = resp.result.expect("leaderboard");
        assert_eq!(board["leaderboard"][0]["referral_code"], serde_json::json!(code));
        assert_eq!(board["leaderboard"][0]["rank"], serde_json::json!(1));

        let _ = std::fs::remove_file(&state.db_path);
    }

    #[tokio::test]
    async fn test_dispatch_redeem_errors() {
        let state = test_state();
        call(&state, "get_or_create", serde_json::json!({"wallet_address": wallet(3)})).await;

        let resp = call(
            &state,
            "redeem",
            serde_json::json!({"wallet_address": wallet(3), "option_id": "custom-amount", "points": 50}),
        )
        .await;
        let err = resp.error.expect("insufficient");
        assert_eq!(err.message, "INSUFFICIENT_POINTS");

        let resp = call(
            &state,
            "redeem",
            serde_json::json!({"wallet_address": wallet(3), "option_id": "custom-amount", "points": 10}),
        )
        .await;
        assert_eq!(resp.error.expect("floor").message, "BELOW_MINIMUM_REDEMPTION");

        let resp = call(&state, "redeem", serde_json::json!({"wallet_address": wallet(3)})).await;
        assert_eq!(resp.error.expect("params").code, -32602);

        let resp = call(&state, "no_such_method", serde_json::json!({})).await;
        assert_eq!(resp.error.expect("method").code, -32601);

        let _ = std::fs::remove_file(&state.db_path);
    }

    #[test]
    fn test_rpc_response_error() {
        let resp = RpcResponse::error(serde_json::json!(1), RpcError::internal_error("test"));
        assert!(resp.result.is_none());
        assert!(resp.error.is_some());
    }
}
