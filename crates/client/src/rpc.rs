//! JSON-RPC transport shared by the chain client and the wallet

use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::debug;

use lottery_core::{LotteryError, Result};

/// EIP-1193: user rejected the request
pub const USER_REJECTED: i64 = 4001;

/// Geth/anvil: execution reverted
pub const EXECUTION_REVERTED: i64 = 3;

/// JSON-RPC: method not found
pub const METHOD_NOT_FOUND: i64 = -32601;

/// HTTP JSON-RPC client bound to one endpoint
#[derive(Clone, Debug)]
pub struct RpcTransport {
    url: String,
    http_client: reqwest::Client,
    next_id: Arc<AtomicU64>,
}

impl RpcTransport {
    /// Create a transport for `url`
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            http_client: reqwest::Client::new(),
            next_id: Arc::new(AtomicU64::new(1)),
        }
    }

    /// Call `method` and return its `result`, which may be `null`
    pub async fn call(&self, method: &str, params: Value) -> Result<Value> {
        match self.send(method, params).await? {
            Ok(result) => Ok(result),
            Err(error) => Err(classify_error(&error)),
        }
    }

    /// Like [`RpcTransport::call`], but `None` when the node lacks `method`
    pub async fn call_if_supported(&self, method: &str, params: Value) -> Result<Option<Value>> {
        match self.send(method, params).await? {
            Ok(result) => Ok(Some(result)),
            Err(error) if error_code(&error) == METHOD_NOT_FOUND => Ok(None),
            Err(error) => Err(classify_error(&error)),
        }
    }

    /// Transport failures are the outer error; a JSON-RPC error object is the inner one
    async fn send(&self, method: &str, params: Value) -> Result<std::result::Result<Value, Value>> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let request = serde_json::json!({
            "jsonrpc": "2.0",
            "method": method,
            "params": params,
            "id": id
        });

        debug!(target: "lottery::rpc", method, id, "rpc request");

        let response = self
            .http_client
            .post(&self.url)
            .json(&request)
            .send()
            .await
            .map_err(LotteryError::rpc)?
            .json::<Value>()
            .await
            .map_err(LotteryError::rpc)?;

        if let Some(error) = response.get("error") {
            return Ok(Err(error.clone()));
        }

        response
            .get("result")
            .cloned()
            .map(Ok)
            .ok_or_else(|| LotteryError::rpc("no result in response"))
    }
}

/// Map a JSON-RPC error object onto the client error taxonomy
pub fn classify_error(error: &Value) -> LotteryError {
    let code = error_code(error);
    let message = error
        .get("message")
        .and_then(Value::as_str)
        .unwrap_or("unknown error")
        .to_string();

    match code {
        USER_REJECTED => LotteryError::UserRejected,
        EXECUTION_REVERTED => LotteryError::Revert(message),
        _ if message.to_lowercase().contains("revert") => LotteryError::Revert(message),
        _ => LotteryError::Rpc(format!("{message} (code {code})")),
    }
}

fn error_code(error: &Value) -> i64 {
    error.get("code").and_then(Value::as_i64).unwrap_or_default()
}

/// Parse a 0x-prefixed hex quantity
pub fn parse_quantity(value: &Value) -> Result<u64> {
    let s = value
        .as_str()
        .ok_or_else(|| LotteryError::rpc(format!("expected hex quantity, got {value}")))?;
    u64::from_str_radix(s.trim_start_matches("0x"), 16).map_err(LotteryError::rpc)
}
