use crate::error::{classify_transport_error, ChainError};
use crate::observability::metrics::Metrics;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::time::sleep;

/// JSON-RPC 2.0 over HTTP. Transport failures and 5xx replies are retried
/// with exponential backoff; RPC error objects are returned as-is.
pub struct RpcClient {
    url: String,
    http: reqwest::Client,
    max_retries: u32,
    next_id: AtomicU64,
    metrics: Metrics,
}

impl RpcClient {
    pub fn new(url: String, max_retries: u32, metrics: Metrics) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            url,
            http,
            max_retries,
            next_id: AtomicU64::new(1),
            metrics,
        }
    }

    pub async fn call(&self, method: &str, params: Value) -> Result<Value, ChainError> {
        self.call_resending(method, params, |_| false).await
    }

    /// Like `call`, for requests that must not take effect twice. When a retry
    /// fails with an error `already_applied` accepts, an earlier attempt reached
    /// the node and `Value::Null` is returned.
    pub async fn call_resending<F>(&self, method: &str, params: Value, already_applied: F) -> Result<Value, ChainError>
    where
        F: Fn(&ChainError) -> bool,
    {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let body = json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params,
        });

        let mut attempt = 0;
        loop {
            self.metrics.rpc_requests_total.inc();
            match self.send_once(method, &body).await {
                Ok(v) => return Ok(v),
                Err(e) if attempt > 0 && already_applied(&e) => return Ok(Value::Null),
                Err(e) if e.is_transient() && attempt < self.max_retries => {
                    attempt += 1;
                    let backoff = Duration::from_millis(100 * 2_u64.pow(attempt));
                    sleep(backoff).await;
                }
                Err(e) => {
                    self.metrics.rpc_errors_total.inc();
                    return Err(e);
                }
            }
        }
    }

    async fn send_once(&self, method: &str, body: &Value) -> Result<Value, ChainError> {
        let res = self
            .http
            .post(&self.url)
            .json(body)
            .send()
            .await
            .map_err(|e| {
                if e.is_connect() || e.is_timeout() {
                    ChainError::transient(e.to_string())
                } else {
                    classify_transport_error(&e)
                }
            })?;

        let status = res.status();
        if status.is_server_error() || status.as_u16() == 429 {
            return Err(ChainError::transient(format!("{}: node returned HTTP {}", method, status)));
        }
        if !status.is_success() {
            return Err(ChainError::permanent(format!("{}: node returned HTTP {}", method, status)));
        }

        let payload: Value = res
            .json()
            .await
            .map_err(|e| ChainError::permanent(format!("{}: malformed response: {}", method, e)))?;

        if let Some(err) = payload.get("error").filter(|e| !e.is_null()) {
            let message = err
                .get("message")
                .and_then(|m| m.as_str())
                .map(str::to_string)
                .unwrap_or_else(|| err.to_string());
            return Err(ChainError::permanent(format!("{}: {}", method, message)));
        }

        payload
            .get("result")
            .cloned()
            .ok_or_else(|| ChainError::permanent(format!("{}: response has no result", method)))
    }
}

/// Parses a hex quantity such as `"0x1a"`.
pub fn parse_quantity(v: &Value) -> Result<u64, ChainError> {
    let s = v
        .as_str()
        .ok_or_else(|| ChainError::permanent(format!("expected hex quantity, got {}", v)))?;
    let digits = s
        .strip_prefix("0x")
        .ok_or_else(|| ChainError::permanent(format!("quantity {} lacks 0x prefix", s)))?;
    if digits.is_empty() {
        return Err(ChainError::permanent("empty quantity"));
    }
    u64::from_str_radix(digits, 16).map_err(|e| ChainError::permanent(format!("invalid quantity {}: {}", s, e)))
}

/// Parses hex data such as an `eth_call` result.
pub fn parse_data(v: &Value) -> Result<Vec<u8>, ChainError> {
    let s = v
        .as_str()
        .ok_or_else(|| ChainError::permanent(format!("expected hex data, got {}", v)))?;
    let digits = s.strip_prefix("0x").unwrap_or(s);
    hex::decode(digits).map_err(|e| ChainError::permanent(format!("invalid hex data: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{routing::post, Json, Router};
    use std::sync::atomic::AtomicUsize;
    use std::sync::Arc;

    async fn serve(app: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://127.0.0.1:{}", port)
    }

    #[test]
    fn test_parse_quantity() {
        assert_eq!(parse_quantity(&json!("0x1a")).unwrap(), 26);
        assert_eq!(parse_quantity(&json!("0x0")).unwrap(), 0);
        assert!(parse_quantity(&json!("1a")).is_err());
        assert!(parse_quantity(&json!("0x")).is_err());
        assert!(parse_quantity(&json!(26)).is_err());
    }

    #[test]
    fn test_parse_data() {
        assert_eq!(parse_data(&json!("0x0102")).unwrap(), vec![1, 2]);
        assert_eq!(parse_data(&json!("0x")).unwrap(), Vec::<u8>::new());
        assert!(parse_data(&json!("0xzz")).is_err());
    }

    #[tokio::test]
    async fn test_call_returns_result() {
        let app = Router::new().route("/", post(|Json(req): Json<Value>| async move {
            Json(json!({"jsonrpc": "2.0", "id": req["id"], "result": req["method"]}))
        }));
        let url = serve(app).await;

        let client = RpcClient::new(url, 0, Metrics::new());
        let v = client.call("eth_chainId", json!([])).await.unwrap();
        assert_eq!(v, json!("eth_chainId"));
    }

    #[tokio::test]
    async fn test_rpc_error_is_permanent() {
        let app = Router::new().route("/", post(|Json(req): Json<Value>| async move {
            Json(json!({"jsonrpc": "2.0", "id": req["id"], "error": {"code": -32000, "message": "execution reverted"}}))
        }));
        let url = serve(app).await;

        let metrics = Metrics::new();
        let client = RpcClient::new(url, 3, metrics.clone());
        let err = client.call("eth_call", json!([])).await.unwrap_err();
        assert!(!err.is_transient());
        assert!(err.message().contains("execution reverted"));
        assert_eq!(metrics.rpc_requests_total.get(), 1);
        assert_eq!(metrics.rpc_errors_total.get(), 1);
    }

    #[tokio::test]
    async fn test_server_error_is_retried() {
        let hits = Arc::new(AtomicUsize::new(0));
        let hits_for_route = hits.clone();
        let app = Router::new().route("/", post(move |Json(req): Json<Value>| {
            let hits = hits_for_route.clone();
            async move {
                if hits.fetch_add(1, Ordering::SeqCst) == 0 {
                    (axum::http::StatusCode::BAD_GATEWAY, Json(json!({})))
                } else {
                    (axum::http::StatusCode::OK, Json(json!({"jsonrpc": "2.0", "id": req["id"], "result": "0x10"})))
                }
            }
        }));
        let url = serve(app).await;

        let client = RpcClient::new(url, 2, Metrics::new());
        let v = client.call("eth_blockNumber", json!([])).await.unwrap();
        assert_eq!(parse_quantity(&v).unwrap(), 16);
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_unreachable_node_is_transient() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let client = RpcClient::new(format!("http://127.0.0.1:{}", port), 0, Metrics::new());
        let err = client.call("eth_chainId", json!([])).await.unwrap_err();
        assert!(err.is_transient());
    }

    #[tokio::test]
    async fn test_resent_request_accepts_already_applied() {
        let hits = Arc::new(AtomicUsize::new(0));
        let hits_for_route = hits.clone();
        let app = Router::new().route("/", post(move |Json(req): Json<Value>| {
            let hits = hits_for_route.clone();
            async move {
                if hits.fetch_add(1, Ordering::SeqCst) == 0 {
                    (axum::http::StatusCode::BAD_GATEWAY, Json(json!({})))
                } else {
                    (axum::http::StatusCode::OK, Json(json!({"jsonrpc": "2.0", "id": req["id"], "error": {"code": -32000, "message": "already known"}})))
                }
            }
        }));
        let url = serve(app).await;

        let client = RpcClient::new(url, 1, Metrics::new());
        let known = |e: &ChainError| e.message().contains("already known");
        let v = client.call_resending("eth_sendRawTransaction", json!(["0x00"]), known).await.unwrap();
        assert!(v.is_null());
        assert_eq!(hits.load(Ordering::SeqCst), 2);

        // The same error on a first attempt is a real failure.
        let err = client.call_resending("eth_sendRawTransaction", json!(["0x00"]), known).await.unwrap_err();
        assert!(err.message().contains("already known"));
    }
}
