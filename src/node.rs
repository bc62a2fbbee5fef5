/// Node client - JSON-RPC over HTTP against a failover endpoint list
///
/// One client is shared by the whole monitor. `cycle` rotates to the next
/// endpoint and is keyed by a generation token: a caller that observed a
/// transient error passes the generation it saw before the request, so two
/// callers reacting to the same failure rotate the endpoint once, not twice.

use std::sync::Mutex;
use std::time::Duration;

use serde_json::{json, Value};
use tracing::info;

use crate::types::{CacheError, RpcBlock, TxReceipt};

/// Opaque endpoint-generation token, see [`NodeClient::cycle`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeGeneration(u64);

struct EndpointState {
    index: usize,
    generation: u64,
}

pub struct NodeClient {
    endpoints: Vec<String>,
    http: reqwest::Client,
    state: Mutex<EndpointState>,
}

impl NodeClient {
    pub fn new(endpoints: Vec<String>, timeout_ms: u64) -> Result<Self, Box<dyn std::error::Error + Send + Sync>> {
        if endpoints.is_empty() {
            return Err("node client needs at least one endpoint".into());
        }
        let http = reqwest::Client::builder()
            .timeout(Duration::from_millis(timeout_ms))
            .build()?;
        Ok(Self {
            endpoints,
            http,
            state: Mutex::new(EndpointState {
                index: 0,
                generation: 0,
            }),
        })
    }

    /// Generation observed before issuing a request
    pub fn generation(&self) -> NodeGeneration {
        let state = self.state.lock().unwrap();
        NodeGeneration(state.generation)
    }

    /// The endpoint requests currently go to
    pub fn current_endpoint(&self) -> String {
        let state = self.state.lock().unwrap();
        self.endpoints[state.index].clone()
    }

    /// Rotate to the next endpoint
    ///
    /// No-op (returns false) when `observed` is stale, i.e. another caller
    /// already rotated for the same failure.
    pub fn cycle(&self, observed: NodeGeneration) -> bool {
        let mut state = self.state.lock().unwrap();
        if state.generation != observed.0 {
            return false;
        }
        state.index = (state.index + 1) % self.endpoints.len();
        state.generation += 1;
        info!(endpoint = %self.endpoints[state.index], "cycled to next node endpoint");
        true
    }

    async fn call(&self, method: &str, params: Value) -> Result<Value, CacheError> {
        let endpoint = self.current_endpoint();
        let body = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": method,
            "params": params,
        });

        let response = self
            .http
            .post(&endpoint)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() || e.is_connect() {
                    CacheError::new(format!("CONNECTION TIMEOUT calling {}: {}", method, e))
                } else {
                    CacheError::new(format!("{} request failed: {}", method, e))
                }
            })?;

        let envelope: Value = response
            .json()
            .await
            .map_err(|e| CacheError::new(format!("Invalid JSON RPC response for {}: {}", method, e)))?;

        if let Some(err) = envelope.get("error").filter(|e| !e.is_null()) {
            return Err(CacheError::new(format!("RPC error for {}: {}", method, err)));
        }

        match envelope.get("result") {
            Some(result) => Ok(result.clone()),
            None => Err(CacheError::new(format!(
                "Invalid JSON RPC response for {}: missing result",
                method
            ))),
        }
    }

    /// eth_getBlockByNumber with full transaction objects
    ///
    /// Returns None when the node has no block at this height yet.
    pub async fn get_block(&self, number: i64) -> Result<Option<RpcBlock>, CacheError> {
        let result = self
            .call("eth_getBlockByNumber", json!([format!("0x{:x}", number), true]))
            .await?;
        if result.is_null() {
            return Ok(None);
        }
        let block: RpcBlock = serde_json::from_value(result)
            .map_err(|e| CacheError::new(format!("Invalid JSON RPC response for eth_getBlockByNumber: {}", e)))?;
        Ok(Some(block))
    }

    /// eth_getTransactionReceipt
    ///
    /// Returns None when the receipt is not yet available.
    pub async fn get_transaction_receipt(&self, hash: &str) -> Result<Option<TxReceipt>, CacheError> {
        let result = self
            .call("eth_getTransactionReceipt", json!([hash]))
            .await?;
        if result.is_null() {
            return Ok(None);
        }
        let receipt: TxReceipt = serde_json::from_value(result)
            .map_err(|e| CacheError::new(format!("Invalid JSON RPC response for eth_getTransactionReceipt: {}", e)))?;
        Ok(Some(receipt))
    }
}

/// Classify a node error as transient (recoverable by endpoint failover)
pub fn is_transient_error(message: &str) -> bool {
    let lowered = message.to_lowercase();
    lowered.contains("invalid json rpc response") || lowered.contains("connection timeout")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_client() -> NodeClient {
        NodeClient::new(
            vec![
                "http://node-a:8545".to_string(),
                "http://node-b:8545".to_string(),
            ],
            1000,
        )
        .unwrap()
    }

    #[test]
    fn test_transient_classification() {
        assert!(is_transient_error("Invalid JSON RPC response for eth_getBlockByNumber"));
        assert!(is_transient_error("CONNECTION TIMEOUT calling eth_getBlockByNumber"));
        assert!(is_transient_error("connection timeout while polling"));
        assert!(!is_transient_error("RPC error for eth_getBlockByNumber: method not found"));
        assert!(!is_transient_error("block insert affected no rows"));
    }

    #[test]
    fn test_cycle_rotates_endpoint() {
        let client = test_client();
        assert_eq!(client.current_endpoint(), "http://node-a:8545");

        let generation = client.generation();
        assert!(client.cycle(generation));
        assert_eq!(client.current_endpoint(), "http://node-b:8545");

        let generation = client.generation();
        assert!(client.cycle(generation));
        assert_eq!(client.current_endpoint(), "http://node-a:8545");
    }

    #[test]
    fn test_stale_generation_does_not_double_cycle() {
        let client = test_client();
        let observed = client.generation();

        assert!(client.cycle(observed));
        // Second caller saw the same failure; its token is now stale
        assert!(!client.cycle(observed));
        assert_eq!(client.current_endpoint(), "http://node-b:8545");
    }

    #[test]
    fn test_single_endpoint_cycle_is_safe() {
        let client = NodeClient::new(vec!["http://only:8545".to_string()], 1000).unwrap();
        let observed = client.generation();
        assert!(client.cycle(observed));
        assert_eq!(client.current_endpoint(), "http://only:8545");
    }

    #[test]
    fn test_empty_endpoint_list_rejected() {
        assert!(NodeClient::new(Vec::new(), 1000).is_err());
    }
}
