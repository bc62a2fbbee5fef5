use serde::Deserialize;
use std::fmt;

/// Error type with message context, used across the monitor
#[derive(Debug, Clone)]
pub struct CacheError {
    pub message: String,
}

impl CacheError {
    /// Create a new error
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl fmt::Display for CacheError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CacheError {}

/// Full block as returned by eth_getBlockByNumber with populated transactions
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RpcBlock {
    pub number: String,
    pub hash: String,
    pub parent_hash: String,
    pub nonce: Option<String>,
    pub gas_limit: String,
    pub gas_used: String,
    pub timestamp: String,
    pub sha3_uncles: Option<String>,
    pub logs_bloom: Option<String>,
    pub transactions_root: Option<String>,
    pub receipts_root: Option<String>,
    pub state_root: Option<String>,
    pub mix_hash: Option<String>,
    pub miner: Option<String>,
    pub difficulty: Option<String>,
    pub extra_data: Option<String>,
    pub size: Option<String>,
    #[serde(default)]
    pub transactions: Vec<RpcTransaction>,
    #[serde(default)]
    pub uncles: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RpcTransaction {
    pub hash: String,
    pub nonce: String,
    pub transaction_index: Option<String>,
    pub from: String,
    pub to: Option<String>,
    pub value: String,
    pub gas_price: Option<String>,
    pub gas: String,
    pub input: String,
    pub v: Option<String>,
    pub r: Option<String>,
    pub s: Option<String>,
}

/// Receipt as returned by eth_getTransactionReceipt
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TxReceipt {
    pub status: Option<String>,
    pub contract_address: Option<String>,
    #[serde(default)]
    pub logs: Vec<ReceiptLog>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReceiptLog {
    pub block_number: String,
    pub log_index: String,
    pub address: String,
    pub data: String,
    #[serde(default)]
    pub topics: Vec<String>,
}

/// Parse an 0x-prefixed hex quantity into i64
///
/// Node responses carry block numbers, gas values, indices etc. as hex
/// strings. Values that do not fit i64 (wei amounts, difficulty) are stored
/// as raw text and never go through this.
pub fn parse_hex_quantity(value: &str) -> Result<i64, CacheError> {
    let digits = value
        .strip_prefix("0x")
        .or_else(|| value.strip_prefix("0X"))
        .unwrap_or(value);
    if digits.is_empty() {
        return Err(CacheError::new(format!("empty hex quantity: {:?}", value)));
    }
    i64::from_str_radix(digits, 16)
        .map_err(|e| CacheError::new(format!("bad hex quantity {:?}: {}", value, e)))
}

/// Normalise a log's topic list to a fixed 4-slot vector
///
/// EVM logs carry 0 to 4 topics. The insert contract takes exactly four
/// positional parameters, NULL for absent slots.
pub fn normalize_topics(topics: &[String]) -> [Option<String>; 4] {
    let mut fixed: [Option<String>; 4] = [None, None, None, None];
    for (i, topic) in topics.iter().take(4).enumerate() {
        fixed[i] = Some(topic.clone());
    }
    fixed
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_hex_quantity() {
        assert_eq!(parse_hex_quantity("0x0").unwrap(), 0);
        assert_eq!(parse_hex_quantity("0x10").unwrap(), 16);
        assert_eq!(parse_hex_quantity("0xde0b6b3a7640000").unwrap(), 1_000_000_000_000_000_000);
        assert_eq!(parse_hex_quantity("ff").unwrap(), 255);
        assert!(parse_hex_quantity("0x").is_err());
        assert!(parse_hex_quantity("0xzz").is_err());
    }

    #[test]
    fn test_normalize_topics_arity() {
        let none = normalize_topics(&[]);
        assert_eq!(none, [None, None, None, None]);

        let one = normalize_topics(&["0xaa".to_string()]);
        assert_eq!(one[0].as_deref(), Some("0xaa"));
        assert_eq!(one[1], None);

        let four: Vec<String> = (0..4).map(|i| format!("0x{:02x}", i)).collect();
        let fixed = normalize_topics(&four);
        assert!(fixed.iter().all(|t| t.is_some()));
    }

    #[test]
    fn test_normalize_topics_ignores_excess() {
        let five: Vec<String> = (0..5).map(|i| format!("0x{:02x}", i)).collect();
        let fixed = normalize_topics(&five);
        assert_eq!(fixed[3].as_deref(), Some("0x03"));
    }

    #[test]
    fn test_block_deserialization() {
        let raw = serde_json::json!({
            "number": "0x1b4",
            "hash": "0xdc0818cf78f21a8e70579cb46a43643f78291264dda342ae31049421c82d21ae",
            "parentHash": "0x9646252be9520f6e71339a8df9c55e4d7619deeb018d2a3f2d21fc165dde5eb5",
            "nonce": "0x689056015818adbe",
            "gasLimit": "0x1388",
            "gasUsed": "0x0",
            "timestamp": "0x55ba467c",
            "sha3Uncles": "0x1dcc4de8dec75d7aab85b567b6ccd41ad312451b948a7413f0a142fd40d49347",
            "miner": "0x4e65fda2159562a496f9f3522f89122a3088497a",
            "difficulty": "0x4ea3f27bc",
            "extraData": "0x",
            "size": "0x220",
            "transactions": [],
            "uncles": []
        });
        let block: RpcBlock = serde_json::from_value(raw).unwrap();
        assert_eq!(parse_hex_quantity(&block.number).unwrap(), 436);
        assert!(block.transactions.is_empty());
        assert!(block.uncles.is_empty());
    }

    #[test]
    fn test_receipt_deserialization_null_fields() {
        let raw = serde_json::json!({
            "status": "0x1",
            "contractAddress": null,
            "logs": [{
                "blockNumber": "0x1b4",
                "logIndex": "0x0",
                "address": "0x4e65fda2159562a496f9f3522f89122a3088497a",
                "data": "0x",
                "topics": ["0xddf252ad1be2c89b69c2b068fc378daa952ba7f163c4a11628f55a4df523b3ef"]
            }]
        });
        let receipt: TxReceipt = serde_json::from_value(raw).unwrap();
        assert_eq!(receipt.status.as_deref(), Some("0x1"));
        assert!(receipt.contract_address.is_none());
        assert_eq!(receipt.logs.len(), 1);
        assert_eq!(receipt.logs[0].topics.len(), 1);
    }
}
