/// Log decoder - identifies known contract events and writes decoded rows
///
/// The event registry is loaded at startup from a JSON config: one descriptor
/// per event with its precomputed signature hash (topic0), an optional
/// contract address filter, and the input layout. The monitor hands the
/// decoder each freshly written log together with its assigned log_id; the
/// decoded row lands in the same database transaction as the log itself.
/// Unknown events are not an error, they simply stay undecoded.

use std::collections::HashMap;
use std::fs;

use serde::Deserialize;
use serde_json::{json, Value};
use sqlx::PgExecutor;
use tracing::debug;

use crate::queries;
use crate::types::ReceiptLog;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, Clone, Deserialize)]
pub struct EventInput {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub indexed: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EventAbi {
    pub name: String,
    /// Optional address filter; absent means the event matches any contract
    #[serde(default)]
    pub contract: Option<String>,
    /// Precomputed keccak hash of the event signature
    pub topic0: String,
    #[serde(default)]
    pub inputs: Vec<EventInput>,
}

pub struct LogDecoder {
    events: HashMap<String, Vec<EventAbi>>,
}

impl LogDecoder {
    /// Load the event registry from a JSON config file
    pub fn load(path: &str) -> Result<Self, BoxError> {
        let raw = fs::read_to_string(path)
            .map_err(|e| format!("cannot read ABI config {}: {}", path, e))?;
        let abis: Vec<EventAbi> = serde_json::from_str(&raw)
            .map_err(|e| format!("cannot parse ABI config {}: {}", path, e))?;
        Ok(Self::from_events(abis))
    }

    pub fn from_events(abis: Vec<EventAbi>) -> Self {
        let mut events: HashMap<String, Vec<EventAbi>> = HashMap::new();
        for abi in abis {
            events.entry(abi.topic0.to_lowercase()).or_default().push(abi);
        }
        Self { events }
    }

    pub fn empty() -> Self {
        Self {
            events: HashMap::new(),
        }
    }

    pub fn event_count(&self) -> usize {
        self.events.values().map(|v| v.len()).sum()
    }

    /// Match a log against the registry by topic0 and contract filter
    pub fn lookup(&self, topic0: &str, address: &str) -> Option<&EventAbi> {
        let candidates = self.events.get(&topic0.to_lowercase())?;
        candidates
            .iter()
            .find(|abi| match &abi.contract {
                Some(contract) => contract.eq_ignore_ascii_case(address),
                None => true,
            })
    }

    /// Decode one stored log and write its event row
    pub async fn decode(
        &self,
        executor: impl PgExecutor<'_>,
        log_id: i64,
        log: &ReceiptLog,
    ) -> Result<(), BoxError> {
        let Some(topic0) = log.topics.first() else {
            return Ok(());
        };
        let Some(abi) = self.lookup(topic0, &log.address) else {
            return Ok(());
        };

        let parameters = decode_parameters(abi, log);
        let serialized = serde_json::to_string(&parameters)?;
        queries::add_log_event(executor, log_id, &abi.name, &log.address, &serialized).await?;
        debug!(log_id, event = %abi.name, "decoded log event");
        Ok(())
    }
}

/// Decode the event parameters of a matched log
///
/// Indexed inputs are taken from topics 1..4 in declaration order,
/// non-indexed inputs from consecutive 32-byte words of the data field.
pub fn decode_parameters(abi: &EventAbi, log: &ReceiptLog) -> Value {
    let mut topics = log.topics.iter().skip(1);
    let mut words = data_words(&log.data).into_iter();
    let mut parameters = serde_json::Map::new();

    for input in &abi.inputs {
        let word = if input.indexed {
            topics.next().cloned()
        } else {
            words.next()
        };
        let value = match word {
            Some(word) => decode_word(&input.kind, &word),
            None => Value::Null,
        };
        parameters.insert(input.name.clone(), value);
    }

    Value::Object(parameters)
}

/// Split an 0x-prefixed data blob into 32-byte hex words
pub fn data_words(data: &str) -> Vec<String> {
    let digits = data.strip_prefix("0x").unwrap_or(data);
    digits
        .as_bytes()
        .chunks(64)
        .map(|chunk| format!("0x{}", String::from_utf8_lossy(chunk)))
        .collect()
}

/// Decode a single 32-byte word according to the declared Solidity type
pub fn decode_word(kind: &str, word: &str) -> Value {
    let digits = word.strip_prefix("0x").unwrap_or(word);
    if kind == "address" {
        let start = digits.len().saturating_sub(40);
        return json!(format!("0x{}", &digits[start..]));
    }
    if kind == "bool" {
        return json!(digits.trim_start_matches('0') == "1");
    }
    if kind.starts_with("uint") {
        if let Ok(value) = u128::from_str_radix(digits, 16) {
            return json!(value.to_string());
        }
        // Too wide for u128, keep the raw hex
        return json!(word);
    }
    json!(word)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const TRANSFER_TOPIC: &str =
        "0xddf252ad1be2c89b69c2b068fc378daa952ba7f163c4a11628f55a4df523b3ef";

    fn transfer_abi() -> EventAbi {
        EventAbi {
            name: "Transfer".to_string(),
            contract: None,
            topic0: TRANSFER_TOPIC.to_string(),
            inputs: vec![
                EventInput {
                    name: "from".to_string(),
                    kind: "address".to_string(),
                    indexed: true,
                },
                EventInput {
                    name: "to".to_string(),
                    kind: "address".to_string(),
                    indexed: true,
                },
                EventInput {
                    name: "value".to_string(),
                    kind: "uint256".to_string(),
                    indexed: false,
                },
            ],
        }
    }

    fn transfer_log() -> ReceiptLog {
        ReceiptLog {
            block_number: "0x1b4".to_string(),
            log_index: "0x0".to_string(),
            address: "0x6b175474e89094c44da98b954eedeac495271d0f".to_string(),
            data: "0x0000000000000000000000000000000000000000000000000de0b6b3a7640000"
                .to_string(),
            topics: vec![
                TRANSFER_TOPIC.to_string(),
                "0x0000000000000000000000004e65fda2159562a496f9f3522f89122a3088497a"
                    .to_string(),
                "0x000000000000000000000000deadbeefdeadbeefdeadbeefdeadbeefdeadbeef"
                    .to_string(),
            ],
        }
    }

    #[test]
    fn test_lookup_wildcard_and_contract_filter() {
        let mut filtered = transfer_abi();
        filtered.contract = Some("0x6B175474E89094C44Da98b954EedeAC495271d0F".to_string());
        let decoder = LogDecoder::from_events(vec![filtered]);

        assert!(decoder
            .lookup(TRANSFER_TOPIC, "0x6b175474e89094c44da98b954eedeac495271d0f")
            .is_some());
        assert!(decoder
            .lookup(TRANSFER_TOPIC, "0x0000000000000000000000000000000000000001")
            .is_none());
        assert!(decoder.lookup("0xabcdef", "0x01").is_none());
    }

    #[test]
    fn test_decode_transfer_parameters() {
        let parameters = decode_parameters(&transfer_abi(), &transfer_log());
        assert_eq!(
            parameters["from"],
            json!("0x4e65fda2159562a496f9f3522f89122a3088497a")
        );
        assert_eq!(
            parameters["to"],
            json!("0xdeadbeefdeadbeefdeadbeefdeadbeefdeadbeef")
        );
        assert_eq!(parameters["value"], json!("1000000000000000000"));
    }

    #[test]
    fn test_decode_missing_slots_are_null() {
        let mut log = transfer_log();
        log.topics.truncate(2);
        log.data = "0x".to_string();
        let parameters = decode_parameters(&transfer_abi(), &log);
        assert_eq!(parameters["to"], Value::Null);
        assert_eq!(parameters["value"], Value::Null);
    }

    #[test]
    fn test_data_words() {
        assert!(data_words("0x").is_empty());
        let two = data_words(&format!("0x{}{}", "11".repeat(32), "22".repeat(32)));
        assert_eq!(two.len(), 2);
        assert_eq!(two[0], format!("0x{}", "11".repeat(32)));
    }

    #[test]
    fn test_decode_word_types() {
        let word = "0x0000000000000000000000000000000000000000000000000000000000000001";
        assert_eq!(decode_word("bool", word), json!(true));
        assert_eq!(decode_word("uint8", word), json!("1"));
        assert_eq!(
            decode_word("address", word),
            json!(format!("0x{}1", "0".repeat(39)))
        );
        assert_eq!(decode_word("bytes32", word), json!(word));
    }

    #[test]
    fn test_load_registry_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"[{{"name": "Transfer", "topic0": "{}", "inputs": [
                 {{"name": "from", "type": "address", "indexed": true}},
                 {{"name": "to", "type": "address", "indexed": true}},
                 {{"name": "value", "type": "uint256"}}
               ]}}]"#,
            TRANSFER_TOPIC
        )
        .unwrap();

        let decoder = LogDecoder::load(file.path().to_str().unwrap()).unwrap();
        assert_eq!(decoder.event_count(), 1);
        assert!(decoder.lookup(TRANSFER_TOPIC, "0x01").is_some());
    }
}
