use std::collections::HashSet;

use serde::{Deserialize, Serialize};

/// JSON-RPC 2.0 response envelope
#[derive(Debug, Deserialize)]
pub struct JsonRpcResponse<T> {
    pub result: Option<T>,
    #[serde(default)]
    pub error: Option<JsonRpcError>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct JsonRpcError {
    pub code: i64,
    pub message: String,
}

/// One entry of an `eth_getLogs` result
#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RawLog {
    #[serde(default)]
    pub transaction_hash: Option<String>,
    #[serde(default)]
    pub topics: Vec<String>,
}

/// Transaction hashes in order of first occurrence, each once
pub fn unique_tx_hashes(logs: &[RawLog]) -> Vec<&str> {
    let mut seen = HashSet::new();
    logs.iter()
        .filter_map(|log| log.transaction_hash.as_deref())
        .filter(|hash| seen.insert(*hash))
        .collect()
}

/// A log emitted inside a transaction receipt
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct LogEntry {
    #[serde(default)]
    pub topics: Vec<String>,
    #[serde(default)]
    pub data: String,
}

impl LogEntry {
    pub fn signature(&self) -> Option<&str> {
        self.topics.first().map(String::as_str)
    }

    pub fn topic(&self, index: usize) -> Option<&str> {
        self.topics.get(index).map(String::as_str)
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct Receipt {
    #[serde(default)]
    pub logs: Vec<LogEntry>,
}

impl Receipt {
    pub fn has_event(&self, signature: &str) -> bool {
        self.logs.iter().any(|log| log.signature() == Some(signature))
    }

    pub fn events<'a>(&'a self, signature: &'a str) -> impl Iterator<Item = &'a LogEntry> + 'a {
        self.logs
            .iter()
            .filter(move |log| log.signature() == Some(signature))
    }
}

/// `[null, null, validationIdHex]`: matches events whose third indexed topic is the validator
#[derive(Debug, Serialize, Clone, PartialEq)]
#[serde(transparent)]
pub struct TopicFilter(pub [Option<String>; 3]);

impl TopicFilter {
    pub fn for_validator(validation_id_hex: &str) -> Self {
        TopicFilter([None, None, Some(validation_id_hex.to_string())])
    }
}

/// `eth_getLogs` parameter object
#[derive(Debug, Serialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct LogQuery {
    pub from_block: String,
    pub to_block: String,
    pub topics: TopicFilter,
}

impl LogQuery {
    pub fn from_block(from_block: u64, topics: TopicFilter) -> Self {
        Self {
            from_block: format!("0x{:x}", from_block),
            to_block: "latest".to_string(),
            topics,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CurrentValidatorsResult {
    #[serde(default)]
    pub validators: Vec<CurrentValidator>,
}

#[derive(Debug, Deserialize)]
pub struct CurrentValidator {
    #[serde(rename = "validationID")]
    pub validation_id: String,
    #[serde(rename = "nodeID", default)]
    pub node_id: Option<String>,
}
