use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::blockchains::beam::chain_reader::{ChainReader, ChainReaderError};
use crate::blockchains::beam::types::{CurrentValidator, LogEntry, RawLog, Receipt, TopicFilter};

/// In-memory chain for driving extractors without a node
#[derive(Default)]
pub struct FakeChain {
    latest_block: u64,
    logs: Vec<RawLog>,
    receipts: HashMap<String, Receipt>,
    receipt_delays: HashMap<String, Duration>,
    validators: HashMap<String, String>,
    fail_once: Mutex<HashSet<String>>,
    receipt_calls: Mutex<HashMap<String, usize>>,
    log_queries: Mutex<Vec<TopicFilter>>,
}

impl FakeChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_latest_block(mut self, block: u64) -> Self {
        self.latest_block = block;
        self
    }

    pub fn with_log(mut self, tx_hash: &str) -> Self {
        self.logs.push(RawLog {
            transaction_hash: Some(tx_hash.to_string()),
            topics: vec!["0x00".to_string()],
        });
        self
    }

    pub fn with_raw_log(mut self, log: RawLog) -> Self {
        self.logs.push(log);
        self
    }

    pub fn with_receipt(mut self, tx_hash: &str, receipt: Receipt) -> Self {
        self.receipts.insert(tx_hash.to_string(), receipt);
        self
    }

    /// Delays the receipt so concurrent lookups finish out of order
    pub fn with_receipt_delay(mut self, tx_hash: &str, delay: Duration) -> Self {
        self.receipt_delays.insert(tx_hash.to_string(), delay);
        self
    }

    pub fn with_validator(mut self, node_id: &str, validation_id: &str) -> Self {
        self.validators
            .insert(node_id.to_string(), validation_id.to_string());
        self
    }

    pub fn failing_once(self, tx_hash: &str) -> Self {
        self.fail_once
            .lock()
            .unwrap()
            .insert(tx_hash.to_string());
        self
    }

    pub fn receipt_calls(&self, tx_hash: &str) -> usize {
        self.receipt_calls
            .lock()
            .unwrap()
            .get(tx_hash)
            .copied()
            .unwrap_or(0)
    }

    pub fn log_queries(&self) -> Vec<TopicFilter> {
        self.log_queries.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChainReader for FakeChain {
    async fn latest_block_number(&self) -> Result<u64, ChainReaderError> {
        Ok(self.latest_block)
    }

    async fn get_logs(
        &self,
        _from_block: u64,
        topics: &TopicFilter,
    ) -> Result<Vec<RawLog>, ChainReaderError> {
        self.log_queries.lock().unwrap().push(topics.clone());
        Ok(self.logs.clone())
    }

    async fn get_transaction_receipt(
        &self,
        tx_hash: &str,
    ) -> Result<Option<Receipt>, ChainReaderError> {
        *self
            .receipt_calls
            .lock()
            .unwrap()
            .entry(tx_hash.to_string())
            .or_default() += 1;

        if let Some(delay) = self.receipt_delays.get(tx_hash) {
            tokio::time::sleep(*delay).await;
        } else {
            tokio::task::yield_now().await;
        }

        if self.fail_once.lock().unwrap().remove(tx_hash) {
            return Err(ChainReaderError::MissingResult {
                method: "eth_getTransactionReceipt".to_string(),
            });
        }

        Ok(self.receipts.get(tx_hash).cloned())
    }

    async fn current_validators(
        &self,
        node_id: &str,
    ) -> Result<Vec<CurrentValidator>, ChainReaderError> {
        Ok(self
            .validators
            .get(node_id)
            .map(|validation_id| CurrentValidator {
                validation_id: validation_id.clone(),
                node_id: Some(node_id.to_string()),
            })
            .into_iter()
            .collect())
    }
}

/// 32-byte topic holding `address` in its low 20 bytes
pub fn address_topic(address: &str) -> String {
    format!("0x{:0>64}", address)
}

/// 32-byte topic holding `value`
pub fn uint_topic(value: u128) -> String {
    format!("0x{:064x}", value)
}

pub fn log_entry(topics: &[&str], data: &str) -> LogEntry {
    LogEntry {
        topics: topics.iter().map(|t| t.to_string()).collect(),
        data: data.to_string(),
    }
}

/// Event data whose third 32-byte word is `amount` (194 hex chars with the prefix)
pub fn stake_data(amount: u128) -> String {
    format!("0x{:064x}{:064x}{:064x}", 0xdead_u128, 0xbeef_u128, amount)
}
