use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use thiserror::Error;
use tracing::{debug, warn};

use crate::blockchains::beam::types::{
    CurrentValidator, CurrentValidatorsResult, JsonRpcResponse, LogQuery, RawLog, Receipt,
    TopicFilter,
};
use crate::core::app_context::AppContext;
use crate::core::clients::http_client::{NodePool, NodePoolErrors};
use crate::core::clients::path::Path;
use crate::core::utils::{create_error_preview, parse_hex_u64, HexValueError};

#[derive(Debug, Error)]
pub enum ChainReaderError {
    #[error("Transport error: {0}")]
    Transport(#[from] NodePoolErrors),

    #[error("{method} returned error {code}: {message}")]
    Rpc {
        method: String,
        code: i64,
        message: String,
    },

    #[error("Could not parse {method} response: {source} (body: {preview})")]
    Decode {
        method: String,
        preview: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("{method} returned no result")]
    MissingResult { method: String },

    #[error("Invalid block number: {0}")]
    BlockNumber(#[from] HexValueError),
}

/// Read access to the chain used by the extractors
#[async_trait]
pub trait ChainReader: Send + Sync {
    async fn latest_block_number(&self) -> Result<u64, ChainReaderError>;

    /// Logs from `from_block` to the latest block matching `topics`
    async fn get_logs(
        &self,
        from_block: u64,
        topics: &TopicFilter,
    ) -> Result<Vec<RawLog>, ChainReaderError>;

    /// `None` when the node has no receipt for the hash
    async fn get_transaction_receipt(
        &self,
        tx_hash: &str,
    ) -> Result<Option<Receipt>, ChainReaderError>;

    async fn current_validators(
        &self,
        node_id: &str,
    ) -> Result<Vec<CurrentValidator>, ChainReaderError>;
}

/// ChainReader over an EVM JSON-RPC endpoint and its sibling validators endpoint
pub struct EvmChainReader {
    rpc: Arc<NodePool>,
    rpc_path: Path,
    validators_path: Path,
    rate_limit_delay: Duration,
}

impl EvmChainReader {
    pub fn new(
        rpc: Arc<NodePool>,
        rpc_path: Path,
        validators_path: Path,
        rate_limit_delay: Duration,
    ) -> Self {
        Self {
            rpc,
            rpc_path,
            validators_path,
            rate_limit_delay,
        }
    }

    pub fn from_context(app_context: &AppContext) -> Self {
        let config = &app_context.config;
        Self::new(
            app_context.rpc.clone(),
            Path::from(&config.chain.rpc_path),
            Path::from(&config.chain.validators_path),
            Duration::from_millis(config.general.rate_limit_delay_ms),
        )
    }

    async fn call<T: DeserializeOwned>(
        &self,
        path: &Path,
        method: &str,
        params: Value,
    ) -> Result<Option<T>, ChainReaderError> {
        let payload = json!({
            "jsonrpc": "2.0",
            "method": method,
            "params": params,
            "id": 1
        });

        let res = self.rpc.post(path.clone(), &payload).await?;

        let response: JsonRpcResponse<T> =
            serde_json::from_str(&res).map_err(|source| ChainReaderError::Decode {
                method: method.to_string(),
                preview: create_error_preview(&res, 200),
                source,
            })?;

        if let Some(error) = response.error {
            return Err(ChainReaderError::Rpc {
                method: method.to_string(),
                code: error.code,
                message: error.message,
            });
        }

        Ok(response.result)
    }
}

#[async_trait]
impl ChainReader for EvmChainReader {
    async fn latest_block_number(&self) -> Result<u64, ChainReaderError> {
        let block_hex: String = self
            .call(&self.rpc_path, "eth_blockNumber", json!([]))
            .await?
            .ok_or_else(|| ChainReaderError::MissingResult {
                method: "eth_blockNumber".to_string(),
            })?;

        Ok(parse_hex_u64(&block_hex)?)
    }

    async fn get_logs(
        &self,
        from_block: u64,
        topics: &TopicFilter,
    ) -> Result<Vec<RawLog>, ChainReaderError> {
        let query = LogQuery::from_block(from_block, topics.clone());
        debug!("(ChainReader) eth_getLogs {:?}", query);

        let result = self
            .call::<Vec<RawLog>>(&self.rpc_path, "eth_getLogs", json!([query]))
            .await;

        // The endpoint is rate limited on log scans only
        tokio::time::sleep(self.rate_limit_delay).await;

        let logs = result?.unwrap_or_else(|| {
            warn!("(ChainReader) eth_getLogs returned no result, treating as empty");
            Vec::new()
        });
        Ok(logs)
    }

    async fn get_transaction_receipt(
        &self,
        tx_hash: &str,
    ) -> Result<Option<Receipt>, ChainReaderError> {
        self.call(&self.rpc_path, "eth_getTransactionReceipt", json!([tx_hash]))
            .await
    }

    async fn current_validators(
        &self,
        node_id: &str,
    ) -> Result<Vec<CurrentValidator>, ChainReaderError> {
        let result: Option<CurrentValidatorsResult> = self
            .call(
                &self.validators_path,
                "validators.getCurrentValidators",
                json!({ "nodeIDs": [node_id] }),
            )
            .await?;

        Ok(result.map(|r| r.validators).unwrap_or_default())
    }
}
