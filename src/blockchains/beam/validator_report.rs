use std::fmt::{Display, Formatter};
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

use anyhow::Context;
use thiserror::Error;
use tracing::info;

use crate::blockchains::beam::chain_reader::{ChainReader, EvmChainReader};
use crate::blockchains::beam::delegations::extract_delegations;
use crate::blockchains::beam::receipt_cache::{ReceiptCache, ReceiptFetcher};
use crate::blockchains::beam::report::{save_report, DelegationReport, StakeReport};
use crate::blockchains::beam::stakes::extract_stakes;
use crate::blockchains::beam::types::{RawLog, TopicFilter};
use crate::blockchains::beam::validator_id::{convert_validation_id, normalize_node_id, short_node_id};
use crate::core::app_context::AppContext;
use crate::core::config::EventsConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationMode {
    Delegations,
    Stakes,
    Both,
}

impl OperationMode {
    pub const ALL: [OperationMode; 3] = [Self::Delegations, Self::Stakes, Self::Both];

    pub fn includes_delegations(self) -> bool {
        matches!(self, Self::Delegations | Self::Both)
    }

    pub fn includes_stakes(self) -> bool {
        matches!(self, Self::Stakes | Self::Both)
    }
}

#[derive(Debug, Error, PartialEq)]
#[error("Unknown operation mode '{0}', expected d, s or b")]
pub struct InvalidMode(String);

impl FromStr for OperationMode {
    type Err = InvalidMode;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "d" => Ok(Self::Delegations),
            "s" => Ok(Self::Stakes),
            "b" => Ok(Self::Both),
            other => Err(InvalidMode(other.to_string())),
        }
    }
}

impl Display for OperationMode {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Delegations => write!(f, "d - node delegations"),
            Self::Stakes => write!(f, "s - BEAM stakes"),
            Self::Both => write!(f, "b - both"),
        }
    }
}

#[derive(Debug, Error)]
pub enum RunError {
    #[error("Node-ID not found: {0}")]
    ValidatorNotFound(String),
}

/// Files written by one run
#[derive(Debug, Default)]
pub struct RunOutcome {
    pub delegations: Option<(DelegationReport, PathBuf)>,
    pub stakes: Option<(StakeReport, PathBuf)>,
}

/// Builds delegation and stake reports for one validator.
///
/// One instance serves one run; both report kinds share its receipt cache.
pub struct ValidatorReporter {
    reader: Arc<dyn ChainReader>,
    cache: ReceiptCache,
    events: EventsConfig,
    concurrency: usize,
    output_dir: PathBuf,
}

impl ValidatorReporter {
    pub fn new(
        reader: Arc<dyn ChainReader>,
        events: EventsConfig,
        concurrency: usize,
        output_dir: PathBuf,
    ) -> Self {
        Self {
            reader,
            cache: ReceiptCache::new(),
            events,
            concurrency,
            output_dir,
        }
    }

    pub fn from_context(app_context: &AppContext) -> Self {
        let config = &app_context.config;
        Self::new(
            Arc::new(EvmChainReader::from_context(app_context)),
            config.events.clone(),
            config.general.concurrency,
            PathBuf::from(&config.general.output_dir),
        )
    }

    fn receipts(&self) -> ReceiptFetcher<'_> {
        ReceiptFetcher::new(self.reader.as_ref(), &self.cache)
    }

    /// Looks up the validator's Base58 validation id by node id
    pub async fn resolve_validation_id(&self, node_id: &str) -> anyhow::Result<String> {
        let node_id = normalize_node_id(node_id);
        let validators = self
            .reader
            .current_validators(&node_id)
            .await
            .with_context(|| format!("Could not query current validators for {}", node_id))?;

        let validator = validators
            .into_iter()
            .next()
            .ok_or_else(|| RunError::ValidatorNotFound(node_id.clone()))?;

        info!("(Validator) {} has validation ID {}", node_id, validator.validation_id);
        Ok(validator.validation_id)
    }

    /// Topic filter matching events of the validator behind `node_id`
    pub async fn topic_filter(&self, node_id: &str) -> anyhow::Result<TopicFilter> {
        let validation_id = self.resolve_validation_id(node_id).await?;
        let validation_id_hex = convert_validation_id(&validation_id)
            .with_context(|| format!("Could not convert validation ID {}", validation_id))?;
        info!("(Validator) Filtering events on topic {}", validation_id_hex);
        Ok(TopicFilter::for_validator(&validation_id_hex))
    }

    async fn scan(&self, filter: &TopicFilter) -> anyhow::Result<(u64, Vec<RawLog>)> {
        let latest_block = self
            .reader
            .latest_block_number()
            .await
            .context("Could not obtain latest block number")?;
        let logs = self
            .reader
            .get_logs(0, filter)
            .await
            .context("Could not fetch validator logs")?;
        info!("Found {} log(s) up to block {}", logs.len(), latest_block);
        Ok((latest_block, logs))
    }

    pub async fn process_delegations(
        &self,
        node_id: &str,
        filter: &TopicFilter,
    ) -> anyhow::Result<(DelegationReport, PathBuf)> {
        info!("Processing node delegations...");
        let (latest_block, logs) = self.scan(filter).await?;

        let records = extract_delegations(&logs, self.receipts(), &self.events).await;
        let report = DelegationReport::from_records(&records);
        let path = save_report(&report, &self.output_dir, short_node_id(node_id))?;

        info!("Node delegation processing complete. Last block: {}.", latest_block);
        Ok((report, path))
    }

    pub async fn process_stakes(
        &self,
        node_id: &str,
        filter: &TopicFilter,
        validator_stake: u128,
    ) -> anyhow::Result<(StakeReport, PathBuf)> {
        info!("Processing BEAM stakes...");
        let (latest_block, logs) = self.scan(filter).await?;

        let records = extract_stakes(&logs, self.receipts(), &self.events, self.concurrency).await;
        let report = StakeReport::from_records(&records, validator_stake);
        let path = save_report(&report, &self.output_dir, short_node_id(node_id))?;

        info!("BEAM stake processing complete. Last block: {}.", latest_block);
        Ok((report, path))
    }

    /// Resolves the validator once, then builds the reports `mode` asks for
    pub async fn run(
        &self,
        node_id: &str,
        mode: OperationMode,
        validator_stake: u128,
    ) -> anyhow::Result<RunOutcome> {
        let filter = self.topic_filter(node_id).await?;
        let mut outcome = RunOutcome::default();

        if mode.includes_delegations() {
            outcome.delegations = Some(self.process_delegations(node_id, &filter).await?);
        }
        if mode.includes_stakes() {
            outcome.stakes = Some(self.process_stakes(node_id, &filter, validator_stake).await?);
        }

        let stats = self.cache.stats().await;
        info!(
            "(ReceiptCache) {} receipt(s) cached, {} lookup(s), {} fetch(es)",
            stats.entries, stats.lookups, stats.fetches
        );
        Ok(outcome)
    }
}
