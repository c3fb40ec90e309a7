use std::collections::HashSet;

use tracing::{info, warn};

use crate::blockchains::beam::receipt_cache::ReceiptFetcher;
use crate::blockchains::beam::types::{unique_tx_hashes, RawLog, Receipt};
use crate::core::config::EventsConfig;
use crate::core::utils::{address_from_topic, parse_hex_u128};

/// A node (NFT token id) delegated by a wallet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DelegationRecord {
    pub tx_hash: String,
    pub wallet: String,
    pub token_id: u128,
}

/// Wallet of the first well-formed wallet-transfer event in the receipt
fn delegating_wallet<'r>(
    tx_hash: &str,
    receipt: &'r Receipt,
    events: &'r EventsConfig,
) -> Option<&'r str> {
    receipt.events(&events.wallet_transfer).find_map(|log| {
        let wallet = log.topic(3).and_then(address_from_topic);
        if wallet.is_none() {
            warn!(
                "(Delegations) Malformed wallet topic in transaction {}: {:?}",
                tx_hash,
                log.topic(3)
            );
        }
        wallet
    })
}

/// Token ids of every well-formed token-transfer event, in log order
fn transferred_token_ids(tx_hash: &str, receipt: &Receipt, events: &EventsConfig) -> Vec<u128> {
    receipt
        .events(&events.token_transfer)
        .filter_map(|log| match log.topic(3).map(parse_hex_u128) {
            Some(Ok(token_id)) => Some(token_id),
            Some(Err(e)) => {
                warn!(
                    "(Delegations) Skipping token id in transaction {}: {}",
                    tx_hash, e
                );
                None
            }
            None => {
                warn!(
                    "(Delegations) Token transfer without token id topic in transaction {}",
                    tx_hash
                );
                None
            }
        })
        .collect()
}

/// Correlates wallet-transfer and token-transfer events per transaction.
///
/// Transactions are handled one at a time in order of first appearance in `logs`.
/// A (wallet, token id) pair is emitted once per run, however many transactions
/// or log entries repeat it.
pub async fn extract_delegations(
    logs: &[RawLog],
    receipts: ReceiptFetcher<'_>,
    events: &EventsConfig,
) -> Vec<DelegationRecord> {
    let mut seen: HashSet<(String, u128)> = HashSet::new();
    let mut delegations = Vec::new();

    for tx_hash in unique_tx_hashes(logs) {
        let Some(receipt) = receipts.fetch(tx_hash).await else {
            continue;
        };

        let Some(wallet) = delegating_wallet(tx_hash, &receipt, events) else {
            continue;
        };

        for token_id in transferred_token_ids(tx_hash, &receipt, events) {
            if !seen.insert((wallet.to_string(), token_id)) {
                continue;
            }
            info!(
                "Node delegation - Transaction: {}, Wallet: 0x{}, Token ID: {}",
                tx_hash, wallet, token_id
            );
            delegations.push(DelegationRecord {
                tx_hash: tx_hash.to_string(),
                wallet: wallet.to_string(),
                token_id,
            });
        }
    }

    delegations
}
