use futures::stream::{self, StreamExt};
use tracing::{debug, info, warn};

use crate::blockchains::beam::receipt_cache::ReceiptFetcher;
use crate::blockchains::beam::types::{unique_tx_hashes, LogEntry, RawLog, Receipt};
use crate::core::config::EventsConfig;
use crate::core::utils::{address_from_topic, parse_hex_u128};

/// BEAM staked by a wallet in one transaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StakeRecord {
    pub tx_hash: String,
    pub wallet: String,
    pub amount: u128,
}

/// Hex chars of `0x` + three 32-byte words; the amount is the third word
const FULL_PAYLOAD_LEN: usize = 194;
/// Hex chars of `0x` + one 32-byte word
const SINGLE_WORD_LEN: usize = 66;

fn amount_word(data: &str) -> Option<&str> {
    if data.len() >= FULL_PAYLOAD_LEN {
        data.get(130..194)
    } else if data.len() >= SINGLE_WORD_LEN {
        data.get(2..66)
    } else {
        None
    }
}

fn parse_amount(tx_hash: &str, log: &LogEntry) -> Option<u128> {
    let word = amount_word(&log.data)?;
    match parse_hex_u128(word) {
        Ok(amount) => Some(amount),
        Err(e) => {
            warn!("(Stakes) Could not parse amount in transaction {}: {}", tx_hash, e);
            None
        }
    }
}

/// Stake carried by one receipt, if it has the stake marker.
///
/// Every wallet-transfer entry overwrites the wallet and, when its payload
/// holds one, the amount; the last entry in log order wins.
pub fn stake_from_receipt(
    tx_hash: &str,
    receipt: &Receipt,
    events: &EventsConfig,
) -> Option<StakeRecord> {
    if !receipt.has_event(&events.stake_marker) {
        return None;
    }

    let mut wallet: Option<&str> = None;
    let mut amount: u128 = 0;

    for log in receipt.events(&events.wallet_transfer) {
        let Some(address) = log.topic(3).and_then(address_from_topic) else {
            warn!(
                "(Stakes) Malformed wallet topic in transaction {}: {:?}",
                tx_hash,
                log.topic(3)
            );
            continue;
        };
        wallet = Some(address);
        if let Some(parsed) = parse_amount(tx_hash, log) {
            amount = parsed;
        }
    }

    let wallet = wallet?;
    if amount == 0 {
        debug!("(Stakes) Zero amount for wallet 0x{} in transaction {}", wallet, tx_hash);
        return None;
    }

    Some(StakeRecord {
        tx_hash: tx_hash.to_string(),
        wallet: wallet.to_string(),
        amount,
    })
}

/// Finds BEAM stakes, fetching at most `concurrency` receipts at a time.
///
/// Each transaction is processed once. Results are merged in the order the
/// transactions first appear in `logs`, whatever order the fetches finish in.
pub async fn extract_stakes(
    logs: &[RawLog],
    receipts: ReceiptFetcher<'_>,
    events: &EventsConfig,
    concurrency: usize,
) -> Vec<StakeRecord> {
    let tx_hashes = unique_tx_hashes(logs);
    debug!(
        "(Stakes) Checking {} transaction(s), {} at a time",
        tx_hashes.len(),
        concurrency.max(1)
    );

    let stakes: Vec<StakeRecord> = stream::iter(tx_hashes)
        .map(|tx_hash| async move {
            let receipt = receipts.fetch(tx_hash).await?;
            stake_from_receipt(tx_hash, &receipt, events)
        })
        .buffered(concurrency.max(1))
        .filter_map(|stake| async move { stake })
        .collect()
        .await;

    for stake in &stakes {
        info!(
            "BEAM stake - Transaction: {}, Wallet: 0x{}, BEAM: {}",
            stake.tx_hash, stake.wallet, stake.amount
        );
    }

    stakes
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blockchains::beam::receipt_cache::ReceiptCache;
    use crate::blockchains::beam::testing::{address_topic, log_entry, stake_data, FakeChain};
    use crate::core::config::{STAKE_MARKER_SIGNATURE, WALLET_TRANSFER_SIGNATURE};
    use std::time::Duration;

    const WALLET_2: &str = "0000000000000000000000000000000000000002";
    const WALLET_3: &str = "0000000000000000000000000000000000000003";

    fn marker() -> LogEntry {
        log_entry(&[STAKE_MARKER_SIGNATURE], "0x")
    }

    fn wallet_log(wallet: &str, data: &str) -> LogEntry {
        log_entry(&[WALLET_TRANSFER_SIGNATURE, "0x01", "0x02", &address_topic(wallet)], data)
    }

    fn logs(hashes: &[&str]) -> Vec<RawLog> {
        hashes
            .iter()
            .map(|tx| RawLog {
                transaction_hash: Some(tx.to_string()),
                topics: vec![],
            })
            .collect()
    }

    #[test]
    fn test_full_payload_uses_third_word() {
        let receipt = Receipt { logs: vec![marker(), wallet_log(WALLET_2, &stake_data(100))] };

        let stake = stake_from_receipt("0xB", &receipt, &EventsConfig::default()).unwrap();
        assert_eq!(stake.wallet, WALLET_2);
        assert_eq!(stake.amount, 100);
    }

    #[test]
    fn test_single_word_payload_uses_first_word() {
        let data = format!("0x{:064x}", 42u128);
        let receipt = Receipt { logs: vec![wallet_log(WALLET_2, &data), marker()] };

        let stake = stake_from_receipt("0xB", &receipt, &EventsConfig::default()).unwrap();
        assert_eq!(stake.amount, 42);
    }

    #[test]
    fn test_last_wallet_transfer_wins() {
        let receipt = Receipt {
            logs: vec![
                marker(),
                wallet_log(WALLET_2, &stake_data(100)),
                wallet_log(WALLET_3, &stake_data(300)),
            ],
        };

        let stake = stake_from_receipt("0xB", &receipt, &EventsConfig::default()).unwrap();
        assert_eq!((stake.wallet.as_str(), stake.amount), (WALLET_3, 300));
    }

    #[test]
    fn test_short_payload_keeps_previous_amount() {
        let receipt = Receipt {
            logs: vec![
                marker(),
                wallet_log(WALLET_2, &stake_data(100)),
                wallet_log(WALLET_3, "0x1234"),
            ],
        };

        let stake = stake_from_receipt("0xB", &receipt, &EventsConfig::default()).unwrap();
        assert_eq!((stake.wallet.as_str(), stake.amount), (WALLET_3, 100));
    }

    #[test]
    fn test_unparsable_amount_keeps_previous_value() {
        let garbage = format!("0x{}", "z".repeat(192));
        let receipt = Receipt {
            logs: vec![marker(), wallet_log(WALLET_2, &stake_data(5)), wallet_log(WALLET_2, &garbage)],
        };

        let stake = stake_from_receipt("0xB", &receipt, &EventsConfig::default()).unwrap();
        assert_eq!(stake.amount, 5);
    }

    #[test]
    fn test_no_marker_or_zero_amount_yields_nothing() {
        let events = EventsConfig::default();
        let unmarked = Receipt { logs: vec![wallet_log(WALLET_2, &stake_data(100))] };
        let zero = Receipt { logs: vec![marker(), wallet_log(WALLET_2, &stake_data(0))] };
        let no_wallet = Receipt { logs: vec![marker()] };

        assert!(stake_from_receipt("0xB", &unmarked, &events).is_none());
        assert!(stake_from_receipt("0xB", &zero, &events).is_none());
        assert!(stake_from_receipt("0xB", &no_wallet, &events).is_none());
    }

    fn staking_chain() -> FakeChain {
        let mut chain = FakeChain::new();
        for i in 1..=12u128 {
            let tx = format!("0x{:x}", i);
            let wallet = format!("{:040x}", i % 4 + 1);
            chain = chain
                .with_receipt(&tx, Receipt { logs: vec![marker(), wallet_log(&wallet, &stake_data(i * 10))] })
                .with_receipt_delay(&tx, Duration::from_millis((13 - i as u64) * 2));
        }
        chain
    }

    #[tokio::test]
    async fn test_concurrency_does_not_change_result() {
        let hashes: Vec<String> = (1..=12).map(|i| format!("0x{:x}", i)).collect();
        let mut hash_refs: Vec<&str> = hashes.iter().map(String::as_str).collect();
        hash_refs.extend(["0x1", "0x5"]);
        let logs = logs(&hash_refs);
        let events = EventsConfig::default();

        let serial_chain = staking_chain();
        let serial_cache = ReceiptCache::new();
        let serial =
            extract_stakes(&logs, ReceiptFetcher::new(&serial_chain, &serial_cache), &events, 1).await;

        let parallel_chain = staking_chain();
        let parallel_cache = ReceiptCache::new();
        let parallel =
            extract_stakes(&logs, ReceiptFetcher::new(&parallel_chain, &parallel_cache), &events, 5)
                .await;

        assert_eq!(serial.len(), 12);
        assert_eq!(serial, parallel);
        assert_eq!(parallel_chain.receipt_calls("0x1"), 1);
        assert_eq!(parallel_chain.receipt_calls("0x5"), 1);
    }

    #[tokio::test]
    async fn test_missing_receipts_are_skipped() {
        let chain = FakeChain::new()
            .with_receipt("0xB", Receipt { logs: vec![marker(), wallet_log(WALLET_2, &stake_data(100))] });
        let cache = ReceiptCache::new();

        let stakes = extract_stakes(
            &logs(&["0xMissing", "0xB"]),
            ReceiptFetcher::new(&chain, &cache),
            &EventsConfig::default(),
            3,
        )
        .await;
        assert_eq!(stakes.len(), 1);
        assert_eq!(stakes[0].tx_hash, "0xB");
    }
}
