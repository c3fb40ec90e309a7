use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::sync::{OnceCell, RwLock};
use tracing::{debug, warn};

use crate::blockchains::beam::chain_reader::{ChainReader, ChainReaderError};
use crate::blockchains::beam::types::Receipt;

type Slot = Arc<OnceCell<Option<Arc<Receipt>>>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    pub entries: usize,
    pub lookups: usize,
    pub fetches: usize,
}

/// Transaction hash -> receipt, shared by both extractors for one run.
///
/// Each hash is fetched at most once, even when several tasks ask for it at the
/// same time. A failed fetch leaves the slot empty so a later lookup can retry.
/// Entries are never evicted or replaced.
#[derive(Default)]
pub struct ReceiptCache {
    slots: RwLock<HashMap<String, Slot>>,
    lookups: AtomicUsize,
    fetches: AtomicUsize,
}

impl ReceiptCache {
    pub fn new() -> Self {
        Self::default()
    }

    async fn slot(&self, tx_hash: &str) -> Slot {
        {
            let slots = self.slots.read().await;
            if let Some(slot) = slots.get(tx_hash) {
                return slot.clone();
            }
        }

        let mut slots = self.slots.write().await;
        slots.entry(tx_hash.to_string()).or_default().clone()
    }

    pub async fn get_or_fetch(
        &self,
        reader: &dyn ChainReader,
        tx_hash: &str,
    ) -> Result<Option<Arc<Receipt>>, ChainReaderError> {
        self.lookups.fetch_add(1, Ordering::Relaxed);
        let slot = self.slot(tx_hash).await;

        let receipt = slot
            .get_or_try_init(|| async move {
                self.fetches.fetch_add(1, Ordering::Relaxed);
                debug!("(ReceiptCache) Fetching receipt for {}", tx_hash);
                let receipt = reader.get_transaction_receipt(tx_hash).await?;
                Ok::<_, ChainReaderError>(receipt.map(Arc::new))
            })
            .await?;

        Ok(receipt.clone())
    }

    pub async fn stats(&self) -> CacheStats {
        let entries = self
            .slots
            .read()
            .await
            .values()
            .filter(|slot| slot.initialized())
            .count();
        CacheStats {
            entries,
            lookups: self.lookups.load(Ordering::Relaxed),
            fetches: self.fetches.load(Ordering::Relaxed),
        }
    }
}

/// Receipt lookups for the extractors: cache first, chain on a miss.
///
/// Missing receipts and failed fetches are logged and yield `None`; they never
/// abort the run or sibling lookups.
#[derive(Clone, Copy)]
pub struct ReceiptFetcher<'a> {
    reader: &'a dyn ChainReader,
    cache: &'a ReceiptCache,
}

impl<'a> ReceiptFetcher<'a> {
    pub fn new(reader: &'a dyn ChainReader, cache: &'a ReceiptCache) -> Self {
        Self { reader, cache }
    }

    pub async fn fetch(&self, tx_hash: &str) -> Option<Arc<Receipt>> {
        match self.cache.get_or_fetch(self.reader, tx_hash).await {
            Ok(Some(receipt)) => Some(receipt),
            Ok(None) => {
                warn!("(ReceiptCache) No receipt for transaction {}, skipping", tx_hash);
                None
            }
            Err(e) => {
                warn!(
                    "(ReceiptCache) Failed to fetch receipt for transaction {}: {}",
                    tx_hash, e
                );
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blockchains::beam::testing::FakeChain;
    use crate::blockchains::beam::types::LogEntry;

    fn receipt() -> Receipt {
        Receipt {
            logs: vec![LogEntry {
                topics: vec!["0x01".to_string()],
                data: "0x".to_string(),
            }],
        }
    }

    #[tokio::test]
    async fn test_fetches_each_hash_once() {
        let chain = FakeChain::new().with_receipt("0xA", receipt());
        let cache = ReceiptCache::new();

        let first = cache.get_or_fetch(&chain, "0xA").await.unwrap();
        let second = cache.get_or_fetch(&chain, "0xA").await.unwrap();

        assert_eq!(first, second);
        assert_eq!(chain.receipt_calls("0xA"), 1);
        assert_eq!(
            cache.stats().await,
            CacheStats { entries: 1, lookups: 2, fetches: 1 }
        );
    }

    #[tokio::test]
    async fn test_concurrent_lookups_share_one_fetch() {
        let chain = FakeChain::new().with_receipt("0xA", receipt());
        let cache = ReceiptCache::new();

        let lookups = (0..8).map(|_| cache.get_or_fetch(&chain, "0xA"));
        let results = futures::future::join_all(lookups).await;

        assert!(results.iter().all(|r| matches!(r, Ok(Some(_)))));
        assert_eq!(chain.receipt_calls("0xA"), 1);
    }

    #[tokio::test]
    async fn test_missing_receipt_is_memoized() {
        let chain = FakeChain::new();
        let cache = ReceiptCache::new();

        assert!(cache.get_or_fetch(&chain, "0xB").await.unwrap().is_none());
        assert!(cache.get_or_fetch(&chain, "0xB").await.unwrap().is_none());
        assert_eq!(chain.receipt_calls("0xB"), 1);
    }

    #[tokio::test]
    async fn test_failed_fetch_is_retried() {
        let chain = FakeChain::new()
            .with_receipt("0xC", receipt())
            .failing_once("0xC");
        let cache = ReceiptCache::new();

        assert!(cache.get_or_fetch(&chain, "0xC").await.is_err());
        assert!(cache.get_or_fetch(&chain, "0xC").await.unwrap().is_some());
        assert_eq!(chain.receipt_calls("0xC"), 2);
    }

    #[tokio::test]
    async fn test_fetcher_swallows_failures() {
        let chain = FakeChain::new().failing_once("0xD");
        let cache = ReceiptCache::new();
        let fetcher = ReceiptFetcher::new(&chain, &cache);

        assert!(fetcher.fetch("0xD").await.is_none());
        assert!(fetcher.fetch("0xE").await.is_none());
    }
}
