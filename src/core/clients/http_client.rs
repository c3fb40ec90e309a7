use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use reqwest::{Client, ClientBuilder, StatusCode};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use super::path::Path;
use crate::core::config::RetryConfig;

/// Check if an HTTP status code represents a transient (retryable) error
fn is_transient_error(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS
        || (status.as_u16() >= 500 && status.as_u16() < 600)
}

/// Check if an HTTP status code represents a permanent (non-retryable) error
fn is_permanent_error(status: StatusCode) -> bool {
    status.as_u16() >= 400 && status.as_u16() < 500 && status != StatusCode::TOO_MANY_REQUESTS
}

/// Extract retry-after delay from response headers (for 429 rate limiting)
fn extract_retry_after(res: &reqwest::Response) -> Option<Duration> {
    res.headers()
        .get("retry-after")
        .and_then(|h| h.to_str().ok())
        .and_then(|s| s.parse::<u64>().ok())
        .map(Duration::from_secs)
}

/// After this many consecutive failures, temporarily exclude node
const CIRCUIT_BREAKER_THRESHOLD: usize = 5;
const CIRCUIT_BREAKER_DURATION: Duration = Duration::from_secs(60);

#[derive(Debug, Clone)]
struct Node {
    name: String,
    url: String,
    consecutive_failures: usize,
    circuit_breaker_until: Option<Instant>,
}

impl Node {
    fn new(name: String, url: String) -> Self {
        Node {
            name,
            url: url.trim_end_matches('/').to_string(),
            consecutive_failures: 0,
            circuit_breaker_until: None,
        }
    }

    fn available(&self, now: Instant) -> bool {
        self.circuit_breaker_until
            .map(|until| now > until)
            .unwrap_or(true)
    }
}

#[derive(Debug, Error)]
pub enum NodePoolErrors {
    #[error("Reqwest error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("Request to {url} rejected with status {status}")]
    Rejected { url: String, status: u16 },

    #[error("No healthy nodes to call for: {0}")]
    NoHealthyNodes(String),
}

/// Bounded exponential backoff with jitter
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl RetryPolicy {
    fn attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }

    fn backoff(&self, attempt: u32, rng: &mut SmallRng) -> Duration {
        let exp = self.base_delay.saturating_mul(2u32.saturating_pow(attempt));
        let jitter_ms = self.base_delay.as_millis() as u64 / 2;
        let jitter = if jitter_ms > 0 {
            Duration::from_millis(rng.random_range(0..=jitter_ms))
        } else {
            Duration::ZERO
        };
        exp + jitter
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts,
            base_delay: Duration::from_millis(config.base_delay_ms),
        }
    }
}

///
/// NodePool sends JSON-RPC calls to the first healthy node, retrying
/// transient failures and failing over past nodes that keep failing
///
pub struct NodePool {
    nodes: Arc<RwLock<Vec<Node>>>,
    client: Client,
    retry: RetryPolicy,
}

impl NodePool {
    ///
    /// Accepts pairs of <name, base url>
    ///
    pub fn new(
        urls: Vec<(String, String)>,
        retry: RetryPolicy,
        timeout: Option<Duration>,
    ) -> Option<Self> {
        if urls.is_empty() {
            return None;
        }

        let http_timeout = timeout.unwrap_or(Duration::from_secs(30));
        let client = ClientBuilder::new().timeout(http_timeout).build().ok()?;

        let nodes: Vec<Node> = urls
            .into_iter()
            .map(|(name, url)| Node::new(name, url))
            .collect();

        Some(Self {
            nodes: Arc::new(RwLock::new(nodes)),
            client,
            retry,
        })
    }

    /// First node in config order whose circuit breaker is closed. When every
    /// node is benched, the one whose breaker reopens soonest is tried anyway,
    /// so a lone node is never locked out for the rest of a run.
    async fn pick_node(&self) -> Option<(String, String)> {
        let nodes = self.nodes.read().await;
        let now = Instant::now();
        let node = match nodes.iter().find(|n| n.available(now)) {
            Some(node) => node,
            None => {
                let node = nodes.iter().min_by_key(|n| n.circuit_breaker_until)?;
                warn!(
                    "(NodePool) All nodes are benched, trying {} ({}) anyway",
                    node.name, node.url
                );
                node
            }
        };
        Some((node.url.clone(), node.name.clone()))
    }

    async fn record_failure(&self, node_url: &str) {
        let mut nodes = self.nodes.write().await;
        if let Some(node) = nodes.iter_mut().find(|n| n.url == node_url) {
            node.consecutive_failures += 1;
            if node.consecutive_failures >= CIRCUIT_BREAKER_THRESHOLD {
                node.circuit_breaker_until = Some(Instant::now() + CIRCUIT_BREAKER_DURATION);
                warn!(
                    "(NodePool) Node {} ({}) circuit breaker activated for {}s ({} consecutive failures)",
                    node.name,
                    node.url,
                    CIRCUIT_BREAKER_DURATION.as_secs(),
                    node.consecutive_failures
                );
            }
        }
    }

    async fn record_success(&self, node_url: &str) {
        let mut nodes = self.nodes.write().await;
        if let Some(node) = nodes.iter_mut().find(|n| n.url == node_url) {
            if node.consecutive_failures > 0 {
                debug!(
                    "(NodePool) Node {} ({}) recovered from {} consecutive failures",
                    node.name, node.url, node.consecutive_failures
                );
                node.consecutive_failures = 0;
                node.circuit_breaker_until = None;
            }
        }
    }

    pub async fn post<T: serde::Serialize + ?Sized>(
        &self,
        path: Path,
        body: &T,
    ) -> Result<String, NodePoolErrors> {
        debug!("Making POST call to {}", path);

        let mut rng = SmallRng::from_os_rng();
        let attempts = self.retry.attempts();

        for attempt in 0..attempts {
            let last_attempt = attempt + 1 == attempts;

            let Some((node_url, node_name)) = self.pick_node().await else {
                debug!(
                    "(NodePool) No healthy nodes available for POST {} (attempt {}/{})",
                    path,
                    attempt + 1,
                    attempts
                );
                if !last_attempt {
                    tokio::time::sleep(self.retry.backoff(attempt, &mut rng)).await;
                }
                continue;
            };

            let url = path.on_node(&node_url);

            match self.client.post(&url).json(body).send().await {
                Ok(res) => {
                    let status = res.status();

                    if status == StatusCode::TOO_MANY_REQUESTS {
                        let retry_after = extract_retry_after(&res)
                            .unwrap_or_else(|| self.retry.backoff(attempt, &mut rng));
                        warn!(
                            "(NodePool) {} Rate limited (429) for POST {}. Retry after {}ms",
                            node_name,
                            url,
                            retry_after.as_millis()
                        );
                        if !last_attempt {
                            tokio::time::sleep(retry_after).await;
                        }
                        continue;
                    }

                    if is_transient_error(status) {
                        warn!(
                            "(NodePool) {} Transient error ({}) for POST {} (attempt {}/{})",
                            node_name,
                            status.as_u16(),
                            url,
                            attempt + 1,
                            attempts
                        );
                        self.record_failure(&node_url).await;
                        if !last_attempt {
                            tokio::time::sleep(self.retry.backoff(attempt, &mut rng)).await;
                        }
                        continue;
                    }

                    if is_permanent_error(status) {
                        warn!(
                            "(NodePool) {} Permanent error ({}) for POST {}",
                            node_name,
                            status.as_u16(),
                            url
                        );
                        return Err(NodePoolErrors::Rejected {
                            url,
                            status: status.as_u16(),
                        });
                    }

                    let text = res.text().await?;
                    self.record_success(&node_url).await;
                    return Ok(text);
                }
                Err(e) => {
                    warn!(
                        "(NodePool) {} Network error for POST {}: {} (attempt {}/{})",
                        node_name,
                        url,
                        e,
                        attempt + 1,
                        attempts
                    );
                    self.record_failure(&node_url).await;
                    if !last_attempt {
                        tokio::time::sleep(self.retry.backoff(attempt, &mut rng)).await;
                    }
                }
            }
        }

        warn!(
            "(NodePool) Giving up on POST {} after {} attempt(s)",
            path, attempts
        );
        Err(NodePoolErrors::NoHealthyNodes(path.to_string()))
    }
}
