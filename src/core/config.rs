use serde::Deserialize;

/// Event topic-0 signatures emitted by the staking contracts
pub const WALLET_TRANSFER_SIGNATURE: &str =
    "0xdf91f7709a30fda3fc5fc5dc97cb5d5b05e67e193dccaaef3cb332d23fda83d1";
pub const TOKEN_TRANSFER_SIGNATURE: &str =
    "0xddf252ad1be2c89b69c2b068fc378daa952ba7f163c4a11628f55a4df523b3ef";
pub const STAKE_MARKER_SIGNATURE: &str =
    "0x6e350dd49b060d87f297206fd309234ed43156d890ced0f139ecf704310481d3";

const DEFAULT_CHAIN_PATH: &str = "/ext/bc/2tmrrBo1Lgt1mzzvPSFt73kkQKFas5d1AP88tv9cicwoFp8BSn";

/// Top-level config struct for the report tool
#[derive(Debug, Deserialize, Clone, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub nodes: NodesConfig,
    #[serde(default)]
    pub chain: ChainConfig,
    #[serde(default)]
    pub events: EventsConfig,
    #[serde(default)]
    pub retry: RetryConfig,
}

/// General configuration for a run
#[derive(Debug, Deserialize, Clone)]
pub struct GeneralConfig {
    #[serde(default = "default_rpc_timeout_seconds")]
    pub rpc_timeout_seconds: u64,
    /// Pause after every eth_getLogs call
    #[serde(default = "default_rate_limit_delay_ms")]
    pub rate_limit_delay_ms: u64,
    /// Maximum receipts in flight during stake extraction
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    #[serde(default = "default_log_file")]
    pub log_file: String,
    #[serde(default = "default_output_dir")]
    pub output_dir: String,
    /// JSON lines on stdout instead of plain text
    #[serde(default)]
    pub log_json: bool,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            rpc_timeout_seconds: default_rpc_timeout_seconds(),
            rate_limit_delay_ms: default_rate_limit_delay_ms(),
            concurrency: default_concurrency(),
            log_file: default_log_file(),
            output_dir: default_output_dir(),
            log_json: false,
        }
    }
}

/// Node configuration for JSON-RPC endpoints
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct NodeConfig {
    pub name: String,
    pub url: String,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct NodesConfig {
    #[serde(default)]
    pub rpc: Vec<NodeConfig>,
}

impl NodesConfig {
    /// Puts the node entered at the prompt first, dropping any configured node with the same URL.
    /// The pool calls nodes in this order, so the others are failover only.
    pub fn with_primary(&self, node: NodeConfig) -> Self {
        let mut rpc = vec![node.clone()];
        rpc.extend(
            self.rpc
                .iter()
                .filter(|n| n.url.trim_end_matches('/') != node.url.trim_end_matches('/'))
                .cloned(),
        );
        Self { rpc }
    }
}

/// Paths of the chain's endpoints, relative to a node URL
#[derive(Debug, Deserialize, Clone)]
pub struct ChainConfig {
    #[serde(default = "default_rpc_path")]
    pub rpc_path: String,
    #[serde(default = "default_validators_path")]
    pub validators_path: String,
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            rpc_path: default_rpc_path(),
            validators_path: default_validators_path(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct EventsConfig {
    #[serde(default = "default_wallet_transfer")]
    pub wallet_transfer: String,
    #[serde(default = "default_token_transfer")]
    pub token_transfer: String,
    #[serde(default = "default_stake_marker")]
    pub stake_marker: String,
}

impl Default for EventsConfig {
    fn default() -> Self {
        Self {
            wallet_transfer: default_wallet_transfer(),
            token_transfer: default_token_transfer(),
            stake_marker: default_stake_marker(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetryConfig {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay_ms(),
        }
    }
}

impl AppConfig {
    pub fn from_yaml(config_str: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(config_str)
    }
}

fn default_rpc_timeout_seconds() -> u64 {
    30
}

fn default_rate_limit_delay_ms() -> u64 {
    1000
}

fn default_concurrency() -> usize {
    5
}

fn default_log_file() -> String {
    "validator_report.log".to_string()
}

fn default_output_dir() -> String {
    ".".to_string()
}

fn default_rpc_path() -> String {
    format!("{}/rpc", DEFAULT_CHAIN_PATH)
}

fn default_validators_path() -> String {
    format!("{}/validators", DEFAULT_CHAIN_PATH)
}

fn default_wallet_transfer() -> String {
    WALLET_TRANSFER_SIGNATURE.to_string()
}

fn default_token_transfer() -> String {
    TOKEN_TRANSFER_SIGNATURE.to_string()
}

fn default_stake_marker() -> String {
    STAKE_MARKER_SIGNATURE.to_string()
}

fn default_max_attempts() -> u32 {
    3
}

fn default_base_delay_ms() -> u64 {
    500
}
