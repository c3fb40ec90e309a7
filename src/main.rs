use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context};
use inquire::{CustomType, Select, Text};
use tracing::{error, info};

use beam_validator_report::blockchains::beam::validator_report::{OperationMode, ValidatorReporter};
use beam_validator_report::core::app_context::AppContext;
use beam_validator_report::core::clients::http_client::{NodePool, RetryPolicy};
use beam_validator_report::core::config::{AppConfig, NodeConfig};
use beam_validator_report::internal::logger;

const CONFIG_ENV: &str = "VALIDATOR_REPORT_CONFIG";
const DEFAULT_CONFIG_PATH: &str = "config.yaml";

/// Answers collected at the prompts
struct Inputs {
    host: String,
    port: u16,
    node_id: String,
    mode: OperationMode,
    validator_stake: u128,
}

#[tokio::main]
async fn main() {
    // It's okay if .env doesn't exist
    let _ = dotenv::dotenv();

    let config = match load_config() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("Failed to load config: {:#}", err);
            std::process::exit(1);
        }
    };

    if let Err(err) = logger::init(&config.general.log_file, config.general.log_json) {
        eprintln!("Failed to initialize logging: {:#}", err);
        std::process::exit(1);
    }

    info!(
        "[main] beam-validator-report {} (commit {}, built {})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_COMMIT_HASH"),
        env!("BUILD_DATE")
    );

    if let Err(err) = run(config).await {
        error!("Run failed:");
        for (i, cause) in err.chain().enumerate() {
            error!("  {}: {}", i, cause);
        }
        std::process::exit(1);
    }
}

/// `--config <file>` wins, then the environment, then `config.yaml` if present.
/// Without any file every setting takes its default.
fn load_config() -> anyhow::Result<AppConfig> {
    let mut args = std::env::args().skip(1);
    let mut explicit: Option<String> = None;
    while let Some(arg) = args.next() {
        if arg == "--config" {
            match args.next() {
                Some(path) => explicit = Some(path),
                None => bail!("--config flag provided but no file specified"),
            }
        }
    }

    let path = match explicit.or_else(|| std::env::var(CONFIG_ENV).ok()) {
        Some(path) => path,
        None if Path::new(DEFAULT_CONFIG_PATH).exists() => DEFAULT_CONFIG_PATH.to_string(),
        None => return Ok(AppConfig::default()),
    };

    let config_str =
        fs::read_to_string(&path).with_context(|| format!("Failed to read {}", path))?;
    AppConfig::from_yaml(&config_str).with_context(|| format!("Failed to parse {}", path))
}

fn prompt_inputs() -> anyhow::Result<Inputs> {
    let host = Text::new("Node IP address:")
        .with_default("127.0.0.1")
        .prompt()?;
    let port = CustomType::<u16>::new("Node port:")
        .with_default(9650)
        .with_error_message("Please enter a valid port number")
        .prompt()?;

    let node_id = Text::new("Validator Node-ID:")
        .with_help_message("e.g., NodeID-7Xhw2mDxuDS44j42TCB6U5579esbSt3Lg")
        .prompt()?;
    let node_id = node_id.trim().to_string();
    if node_id.is_empty() {
        bail!("Node-ID must not be empty");
    }

    let mode = Select::new("What should be reported?", OperationMode::ALL.to_vec()).prompt()?;

    let validator_stake = if mode.includes_stakes() {
        CustomType::<u128>::new("Validator's own stake in BEAM:")
            .with_default(0)
            .with_error_message("Please enter a whole number of BEAM")
            .prompt()?
    } else {
        0
    };

    Ok(Inputs {
        host: host.trim().to_string(),
        port,
        node_id,
        mode,
        validator_stake,
    })
}

async fn run(config: AppConfig) -> anyhow::Result<()> {
    let inputs = prompt_inputs().context("Could not read input")?;

    let nodes = config.nodes.with_primary(NodeConfig {
        name: "prompt".to_string(),
        url: format!("http://{}:{}", inputs.host, inputs.port),
    });
    info!(
        "[main] Using {} RPC node(s), calls go to {} while it is healthy",
        nodes.rpc.len(),
        nodes.rpc[0].url
    );

    let rpc_nodes: Vec<(String, String)> = nodes
        .rpc
        .iter()
        .map(|n| (n.name.clone(), n.url.clone()))
        .collect();
    let rpc_timeout = Duration::from_secs(config.general.rpc_timeout_seconds);
    let rpc_pool = NodePool::new(rpc_nodes, RetryPolicy::from(&config.retry), Some(rpc_timeout))
        .context("Could not create RPC node pool")?;

    let app_context = AppContext::new(config, Arc::new(rpc_pool));
    let reporter = ValidatorReporter::from_context(&app_context);

    let outcome = reporter
        .run(&inputs.node_id, inputs.mode, inputs.validator_stake)
        .await?;

    for path in outcome
        .delegations
        .iter()
        .map(|(_, p)| p)
        .chain(outcome.stakes.iter().map(|(_, p)| p))
    {
        info!("[main] Wrote {}", path.display());
    }
    Ok(())
}
