use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde_json::ser::PrettyFormatter;
use thiserror::Error;
use tracing::{info, warn};

use crate::blockchains::beam::delegations::DelegationRecord;
use crate::blockchains::beam::stakes::StakeRecord;

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("Could not serialize report: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Could not write report to {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Groups values by wallet, keeping wallets in order of first appearance
fn group_by_wallet<T>(items: impl IntoIterator<Item = (String, T)>) -> Vec<(String, Vec<T>)> {
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut groups: Vec<(String, Vec<T>)> = Vec::new();

    for (wallet, item) in items {
        match index.get(&wallet) {
            Some(&i) => groups[i].1.push(item),
            None => {
                index.insert(wallet.clone(), groups.len());
                groups.push((wallet, vec![item]));
            }
        }
    }

    groups
}

/// Adds BEAM amounts; a sum past 128 bits is pinned at `u128::MAX` with a warning
fn add_beam(total: u128, amount: u128, what: &str) -> u128 {
    total.checked_add(amount).unwrap_or_else(|| {
        warn!("(Report) {} overflows 128 bits, capped at {}", what, u128::MAX);
        u128::MAX
    })
}

/// Shared behaviour of the per-wallet reports
pub trait WalletReport: Serialize {
    /// Suffix of the report file name
    const KIND: &'static str;

    fn log_summary(&self);

    fn file_name(node: &str) -> String {
        format!("{}_validator_report_{}.json", node, Self::KIND)
    }
}

#[derive(Debug, Serialize, PartialEq)]
pub struct WalletNodes {
    pub wallet: String,
    pub nodes: Vec<String>,
    pub total_nodes: usize,
}

#[derive(Debug, Serialize, PartialEq)]
pub struct DelegationReport {
    pub nodes_per_wallet: Vec<WalletNodes>,
    pub total_nodes: usize,
}

impl DelegationReport {
    pub fn from_records(records: &[DelegationRecord]) -> Self {
        let grouped = group_by_wallet(
            records
                .iter()
                .map(|r| (r.wallet.clone(), r.token_id.to_string())),
        );

        let nodes_per_wallet: Vec<WalletNodes> = grouped
            .into_iter()
            .map(|(wallet, nodes)| WalletNodes {
                wallet: format!("0x{}", wallet),
                total_nodes: nodes.len(),
                nodes,
            })
            .collect();
        let total_nodes = nodes_per_wallet.iter().map(|e| e.total_nodes).sum();

        Self {
            nodes_per_wallet,
            total_nodes,
        }
    }
}

impl WalletReport for DelegationReport {
    const KIND: &'static str = "delegations";

    fn log_summary(&self) {
        info!("Node Delegations Report:");
        for entry in &self.nodes_per_wallet {
            info!("Wallet: {}", entry.wallet);
            info!("Nodes: {}", entry.nodes.join(", "));
            info!("Total Nodes: {}", entry.total_nodes);
            info!("---");
        }
        info!("Total Nodes (all wallets): {}", self.total_nodes);
    }
}

#[derive(Debug, Serialize, PartialEq)]
pub struct StakeEntry {
    pub transaction: String,
    pub amount: u128,
}

#[derive(Debug, Serialize, PartialEq)]
pub struct WalletStakes {
    pub wallet: String,
    pub stakes: Vec<StakeEntry>,
    pub total_beam: u128,
}

#[derive(Debug, Serialize, PartialEq)]
pub struct StakeReport {
    pub stakes_per_wallet: Vec<WalletStakes>,
    pub validator_stake: u128,
    /// Sum over all wallets plus the validator's own stake
    pub total_beam: u128,
}

impl StakeReport {
    pub fn from_records(records: &[StakeRecord], validator_stake: u128) -> Self {
        let grouped = group_by_wallet(records.iter().map(|r| {
            (
                r.wallet.clone(),
                StakeEntry {
                    transaction: r.tx_hash.clone(),
                    amount: r.amount,
                },
            )
        }));

        let stakes_per_wallet: Vec<WalletStakes> = grouped
            .into_iter()
            .map(|(wallet, stakes)| {
                let wallet = format!("0x{}", wallet);
                let what = format!("Total BEAM of {}", wallet);
                WalletStakes {
                    total_beam: stakes
                        .iter()
                        .fold(0u128, |acc, s| add_beam(acc, s.amount, &what)),
                    wallet,
                    stakes,
                }
            })
            .collect();
        let total_beam = stakes_per_wallet.iter().fold(validator_stake, |acc, e| {
            add_beam(acc, e.total_beam, "Total BEAM (including validator)")
        });

        Self {
            stakes_per_wallet,
            validator_stake,
            total_beam,
        }
    }
}

impl WalletReport for StakeReport {
    const KIND: &'static str = "stakes";

    fn log_summary(&self) {
        info!("BEAM Stakes Report:");
        for entry in &self.stakes_per_wallet {
            info!("Wallet: {}", entry.wallet);
            for stake in &entry.stakes {
                info!("Transaction: {}, BEAM: {}", stake.transaction, stake.amount);
            }
            info!("Total BEAM: {}", entry.total_beam);
            info!("---");
        }
        info!("Validator Stake: {} BEAM", self.validator_stake);
        info!("Total BEAM (including validator): {}", self.total_beam);
    }
}

/// Pretty-printed with a 4-space indent
pub fn to_json<R: Serialize>(report: &R) -> Result<Vec<u8>, ReportError> {
    let mut buf = Vec::new();
    let formatter = PrettyFormatter::with_indent(b"    ");
    let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
    report.serialize(&mut ser)?;
    Ok(buf)
}

/// Logs the report, writes it to `<output_dir>/<node>_validator_report_<kind>.json`
/// and returns the path written
pub fn save_report<R: WalletReport>(
    report: &R,
    output_dir: &Path,
    node: &str,
) -> Result<PathBuf, ReportError> {
    report.log_summary();

    let path = output_dir.join(R::file_name(node));
    let json = to_json(report)?;
    fs::create_dir_all(output_dir)
        .and_then(|_| fs::write(&path, json))
        .map_err(|source| ReportError::Write {
            path: path.clone(),
            source,
        })?;

    info!("Report saved to: {}", path.display());
    Ok(path)
}
