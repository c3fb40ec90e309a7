pub mod chain_reader;
pub mod delegations;
pub mod receipt_cache;
pub mod report;
pub mod stakes;
pub mod types;
pub mod validator_id;
pub mod validator_report;

#[cfg(test)]
pub(crate) mod testing;
