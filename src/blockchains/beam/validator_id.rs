use thiserror::Error;

const CHECKSUM_LEN: usize = 4;
const NODE_ID_PREFIX: &str = "NodeID-";

#[derive(Debug, Error, PartialEq)]
pub enum ValidatorIdError {
    #[error("Invalid Base58 string: {0}")]
    Decode(String),

    #[error("Decoded identifier is {0} byte(s), expected at least {CHECKSUM_LEN}")]
    TooShort(usize),
}

/// Decode a Base58 validation id and hex-encode it without its 4-byte checksum
pub fn convert_validation_id(validation_id: &str) -> Result<String, ValidatorIdError> {
    let decoded = bs58::decode(validation_id)
        .into_vec()
        .map_err(|e| ValidatorIdError::Decode(e.to_string()))?;

    if decoded.len() < CHECKSUM_LEN {
        return Err(ValidatorIdError::TooShort(decoded.len()));
    }

    let payload = &decoded[..decoded.len() - CHECKSUM_LEN];
    Ok(format!("0x{}", hex::encode(payload)))
}

/// `abc` -> `NodeID-abc`; already prefixed ids are returned as is
pub fn normalize_node_id(node_id: &str) -> String {
    let node_id = node_id.trim();
    if node_id.starts_with(NODE_ID_PREFIX) {
        node_id.to_string()
    } else {
        format!("{}{}", NODE_ID_PREFIX, node_id)
    }
}

/// Node id without its `NodeID-` prefix, used to name report files
pub fn short_node_id(node_id: &str) -> &str {
    let node_id = node_id.trim();
    node_id.strip_prefix(NODE_ID_PREFIX).unwrap_or(node_id)
}
