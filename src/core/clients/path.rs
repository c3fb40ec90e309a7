use std::fmt::{Display, Formatter};

/// Endpoint path relative to a node's base URL, e.g. `/ext/bc/<chain>/rpc`.
/// Always starts with '/'.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Path(String);

impl Path {
    fn normalized(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.starts_with('/') {
            Path(trimmed.to_string())
        } else {
            Path(format!("/{}", trimmed))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Full URL of this path on the node at `node_url`
    pub fn on_node(&self, node_url: &str) -> String {
        format!("{}{}", node_url.trim_end_matches('/'), self.0)
    }
}

impl Display for Path {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Path {
    fn from(path: &str) -> Self {
        Path::normalized(path)
    }
}

impl From<&String> for Path {
    fn from(path: &String) -> Self {
        Path::normalized(path)
    }
}
