use crate::core::clients::http_client::NodePool;
use crate::core::config::AppConfig;
use std::sync::Arc;

pub struct AppContext {
    pub config: AppConfig,
    pub rpc: Arc<NodePool>,
}

impl AppContext {
    pub fn new(config: AppConfig, rpc: Arc<NodePool>) -> Self {
        Self { config, rpc }
    }
}
