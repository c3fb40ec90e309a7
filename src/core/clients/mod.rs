pub mod http_client;
pub mod path;
