pub mod app_context;
pub mod clients;
pub mod config;
pub mod utils;
