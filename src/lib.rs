pub mod blockchains;
pub mod core;
pub mod internal;
