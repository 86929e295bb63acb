pub mod cli;
pub mod config;
pub mod import;
pub mod metrics;
pub mod parser;
pub mod source;
pub mod storage;
