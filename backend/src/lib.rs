pub mod bootstrap;
pub mod config;
pub mod db;
pub mod fixing;
pub mod history;
pub mod ingest;
pub mod metrics;
pub mod publish;
pub mod quotes;

pub mod error;
pub mod time;
