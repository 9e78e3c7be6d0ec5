pub mod catalog;
pub mod cli;
pub mod config;
pub mod db;
pub mod dedup;
pub mod embed;
pub mod error;
pub mod lifecycle;
mod metrics;
mod server;
pub mod similar;
pub mod tagger;
pub mod vector;

pub use catalog::Catalog;
pub use config::Opts;
