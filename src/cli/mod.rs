mod backfill;
mod migrate;
pub mod server;

pub use backfill::*;
pub use migrate::*;
pub use server::*;

use crate::config::Opts;

pub trait SubCommandExtend {
    fn run(&self, opts: &Opts) -> impl std::future::Future<Output = anyhow::Result<()>> + Send;
}
