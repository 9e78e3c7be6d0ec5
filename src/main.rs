use clap::Parser;
use pictor::cli::SubCommandExtend;
use pictor::config::{Opts, SubCommand};

#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();

    let opts = Opts::parse();
    match &opts.subcmd {
        SubCommand::Server(cmd) => cmd.run(&opts).await,
        SubCommand::Migrate(cmd) => cmd.run(&opts).await,
        SubCommand::Backfill(cmd) => cmd.run(&opts).await,
    }
}
