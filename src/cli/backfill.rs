use std::sync::Arc;

use clap::Parser;

use crate::Catalog;
use crate::cli::SubCommandExtend;
use crate::config::{ModelOptions, Opts};
use crate::db::init_db;
use crate::embed::RemoteEmbedder;

#[derive(Parser, Debug, Clone)]
pub struct BackfillCommand {
    #[command(flatten)]
    pub model: ModelOptions,
}

impl SubCommandExtend for BackfillCommand {
    async fn run(&self, opts: &Opts) -> anyhow::Result<()> {
        tokio::fs::create_dir_all(opts.data_dir.path()).await?;
        let db = init_db(opts.data_dir.database()).await?;

        let embedder = Arc::new(RemoteEmbedder::new(self.model.model_url.clone()));
        let catalog = Catalog::new(db, opts.data_dir.clone(), embedder);
        catalog.ensure_initialized().await?;

        let report = catalog.backfill_embeddings().await?;
        println!("{}", serde_json::to_string_pretty(&report)?);
        Ok(())
    }
}
