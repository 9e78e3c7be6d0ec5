use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use indicatif::ProgressBar;
use serde_json::json;

use crate::Catalog;
use crate::cli::SubCommandExtend;
use crate::config::Opts;
use crate::db::init_db;
use crate::embed::RemoteEmbedder;

#[derive(Parser, Debug, Clone)]
pub struct MigrateCommand {}

impl SubCommandExtend for MigrateCommand {
    async fn run(&self, opts: &Opts) -> anyhow::Result<()> {
        tokio::fs::create_dir_all(opts.data_dir.path()).await?;
        let db = init_db(opts.data_dir.database()).await?;

        // 迁移不计算嵌入，嵌入由 backfill 补算
        let embedder = Arc::new(RemoteEmbedder::new("http://127.0.0.1:0"));
        let catalog = Catalog::new(db, opts.data_dir.clone(), embedder);

        let pb = ProgressBar::new_spinner().with_message("正在导入旧版元数据");
        pb.enable_steady_tick(Duration::from_millis(100));
        let imported = catalog.ensure_initialized().await?;
        pb.finish_and_clear();

        println!("{}", json!({ "imported": imported }));
        Ok(())
    }
}
