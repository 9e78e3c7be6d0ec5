use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use futures::FutureExt;
use log::info;
use tokio::net::TcpListener;

use crate::cli::SubCommandExtend;
use crate::config::{ModelOptions, Opts, SearchOptions};
use crate::db::init_db;
use crate::embed::RemoteEmbedder;
use crate::lifecycle::ResourceManager;
use crate::tagger::RemoteTagger;
use crate::{Catalog, server};

#[derive(Parser, Debug, Clone)]
pub struct ServerCommand {
    #[command(flatten)]
    pub search: SearchOptions,
    #[command(flatten)]
    pub model: ModelOptions,
    /// 监听地址
    #[arg(long, default_value = "127.0.0.1:8100")]
    pub addr: String,
}

impl SubCommandExtend for ServerCommand {
    async fn run(&self, opts: &Opts) -> anyhow::Result<()> {
        tokio::fs::create_dir_all(opts.data_dir.path()).await?;
        let db = init_db(opts.data_dir.database()).await?;

        let embedder = Arc::new(RemoteEmbedder::new(self.model.model_url.clone()));
        let catalog = Catalog::new(db, opts.data_dir.clone(), embedder);
        catalog.ensure_initialized().await?;

        // 打标模型惰性加载，空闲超时后卸载
        let model_url = self.model.model_url.clone();
        let tagger = ResourceManager::new(
            Duration::from_secs(self.model.tagger_idle_timeout),
            move || {
                let model_url = model_url.clone();
                async move { RemoteTagger::connect(&model_url).await }.boxed()
            },
        );

        // 创建应用状态
        let state = server::AppState::new(catalog, tagger, self);

        // 创建应用
        let app = server::create_app(state);

        info!("starting server at http://{}", &self.addr);
        let listener = TcpListener::bind(&self.addr).await?;
        axum::serve(listener, app).await?;
        Ok(())
    }
}
