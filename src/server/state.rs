use std::sync::Arc;

use crate::Catalog;
use crate::cli::server::ServerCommand;
use crate::config::{ModelOptions, SearchOptions};
use crate::lifecycle::ResourceManager;
use crate::tagger::RemoteTagger;

/// 应用状态
pub struct AppState {
    /// 图库目录
    pub catalog: Catalog,
    /// 打标模型生命周期管理器
    pub tagger: Arc<ResourceManager<RemoteTagger>>,
    /// 搜索配置选项
    pub search: SearchOptions,
    /// 模型配置选项
    pub model: ModelOptions,
}

impl AppState {
    /// 创建新的应用状态
    pub fn new(
        catalog: Catalog,
        tagger: Arc<ResourceManager<RemoteTagger>>,
        opts: &ServerCommand,
    ) -> Arc<Self> {
        Arc::new(AppState {
            catalog,
            tagger,
            search: opts.search.clone(),
            model: opts.model.clone(),
        })
    }
}
