use std::convert::Infallible;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::LazyLock;

use clap::Parser;
use directories::ProjectDirs;

use crate::cli::*;

static DATA_DIR: LazyLock<DataDir> = LazyLock::new(|| {
    let proj_dirs = ProjectDirs::from("", "", "pictor").expect("failed to get project dir");
    DataDir { path: proj_dirs.data_dir().to_path_buf() }
});

fn default_data_dir() -> &'static str {
    DATA_DIR.path().to_str().unwrap()
}

#[derive(Parser, Debug, Clone)]
pub struct SearchOptions {
    /// 相似搜索默认返回数量
    #[arg(long, value_name = "N", default_value_t = 20)]
    pub limit: usize,
    /// 重复候选的默认距离阈值
    #[arg(long, value_name = "DIST", default_value_t = 0.2)]
    pub dup_threshold: f32,
    /// 重复候选的默认分组数量上限
    #[arg(long, value_name = "N", default_value_t = 50)]
    pub max_groups: usize,
}

#[derive(Parser, Debug, Clone)]
pub struct ModelOptions {
    /// 模型服务地址，打标和嵌入共用
    #[arg(long, value_name = "URL", default_value = "http://127.0.0.1:8000")]
    pub model_url: String,
    /// 标签预测阈值
    #[arg(long, value_name = "THRESHOLD", default_value_t = 0.35)]
    pub tag_threshold: f32,
    /// 打标模型空闲卸载时间，单位为秒
    #[arg(long, value_name = "SECS", default_value_t = 120)]
    pub tagger_idle_timeout: u64,
}

#[derive(Parser, Debug, Clone)]
#[command(name = "pictor", version)]
pub struct Opts {
    #[command(subcommand)]
    pub subcmd: SubCommand,
    /// pictor 数据目录
    #[arg(short, long, default_value = default_data_dir())]
    pub data_dir: DataDir,
}

#[derive(clap::Subcommand, Debug, Clone)]
pub enum SubCommand {
    /// 启动 HTTP 服务
    Server(ServerCommand),
    /// 建表并导入旧版 JSON 元数据
    Migrate(MigrateCommand),
    /// 为缺失嵌入的图片补算向量
    Backfill(BackfillCommand),
}

/// 数据目录布局
#[derive(Debug, Clone)]
pub struct DataDir {
    path: PathBuf,
}

impl DataDir {
    pub fn path(&self) -> &Path {
        self.path.as_path()
    }

    /// 返回数据库文件的路径
    pub fn database(&self) -> PathBuf {
        self.path.join("gallery.db")
    }

    /// 返回旧版 JSON 元数据目录
    pub fn legacy_metadata(&self) -> PathBuf {
        self.path.join("metadata")
    }

    /// 返回原图目录
    pub fn uploads(&self) -> PathBuf {
        self.path.join("uploads")
    }

    /// 返回某条记录对应的原图路径
    pub fn image_path(&self, filename: &str) -> PathBuf {
        self.uploads().join(filename)
    }
}

impl FromStr for DataDir {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self { path: PathBuf::from(s) })
    }
}
