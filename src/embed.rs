//! 嵌入管线：图片路径 → D 维向量
//!
//! 失败以错误值返回而不是向上抛出致命错误，调用方约定降级为零向量哨兵

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;
use tokio::sync::OnceCell;

use crate::vector::VECTOR_DIM;

#[derive(Error, Debug)]
pub enum EmbedError {
    #[error("图片文件不存在: {0}")]
    FileMissing(PathBuf),

    #[error("嵌入模型后端错误: {0}")]
    Backend(String),

    #[error("嵌入维度错误: 期望 {expected}，得到 {actual}")]
    Dimension { expected: usize, actual: usize },
}

impl From<reqwest::Error> for EmbedError {
    fn from(err: reqwest::Error) -> Self {
        EmbedError::Backend(err.to_string())
    }
}

/// 嵌入模型边界能力
#[async_trait]
pub trait Embedder: Send + Sync {
    /// 计算图片的嵌入向量，长度恒为 [`VECTOR_DIM`]
    async fn encode(&self, path: &Path) -> Result<Vec<f32>, EmbedError>;
}

#[derive(Deserialize)]
struct EmbedResponse {
    #[serde(default)]
    vector: Vec<f32>,
}

/// 通过 HTTP 调用嵌入模型服务
///
/// 客户端惰性创建一次后共享。嵌入相比打标便宜，不做空闲卸载，
/// 重量级资源的生命周期管理见 [`crate::lifecycle`]
pub struct RemoteEmbedder {
    base_url: String,
    client: OnceCell<reqwest::Client>,
}

impl RemoteEmbedder {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self { base_url: base_url.into(), client: OnceCell::new() }
    }

    async fn client(&self) -> &reqwest::Client {
        self.client.get_or_init(|| async { reqwest::Client::new() }).await
    }
}

#[async_trait]
impl Embedder for RemoteEmbedder {
    async fn encode(&self, path: &Path) -> Result<Vec<f32>, EmbedError> {
        if !path.exists() {
            return Err(EmbedError::FileMissing(path.to_path_buf()));
        }

        let url = format!("{}/embed", self.base_url);
        let resp = self
            .client()
            .await
            .post(&url)
            .json(&serde_json::json!({ "path": path }))
            .send()
            .await?
            .error_for_status()?;
        let body: EmbedResponse = resp.json().await?;

        if body.vector.len() != VECTOR_DIM {
            return Err(EmbedError::Dimension { expected: VECTOR_DIM, actual: body.vector.len() });
        }
        Ok(body.vector)
    }
}
