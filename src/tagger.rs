//! 打标模型边界：图片字节 → 标签列表

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TagError {
    #[error("打标模型后端错误: {0}")]
    Backend(String),
}

impl From<reqwest::Error> for TagError {
    fn from(err: reqwest::Error) -> Self {
        TagError::Backend(err.to_string())
    }
}

/// 打标模型边界能力，失败返回错误，由调用方决定降级
#[async_trait]
pub trait Tagger: Send + Sync {
    async fn predict(&self, image: &[u8], threshold: f32) -> Result<Vec<String>, TagError>;
}

#[derive(Deserialize)]
struct TagResponse {
    #[serde(default)]
    tags: Vec<String>,
}

/// 通过 HTTP 调用打标模型服务
pub struct RemoteTagger {
    base_url: String,
    client: reqwest::Client,
}

impl RemoteTagger {
    /// 连接打标服务，连接失败时返回错误让加载方快速失败
    pub async fn connect(base_url: &str) -> anyhow::Result<Self> {
        let client = reqwest::Client::new();
        // 探测一次服务可达性，状态码不限，只要求服务在线
        client.get(base_url).send().await?;
        Ok(Self { base_url: base_url.to_string(), client })
    }
}

#[async_trait]
impl Tagger for RemoteTagger {
    async fn predict(&self, image: &[u8], threshold: f32) -> Result<Vec<String>, TagError> {
        let part = reqwest::multipart::Part::bytes(image.to_vec()).file_name("image");
        let form = reqwest::multipart::Form::new()
            .part("file", part)
            .text("threshold", threshold.to_string());

        let url = format!("{}/tag", self.base_url);
        let resp = self.client.post(&url).multipart(form).send().await?.error_for_status()?;
        let body: TagResponse = resp.json().await?;

        // 后端约定用 ["error"] 标记预测失败
        if body.tags.as_slice() == ["error"] {
            return Err(TagError::Backend("模型预测失败".to_string()));
        }
        Ok(body.tags)
    }
}
