use thiserror::Error;

/// 全局错误类型
#[derive(Error, Debug)]
pub enum PictorError {
    /// 输入不合法，拒绝于任何写入之前
    #[error("参数错误: {0}")]
    Validation(String),

    /// 操作目标不存在
    #[error("图片不存在: {id}")]
    NotFound { id: String },

    /// 模型后端不可用，调用方自行决定降级或中止
    #[error("模型服务不可用: {0}")]
    ResourceUnavailable(String),

    #[error("数据库错误: {0}")]
    Database(#[from] sqlx::Error),

    #[error("IO 错误: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON 错误: {0}")]
    Json(#[from] serde_json::Error),

    #[error("内部错误: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, PictorError>;
