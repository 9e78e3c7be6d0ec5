use axum::body::Bytes;
use axum_typed_multipart::TryFromMultipart;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::catalog::NewImage;
use crate::db::ImageItem;
use crate::similar::SimilarImage;

/// 新建图片请求
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateImageRequest {
    /// 记录 id，不填则使用毫秒时间戳
    pub id: Option<String>,
    pub filename: String,
    pub thumbnail: String,
    pub original_name: String,
    #[serde(default)]
    pub tags: Vec<String>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    #[serde(default)]
    pub notes: String,
    /// 创建时间，不填则使用当前时间
    pub created_at: Option<String>,
    /// 原图路径，存在时同步计算嵌入
    pub source_path: Option<String>,
}

impl CreateImageRequest {
    pub fn into_new_image(self, id: String, created_at: String) -> NewImage {
        NewImage {
            id,
            filename: self.filename,
            thumbnail: self.thumbnail,
            original_name: self.original_name,
            tags: self.tags,
            width: self.width,
            height: self.height,
            notes: self.notes,
            created_at,
        }
    }
}

/// 部分更新请求，缺省的字段保持不变
#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateImageRequest {
    pub notes: Option<String>,
    pub tags: Option<Vec<String>>,
}

/// 批量移除标签请求
#[derive(Debug, Deserialize, ToSchema)]
pub struct BulkRemoveTagsRequest {
    pub tag_names: Vec<String>,
}

/// 相似图片搜索请求
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SearchSimilarRequest {
    /// 查询图片的 id
    pub image_id: String,
    /// 返回数量，会被钳制到许可范围
    pub limit: Option<usize>,
}

/// 重复候选查询参数
#[derive(Debug, Deserialize, ToSchema)]
pub struct DuplicateCandidatesParams {
    /// 距离阈值，钳制到 0.05..=1.0
    pub threshold: Option<f32>,
    /// 分组数量上限，钳制到 1..=200
    pub max_groups: Option<usize>,
}

/// 打标请求参数
#[derive(TryFromMultipart)]
pub struct TagRequest {
    pub file: Bytes,
    pub threshold: Option<f32>,
}

/// 打标表单（用于API文档）
#[derive(Debug, ToSchema)]
#[allow(unused)]
pub struct TagForm {
    /// 上传的图片文件
    #[schema(format = Binary, content_media_type = "application/octet-stream")]
    pub file: String,
    /// 标签预测阈值
    pub threshold: Option<f32>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SuccessResponse {
    pub success: bool,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct BulkRemoveTagsResponse {
    pub success: bool,
    /// 被改写的记录数
    pub updated: u64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SearchSimilarResponse {
    pub results: Vec<SimilarImage>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct DuplicateCandidatesResponse {
    pub groups: Vec<Vec<ImageItem>>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct TagResponse {
    pub tags: Vec<String>,
}
