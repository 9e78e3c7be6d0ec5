use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

use crate::db::utils::{blob_to_vector, vector_to_blob};
use crate::error::PictorError;

/// images 表中的一行，字段与表结构一一对应
#[derive(Debug, Clone, FromRow)]
pub struct ImageRow {
    pub id: String,
    pub filename: String,
    pub thumbnail: String,
    pub original_name: String,
    /// JSON 编码的标签列表
    pub tags: String,
    pub width: Option<i64>,
    pub height: Option<i64>,
    pub notes: String,
    pub created_at: String,
    /// 小端 f32 编码的嵌入向量
    pub vector: Vec<u8>,
}

/// 一张图片的完整记录，包含嵌入向量
#[derive(Debug, Clone, PartialEq)]
pub struct ImageRecord {
    pub id: String,
    pub filename: String,
    pub thumbnail: String,
    pub original_name: String,
    pub tags: Vec<String>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub notes: String,
    pub created_at: String,
    /// 全零表示嵌入尚未计算，见 [`crate::vector::is_zero_vector`]
    pub vector: Vec<f32>,
}

/// 对外返回的图片记录，不携带向量
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ImageItem {
    pub id: String,
    pub filename: String,
    pub thumbnail: String,
    pub original_name: String,
    pub tags: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
    pub notes: String,
    pub created_at: String,
}

impl ImageRecord {
    /// 去掉向量字段，转换为响应用的记录
    pub fn into_item(self) -> ImageItem {
        ImageItem {
            id: self.id,
            filename: self.filename,
            thumbnail: self.thumbnail,
            original_name: self.original_name,
            tags: self.tags,
            width: self.width,
            height: self.height,
            notes: self.notes,
            created_at: self.created_at,
        }
    }
}

impl TryFrom<ImageRow> for ImageRecord {
    type Error = PictorError;

    fn try_from(row: ImageRow) -> Result<Self, Self::Error> {
        let tags = serde_json::from_str(&row.tags)?;
        Ok(ImageRecord {
            id: row.id,
            filename: row.filename,
            thumbnail: row.thumbnail,
            original_name: row.original_name,
            tags,
            width: row.width.map(|w| w as u32),
            height: row.height.map(|h| h as u32),
            notes: row.notes,
            created_at: row.created_at,
            vector: blob_to_vector(&row.vector),
        })
    }
}

impl From<&ImageRecord> for ImageRow {
    fn from(record: &ImageRecord) -> Self {
        ImageRow {
            id: record.id.clone(),
            filename: record.filename.clone(),
            thumbnail: record.thumbnail.clone(),
            original_name: record.original_name.clone(),
            tags: serde_json::to_string(&record.tags).unwrap_or_else(|_| "[]".to_string()),
            width: record.width.map(|w| w as i64),
            height: record.height.map(|h| h as i64),
            notes: record.notes.clone(),
            created_at: record.created_at.clone(),
            vector: vector_to_blob(&record.vector),
        }
    }
}
