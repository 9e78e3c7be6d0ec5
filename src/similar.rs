//! 相似图片搜索：在存储层近邻原语之上套用领域规则

use std::time::Instant;

use serde::Serialize;
use utoipa::ToSchema;

use crate::db::utils::exclude_id_predicate;
use crate::db::{Database, ImageItem, crud};
use crate::error::Result;
use crate::metrics;
use crate::vector::is_zero_vector;

/// limit 的许可范围，限制单次响应成本
pub const MIN_LIMIT: usize = 1;
pub const MAX_LIMIT: usize = 50;

/// 搜索结果的一项，向量已剥离
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct SimilarImage {
    #[serde(flatten)]
    pub image: ImageItem,
    /// 余弦距离，越小越相似
    pub distance: f32,
}

/// 近邻搜索，按距离升序返回
///
/// 查询向量是零向量哨兵时直接返回空结果；`exclude_id` 对应的记录
/// （即查询图片自身）不会出现在结果中；limit 被钳制到许可范围内
pub async fn nearest_neighbors(
    db: &Database,
    query: &[f32],
    exclude_id: &str,
    limit: usize,
) -> Result<Vec<SimilarImage>> {
    if is_zero_vector(query) {
        return Ok(Vec::new());
    }
    let limit = limit.clamp(MIN_LIMIT, MAX_LIMIT);

    let start = Instant::now();
    let hits = crud::knn_search(db, query, limit, Some(&exclude_id_predicate(exclude_id))).await?;
    metrics::observe_similar_search_duration(start.elapsed().as_secs_f64());

    Ok(hits
        .into_iter()
        .map(|(record, distance)| SimilarImage { image: record.into_item(), distance })
        .collect())
}
