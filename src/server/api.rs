use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, Query, State};
use axum_typed_multipart::TypedMultipart;
use chrono::Utc;
use log::{info, warn};

use super::error::{AppError, Result};
use super::state::AppState;
use super::types::*;
use crate::db::ImageItem;
use crate::error::PictorError;
use crate::tagger::Tagger;
use crate::{catalog, dedup, similar};

/// 图片列表，按 id 数值降序
#[utoipa::path(
    get,
    path = "/images",
    responses(
        (status = 200, body = Vec<ImageItem>),
    )
)]
pub async fn list_images_handler(State(state): State<Arc<AppState>>) -> Result<Json<Vec<ImageItem>>> {
    Ok(Json(state.catalog.list().await?))
}

/// 新建图片记录
#[utoipa::path(
    post,
    path = "/images",
    request_body = CreateImageRequest,
    responses(
        (status = 200, body = ImageItem),
        (status = 400, description = "参数错误"),
    )
)]
pub async fn create_image_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateImageRequest>,
) -> Result<Json<ImageItem>> {
    let id = match &req.id {
        Some(id) => id.clone(),
        None => Utc::now().timestamp_millis().to_string(),
    };
    let created_at = match &req.created_at {
        Some(created_at) => created_at.clone(),
        None => Utc::now().to_rfc3339(),
    };
    let source = req.source_path.clone().map(std::path::PathBuf::from);
    let image = req.into_new_image(id, created_at);
    let item = state.catalog.create(image, source.as_deref()).await?;
    Ok(Json(item))
}

/// 部分更新 notes / tags
#[utoipa::path(
    patch,
    path = "/images/{id}",
    request_body = UpdateImageRequest,
    responses(
        (status = 200, body = SuccessResponse),
    )
)]
pub async fn update_image_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<UpdateImageRequest>,
) -> Result<Json<SuccessResponse>> {
    let patch = catalog::UpdatePatch { notes: req.notes, tags: req.tags };
    state.catalog.update(&id, patch).await?;
    Ok(Json(SuccessResponse { success: true }))
}

/// 删除图片记录，幂等
#[utoipa::path(
    delete,
    path = "/images/{id}",
    responses(
        (status = 200, body = SuccessResponse),
    )
)]
pub async fn delete_image_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<SuccessResponse>> {
    state.catalog.delete(&id).await?;
    Ok(Json(SuccessResponse { success: true }))
}

/// 从所有记录中批量移除标签
#[utoipa::path(
    post,
    path = "/bulk-remove-tags",
    request_body = BulkRemoveTagsRequest,
    responses(
        (status = 200, body = BulkRemoveTagsResponse),
    )
)]
pub async fn bulk_remove_tags_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<BulkRemoveTagsRequest>,
) -> Result<Json<BulkRemoveTagsResponse>> {
    let updated = state.catalog.bulk_remove_tags(&req.tag_names).await?;
    Ok(Json(BulkRemoveTagsResponse { success: true, updated }))
}

/// 以某张图片为查询搜索相似图片
#[utoipa::path(
    post,
    path = "/search-similar",
    request_body = SearchSimilarRequest,
    responses(
        (status = 200, body = SearchSimilarResponse),
        (status = 404, description = "查询图片不存在"),
    )
)]
pub async fn search_similar_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SearchSimilarRequest>,
) -> Result<Json<SearchSimilarResponse>> {
    let image_id = req.image_id.trim();
    if image_id.is_empty() {
        return Err(AppError(PictorError::Validation("imageId 不能为空".to_string())));
    }
    let record = state
        .catalog
        .get_record(image_id)
        .await?
        .ok_or_else(|| PictorError::NotFound { id: image_id.to_string() })?;

    let limit = req.limit.unwrap_or(state.search.limit);
    let results = similar::nearest_neighbors(state.catalog.db(), &record.vector, &record.id, limit)
        .await?;
    Ok(Json(SearchSimilarResponse { results }))
}

/// 近似重复候选分组
#[utoipa::path(
    get,
    path = "/duplicate-candidates",
    params(
        ("threshold" = Option<f32>, Query, description = "距离阈值"),
        ("max_groups" = Option<usize>, Query, description = "分组数量上限"),
    ),
    responses(
        (status = 200, body = DuplicateCandidatesResponse),
    )
)]
pub async fn duplicate_candidates_handler(
    State(state): State<Arc<AppState>>,
    Query(params): Query<DuplicateCandidatesParams>,
) -> Result<Json<DuplicateCandidatesResponse>> {
    let threshold = params.threshold.unwrap_or(state.search.dup_threshold).clamp(0.05, 1.0);
    let max_groups = params.max_groups.unwrap_or(state.search.max_groups).clamp(1, 200);

    info!("正在计算重复候选: threshold={} max_groups={}", threshold, max_groups);
    let groups = dedup::duplicate_groups(state.catalog.db(), threshold, max_groups).await?;
    Ok(Json(DuplicateCandidatesResponse { groups }))
}

/// 为缺失嵌入的记录补算向量
#[utoipa::path(
    post,
    path = "/backfill/embeddings",
    responses(
        (status = 200, body = catalog::BackfillReport),
    )
)]
pub async fn backfill_handler(
    State(state): State<Arc<AppState>>,
) -> Result<Json<catalog::BackfillReport>> {
    Ok(Json(state.catalog.backfill_embeddings().await?))
}

/// 预测一张图片的标签
#[utoipa::path(
    post,
    path = "/tag",
    request_body(content = TagForm, content_type = "multipart/form-data"),
    responses(
        (status = 200, body = TagResponse),
        (status = 503, description = "模型服务不可用"),
    )
)]
pub async fn tag_handler(
    State(state): State<Arc<AppState>>,
    data: TypedMultipart<TagRequest>,
) -> Result<Json<TagResponse>> {
    let tagger = state
        .tagger
        .acquire()
        .await
        .map_err(|e| PictorError::ResourceUnavailable(e.to_string()))?;

    let threshold = data.threshold.unwrap_or(state.model.tag_threshold);
    let tags = match tagger.predict(&data.file, threshold).await {
        Ok(tags) => tags,
        Err(e) => {
            // 预测失败降级为空标签，不作为致命错误返回
            warn!("标签预测失败: {}", e);
            Vec::new()
        }
    };
    Ok(Json(TagResponse { tags }))
}

/// prometheus 指标
#[utoipa::path(get, path = "/metrics")]
pub async fn metrics_handler() -> Result<String> {
    use prometheus::Encoder;

    let encoder = prometheus::TextEncoder::new();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&prometheus::gather(), &mut buffer) {
        return Err(AppError(PictorError::Internal(e.to_string())));
    }
    Ok(String::from_utf8_lossy(&buffer).into_owned())
}
