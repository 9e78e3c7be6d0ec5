mod api;
mod error;
mod state;
mod types;

use std::sync::Arc;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::routing::{get, patch, post};
use tower_http::limit::RequestBodyLimitLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

pub use self::state::*;

#[derive(OpenApi)]
#[openapi(
    paths(
        api::list_images_handler,
        api::create_image_handler,
        api::update_image_handler,
        api::delete_image_handler,
        api::bulk_remove_tags_handler,
        api::search_similar_handler,
        api::duplicate_candidates_handler,
        api::backfill_handler,
        api::tag_handler,
        api::metrics_handler,
    ),
    components(schemas(
        crate::db::ImageItem,
        crate::catalog::BackfillReport,
        crate::similar::SimilarImage,
        types::CreateImageRequest,
        types::UpdateImageRequest,
        types::BulkRemoveTagsRequest,
        types::SearchSimilarRequest,
        types::TagForm,
    ))
)]
pub struct ApiDoc;

/// 构建API服务器
pub fn create_app(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/images", get(api::list_images_handler).post(api::create_image_handler))
        .route(
            "/images/{id}",
            patch(api::update_image_handler).delete(api::delete_image_handler),
        )
        .route("/bulk-remove-tags", post(api::bulk_remove_tags_handler))
        .route("/search-similar", post(api::search_similar_handler))
        .route("/duplicate-candidates", get(api::duplicate_candidates_handler))
        .route("/backfill/embeddings", post(api::backfill_handler))
        .route("/tag", post(api::tag_handler))
        .route("/metrics", get(api::metrics_handler))
        .merge(SwaggerUi::new("/docs").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(DefaultBodyLimit::disable())
        // 上传限制：10M
        .layer(RequestBodyLimitLayer::new(1024 * 1024 * 10))
        .with_state(state)
}
