use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use pictor::Catalog;
use pictor::catalog::{BackfillReport, NewImage, UpdatePatch};
use pictor::config::DataDir;
use pictor::db::{ImageRecord, crud, init_db};
use pictor::embed::{EmbedError, Embedder};
use pictor::error::PictorError;
use pictor::vector::{VECTOR_DIM, is_zero_vector, zero_vector};
use tempfile::TempDir;

/// 按文件名决定行为的测试嵌入器
struct StubEmbedder;

#[async_trait]
impl Embedder for StubEmbedder {
    async fn encode(&self, path: &Path) -> Result<Vec<f32>, EmbedError> {
        let name = path.file_name().unwrap().to_string_lossy().to_string();
        if name.contains("baddim") {
            return Ok(vec![1.0; 8]);
        }
        if name.contains("fail") {
            return Err(EmbedError::Backend("stub failure".to_string()));
        }
        let mut v = zero_vector();
        v[0] = 1.0;
        Ok(v)
    }
}

async fn setup(dir: &Path) -> Catalog {
    let data_dir = DataDir::from_str(dir.to_str().unwrap()).unwrap();
    tokio::fs::create_dir_all(data_dir.path()).await.unwrap();
    let db = init_db(data_dir.database()).await.unwrap();
    Catalog::new(db, data_dir, Arc::new(StubEmbedder))
}

fn new_image(id: &str) -> NewImage {
    NewImage {
        id: id.to_string(),
        filename: format!("{id}.png"),
        thumbnail: format!("{id}.webp"),
        original_name: format!("{id}-orig.png"),
        tags: vec![],
        width: Some(800),
        height: Some(600),
        notes: String::new(),
        created_at: "2025-08-15T00:00:00Z".to_string(),
    }
}

fn embedded_record(id: &str, vector: Vec<f32>) -> ImageRecord {
    ImageRecord {
        id: id.to_string(),
        filename: format!("{id}.png"),
        thumbnail: format!("{id}.webp"),
        original_name: format!("{id}-orig.png"),
        tags: vec![],
        width: None,
        height: None,
        notes: String::new(),
        created_at: String::new(),
        vector,
    }
}

/// 第 i 个分量带微小偏移的单位向量，彼此距离远小于 0.1
fn near_vector(offset: f32) -> Vec<f32> {
    let mut v = zero_vector();
    v[0] = 1.0;
    v[1] = offset;
    v
}

fn axis_vector(i: usize) -> Vec<f32> {
    let mut v = zero_vector();
    v[i] = 1.0;
    v
}

mod migration {
    use super::*;

    async fn write_legacy(dir: &Path, name: &str, content: &str) {
        let metadata = dir.join("metadata");
        tokio::fs::create_dir_all(&metadata).await.unwrap();
        tokio::fs::write(metadata.join(name), content).await.unwrap();
    }

    #[tokio::test]
    async fn test_migration_is_idempotent_and_skips_malformed() {
        let tmp = TempDir::new().unwrap();
        write_legacy(
            tmp.path(),
            "100.json",
            r#"{"id":"100","filename":"100.png","thumbnail":"100.webp","originalName":"a.png","tags":["cat"],"createdAt":"2024-01-01T00:00:00Z"}"#,
        )
        .await;
        write_legacy(
            tmp.path(),
            "200.json",
            r#"{"id":"200","filename":"200.png","thumbnail":"200.webp","originalName":"b.png","tags":[]}"#,
        )
        .await;
        write_legacy(tmp.path(), "broken.json", "not json at all").await;
        write_legacy(tmp.path(), "noid.json", r#"{"filename":"x.png"}"#).await;
        write_legacy(tmp.path(), "ignored.txt", "not metadata").await;

        let catalog = setup(tmp.path()).await;
        assert_eq!(catalog.ensure_initialized().await.unwrap(), 2);

        // 再跑一遍不会重复导入
        assert_eq!(catalog.ensure_initialized().await.unwrap(), 0);
        assert_eq!(catalog.list().await.unwrap().len(), 2);

        // 导入的记录向量为零哨兵，notes 默认空串
        let record = catalog.get_record("100").await.unwrap().unwrap();
        assert!(is_zero_vector(&record.vector));
        assert_eq!(record.vector.len(), VECTOR_DIM);
        assert_eq!(record.notes, "");
        assert_eq!(record.tags, vec!["cat"]);
    }

    #[tokio::test]
    async fn test_migration_noop_when_table_populated() {
        let tmp = TempDir::new().unwrap();
        let catalog = setup(tmp.path()).await;
        catalog.create(new_image("1"), None).await.unwrap();

        write_legacy(tmp.path(), "100.json", r#"{"id":"100","filename":"100.png"}"#).await;
        assert_eq!(catalog.ensure_initialized().await.unwrap(), 0);
        assert!(catalog.get_record("100").await.unwrap().is_none());
    }
}

mod listing {
    use super::*;

    #[tokio::test]
    async fn test_list_orders_ids_numerically_descending() {
        let tmp = TempDir::new().unwrap();
        let catalog = setup(tmp.path()).await;
        for id in ["3", "10", "2"] {
            catalog.create(new_image(id), None).await.unwrap();
        }

        let ids: Vec<String> =
            catalog.list().await.unwrap().into_iter().map(|item| item.id).collect();
        assert_eq!(ids, vec!["10", "3", "2"]);
    }

    #[tokio::test]
    async fn test_list_treats_non_numeric_id_as_zero() {
        let tmp = TempDir::new().unwrap();
        let catalog = setup(tmp.path()).await;
        for id in ["5", "abc", "-1"] {
            catalog.create(new_image(id), None).await.unwrap();
        }

        let ids: Vec<String> =
            catalog.list().await.unwrap().into_iter().map(|item| item.id).collect();
        // "abc" 按 0 排序，落在正数之后、负数之前
        assert_eq!(ids, vec!["5", "abc", "-1"]);
    }

    #[tokio::test]
    async fn test_list_strips_vector() {
        let tmp = TempDir::new().unwrap();
        let catalog = setup(tmp.path()).await;
        catalog.create(new_image("1"), None).await.unwrap();
        let items = catalog.list().await.unwrap();
        let json = serde_json::to_value(&items).unwrap();
        assert!(json[0].get("vector").is_none());
        assert_eq!(json[0]["originalName"], "1-orig.png");
    }
}

mod create {
    use super::*;

    #[tokio::test]
    async fn test_create_rejects_empty_id() {
        let tmp = TempDir::new().unwrap();
        let catalog = setup(tmp.path()).await;
        let err = catalog.create(new_image("  "), None).await.unwrap_err();
        assert!(matches!(err, PictorError::Validation(_)));
    }

    #[tokio::test]
    async fn test_create_without_source_stores_sentinel() {
        let tmp = TempDir::new().unwrap();
        let catalog = setup(tmp.path()).await;
        catalog.create(new_image("1"), None).await.unwrap();
        let record = catalog.get_record("1").await.unwrap().unwrap();
        assert!(is_zero_vector(&record.vector));
    }

    #[tokio::test]
    async fn test_create_with_source_embeds_synchronously() {
        let tmp = TempDir::new().unwrap();
        let catalog = setup(tmp.path()).await;
        let source = tmp.path().join("photo.png");
        tokio::fs::write(&source, b"png").await.unwrap();

        catalog.create(new_image("1"), Some(&source)).await.unwrap();
        let record = catalog.get_record("1").await.unwrap().unwrap();
        assert!(!is_zero_vector(&record.vector));
        assert_eq!(record.vector.len(), VECTOR_DIM);
    }

    #[tokio::test]
    async fn test_create_degrades_to_sentinel_on_embed_failure() {
        let tmp = TempDir::new().unwrap();
        let catalog = setup(tmp.path()).await;
        let source = tmp.path().join("fail.png");
        tokio::fs::write(&source, b"png").await.unwrap();

        catalog.create(new_image("1"), Some(&source)).await.unwrap();
        let record = catalog.get_record("1").await.unwrap().unwrap();
        assert!(is_zero_vector(&record.vector));
    }
}

mod update_delete {
    use super::*;

    #[tokio::test]
    async fn test_update_is_partial() {
        let tmp = TempDir::new().unwrap();
        let catalog = setup(tmp.path()).await;
        let mut image = new_image("1");
        image.tags = vec!["cat".to_string()];
        image.notes = "old".to_string();
        catalog.create(image, None).await.unwrap();

        let patch = UpdatePatch { notes: Some("new".to_string()), tags: None };
        catalog.update("1", patch).await.unwrap();
        let item = catalog.get("1").await.unwrap();
        assert_eq!(item.notes, "new");
        assert_eq!(item.tags, vec!["cat"]);

        let patch = UpdatePatch { notes: None, tags: Some(vec!["dog".to_string()]) };
        catalog.update("1", patch).await.unwrap();
        let item = catalog.get("1").await.unwrap();
        assert_eq!(item.notes, "new");
        assert_eq!(item.tags, vec!["dog"]);
    }

    #[tokio::test]
    async fn test_update_missing_id_is_silent_noop() {
        let tmp = TempDir::new().unwrap();
        let catalog = setup(tmp.path()).await;
        let patch = UpdatePatch { notes: Some("x".to_string()), tags: None };
        catalog.update("ghost", patch).await.unwrap();
    }

    #[tokio::test]
    async fn test_update_with_empty_patch_is_noop() {
        let tmp = TempDir::new().unwrap();
        let catalog = setup(tmp.path()).await;
        catalog.create(new_image("1"), None).await.unwrap();
        catalog.update("1", UpdatePatch::default()).await.unwrap();
        assert_eq!(catalog.get("1").await.unwrap().notes, "");
    }

    #[tokio::test]
    async fn test_delete_is_idempotent() {
        let tmp = TempDir::new().unwrap();
        let catalog = setup(tmp.path()).await;
        catalog.create(new_image("1"), None).await.unwrap();
        catalog.delete("1").await.unwrap();
        catalog.delete("1").await.unwrap();
        assert!(matches!(
            catalog.get("1").await.unwrap_err(),
            PictorError::NotFound { .. }
        ));
    }

    #[tokio::test]
    async fn test_quoted_id_does_not_break_predicates() {
        let tmp = TempDir::new().unwrap();
        let catalog = setup(tmp.path()).await;
        catalog.create(new_image("it's"), None).await.unwrap();

        let patch = UpdatePatch { notes: Some("quoted".to_string()), tags: None };
        catalog.update("it's", patch).await.unwrap();
        assert_eq!(catalog.get("it's").await.unwrap().notes, "quoted");

        catalog.delete("it's").await.unwrap();
        assert!(catalog.get_record("it's").await.unwrap().is_none());
    }
}

mod bulk_tags {
    use super::*;

    #[tokio::test]
    async fn test_bulk_remove_is_case_insensitive_and_exact() {
        let tmp = TempDir::new().unwrap();
        let catalog = setup(tmp.path()).await;

        let mut a = new_image("1");
        a.tags = vec!["Cat".to_string(), "dog".to_string()];
        catalog.create(a, None).await.unwrap();

        let mut b = new_image("2");
        b.tags = vec!["dog".to_string()];
        catalog.create(b, None).await.unwrap();

        let updated = catalog.bulk_remove_tags(&["cat".to_string()]).await.unwrap();
        assert_eq!(updated, 1);
        assert_eq!(catalog.get("1").await.unwrap().tags, vec!["dog"]);
        assert_eq!(catalog.get("2").await.unwrap().tags, vec!["dog"]);
    }

    #[tokio::test]
    async fn test_bulk_remove_normalizes_input() {
        let tmp = TempDir::new().unwrap();
        let catalog = setup(tmp.path()).await;
        let mut a = new_image("1");
        a.tags = vec!["cat".to_string(), "catgirl".to_string()];
        catalog.create(a, None).await.unwrap();

        let updated = catalog.bulk_remove_tags(&["  CAT ".to_string()]).await.unwrap();
        assert_eq!(updated, 1);
        // 精确匹配，"catgirl" 不受前缀影响
        assert_eq!(catalog.get("1").await.unwrap().tags, vec!["catgirl"]);
    }

    #[tokio::test]
    async fn test_bulk_remove_empty_input_touches_nothing() {
        let tmp = TempDir::new().unwrap();
        let catalog = setup(tmp.path()).await;
        let mut a = new_image("1");
        a.tags = vec!["cat".to_string()];
        catalog.create(a, None).await.unwrap();

        assert_eq!(catalog.bulk_remove_tags(&[]).await.unwrap(), 0);
        assert_eq!(catalog.bulk_remove_tags(&["  ".to_string()]).await.unwrap(), 0);
    }
}

mod backfill {
    use super::*;

    #[tokio::test]
    async fn test_backfill_isolates_per_record_failures() {
        let tmp = TempDir::new().unwrap();
        let catalog = setup(tmp.path()).await;
        let uploads = tmp.path().join("uploads");
        tokio::fs::create_dir_all(&uploads).await.unwrap();

        // 1: 源文件缺失 → skipped
        catalog.create(new_image("1"), None).await.unwrap();

        // 2: 嵌入维度错误 → failed
        let mut bad = new_image("2");
        bad.filename = "baddim.png".to_string();
        catalog.create(bad, None).await.unwrap();
        tokio::fs::write(uploads.join("baddim.png"), b"png").await.unwrap();

        // 3: 正常补算 → updated
        catalog.create(new_image("3"), None).await.unwrap();
        tokio::fs::write(uploads.join("3.png"), b"png").await.unwrap();

        let report = catalog.backfill_embeddings().await.unwrap();
        assert_eq!(report, BackfillReport { updated: 1, skipped: 1, failed: 1 });

        assert!(!is_zero_vector(&catalog.get_record("3").await.unwrap().unwrap().vector));
        assert!(is_zero_vector(&catalog.get_record("2").await.unwrap().unwrap().vector));
    }

    #[tokio::test]
    async fn test_backfill_skips_already_embedded() {
        let tmp = TempDir::new().unwrap();
        let catalog = setup(tmp.path()).await;
        let uploads = tmp.path().join("uploads");
        tokio::fs::create_dir_all(&uploads).await.unwrap();

        tokio::fs::write(uploads.join("1.png"), b"png").await.unwrap();
        catalog.create(new_image("1"), Some(&uploads.join("1.png"))).await.unwrap();

        let report = catalog.backfill_embeddings().await.unwrap();
        assert_eq!(report, BackfillReport { updated: 0, skipped: 1, failed: 0 });
    }
}

mod similar_search {
    use super::*;
    use pictor::similar::nearest_neighbors;

    async fn seed(catalog: &Catalog) {
        crud::insert_image(catalog.db(), &embedded_record("1", near_vector(0.01))).await.unwrap();
        crud::insert_image(catalog.db(), &embedded_record("2", near_vector(-0.01))).await.unwrap();
        crud::insert_image(catalog.db(), &embedded_record("3", axis_vector(1))).await.unwrap();
        // 零向量哨兵，不参与搜索
        crud::insert_image(catalog.db(), &embedded_record("4", zero_vector())).await.unwrap();
    }

    #[tokio::test]
    async fn test_excludes_self_and_orders_by_distance() {
        let tmp = TempDir::new().unwrap();
        let catalog = setup(tmp.path()).await;
        seed(&catalog).await;

        let query = catalog.get_record("1").await.unwrap().unwrap();
        let results = nearest_neighbors(catalog.db(), &query.vector, "1", 10).await.unwrap();
        let ids: Vec<&str> = results.iter().map(|r| r.image.id.as_str()).collect();
        assert_eq!(ids, vec!["2", "3"]);
        assert!(results[0].distance < results[1].distance);
    }

    #[tokio::test]
    async fn test_zero_query_returns_empty() {
        let tmp = TempDir::new().unwrap();
        let catalog = setup(tmp.path()).await;
        seed(&catalog).await;

        let results = nearest_neighbors(catalog.db(), &zero_vector(), "4", 10).await.unwrap();
        assert!(results.is_empty());

        // 容差内的近零向量同样视为哨兵
        let mut near_zero = zero_vector();
        near_zero[0] = 1e-10;
        let results = nearest_neighbors(catalog.db(), &near_zero, "4", 10).await.unwrap();
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn test_limit_is_clamped() {
        let tmp = TempDir::new().unwrap();
        let catalog = setup(tmp.path()).await;
        seed(&catalog).await;

        let query = catalog.get_record("1").await.unwrap().unwrap();
        let results = nearest_neighbors(catalog.db(), &query.vector, "1", 0).await.unwrap();
        assert_eq!(results.len(), 1);
    }

    #[tokio::test]
    async fn test_result_strips_vector() {
        let tmp = TempDir::new().unwrap();
        let catalog = setup(tmp.path()).await;
        seed(&catalog).await;

        let query = catalog.get_record("1").await.unwrap().unwrap();
        let results = nearest_neighbors(catalog.db(), &query.vector, "1", 1).await.unwrap();
        let json = serde_json::to_value(&results).unwrap();
        assert!(json[0].get("vector").is_none());
        assert!(json[0].get("distance").is_some());
    }
}

mod duplicates {
    use super::*;
    use pictor::dedup::duplicate_groups;

    #[tokio::test]
    async fn test_mutual_neighbors_collapse_into_one_group() {
        let tmp = TempDir::new().unwrap();
        let catalog = setup(tmp.path()).await;
        crud::insert_image(catalog.db(), &embedded_record("1", near_vector(0.01))).await.unwrap();
        crud::insert_image(catalog.db(), &embedded_record("2", near_vector(-0.01))).await.unwrap();
        crud::insert_image(catalog.db(), &embedded_record("3", near_vector(0.02))).await.unwrap();
        crud::insert_image(catalog.db(), &embedded_record("9", axis_vector(1))).await.unwrap();
        crud::insert_image(catalog.db(), &embedded_record("8", zero_vector())).await.unwrap();

        let groups = duplicate_groups(catalog.db(), 0.1, 50).await.unwrap();
        assert_eq!(groups.len(), 1);
        let ids: Vec<&str> = groups[0].iter().map(|item| item.id.as_str()).collect();
        // 三张互为近邻的图片合并成一组，而不是三个两两组合
        assert_eq!(ids, vec!["1", "2", "3"]);
    }

    #[tokio::test]
    async fn test_groups_sorted_by_size_then_smallest_member() {
        let tmp = TempDir::new().unwrap();
        let catalog = setup(tmp.path()).await;
        // 20/21 与 10/11 两对大小相同的分组
        crud::insert_image(catalog.db(), &embedded_record("20", near_vector(0.01))).await.unwrap();
        crud::insert_image(catalog.db(), &embedded_record("21", near_vector(-0.01))).await.unwrap();
        let mut far_pair = axis_vector(1);
        far_pair[2] = 0.01;
        crud::insert_image(catalog.db(), &embedded_record("10", axis_vector(1))).await.unwrap();
        crud::insert_image(catalog.db(), &embedded_record("11", far_pair)).await.unwrap();

        let groups = duplicate_groups(catalog.db(), 0.1, 50).await.unwrap();
        assert_eq!(groups.len(), 2);
        // 同大小的分组按最小成员 id 数值升序
        assert_eq!(groups[0][0].id, "10");
        assert_eq!(groups[1][0].id, "20");

        let truncated = duplicate_groups(catalog.db(), 0.1, 1).await.unwrap();
        assert_eq!(truncated.len(), 1);
        assert_eq!(truncated[0][0].id, "10");
    }

    #[tokio::test]
    async fn test_singletons_are_dropped() {
        let tmp = TempDir::new().unwrap();
        let catalog = setup(tmp.path()).await;
        crud::insert_image(catalog.db(), &embedded_record("1", axis_vector(0))).await.unwrap();
        crud::insert_image(catalog.db(), &embedded_record("2", axis_vector(1))).await.unwrap();

        let groups = duplicate_groups(catalog.db(), 0.1, 50).await.unwrap();
        assert!(groups.is_empty());
    }
}
