//! 图库目录：记录的增删改查、旧版数据导入与嵌入回填

use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use walkdir::WalkDir;

use crate::config::DataDir;
use crate::db::utils::id_predicate;
use crate::db::{Database, ImageItem, ImageRecord, crud};
use crate::embed::Embedder;
use crate::error::{PictorError, Result};
use crate::metrics;
use crate::vector::{VECTOR_DIM, is_zero_vector, zero_vector};

/// 新建记录的输入字段，向量由目录负责计算
#[derive(Debug, Clone)]
pub struct NewImage {
    pub id: String,
    pub filename: String,
    pub thumbnail: String,
    pub original_name: String,
    pub tags: Vec<String>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub notes: String,
    pub created_at: String,
}

/// 部分更新，None 的字段保持不变
#[derive(Debug, Clone, Default)]
pub struct UpdatePatch {
    pub notes: Option<String>,
    pub tags: Option<Vec<String>>,
}

/// 嵌入回填的逐条结果统计
#[derive(Debug, Clone, Default, PartialEq, Serialize, ToSchema)]
pub struct BackfillReport {
    pub updated: u64,
    pub skipped: u64,
    pub failed: u64,
}

/// 旧版 JSON 元数据，一个文件一条记录
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct LegacyRecord {
    #[serde(default)]
    id: String,
    #[serde(default)]
    filename: String,
    #[serde(default)]
    thumbnail: String,
    #[serde(default)]
    original_name: String,
    #[serde(default)]
    tags: Vec<String>,
    width: Option<u32>,
    height: Option<u32>,
    #[serde(default)]
    notes: String,
    #[serde(default)]
    created_at: String,
}

/// id 按整数解释用于排序，解析失败的按 0 处理
pub fn numeric_id(id: &str) -> i64 {
    id.parse().unwrap_or(0)
}

/// 标签归一化：去首尾空白后转小写
fn normalize_tag(tag: &str) -> String {
    tag.trim().to_lowercase()
}

#[derive(Clone)]
pub struct Catalog {
    db: Database,
    data_dir: DataDir,
    embedder: Arc<dyn Embedder>,
}

impl Catalog {
    pub fn new(db: Database, data_dir: DataDir, embedder: Arc<dyn Embedder>) -> Self {
        Self { db, data_dir, embedder }
    }

    pub fn db(&self) -> &Database {
        &self.db
    }

    /// 幂等初始化：表为空且存在旧版 JSON 元数据时一次性导入，
    /// 表中已有数据则什么都不做，绝不覆盖或合并
    ///
    /// 返回本次导入的记录数
    pub async fn ensure_initialized(&self) -> Result<u64> {
        if crud::count_images(&self.db).await? > 0 {
            debug!("数据表已有数据，跳过旧版数据导入");
            return Ok(0);
        }

        let legacy_dir = self.data_dir.legacy_metadata();
        if !legacy_dir.is_dir() {
            return Ok(0);
        }

        let mut files: Vec<_> = WalkDir::new(&legacy_dir)
            .min_depth(1)
            .max_depth(1)
            .into_iter()
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.into_path())
            .filter(|path| path.extension().is_some_and(|ext| ext == "json"))
            .collect();
        files.sort();

        let mut tx = self.db.begin().await?;
        let mut imported = 0u64;
        for file in &files {
            let content = match tokio::fs::read_to_string(file).await {
                Ok(content) => content,
                Err(e) => {
                    warn!("无法读取旧版元数据 {}: {}", file.display(), e);
                    continue;
                }
            };
            let legacy: LegacyRecord = match serde_json::from_str(&content) {
                Ok(legacy) => legacy,
                Err(e) => {
                    warn!("跳过无法解析的旧版元数据 {}: {}", file.display(), e);
                    continue;
                }
            };
            if legacy.id.trim().is_empty() {
                warn!("跳过缺少 id 的旧版元数据 {}", file.display());
                continue;
            }
            let record = ImageRecord {
                id: legacy.id,
                filename: legacy.filename,
                thumbnail: legacy.thumbnail,
                original_name: legacy.original_name,
                tags: legacy.tags,
                width: legacy.width,
                height: legacy.height,
                notes: legacy.notes,
                created_at: legacy.created_at,
                // 旧版数据没有嵌入，之后由回填补算
                vector: zero_vector(),
            };
            if let Err(e) = crud::insert_image(&mut *tx, &record).await {
                warn!("无法导入旧版记录 {}: {}", record.id, e);
                continue;
            }
            imported += 1;
        }
        tx.commit().await?;

        if imported > 0 {
            info!("已导入 {} 条旧版记录", imported);
        }
        Ok(imported)
    }

    /// 全部记录，id 按整数解释降序；同键按原始 id 字符串降序保证确定性
    pub async fn list(&self) -> Result<Vec<ImageItem>> {
        let mut records = crud::list_images(&self.db).await?;
        records
            .sort_by(|a, b| numeric_id(&b.id).cmp(&numeric_id(&a.id)).then_with(|| b.id.cmp(&a.id)));
        Ok(records.into_iter().map(ImageRecord::into_item).collect())
    }

    pub async fn get(&self, id: &str) -> Result<ImageItem> {
        match crud::get_image(&self.db, id).await? {
            Some(record) => Ok(record.into_item()),
            None => Err(PictorError::NotFound { id: id.to_string() }),
        }
    }

    /// 含向量的完整记录，相似搜索用
    pub async fn get_record(&self, id: &str) -> Result<Option<ImageRecord>> {
        crud::get_image(&self.db, id).await
    }

    /// 新建记录；源文件存在时同步计算嵌入，否则写入零向量哨兵
    pub async fn create(&self, image: NewImage, source: Option<&Path>) -> Result<ImageItem> {
        if image.id.trim().is_empty() {
            return Err(PictorError::Validation("id 不能为空".to_string()));
        }

        let vector = match source {
            Some(path) if path.exists() => match self.embedder.encode(path).await {
                Ok(v) if v.len() == VECTOR_DIM => v,
                Ok(v) => {
                    warn!("嵌入维度错误 ({})，降级为零向量: {}", v.len(), image.id);
                    zero_vector()
                }
                Err(e) => {
                    warn!("嵌入计算失败，降级为零向量: {}", e);
                    zero_vector()
                }
            },
            _ => zero_vector(),
        };

        let record = ImageRecord {
            id: image.id,
            filename: image.filename,
            thumbnail: image.thumbnail,
            original_name: image.original_name,
            tags: image.tags,
            width: image.width,
            height: image.height,
            notes: image.notes,
            created_at: image.created_at,
            vector,
        };
        crud::insert_image(&self.db, &record).await?;
        Ok(record.into_item())
    }

    /// 部分更新 notes / tags；id 不存在时静默成功，与旧版行为保持一致
    pub async fn update(&self, id: &str, patch: UpdatePatch) -> Result<()> {
        if patch.notes.is_none() && patch.tags.is_none() {
            return Ok(());
        }
        let tags_json = patch.tags.map(|tags| serde_json::to_string(&tags)).transpose()?;
        crud::update_where(&self.db, &id_predicate(id), patch.notes.as_deref(), tags_json.as_deref())
            .await?;
        Ok(())
    }

    /// 幂等删除，id 不存在不是错误
    pub async fn delete(&self, id: &str) -> Result<()> {
        crud::delete_where(&self.db, &id_predicate(id)).await?;
        Ok(())
    }

    /// 批量移除标签：输入归一化后做大小写无关的精确匹配，
    /// 没有命中的记录不产生多余写入，返回被改写的记录数
    pub async fn bulk_remove_tags(&self, tag_names: &[String]) -> Result<u64> {
        let exclude: HashSet<String> =
            tag_names.iter().map(|t| normalize_tag(t)).filter(|t| !t.is_empty()).collect();
        if exclude.is_empty() {
            return Ok(0);
        }

        // 时间点快照逐条改写，与并发写入交错时后写覆盖，单写者部署下可接受
        let records = crud::list_images(&self.db).await?;
        let mut updated = 0u64;
        for record in records {
            let kept: Vec<String> =
                record.tags.iter().filter(|t| !exclude.contains(&normalize_tag(t))).cloned().collect();
            if kept.len() == record.tags.len() {
                continue;
            }
            let tags_json = serde_json::to_string(&kept)?;
            crud::update_where(&self.db, &id_predicate(&record.id), None, Some(&tags_json)).await?;
            updated += 1;
        }
        Ok(updated)
    }

    /// 为源文件存在且向量仍为哨兵的记录补算嵌入
    ///
    /// 单条记录的失败不会中断整个回填，逐条计入统计
    pub async fn backfill_embeddings(&self) -> Result<BackfillReport> {
        let records = crud::list_images(&self.db).await?;
        let mut report = BackfillReport::default();

        for record in records {
            let path = self.data_dir.image_path(&record.filename);
            if !path.exists() || !is_zero_vector(&record.vector) {
                report.skipped += 1;
                continue;
            }
            match self.embedder.encode(&path).await {
                Ok(vector) if vector.len() == VECTOR_DIM => {
                    crud::update_vector_where(&self.db, &id_predicate(&record.id), &vector).await?;
                    report.updated += 1;
                }
                Ok(vector) => {
                    warn!("回填 {} 失败: 嵌入维度错误 ({})", record.id, vector.len());
                    report.failed += 1;
                }
                Err(e) => {
                    warn!("回填 {} 失败: {}", record.id, e);
                    report.failed += 1;
                }
            }
        }

        metrics::add_backfill_result("updated", report.updated);
        metrics::add_backfill_result("skipped", report.skipped);
        metrics::add_backfill_result("failed", report.failed);
        info!(
            "嵌入回填完成: updated={} skipped={} failed={}",
            report.updated, report.skipped, report.failed
        );
        Ok(report)
    }
}
