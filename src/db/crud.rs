use log::warn;
use sqlx::{Executor, Sqlite, SqlitePool};

use super::model::{ImageRecord, ImageRow};
use crate::error::Result;
use crate::vector::{cosine_distance, is_zero_vector};

const ALL_COLUMNS: &str = "id, filename, thumbnail, original_name, tags, width, height, notes, \
                           created_at, vector";

/// 插入一条图片记录
pub async fn insert_image<'c, E>(executor: E, record: &ImageRecord) -> Result<()>
where
    E: Executor<'c, Database = Sqlite>,
{
    let row = ImageRow::from(record);
    sqlx::query(
        r#"
        INSERT INTO images (id, filename, thumbnail, original_name, tags, width, height, notes, created_at, vector)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&row.id)
    .bind(&row.filename)
    .bind(&row.thumbnail)
    .bind(&row.original_name)
    .bind(&row.tags)
    .bind(row.width)
    .bind(row.height)
    .bind(&row.notes)
    .bind(&row.created_at)
    .bind(&row.vector)
    .execute(executor)
    .await?;
    Ok(())
}

/// 按 id 查询单条记录
pub async fn get_image(pool: &SqlitePool, id: &str) -> Result<Option<ImageRecord>> {
    let sql = format!("SELECT {ALL_COLUMNS} FROM images WHERE id = ?");
    let row = sqlx::query_as::<_, ImageRow>(&sql).bind(id).fetch_optional(pool).await?;
    row.map(ImageRecord::try_from).transpose()
}

/// 查询全部记录，顺序未定义，排序是调用方的事
///
/// 解析失败的行会被跳过并记录日志，一条坏记录不会让整个扫描失败
pub async fn list_images(pool: &SqlitePool) -> Result<Vec<ImageRecord>> {
    let sql = format!("SELECT {ALL_COLUMNS} FROM images");
    let rows = sqlx::query_as::<_, ImageRow>(&sql).fetch_all(pool).await?;
    let mut records = Vec::with_capacity(rows.len());
    for row in rows {
        let id = row.id.clone();
        match ImageRecord::try_from(row) {
            Ok(record) => records.push(record),
            Err(e) => warn!("跳过无法解析的记录 {}: {}", id, e),
        }
    }
    Ok(records)
}

/// 表中的记录总数
pub async fn count_images(pool: &SqlitePool) -> Result<i64> {
    let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM images").fetch_one(pool).await?;
    Ok(count)
}

/// 按文本谓词更新 notes / tags，两者都为 None 时不执行任何写入
///
/// 谓词必须经过 [`super::utils::id_predicate`] 这类转义助手构造
pub async fn update_where(
    pool: &SqlitePool,
    predicate: &str,
    notes: Option<&str>,
    tags_json: Option<&str>,
) -> Result<u64> {
    let mut sets = Vec::new();
    if notes.is_some() {
        sets.push("notes = ?");
    }
    if tags_json.is_some() {
        sets.push("tags = ?");
    }
    if sets.is_empty() {
        return Ok(0);
    }

    let sql = format!("UPDATE images SET {} WHERE {}", sets.join(", "), predicate);
    let mut query = sqlx::query(&sql);
    if let Some(notes) = notes {
        query = query.bind(notes);
    }
    if let Some(tags) = tags_json {
        query = query.bind(tags);
    }
    Ok(query.execute(pool).await?.rows_affected())
}

/// 按文本谓词更新向量
pub async fn update_vector_where(pool: &SqlitePool, predicate: &str, vector: &[f32]) -> Result<u64> {
    let sql = format!("UPDATE images SET vector = ? WHERE {}", predicate);
    let blob = super::utils::vector_to_blob(vector);
    Ok(sqlx::query(&sql).bind(blob).execute(pool).await?.rows_affected())
}

/// 按文本谓词删除，返回删除数量
pub async fn delete_where(pool: &SqlitePool, predicate: &str) -> Result<u64> {
    let sql = format!("DELETE FROM images WHERE {}", predicate);
    Ok(sqlx::query(&sql).execute(pool).await?.rows_affected())
}

/// 近邻搜索原语：全表扫描计算余弦距离，升序返回前 limit 条
///
/// 零向量哨兵不视为有效嵌入，直接跳过；可选谓词用于排除指定记录
pub async fn knn_search(
    pool: &SqlitePool,
    query: &[f32],
    limit: usize,
    predicate: Option<&str>,
) -> Result<Vec<(ImageRecord, f32)>> {
    let sql = match predicate {
        Some(p) => format!("SELECT {ALL_COLUMNS} FROM images WHERE {}", p),
        None => format!("SELECT {ALL_COLUMNS} FROM images"),
    };
    let rows = sqlx::query_as::<_, ImageRow>(&sql).fetch_all(pool).await?;

    let mut hits = Vec::new();
    for row in rows {
        let id = row.id.clone();
        let record = match ImageRecord::try_from(row) {
            Ok(record) => record,
            Err(e) => {
                warn!("跳过无法解析的记录 {}: {}", id, e);
                continue;
            }
        };
        if is_zero_vector(&record.vector) {
            continue;
        }
        let distance = cosine_distance(query, &record.vector);
        hits.push((record, distance));
    }
    hits.sort_by(|a, b| a.1.total_cmp(&b.1));
    hits.truncate(limit);
    Ok(hits)
}
