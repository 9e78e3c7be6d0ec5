//! 近似重复聚类：逐条近邻查询建图，并查集提取连通分量

use std::collections::HashMap;

use log::warn;

use crate::catalog::numeric_id;
use crate::db::utils::exclude_id_predicate;
use crate::db::{Database, ImageItem, ImageRecord, crud};
use crate::error::Result;
use crate::vector::is_zero_vector;

/// 每张图片查询的近邻数量
pub const NEIGHBORS_K: usize = 40;

/// 带路径压缩的并查集
pub struct UnionFind {
    parent: Vec<usize>,
}

impl UnionFind {
    pub fn new(n: usize) -> Self {
        Self { parent: (0..n).collect() }
    }

    pub fn find(&mut self, x: usize) -> usize {
        let mut root = x;
        while self.parent[root] != root {
            root = self.parent[root];
        }
        let mut cur = x;
        while self.parent[cur] != root {
            let next = self.parent[cur];
            self.parent[cur] = root;
            cur = next;
        }
        root
    }

    pub fn union(&mut self, a: usize, b: usize) {
        let ra = self.find(a);
        let rb = self.find(b);
        if ra != rb {
            self.parent[ra] = rb;
        }
    }
}

fn member_key(record: &ImageRecord) -> (i64, &str) {
    (numeric_id(&record.id), record.id.as_str())
}

/// 距离低于 threshold 的记录对视为无向边，连通分量即重复候选分组
///
/// - 零向量哨兵的记录不参与聚类
/// - 边与查询方向无关，两侧查到同一对只贡献一条边
/// - 单条记录的近邻查询失败只影响它自己的出边，不会中断整体计算
/// - 分组按成员数降序，同大小按最小成员 id（数值序）升序，结果确定
pub async fn duplicate_groups(
    db: &Database,
    threshold: f32,
    max_groups: usize,
) -> Result<Vec<Vec<ImageItem>>> {
    let records: Vec<ImageRecord> = crud::list_images(db)
        .await?
        .into_iter()
        .filter(|r| !is_zero_vector(&r.vector))
        .collect();

    let index: HashMap<&str, usize> =
        records.iter().enumerate().map(|(i, r)| (r.id.as_str(), i)).collect();

    let mut uf = UnionFind::new(records.len());
    for (i, record) in records.iter().enumerate() {
        let predicate = exclude_id_predicate(&record.id);
        let hits = match crud::knn_search(db, &record.vector, NEIGHBORS_K, Some(&predicate)).await {
            Ok(hits) => hits,
            Err(e) => {
                warn!("忽略 {} 的近邻查询失败: {}", record.id, e);
                continue;
            }
        };
        for (neighbor, distance) in hits {
            if distance >= threshold {
                continue;
            }
            if let Some(&j) = index.get(neighbor.id.as_str()) {
                uf.union(i, j);
            }
        }
    }

    let mut components: HashMap<usize, Vec<usize>> = HashMap::new();
    for i in 0..records.len() {
        components.entry(uf.find(i)).or_default().push(i);
    }

    let mut groups: Vec<Vec<usize>> =
        components.into_values().filter(|members| members.len() >= 2).collect();
    for group in &mut groups {
        group.sort_by(|&a, &b| member_key(&records[a]).cmp(&member_key(&records[b])));
    }
    // 组内已按成员 id 升序，首个成员即最小 id
    groups.sort_by(|a, b| {
        b.len().cmp(&a.len()).then_with(|| member_key(&records[a[0]]).cmp(&member_key(&records[b[0]])))
    });
    groups.truncate(max_groups);

    Ok(groups
        .into_iter()
        .map(|members| {
            members.into_iter().map(|i| records[i].clone().into_item()).collect::<Vec<_>>()
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_union_find_basic() {
        let mut uf = UnionFind::new(4);
        assert_ne!(uf.find(0), uf.find(1));
        uf.union(0, 1);
        assert_eq!(uf.find(0), uf.find(1));
        assert_ne!(uf.find(0), uf.find(2));
    }

    #[test]
    fn test_union_find_transitive() {
        let mut uf = UnionFind::new(5);
        uf.union(0, 1);
        uf.union(1, 2);
        uf.union(3, 4);
        assert_eq!(uf.find(0), uf.find(2));
        assert_ne!(uf.find(2), uf.find(3));
    }

    #[test]
    fn test_union_find_duplicate_edges_collapse() {
        let mut uf = UnionFind::new(3);
        uf.union(0, 1);
        uf.union(1, 0);
        uf.union(0, 1);
        let root = uf.find(0);
        assert_eq!(uf.find(1), root);
        assert_ne!(uf.find(2), root);
    }
}
