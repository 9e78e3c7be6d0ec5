//! 嵌入向量的公共约定：维度、零向量哨兵、距离计算

/// 嵌入向量维度，与部署的 CLIP ViT-B/32 模型一致，修改需要迁移数据
pub const VECTOR_DIM: usize = 512;

/// 判定零向量的容差
pub const ZERO_EPS: f32 = 1e-9;

/// 返回表示「尚未计算嵌入」的哨兵向量
pub fn zero_vector() -> Vec<f32> {
    vec![0.0; VECTOR_DIM]
}

/// 所有分量都在容差内为零的向量视为哨兵，不参与任何相似度计算
pub fn is_zero_vector(v: &[f32]) -> bool {
    v.iter().all(|x| x.abs() <= ZERO_EPS)
}

/// 余弦距离，范围 [0, 2]，越小越相似
///
/// 模为零的向量不应该出现在这里，出现时返回最大距离
pub fn cosine_distance(a: &[f32], b: &[f32]) -> f32 {
    let mut dot = 0.0f32;
    let mut na = 0.0f32;
    let mut nb = 0.0f32;
    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        na += x * x;
        nb += y * y;
    }
    let norm = na.sqrt() * nb.sqrt();
    if norm <= ZERO_EPS {
        return 2.0;
    }
    1.0 - dot / norm
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_vector_is_sentinel() {
        assert!(is_zero_vector(&zero_vector()));
    }

    #[test]
    fn test_near_zero_vector_is_sentinel() {
        // 不只是字面量零，容差内的值也算哨兵
        let mut v = zero_vector();
        v[0] = 1e-10;
        v[511] = -1e-10;
        assert!(is_zero_vector(&v));
    }

    #[test]
    fn test_small_component_is_not_sentinel() {
        let mut v = zero_vector();
        v[3] = 1e-3;
        assert!(!is_zero_vector(&v));
    }

    #[test]
    fn test_cosine_distance_identical() {
        let v = vec![0.3f32; VECTOR_DIM];
        assert!(cosine_distance(&v, &v).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_distance_orthogonal() {
        let mut a = zero_vector();
        let mut b = zero_vector();
        a[0] = 1.0;
        b[1] = 1.0;
        assert!((cosine_distance(&a, &b) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_distance_opposite() {
        let mut a = zero_vector();
        let mut b = zero_vector();
        a[0] = 1.0;
        b[0] = -1.0;
        assert!((cosine_distance(&a, &b) - 2.0).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_distance_zero_norm() {
        let mut a = zero_vector();
        a[0] = 1.0;
        assert_eq!(cosine_distance(&a, &zero_vector()), 2.0);
    }
}
