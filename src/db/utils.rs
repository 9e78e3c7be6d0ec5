/// 把向量编码为小端 f32 的 BLOB
pub fn vector_to_blob(v: &[f32]) -> Vec<u8> {
    bytemuck::cast_slice(v).to_vec()
}

/// 从 BLOB 解码向量，长度不是 4 的倍数时多余字节被丢弃
pub fn blob_to_vector(blob: &[u8]) -> Vec<f32> {
    let len = blob.len() / 4 * 4;
    bytemuck::pod_collect_to_vec(&blob[..len])
}

/// 转义字符串中的单引号，用于拼接文本谓词
pub fn escape_quotes(s: &str) -> String {
    s.replace('\'', "''")
}

/// 根据 id 构造等值谓词，id 中的引号会被转义，避免拼出畸形谓词
pub fn id_predicate(id: &str) -> String {
    format!("id = '{}'", escape_quotes(id))
}

/// 根据 id 构造排除谓词
pub fn exclude_id_predicate(id: &str) -> String {
    format!("id != '{}'", escape_quotes(id))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vector_blob_roundtrip() {
        let v = vec![0.5f32, -1.25, 3.75];
        assert_eq!(blob_to_vector(&vector_to_blob(&v)), v);
    }

    #[test]
    fn test_blob_to_vector_unaligned_source() {
        // BLOB 从数据库读出时不保证 4 字节对齐
        let mut blob = vec![0u8];
        blob.extend_from_slice(&vector_to_blob(&[1.0f32, 2.0]));
        assert_eq!(blob_to_vector(&blob[1..]), vec![1.0f32, 2.0]);
    }

    #[test]
    fn test_id_predicate_plain() {
        assert_eq!(id_predicate("1736899200000"), "id = '1736899200000'");
    }

    #[test]
    fn test_id_predicate_escapes_quotes() {
        assert_eq!(id_predicate("a'b"), "id = 'a''b'");
        assert_eq!(exclude_id_predicate("x''"), "id != 'x'''''");
    }
}
