//! 设备 / 寄存器 ID 生成。
//!
//! 格式：单字母前缀 + 8 位小写十六进制（取自随机 v4 UUID）。

/// 前缀之后的字符数。
pub const ID_BODY_LEN: usize = 8;

/// 生成一个带前缀的定长 ID。
pub fn generate_id(prefix: char) -> String {
    let raw = uuid::Uuid::new_v4().simple().to_string();
    format!("{}{}", prefix, &raw[..ID_BODY_LEN])
}

/// 生成与已有 ID 不冲突的新 ID。
pub fn generate_unique_id(prefix: char, taken: impl Fn(&str) -> bool) -> String {
    loop {
        let id = generate_id(prefix);
        if !taken(&id) {
            return id;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_fixed_width_and_prefixed() {
        let id = generate_id('D');
        assert_eq!(id.len(), 1 + ID_BODY_LEN);
        assert!(id.starts_with('D'));
        assert!(id[1..].chars().all(|c| c.is_ascii_alphanumeric()));
    }

    #[test]
    fn unique_id_skips_taken() {
        let first = generate_id('R');
        let next = generate_unique_id('R', |candidate| candidate == first);
        assert_ne!(next, first);
    }
}
