use rand::Rng;
use regex::Regex;
use std::sync::OnceLock;

const COUPON_CODE_CHARSET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";
const GENERATED_COUPON_CODE_LEN: usize = 8;

fn coupon_code_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[A-Z0-9_-]{3,32}$").expect("valid coupon code regex"))
}

/// 生成8位优惠码（去掉易混淆字符 0/O, 1/I）
pub fn generate_coupon_code() -> String {
    let mut rng = rand::thread_rng();
    (0..GENERATED_COUPON_CODE_LEN)
        .map(|_| {
            let idx = rng.gen_range(0..COUPON_CODE_CHARSET.len());
            COUPON_CODE_CHARSET[idx] as char
        })
        .collect()
}

/// 规范化优惠码: 去空白并转大写
pub fn normalize_coupon_code(code: &str) -> String {
    code.trim().to_ascii_uppercase()
}

/// 校验规范化后的优惠码格式
pub fn is_valid_coupon_code(code: &str) -> bool {
    coupon_code_regex().is_match(code)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_coupon_code() {
        let code = generate_coupon_code();
        assert_eq!(code.len(), GENERATED_COUPON_CODE_LEN);
        assert!(code.bytes().all(|b| COUPON_CODE_CHARSET.contains(&b)));
        assert!(is_valid_coupon_code(&code));
    }

    #[test]
    fn test_normalize_coupon_code() {
        assert_eq!(normalize_coupon_code("  summer-10 "), "SUMMER-10");
    }

    #[test]
    fn test_is_valid_coupon_code() {
        assert!(is_valid_coupon_code("SAVE10"));
        assert!(is_valid_coupon_code("BLACK_FRIDAY-2025"));
        assert!(!is_valid_coupon_code("AB"));
        assert!(!is_valid_coupon_code("save10"));
        assert!(!is_valid_coupon_code("SAVE 10"));
        assert!(!is_valid_coupon_code(&"X".repeat(33)));
    }
}
