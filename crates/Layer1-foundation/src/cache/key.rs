//! 캐시 키 생성

use sha2::{Digest, Sha256};

/// memcached 계열 백엔드가 허용하는 최대 키 길이
pub const MAX_KEY_LENGTH: usize = 250;

/// 사이트 접두사를 붙이고 백엔드가 받을 수 있는 형태로 정규화한 캐시 키
///
/// 공백/제어 문자는 `_`로 바뀌고, 최대 길이를 넘는 키는 앞부분과 SHA-256
/// 다이제스트로 줄인다.
pub fn make_cache_key(prefix: Option<&str>, key: &str) -> String {
    let full = match prefix {
        Some(prefix) if !prefix.is_empty() => format!("{}:{}", prefix, key),
        _ => key.to_string(),
    };

    let sanitized: String = full
        .chars()
        .map(|c| if c.is_whitespace() || c.is_control() { '_' } else { c })
        .collect();

    if sanitized.len() <= MAX_KEY_LENGTH {
        return sanitized;
    }

    let digest = format!("{:x}", Sha256::digest(sanitized.as_bytes()));
    let keep = MAX_KEY_LENGTH - digest.len() - 1;

    // UTF-8 경계에서 자르기
    let mut cut = keep;
    while !sanitized.is_char_boundary(cut) {
        cut -= 1;
    }

    format!("{}-{}", &sanitized[..cut], digest)
}
