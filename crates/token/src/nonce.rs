//! nonce 生成
//!
//! 使用线程本地伪随机源生成 base-36 字母数字串。nonce 只用于区分每次签发、
//! 标记新鲜度，不承担保密性。

use rand::Rng;

/// nonce 长度（字符）
pub const NONCE_LENGTH: usize = 26;

const ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// 生成一个新的 nonce
pub fn generate() -> String {
    let mut rng = rand::thread_rng();
    (0..NONCE_LENGTH)
        .map(|_| ALPHABET[rng.gen_range(0..ALPHABET.len())] as char)
        .collect()
}
