use sha2::{Digest, Sha256};

/// 日志里代替会话ID / 令牌ID 的短指纹，原值不落日志
pub fn fingerprint(secret: &str) -> String {
    let digest = format!("{:x}", Sha256::digest(secret.as_bytes()));
    digest[..12].to_string()
}
