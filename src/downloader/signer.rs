//! 下载链接签名
//!
//! 私有空间的下载链接格式：
//! ```text
//! {base_url}?e={deadline}&token={access_key}:{urlsafe_base64(hmac_sha1(secret_key, base_url?e=deadline))}
//! ```

use base64::{engine::general_purpose::URL_SAFE, Engine as _};
use chrono::Utc;
use hmac::{Hmac, Mac};
use sha1::Sha1;
use thiserror::Error;

type HmacSha1 = Hmac<Sha1>;

/// 签名错误
#[derive(Debug, Error)]
pub enum SignError {
    #[error("无效的签名密钥")]
    InvalidKey,
    #[error("无效的下载链接: {0}")]
    InvalidUrl(String),
}

/// 把对象 URL 转换为带鉴权信息的 URL
pub trait UrlSigner: Send + Sync {
    fn sign(&self, base_url: &str) -> Result<String, SignError>;
}

/// 公开空间：URL 原样返回
#[derive(Debug, Clone, Default)]
pub struct PublicUrlSigner;

impl UrlSigner for PublicUrlSigner {
    fn sign(&self, base_url: &str) -> Result<String, SignError> {
        Ok(base_url.to_string())
    }
}

/// 私有空间：HMAC-SHA1 签名的限时下载链接
#[derive(Clone)]
pub struct PrivateUrlSigner {
    access_key: String,
    secret_key: String,
    ttl_secs: u64,
}

impl std::fmt::Debug for PrivateUrlSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PrivateUrlSigner")
            .field("access_key", &"*".repeat(self.access_key.len()))
            .field("ttl_secs", &self.ttl_secs)
            .finish()
    }
}

impl PrivateUrlSigner {
    pub fn new(access_key: impl Into<String>, secret_key: impl Into<String>, ttl_secs: u64) -> Self {
        Self {
            access_key: access_key.into(),
            secret_key: secret_key.into(),
            ttl_secs,
        }
    }

    /// 使用指定的过期时间签名
    pub fn sign_with_deadline(&self, base_url: &str, deadline: i64) -> Result<String, SignError> {
        if base_url.is_empty() {
            return Err(SignError::InvalidUrl(base_url.to_string()));
        }

        let separator = if base_url.contains('?') { '&' } else { '?' };
        let url = format!("{}{}e={}", base_url, separator, deadline);

        let mut mac =
            HmacSha1::new_from_slice(self.secret_key.as_bytes()).map_err(|_| SignError::InvalidKey)?;
        mac.update(url.as_bytes());
        let sign = URL_SAFE.encode(mac.finalize().into_bytes());

        Ok(format!("{}&token={}:{}", url, self.access_key, sign))
    }
}

impl UrlSigner for PrivateUrlSigner {
    fn sign(&self, base_url: &str) -> Result<String, SignError> {
        let deadline = Utc::now().timestamp() + self.ttl_secs as i64;
        self.sign_with_deadline(base_url, deadline)
    }
}
