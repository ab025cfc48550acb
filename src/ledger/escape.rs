//! 对象 key 的转义
//!
//! key 会原样出现在日志行和对象 URL 中，因此需要做 URL 安全的百分号转义：
//! - 按 `/` 切分，每一段单独转义，`/` 保留为路径分隔符
//! - 非保留字符（字母、数字、`-_.~`）保持不变
//! - `:` 一定被转义为 `%3A`，不会与时间戳分隔符混淆
//! - 换行符被转义为 `%0A`，不会破坏按行存储的格式

use std::string::FromUtf8Error;

/// 转义 key
pub fn escape(key: &str) -> String {
    key.split('/')
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

/// 反转义 key
///
/// 解码后不是合法 UTF-8 时返回错误
pub fn unescape(escaped: &str) -> Result<String, FromUtf8Error> {
    urlencoding::decode(escaped).map(|s| s.into_owned())
}
