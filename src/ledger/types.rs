//! 日志记录类型
//!
//! ## 行格式
//!
//! keys.log：
//! ```text
//! {escaped_key}:{unix_nanos}
//! ```
//!
//! history.log：
//! ```text
//! {escaped_key}:{unix_nanos} {etag} {mod_time_nanos} {bytes_downloaded} {full_size}
//! ```

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

use super::escape::unescape;

/// TaskID 解析错误
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TaskIdError {
    /// 不是恰好两段 `key:timestamp`
    #[error("TaskID 格式错误: {0}")]
    Malformed(String),
    /// 时间戳不是整数
    #[error("TaskID 时间戳无效: {0}")]
    InvalidTimestamp(String),
    /// key 无法反转义
    #[error("TaskID key 反转义失败: {0}")]
    InvalidKey(String),
}

/// 任务标识：`(转义后的 key, 入队时间戳)`
///
/// 同一个 key 在不同时间入队是不同的任务
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TaskId {
    /// 转义后的 key（不含 `:`）
    pub escaped_key: String,
    /// 入队时间（Unix 纳秒）
    pub enqueued_at_nanos: i64,
}

impl TaskId {
    pub fn new(escaped_key: impl Into<String>, enqueued_at_nanos: i64) -> Self {
        Self {
            escaped_key: escaped_key.into(),
            enqueued_at_nanos,
        }
    }

    /// 反转义后的原始 key
    pub fn key(&self) -> Result<String, TaskIdError> {
        unescape(&self.escaped_key).map_err(|_| TaskIdError::InvalidKey(self.escaped_key.clone()))
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.escaped_key, self.enqueued_at_nanos)
    }
}

impl FromStr for TaskId {
    type Err = TaskIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split(':').collect();
        if parts.len() != 2 {
            return Err(TaskIdError::Malformed(s.to_string()));
        }
        let enqueued_at_nanos = parts[1]
            .parse::<i64>()
            .map_err(|_| TaskIdError::InvalidTimestamp(s.to_string()))?;
        Ok(Self::new(parts[0], enqueued_at_nanos))
    }
}

/// 一次下载尝试的结果明细（history.log 中 TaskID 之后的部分）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryDetail {
    /// 响应头中的 Etag（可能为空）
    pub etag: String,
    /// 本地文件修改时间（Unix 纳秒）
    pub mod_time_nanos: i64,
    /// 本地文件实际大小
    pub bytes_downloaded: u64,
    /// 对象完整大小
    pub full_size: u64,
}

impl HistoryDetail {
    /// 是否已下载完整
    pub fn is_complete(&self) -> bool {
        self.bytes_downloaded >= self.full_size
    }

    /// 解析明细（4 个空格分隔字段，数值字段必须合法）
    pub fn parse(detail: &str) -> Option<Self> {
        let parts: Vec<&str> = detail.split(' ').collect();
        if parts.len() != 4 {
            return None;
        }
        Some(Self {
            etag: parts[0].to_string(),
            mod_time_nanos: parts[1].parse().ok()?,
            bytes_downloaded: parts[2].parse().ok()?,
            full_size: parts[3].parse().ok()?,
        })
    }

    /// 序列化为明细格式
    ///
    /// Etag 中的空白字符会被转义，保证字段数量不变
    pub fn to_detail(&self) -> String {
        format!(
            "{} {} {} {}",
            sanitize_etag(&self.etag),
            self.mod_time_nanos,
            self.bytes_downloaded,
            self.full_size
        )
    }
}

fn sanitize_etag(etag: &str) -> String {
    let mut out = String::with_capacity(etag.len());
    for c in etag.chars() {
        match c {
            ' ' => out.push_str("%20"),
            '\t' => out.push_str("%09"),
            '\r' => out.push_str("%0D"),
            '\n' => out.push_str("%0A"),
            _ => out.push(c),
        }
    }
    out
}
