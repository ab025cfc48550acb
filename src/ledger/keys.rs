//! KeyLedger：记录“某个 key 需要备份”的追加式日志
//!
//! 每次入队追加一行 `{escaped_key}:{unix_nanos}`，记录永不删除

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use chrono::Utc;
use tracing::{debug, warn};

use super::escape::escape;
use super::file::{AppendLog, LedgerError};
use super::types::TaskId;

/// key 入队日志
#[derive(Debug)]
pub struct KeyLedger {
    log: AppendLog,
}

impl KeyLedger {
    pub fn new(path: PathBuf) -> Self {
        Self {
            log: AppendLog::new(path),
        }
    }

    pub fn path(&self) -> &Path {
        self.log.path()
    }

    /// 入队一个 key，返回生成的 TaskID
    pub fn put(&self, key: &str) -> Result<TaskId, LedgerError> {
        // 纳秒时间戳在 2262 年后溢出，届时退化为微秒精度
        let now = Utc::now();
        let nanos = now
            .timestamp_nanos_opt()
            .unwrap_or_else(|| now.timestamp_micros().saturating_mul(1000));
        self.put_at(key, nanos)
    }

    /// 以指定时间戳入队
    pub fn put_at(&self, key: &str, enqueued_at_nanos: i64) -> Result<TaskId, LedgerError> {
        if key.contains('\n') || key.contains('\r') {
            return Err(LedgerError::InvalidKey(key.to_string()));
        }
        let task_id = TaskId::new(escape(key), enqueued_at_nanos);
        self.log.append(&task_id.to_string())?;
        Ok(task_id)
    }

    /// 列出所有 key：`转义后的 key -> 时间戳字符串`
    ///
    /// 不是恰好两段的行被跳过；同一个 key 多次入队时保留最后一行
    pub fn list(&self) -> Result<HashMap<String, String>, LedgerError> {
        let mut keys = HashMap::new();
        let mut skipped = 0;

        for line in self.log.read_lines()? {
            let parts: Vec<&str> = line.split(':').collect();
            if parts.len() == 2 {
                keys.insert(parts[0].to_string(), parts[1].to_string());
            } else {
                skipped += 1;
            }
        }

        if skipped > 0 {
            warn!("keys 日志中跳过 {} 行无效记录: {:?}", skipped, self.log.path());
        }
        debug!("已读取 {} 个 key", keys.len());

        Ok(keys)
    }
}
