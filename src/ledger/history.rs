//! HistoryLedger：记录每次下载尝试结果的追加式日志
//!
//! 每行 `{task_id} {etag} {mod_time_nanos} {bytes_downloaded} {full_size}`。
//! 同一 TaskID 出现多行时以最后一行为准（重做会追加新行）

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use super::file::{AppendLog, LedgerError};
use super::types::HistoryDetail;

/// 下载历史日志
#[derive(Debug)]
pub struct HistoryLedger {
    log: AppendLog,
}

impl HistoryLedger {
    pub fn new(path: PathBuf) -> Self {
        Self {
            log: AppendLog::new(path),
        }
    }

    pub fn path(&self) -> &Path {
        self.log.path()
    }

    /// 追加一条下载结果
    pub fn put(&self, task_id: &str, detail: &HistoryDetail) -> Result<(), LedgerError> {
        self.log
            .append(&format!("{} {}", task_id, detail.to_detail()))
    }

    /// 列出所有历史：`TaskID -> "etag modTime bytesDownloaded fullSize"`
    ///
    /// 按第一个空格切分，没有空格的行被跳过
    pub fn list(&self) -> Result<HashMap<String, String>, LedgerError> {
        let mut history = HashMap::new();
        let mut skipped = 0;

        for line in self.log.read_lines()? {
            match line.split_once(' ') {
                Some((task_id, detail)) => {
                    history.insert(task_id.to_string(), detail.to_string());
                }
                None => skipped += 1,
            }
        }

        if skipped > 0 {
            warn!("history 日志中跳过 {} 行无效记录: {:?}", skipped, self.log.path());
        }
        debug!("已读取 {} 条历史记录", history.len());

        Ok(history)
    }
}
