//! 任务规划：对比 keys 日志和 history 日志生成工作列表
//!
//! 对 keys 日志中的每个 TaskID：
//! - history 中没有记录 → 新任务
//! - 有记录且 `bytes_downloaded < full_size` → 重做任务，从 `bytes_downloaded` 续传
//! - 有记录且 `bytes_downloaded >= full_size` → 已完成，跳过
//! - 记录明细无法解析 → 记录日志后丢弃（不进入任何列表，避免损坏记录反复失败）

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, info};

use crate::ledger::{HistoryDetail, HistoryLedger, KeyLedger, LedgerError};

/// 一次规划的结果
///
/// `new_tasks` 的顺序与 `redo_tasks` 的遍历顺序均无保证
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskPlan {
    /// 从未尝试过的 TaskID
    pub new_tasks: Vec<String>,
    /// 部分完成的 TaskID -> 续传偏移
    pub redo_tasks: HashMap<String, u64>,
}

impl TaskPlan {
    pub fn is_empty(&self) -> bool {
        self.new_tasks.is_empty() && self.redo_tasks.is_empty()
    }
}

/// 任务规划器
#[derive(Debug, Clone)]
pub struct TaskPlanner {
    keys: Arc<KeyLedger>,
    history: Arc<HistoryLedger>,
}

impl TaskPlanner {
    pub fn new(keys: Arc<KeyLedger>, history: Arc<HistoryLedger>) -> Self {
        Self { keys, history }
    }

    /// 检查两个日志文件都可访问
    pub fn check_ready(&self) -> Result<(), LedgerError> {
        for path in [self.keys.path(), self.history.path()] {
            std::fs::metadata(path).map_err(|source| LedgerError::Io {
                path: path.to_path_buf(),
                source,
            })?;
        }
        Ok(())
    }

    /// 生成工作列表
    ///
    /// 任一日志读取失败时返回错误，不产生部分结果
    pub fn plan(&self) -> Result<TaskPlan, LedgerError> {
        let keys = self.keys.list()?;
        let history = self.history.list()?;

        let mut plan = TaskPlan::default();
        let mut done = 0;
        let mut dropped = 0;

        for (key, ts) in keys {
            let task_id = format!("{}:{}", key, ts);
            match history.get(&task_id) {
                None => plan.new_tasks.push(task_id),
                Some(raw) => match HistoryDetail::parse(raw) {
                    Some(detail) if detail.is_complete() => done += 1,
                    Some(detail) => {
                        plan.redo_tasks.insert(task_id, detail.bytes_downloaded);
                    }
                    None => {
                        debug!("历史记录明细无法解析，丢弃任务 {}: {:?}", task_id, raw);
                        dropped += 1;
                    }
                },
            }
        }

        info!(
            "任务规划完成: 新任务 {}, 重做 {}, 已完成 {}, 丢弃 {}",
            plan.new_tasks.len(),
            plan.redo_tasks.len(),
            done,
            dropped
        );

        Ok(plan)
    }
}
