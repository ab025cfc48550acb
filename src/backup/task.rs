use crate::downloader::DownloadOutcome;

/// 备份任务状态
///
/// `Pending -> Downloading -> {Completed | PartiallyCompleted | Failed}`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskStatus {
    /// 等待中
    Pending,
    /// 下载中
    Downloading,
    /// 已完成
    Completed,
    /// 部分完成（已记录进度，等待下次重做）
    PartiallyCompleted,
    /// 失败
    Failed,
}

/// 任务来源
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskKind {
    /// 从未尝试过
    New,
    /// 上次未下载完整
    Redo,
}

/// 单次备份中的一个任务
#[derive(Debug, Clone)]
pub struct BackupTask {
    /// TaskID（`key:timestamp`）
    pub task_id: String,
    pub kind: TaskKind,
    /// 续传偏移
    pub resume_offset: u64,
    pub status: TaskStatus,
    /// 本地已有字节数
    pub bytes_downloaded: u64,
    /// 对象完整大小（响应之前为 0）
    pub full_size: u64,
    /// 开始时间 (Unix timestamp)
    pub started_at: Option<i64>,
    /// 结束时间 (Unix timestamp)
    pub finished_at: Option<i64>,
    /// 错误信息
    pub error: Option<String>,
}

impl BackupTask {
    fn with_kind(task_id: String, kind: TaskKind, resume_offset: u64) -> Self {
        Self {
            task_id,
            kind,
            resume_offset,
            status: TaskStatus::Pending,
            bytes_downloaded: resume_offset,
            full_size: 0,
            started_at: None,
            finished_at: None,
            error: None,
        }
    }

    /// 新任务，从 0 开始
    pub fn new_task(task_id: String) -> Self {
        Self::with_kind(task_id, TaskKind::New, 0)
    }

    /// 重做任务，从记录的偏移开始
    pub fn redo(task_id: String, resume_offset: u64) -> Self {
        Self::with_kind(task_id, TaskKind::Redo, resume_offset)
    }

    /// 标记为下载中
    pub fn mark_downloading(&mut self) {
        self.status = TaskStatus::Downloading;
        if self.started_at.is_none() {
            self.started_at = Some(chrono::Utc::now().timestamp());
        }
    }

    /// 根据下载结果标记为已完成或部分完成
    pub fn mark_finished(&mut self, outcome: &DownloadOutcome) {
        self.bytes_downloaded = outcome.bytes_downloaded;
        self.full_size = outcome.full_size;
        self.finished_at = Some(chrono::Utc::now().timestamp());
        if outcome.is_complete() {
            self.status = TaskStatus::Completed;
        } else {
            self.status = TaskStatus::PartiallyCompleted;
            self.error = outcome.interrupted.clone();
        }
    }

    /// 标记为失败
    pub fn mark_failed(&mut self, error: String) {
        self.status = TaskStatus::Failed;
        self.finished_at = Some(chrono::Utc::now().timestamp());
        self.error = Some(error);
    }

    /// 只有完整下载才计为成功
    pub fn is_success(&self) -> bool {
        self.status == TaskStatus::Completed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn outcome(bytes_downloaded: u64, full_size: u64) -> DownloadOutcome {
        DownloadOutcome {
            status: 200,
            bytes_downloaded,
            full_size,
            mod_time_nanos: 1,
            etag: String::new(),
            interrupted: (bytes_downloaded < full_size).then(|| "short".to_string()),
        }
    }

    #[test]
    fn test_task_creation() {
        let task = BackupTask::new_task("foo:1".to_string());
        assert_eq!(task.kind, TaskKind::New);
        assert_eq!(task.resume_offset, 0);
        assert_eq!(task.status, TaskStatus::Pending);

        let task = BackupTask::redo("foo:1".to_string(), 500);
        assert_eq!(task.kind, TaskKind::Redo);
        assert_eq!(task.resume_offset, 500);
        assert_eq!(task.bytes_downloaded, 500);
    }

    #[test]
    fn test_completed() {
        let mut task = BackupTask::new_task("foo:1".to_string());
        task.mark_downloading();
        assert_eq!(task.status, TaskStatus::Downloading);
        assert!(task.started_at.is_some());

        task.mark_finished(&outcome(10, 10));
        assert_eq!(task.status, TaskStatus::Completed);
        assert!(task.is_success());
        assert!(task.error.is_none());
    }

    #[test]
    fn test_partially_completed_is_not_success() {
        let mut task = BackupTask::redo("foo:1".to_string(), 2);
        task.mark_downloading();
        task.mark_finished(&outcome(5, 10));

        assert_eq!(task.status, TaskStatus::PartiallyCompleted);
        assert_eq!(task.bytes_downloaded, 5);
        assert_eq!(task.error.as_deref(), Some("short"));
        assert!(!task.is_success());
    }

    #[test]
    fn test_failed() {
        let mut task = BackupTask::new_task("foo:1".to_string());
        task.mark_failed("HTTP错误: Code: 404".to_string());
        assert_eq!(task.status, TaskStatus::Failed);
        assert!(task.finished_at.is_some());
        assert!(!task.is_success());
    }
}
