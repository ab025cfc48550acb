//! 备份执行器
//!
//! 一次备份 = 在运行锁内重新规划 + 依次执行新任务和重做任务。
//! 同一时刻最多一次备份在执行；第二次触发会等待前一次结束后重新规划，
//! 不会与进行中的备份合并，也不会被拒绝

use std::path::PathBuf;
use std::sync::Arc;

use dashmap::DashMap;
use futures::stream::{self, StreamExt};
use thiserror::Error;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{error, info, info_span, Instrument};
use uuid::Uuid;

use super::planner::{TaskPlan, TaskPlanner};
use super::task::{BackupTask, TaskKind};
use crate::config::BackupConfig;
use crate::downloader::{DownloadError, Downloader, PrivateUrlSigner};
use crate::ledger::{BackupWorkspace, HistoryLedger, LedgerError, TaskId};

/// 备份启动/执行错误
#[derive(Debug, Error)]
pub enum BackupError {
    #[error("任务规划失败: {0}")]
    Plan(#[from] LedgerError),
    #[error("没有可用的异步运行时: {0}")]
    Runtime(#[from] tokio::runtime::TryCurrentError),
    #[error("后台任务异常退出: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// 一次备份的汇总
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BackupReport {
    pub run_id: String,
    pub new_succeeded: usize,
    pub new_failed: usize,
    pub redo_succeeded: usize,
    pub redo_failed: usize,
}

impl BackupReport {
    pub fn failed(&self) -> usize {
        self.new_failed + self.redo_failed
    }

    fn record(&mut self, task: &BackupTask) {
        match (task.kind, task.is_success()) {
            (TaskKind::New, true) => self.new_succeeded += 1,
            (TaskKind::New, false) => self.new_failed += 1,
            (TaskKind::Redo, true) => self.redo_succeeded += 1,
            (TaskKind::Redo, false) => self.redo_failed += 1,
        }
    }
}

/// 备份执行器
pub struct BackupRunner {
    planner: TaskPlanner,
    history: Arc<HistoryLedger>,
    downloader: Downloader,
    /// 单次备份内的并发下载数
    concurrency: usize,
    /// 运行锁：同一时刻最多一次备份
    run_lock: Mutex<()>,
    /// 本地文件锁：同一路径不会有两个并发写入者
    path_locks: DashMap<PathBuf, Arc<Mutex<()>>>,
}

impl BackupRunner {
    pub fn new(workspace: &BackupWorkspace, downloader: Downloader, concurrency: usize) -> Self {
        Self {
            planner: TaskPlanner::new(workspace.keys.clone(), workspace.history.clone()),
            history: workspace.history.clone(),
            downloader,
            concurrency: concurrency.max(1),
            run_lock: Mutex::new(()),
            path_locks: DashMap::new(),
        }
    }

    /// 按配置创建（私有空间签名）
    pub fn from_config(
        config: &BackupConfig,
        workspace: &BackupWorkspace,
    ) -> Result<Self, DownloadError> {
        let signer = PrivateUrlSigner::new(
            config.access_key.clone(),
            config.secret_key.clone(),
            config.url_ttl_secs,
        );
        let downloader = Downloader::new(
            config.scheme.clone(),
            config.domain.clone(),
            Arc::new(signer),
            workspace.data_dir().to_path_buf(),
        )?;
        Ok(Self::new(workspace, downloader, config.concurrency))
    }

    pub fn planner(&self) -> &TaskPlanner {
        &self.planner
    }

    /// 在后台启动一次备份，立即返回
    ///
    /// 调用方可以等待返回的句柄，也可以直接丢弃
    pub fn start_backup(
        self: &Arc<Self>,
    ) -> Result<JoinHandle<Result<BackupReport, BackupError>>, BackupError> {
        info!("Starting backup tasks");
        self.planner.check_ready()?;
        let handle = tokio::runtime::Handle::try_current()?;

        let runner = Arc::clone(self);
        Ok(handle.spawn(async move {
            let result = runner.plan_and_run().await;
            if let Err(e) = &result {
                error!("备份失败: {}", e);
            }
            result
        }))
    }

    /// 获取运行锁后重新规划并执行
    pub async fn plan_and_run(&self) -> Result<BackupReport, BackupError> {
        let _guard = self.run_lock.lock().await;
        let planner = self.planner.clone();
        let plan = tokio::task::spawn_blocking(move || planner.plan()).await??;
        Ok(self.execute(plan).await)
    }

    /// 获取运行锁后执行给定的工作列表
    pub async fn run_backup(&self, plan: TaskPlan) -> BackupReport {
        let _guard = self.run_lock.lock().await;
        self.execute(plan).await
    }

    async fn execute(&self, plan: TaskPlan) -> BackupReport {
        let run_id = Uuid::new_v4().to_string();
        let span = info_span!("backup", run_id = %run_id);

        async move {
            let mut report = BackupReport {
                run_id: run_id.clone(),
                ..Default::default()
            };

            // 新任务
            info!("##### {} file(s) to download #####", plan.new_tasks.len());
            let tasks = plan.new_tasks.into_iter().map(BackupTask::new_task);
            for task in self.run_tasks(tasks).await {
                report.record(&task);
            }
            info!(
                "##### Tasks ended with {} succeeded, {} failed #####",
                report.new_succeeded, report.new_failed
            );

            // 重做任务
            info!("##### {} file(s) to redo #####", plan.redo_tasks.len());
            let redos = plan
                .redo_tasks
                .into_iter()
                .map(|(task_id, offset)| BackupTask::redo(task_id, offset));
            for task in self.run_tasks(redos).await {
                report.record(&task);
            }
            info!(
                "##### Redos ended with {} succeeded, {} failed #####",
                report.redo_succeeded, report.redo_failed
            );

            self.path_locks.clear();
            report
        }
        .instrument(span)
        .await
    }

    async fn run_tasks(&self, tasks: impl Iterator<Item = BackupTask>) -> Vec<BackupTask> {
        stream::iter(tasks)
            .map(|task| self.run_task(task))
            .buffer_unordered(self.concurrency)
            .collect()
            .await
    }

    async fn run_task(&self, mut task: BackupTask) -> BackupTask {
        let key = match task
            .task_id
            .parse::<TaskId>()
            .and_then(|task_id| task_id.key())
        {
            Ok(key) => key,
            Err(e) => {
                error!("{}", e);
                task.mark_failed(e.to_string());
                return task;
            }
        };

        let path = match self.downloader.content_path(&key) {
            Ok(path) => path,
            Err(e) => {
                error!("Failed downloading {}: {}", key, e);
                task.mark_failed(e.to_string());
                return task;
            }
        };
        let path_lock = self.path_locks.entry(path).or_default().clone();
        let _guard = path_lock.lock().await;

        info!("Downloading {} (offset={})", key, task.resume_offset);
        task.mark_downloading();

        let outcome = match self.downloader.download(&key, task.resume_offset).await {
            Ok(outcome) => outcome,
            Err(e) => {
                error!("Failed downloading {}: {}", key, e);
                task.mark_failed(e.to_string());
                return task;
            }
        };

        let history = self.history.clone();
        let task_id = task.task_id.clone();
        let detail = outcome.to_history_detail();
        let logged = tokio::task::spawn_blocking(move || history.put(&task_id, &detail))
            .await
            .map_err(|e| e.to_string())
            .and_then(|result| result.map_err(|e| e.to_string()));
        if let Err(e) = logged {
            error!("Failed logging {} to history: {}", key, e);
            task.mark_failed(e);
            return task;
        }

        task.mark_finished(&outcome);
        if task.is_success() {
            info!("Succeeded downloading {}", key);
        } else {
            info!(
                "Partially downloaded {} ({} / {} bytes), will redo next run",
                key, outcome.bytes_downloaded, outcome.full_size
            );
        }
        task
    }
}
