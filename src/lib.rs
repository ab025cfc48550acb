// Bucket Backup Library
// 对象存储空间增量备份：key 入队、任务规划、断点续传下载

// 配置管理模块
pub mod config;

// 任务日志模块（keys.log / history.log）
pub mod ledger;

// 下载引擎模块
pub mod downloader;

// 备份规划与执行模块
pub mod backup;

// Web服务器模块
pub mod server;

// 日志模块
pub mod logging;

#[cfg(test)]
mod testutil;

// 导出常用类型
pub use backup::{BackupError, BackupReport, BackupRunner, TaskPlan, TaskPlanner};
pub use config::{BackupConfig, ConfigError, LogConfig};
pub use downloader::{DownloadError, DownloadOutcome, Downloader, PrivateUrlSigner, UrlSigner};
pub use ledger::{BackupWorkspace, HistoryDetail, HistoryLedger, KeyLedger, LedgerError, TaskId};
pub use server::AppState;
