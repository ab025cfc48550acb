// 控制面状态

use std::sync::Arc;

use crate::backup::BackupRunner;
use crate::config::BackupConfig;
use crate::ledger::{BackupWorkspace, KeyLedger};

/// 控制面共享状态
#[derive(Clone)]
pub struct AppState {
    /// key 入队日志
    pub keys: Arc<KeyLedger>,
    /// 备份执行器
    pub runner: Arc<BackupRunner>,
    /// IP 白名单，为空时不限制
    pub allowed_ips: Arc<Vec<String>>,
}

impl AppState {
    pub fn new(config: &BackupConfig, workspace: &BackupWorkspace, runner: Arc<BackupRunner>) -> Self {
        Self {
            keys: workspace.keys.clone(),
            runner,
            allowed_ips: Arc::new(config.ips.clone()),
        }
    }

    /// 判断调用方 IP 是否允许访问
    pub fn is_allowed(&self, ip: &str) -> bool {
        self.allowed_ips.is_empty() || self.allowed_ips.iter().any(|allowed| allowed == ip)
    }
}
