//! 备份工作目录
//!
//! ```text
//! {baseDir}/{bucket}/
//! ├── log/
//! │   ├── keys.log
//! │   └── history.log
//! └── data/
//!     └── {key 对应的路径}
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{error, info};

use super::file::{touch, LedgerError};
use super::history::HistoryLedger;
use super::keys::KeyLedger;
use crate::config::BackupConfig;

/// 已初始化的备份工作目录
#[derive(Debug, Clone)]
pub struct BackupWorkspace {
    pub keys: Arc<KeyLedger>,
    pub history: Arc<HistoryLedger>,
    data_dir: PathBuf,
}

impl BackupWorkspace {
    /// 创建目录和日志文件（已存在时保持不变）
    pub fn init(config: &BackupConfig) -> Result<Self, LedgerError> {
        let log_dir = config.log_dir();
        create_private_dir(&log_dir).map_err(|e| {
            error!("初始化日志目录失败: {:?}", log_dir);
            e
        })?;

        let keys_path = config.keys_log_path();
        touch(&keys_path)?;
        let history_path = config.history_log_path();
        touch(&history_path)?;

        let data_dir = config.data_dir();
        create_private_dir(&data_dir).map_err(|e| {
            error!("初始化数据目录失败: {:?}", data_dir);
            e
        })?;

        info!("备份工作目录已就绪: {:?}", config.bucket_dir());

        Ok(Self {
            keys: Arc::new(KeyLedger::new(keys_path)),
            history: Arc::new(HistoryLedger::new(history_path)),
            data_dir,
        })
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }
}

/// 递归创建仅所有者可访问的目录
pub(crate) fn create_private_dir(path: &Path) -> Result<(), LedgerError> {
    let mut builder = fs::DirBuilder::new();
    builder.recursive(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        builder.mode(0o700);
    }
    builder.create(path).map_err(|source| LedgerError::Io {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::test_config;
    use tempfile::TempDir;

    #[test]
    fn test_init_creates_layout() {
        let temp_dir = TempDir::new().unwrap();
        let config = test_config(temp_dir.path(), "127.0.0.1:1");

        let workspace = BackupWorkspace::init(&config).unwrap();

        assert!(config.keys_log_path().is_file());
        assert!(config.history_log_path().is_file());
        assert!(workspace.data_dir().is_dir());
        assert_eq!(workspace.data_dir(), config.data_dir());
    }

    #[cfg(unix)]
    #[test]
    fn test_dirs_are_private() {
        use std::os::unix::fs::PermissionsExt;

        let temp_dir = TempDir::new().unwrap();
        let config = test_config(temp_dir.path(), "127.0.0.1:1");
        BackupWorkspace::init(&config).unwrap();

        let mode = fs::metadata(config.data_dir()).unwrap().permissions().mode();
        assert_eq!(mode & 0o077, 0);
    }

    #[test]
    fn test_init_is_idempotent() {
        let temp_dir = TempDir::new().unwrap();
        let config = test_config(temp_dir.path(), "127.0.0.1:1");

        let workspace = BackupWorkspace::init(&config).unwrap();
        workspace.keys.put_at("foo", 100).unwrap();

        let workspace = BackupWorkspace::init(&config).unwrap();
        assert_eq!(workspace.keys.list().unwrap().len(), 1);
    }
}
