// 配置管理模块

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// keys 日志文件名
pub const KEYS_LOG_NAME: &str = "keys.log";
/// history 日志文件名
pub const HISTORY_LOG_NAME: &str = "history.log";

/// 配置错误
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("读取配置文件失败 {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("解析配置文件失败 {path:?}: {message}")]
    Parse { path: PathBuf, message: String },
    #[error("配置缺少必填字段: {0}")]
    MissingField(&'static str),
    #[error("配置字段无效: {0}")]
    Invalid(String),
}

/// 备份配置
///
/// 兼容原有 JSON 格式：
/// ```json
/// {
///     "ips": [],
///     "bucket": "",
///     "domain": "",
///     "baseDir": "",
///     "accessKey": "",
///     "secretKey": ""
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupConfig {
    /// 存储空间名
    #[serde(default)]
    pub bucket: String,
    /// 下载域名
    #[serde(default)]
    pub domain: String,
    /// 本地备份根目录
    #[serde(default)]
    pub base_dir: PathBuf,
    #[serde(default)]
    pub access_key: String,
    #[serde(default)]
    pub secret_key: String,
    /// 控制面 IP 白名单，为空时不限制
    #[serde(default)]
    pub ips: Vec<String>,
    /// 下载协议（http / https）
    #[serde(default = "default_scheme")]
    pub scheme: String,
    /// 单次备份内同时下载的任务数（1 表示严格串行）
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    /// 私有下载链接有效期（秒）
    #[serde(default = "default_url_ttl_secs")]
    pub url_ttl_secs: u64,
    /// 日志配置
    #[serde(default)]
    pub log: LogConfig,
}

fn default_scheme() -> String {
    "http".to_string()
}

fn default_concurrency() -> usize {
    1
}

fn default_url_ttl_secs() -> u64 {
    3600
}

/// 日志配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogConfig {
    /// 是否启用日志文件持久化
    #[serde(default)]
    pub enabled: bool,
    /// 日志文件保存目录
    #[serde(default = "default_log_dir")]
    pub log_dir: PathBuf,
    /// 日志保留天数
    #[serde(default = "default_log_retention_days")]
    pub retention_days: u32,
    /// 日志级别
    #[serde(default = "default_log_level")]
    pub level: String,
    /// 单个日志文件最大大小（字节）
    #[serde(default = "default_log_max_file_size")]
    pub max_file_size: u64,
}

fn default_log_dir() -> PathBuf {
    PathBuf::from("logs")
}

fn default_log_retention_days() -> u32 {
    7
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_max_file_size() -> u64 {
    50 * 1024 * 1024 // 50MB
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            log_dir: default_log_dir(),
            retention_days: default_log_retention_days(),
            level: default_log_level(),
            max_file_size: default_log_max_file_size(),
        }
    }
}

impl BackupConfig {
    /// 从文件加载并校验配置
    ///
    /// `.toml` 后缀按 TOML 解析，其余按 JSON 解析
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        let is_toml = path
            .extension()
            .map(|ext| ext.eq_ignore_ascii_case("toml"))
            .unwrap_or(false);

        let config: BackupConfig = if is_toml {
            toml::from_str(&content).map_err(|e| ConfigError::Parse {
                path: path.to_path_buf(),
                message: e.to_string(),
            })?
        } else {
            serde_json::from_str(&content).map_err(|e| ConfigError::Parse {
                path: path.to_path_buf(),
                message: e.to_string(),
            })?
        };

        config.validate()?;
        Ok(config)
    }

    /// 校验必填字段
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.bucket.is_empty() {
            return Err(ConfigError::MissingField("bucket"));
        }
        if self.domain.is_empty() {
            return Err(ConfigError::MissingField("domain"));
        }
        if self.base_dir.as_os_str().is_empty() {
            return Err(ConfigError::MissingField("baseDir"));
        }
        if self.access_key.is_empty() {
            return Err(ConfigError::MissingField("accessKey"));
        }
        if self.secret_key.is_empty() {
            return Err(ConfigError::MissingField("secretKey"));
        }
        if self.concurrency == 0 {
            return Err(ConfigError::Invalid("concurrency 必须大于 0".to_string()));
        }
        if self.scheme != "http" && self.scheme != "https" {
            return Err(ConfigError::Invalid(format!(
                "scheme 只能是 http 或 https: {}",
                self.scheme
            )));
        }
        Ok(())
    }

    /// `{baseDir}/{bucket}`
    pub fn bucket_dir(&self) -> PathBuf {
        self.base_dir.join(&self.bucket)
    }

    /// `{baseDir}/{bucket}/log`
    pub fn log_dir(&self) -> PathBuf {
        self.bucket_dir().join("log")
    }

    /// `{baseDir}/{bucket}/data`
    pub fn data_dir(&self) -> PathBuf {
        self.bucket_dir().join("data")
    }

    pub fn keys_log_path(&self) -> PathBuf {
        self.log_dir().join(KEYS_LOG_NAME)
    }

    pub fn history_log_path(&self) -> PathBuf {
        self.log_dir().join(HISTORY_LOG_NAME)
    }

    /// 用于启动日志的配置摘要（密钥以 `*` 遮盖）
    pub fn summary(&self) -> String {
        format!(
            "Bucket: {}; Domain: {}; BaseDir: {:?}; AccessKey: {}; SecretKey: {}; IPs: {:?}; Concurrency: {}",
            self.bucket,
            self.domain,
            self.base_dir,
            "*".repeat(self.access_key.len()),
            "*".repeat(self.secret_key.len()),
            self.ips,
            self.concurrency
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::{Builder, NamedTempFile};

    const FULL_JSON: &str = r#"{
        "ips": ["127.0.0.1"],
        "bucket": "photos",
        "domain": "cdn.example.com",
        "baseDir": "/var/backup",
        "accessKey": "ak",
        "secretKey": "sk"
    }"#;

    fn write_temp(suffix: &str, content: &str) -> NamedTempFile {
        let mut file = Builder::new().suffix(suffix).tempfile().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_load_json() {
        let file = write_temp(".json", FULL_JSON);
        let config = BackupConfig::load_from_file(file.path()).unwrap();

        assert_eq!(config.bucket, "photos");
        assert_eq!(config.domain, "cdn.example.com");
        assert_eq!(config.base_dir, PathBuf::from("/var/backup"));
        assert_eq!(config.ips, vec!["127.0.0.1"]);
        assert_eq!(config.scheme, "http");
        assert_eq!(config.concurrency, 1);
        assert_eq!(config.url_ttl_secs, 3600);
        assert!(!config.log.enabled);
    }

    #[test]
    fn test_load_toml() {
        let file = write_temp(
            ".toml",
            r#"
bucket = "photos"
domain = "cdn.example.com"
baseDir = "/var/backup"
accessKey = "ak"
secretKey = "sk"
concurrency = 4

[log]
enabled = true
level = "debug"
"#,
        );
        let config = BackupConfig::load_from_file(file.path()).unwrap();
        assert_eq!(config.concurrency, 4);
        assert!(config.ips.is_empty());
        assert!(config.log.enabled);
        assert_eq!(config.log.level, "debug");
        assert_eq!(config.log.retention_days, 7);
    }

    #[test]
    fn test_missing_field() {
        let file = write_temp(".json", r#"{"bucket": "b", "domain": "d", "baseDir": "/x", "accessKey": "ak"}"#);
        let err = BackupConfig::load_from_file(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::MissingField("secretKey")));
    }

    #[test]
    fn test_invalid_json() {
        let file = write_temp(".json", "{ not json");
        let err = BackupConfig::load_from_file(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn test_missing_file() {
        let err = BackupConfig::load_from_file("/nonexistent/config.json").unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn test_zero_concurrency_rejected() {
        let mut config: BackupConfig = serde_json::from_str(FULL_JSON).unwrap();
        config.concurrency = 0;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_layout_paths() {
        let config: BackupConfig = serde_json::from_str(FULL_JSON).unwrap();
        assert_eq!(config.keys_log_path(), PathBuf::from("/var/backup/photos/log/keys.log"));
        assert_eq!(
            config.history_log_path(),
            PathBuf::from("/var/backup/photos/log/history.log")
        );
        assert_eq!(config.data_dir(), PathBuf::from("/var/backup/photos/data"));
    }

    #[test]
    fn test_summary_masks_secrets() {
        let mut config: BackupConfig = serde_json::from_str(FULL_JSON).unwrap();
        config.secret_key = "supersecret".to_string();
        let summary = config.summary();
        assert!(!summary.contains("supersecret"));
        assert!(summary.contains("***********"));
    }
}
