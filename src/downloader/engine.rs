use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

use chrono::{DateTime, Utc};
use futures::StreamExt;
use reqwest::header::{ACCEPT_ENCODING, CONNECTION, CONTENT_LENGTH, ETAG, RANGE};
use reqwest::{Client, StatusCode};
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use super::signer::{SignError, UrlSigner};
use super::storage::{content_path, open_content_file, verify_resume_offset};
use crate::ledger::{escape, HistoryDetail};

/// 下载错误
///
/// 这些错误都发生在响应体开始写入之前，本次尝试没有产生任何本地数据
#[derive(Debug, Error)]
pub enum DownloadError {
    #[error("签名失败: {0}")]
    Sign(#[from] SignError),
    #[error("无效的对象 key: {0:?}")]
    InvalidKey(String),
    #[error("发送HTTP请求失败: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("HTTP错误: Code: {code}")]
    Status { code: u16 },
    #[error("响应头中缺少 Content-Length")]
    MissingContentLength,
    #[error("本地文件操作失败 {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl DownloadError {
    /// 错误携带的 HTTP 状态码
    pub fn status_code(&self) -> Option<u16> {
        match self {
            DownloadError::Status { code } => Some(*code),
            DownloadError::Transport(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    fn io(path: &Path, source: std::io::Error) -> Self {
        DownloadError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// 一次下载尝试的结果（响应体已开始写入）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadOutcome {
    /// HTTP 状态码
    pub status: u16,
    /// 本地文件实际大小
    pub bytes_downloaded: u64,
    /// 对象完整大小
    pub full_size: u64,
    /// 本地文件修改时间（Unix 纳秒）
    pub mod_time_nanos: i64,
    /// 响应头中的 Etag，原样保存
    pub etag: String,
    /// 响应体未完整写入的原因
    pub interrupted: Option<String>,
}

impl DownloadOutcome {
    pub fn is_complete(&self) -> bool {
        self.bytes_downloaded >= self.full_size
    }

    pub fn to_history_detail(&self) -> HistoryDetail {
        HistoryDetail {
            etag: self.etag.clone(),
            mod_time_nanos: self.mod_time_nanos,
            bytes_downloaded: self.bytes_downloaded,
            full_size: self.full_size,
        }
    }
}

/// 单文件下载器
///
/// 每次下载使用独立连接（连接池空闲上限为 0，并发送 `Connection: close`），
/// 禁用传输压缩，保证字节数与对象内容长度一致
#[derive(Clone)]
pub struct Downloader {
    client: Client,
    scheme: String,
    domain: String,
    signer: Arc<dyn UrlSigner>,
    data_dir: PathBuf,
}

impl Downloader {
    pub fn new(
        scheme: impl Into<String>,
        domain: impl Into<String>,
        signer: Arc<dyn UrlSigner>,
        data_dir: PathBuf,
    ) -> Result<Self, DownloadError> {
        let client = Client::builder()
            .user_agent(concat!("bucket-backup/", env!("CARGO_PKG_VERSION")))
            .pool_max_idle_per_host(0)
            .build()?;

        Ok(Self {
            client,
            scheme: scheme.into(),
            domain: domain.into(),
            signer,
            data_dir,
        })
    }

    /// key 对应的本地文件路径
    pub fn content_path(&self, key: &str) -> Result<PathBuf, DownloadError> {
        content_path(&self.data_dir, key).ok_or_else(|| DownloadError::InvalidKey(key.to_string()))
    }

    /// 未签名的对象 URL
    pub fn object_url(&self, key: &str) -> String {
        format!("{}://{}/{}", self.scheme, self.domain, escape(key))
    }

    /// 下载对象，`resume_offset > 0` 时从该偏移续传
    ///
    /// 响应体开始写入后总是返回 `Ok`：数据流提前结束时，
    /// 结果中的 `bytes_downloaded` 小于 `full_size`，供下次重做
    pub async fn download(
        &self,
        key: &str,
        resume_offset: u64,
    ) -> Result<DownloadOutcome, DownloadError> {
        let path = self.content_path(key)?;

        // 1. 以本地文件实际大小校验续传偏移
        let mut offset = verify_resume_offset(&path, resume_offset)
            .await
            .map_err(|e| DownloadError::io(&path, e))?;

        // 2. 签名并发送请求
        let url = self.signer.sign(&self.object_url(key))?;
        let mut request = self
            .client
            .get(&url)
            .header(ACCEPT_ENCODING, "identity")
            .header(CONNECTION, "close");
        if offset > 0 {
            request = request.header(RANGE, format!("bytes={}-", offset));
        }

        let resp = request.send().await.map_err(|e| {
            debug!("请求失败: key={}, 错误={}", key, e);
            DownloadError::Transport(e)
        })?;

        let status = resp.status();
        let req_id = resp
            .headers()
            .get("X-Reqid")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("");
        debug!("ReqId: {}, Code: {}", req_id, status.as_u16());

        if !status.is_success() {
            return Err(DownloadError::Status {
                code: status.as_u16(),
            });
        }

        let content_length = resp
            .headers()
            .get(CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u64>().ok())
            .ok_or(DownloadError::MissingContentLength)?;

        // 服务器忽略 Range 时响应体是完整对象
        if offset > 0 && status != StatusCode::PARTIAL_CONTENT {
            warn!(
                "服务器未按 Range 返回 (Code: {})，从头写入: key={}",
                status.as_u16(),
                key
            );
            offset = 0;
        }

        let full_size = content_length + offset;
        let etag = resp
            .headers()
            .get(ETAG)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string();

        // 3. 流式写入本地文件
        let mut file = open_content_file(&path, offset)
            .await
            .map_err(|e| DownloadError::io(&path, e))?;

        let mut interrupted = None;
        let mut stream = resp.bytes_stream();
        while let Some(chunk_result) = stream.next().await {
            let chunk = match chunk_result {
                Ok(chunk) => chunk,
                Err(e) => {
                    interrupted = Some(format!("读取数据流失败: {}", e));
                    break;
                }
            };
            if let Err(e) = file.write_all(&chunk).await {
                interrupted = Some(format!("写入文件失败: {}", e));
                break;
            }
        }

        if let Err(e) = file.flush().await {
            interrupted.get_or_insert_with(|| format!("刷新文件缓冲失败: {}", e));
        }
        if let Err(e) = file.sync_data().await {
            interrupted.get_or_insert_with(|| format!("同步文件失败: {}", e));
        }
        drop(file);

        // 4. 以磁盘上的实际状态为准
        let meta = tokio::fs::metadata(&path)
            .await
            .map_err(|e| DownloadError::io(&path, e))?;
        let bytes_downloaded = meta.len();
        let mod_time_nanos = meta.modified().map(system_time_nanos).unwrap_or(0);

        if bytes_downloaded < full_size && interrupted.is_none() {
            interrupted = Some(format!(
                "数据不完整: {} / {} bytes",
                bytes_downloaded, full_size
            ));
        }

        match &interrupted {
            None => info!("下载完成: key={}, 大小={} bytes", key, bytes_downloaded),
            Some(reason) => warn!(
                "下载未完成: key={}, 已写入={} / {} bytes, 原因={}",
                key, bytes_downloaded, full_size, reason
            ),
        }

        Ok(DownloadOutcome {
            status: status.as_u16(),
            bytes_downloaded,
            full_size,
            mod_time_nanos,
            etag,
            interrupted,
        })
    }
}

fn system_time_nanos(time: SystemTime) -> i64 {
    let datetime: DateTime<Utc> = time.into();
    datetime.timestamp_nanos_opt().unwrap_or(0)
}
