//! 测试辅助：进程内的对象存储模拟服务器

use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use axum::body::{Body, Bytes};
use axum::extract::State;
use axum::http::{header, HeaderMap, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::Router;
use parking_lot::Mutex;

use crate::config::{BackupConfig, LogConfig};

/// 模拟对象的响应方式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Behavior {
    /// 正常响应，支持 `Range: bytes=N-`
    Normal,
    /// 忽略 Range，总是返回 200 和完整内容
    IgnoreRange,
    /// 分块传输，不带 Content-Length
    NoContentLength,
    /// 声明完整长度，但只发送前 N 字节后断开
    Truncate(usize),
    /// 返回指定状态码
    Status(u16),
}

/// 服务器收到的请求
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub path: String,
    pub query: Option<String>,
    pub range: Option<String>,
    pub accept_encoding: Option<String>,
}

#[derive(Default)]
struct FixtureState {
    objects: Mutex<HashMap<String, (Vec<u8>, Behavior)>>,
    requests: Mutex<Vec<RecordedRequest>>,
}

/// 模拟服务器，绑定 `127.0.0.1:0`
pub struct FixtureServer {
    addr: SocketAddr,
    state: Arc<FixtureState>,
}

impl FixtureServer {
    pub async fn start() -> Self {
        let state = Arc::new(FixtureState::default());
        let app = Router::new()
            .fallback(serve_object)
            .with_state(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self { addr, state }
    }

    /// `host:port`，用作下载域名
    pub fn domain(&self) -> String {
        self.addr.to_string()
    }

    /// 放置对象（key 为原始 key）
    pub fn put(&self, key: &str, body: Vec<u8>, behavior: Behavior) {
        self.state
            .objects
            .lock()
            .insert(key.to_string(), (body, behavior));
    }

    /// 修改对象的响应方式
    pub fn set_behavior(&self, key: &str, behavior: Behavior) {
        if let Some(entry) = self.state.objects.lock().get_mut(key) {
            entry.1 = behavior;
        }
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.state.requests.lock().clone()
    }
}

async fn serve_object(
    State(state): State<Arc<FixtureState>>,
    uri: Uri,
    headers: HeaderMap,
) -> Response {
    let header_str = |name: header::HeaderName| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    };
    let range = header_str(header::RANGE);
    state.requests.lock().push(RecordedRequest {
        path: uri.path().to_string(),
        query: uri.query().map(str::to_string),
        range: range.clone(),
        accept_encoding: header_str(header::ACCEPT_ENCODING),
    });

    let raw_key = uri.path().trim_start_matches('/');
    let key = match urlencoding::decode(raw_key) {
        Ok(key) => key.into_owned(),
        Err(_) => return StatusCode::BAD_REQUEST.into_response(),
    };

    let Some((body, behavior)) = state.objects.lock().get(&key).cloned() else {
        return StatusCode::NOT_FOUND.into_response();
    };
    let etag = format!("\"etag-{}\"", key);

    let start = range
        .as_deref()
        .and_then(|r| r.strip_prefix("bytes="))
        .and_then(|r| r.strip_suffix('-'))
        .and_then(|r| r.parse::<usize>().ok());

    match behavior {
        Behavior::Status(code) => StatusCode::from_u16(code)
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
            .into_response(),
        Behavior::NoContentLength => {
            let stream = futures::stream::iter(vec![Ok::<_, std::io::Error>(Bytes::from(body))]);
            Response::builder()
                .status(StatusCode::OK)
                .header(header::ETAG, etag)
                .body(Body::from_stream(stream))
                .unwrap()
        }
        Behavior::Truncate(sent) => {
            let declared = body.len();
            let first = Bytes::from(body[..sent.min(declared)].to_vec());
            let stream = futures::stream::unfold(0u8, move |step| {
                let first = first.clone();
                async move {
                    match step {
                        0 => Some((Ok(first), 1)),
                        1 => {
                            tokio::time::sleep(Duration::from_millis(100)).await;
                            let err = std::io::Error::new(std::io::ErrorKind::Other, "truncated");
                            Some((Err(err), 2))
                        }
                        _ => None,
                    }
                }
            });
            Response::builder()
                .status(StatusCode::OK)
                .header(header::ETAG, etag)
                .header(header::CONTENT_LENGTH, declared)
                .body(Body::from_stream(stream))
                .unwrap()
        }
        Behavior::Normal if start.is_some() => {
            let start = start.unwrap_or_default();
            if start >= body.len() {
                return StatusCode::RANGE_NOT_SATISFIABLE.into_response();
            }
            let total = body.len();
            Response::builder()
                .status(StatusCode::PARTIAL_CONTENT)
                .header(header::ETAG, etag)
                .header(
                    header::CONTENT_RANGE,
                    format!("bytes {}-{}/{}", start, total - 1, total),
                )
                .body(Body::from(body[start..].to_vec()))
                .unwrap()
        }
        Behavior::Normal | Behavior::IgnoreRange => Response::builder()
            .status(StatusCode::OK)
            .header(header::ETAG, etag)
            .body(Body::from(body))
            .unwrap(),
    }
}

/// 指向模拟服务器的最小配置
pub fn test_config(base_dir: &Path, domain: &str) -> BackupConfig {
    BackupConfig {
        bucket: "test-bucket".to_string(),
        domain: domain.to_string(),
        base_dir: base_dir.to_path_buf(),
        access_key: "ak".to_string(),
        secret_key: "sk".to_string(),
        ips: Vec::new(),
        scheme: "http".to_string(),
        concurrency: 1,
        url_ttl_secs: 3600,
        log: LogConfig::default(),
    }
}
