// API处理器模块

pub mod backup;

pub use backup::*;

use axum::http::StatusCode;
use serde::{Deserialize, Serialize};

/// 启动备份失败
pub const STATUS_BACKUP_FAILED: u16 = 495;
/// 调用方 IP 不在白名单中
pub const STATUS_IP_NOT_ALLOWED: u16 = 496;
/// 缺少 key 参数
pub const STATUS_EMPTY_KEY: u16 = 497;
/// 写入 keys 日志失败
pub const STATUS_PUT_KEY_FAILED: u16 = 498;

/// 统一 API 响应格式
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    /// 状态码 (0: 成功, 其他: 错误码)
    pub code: i32,
    /// 消息
    pub message: String,
    /// 数据
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            code: 0,
            message: "Success".to_string(),
            data: Some(data),
        }
    }

    pub fn error(code: i32, message: String) -> Self {
        Self {
            code,
            message,
            data: None,
        }
    }
}

/// 自定义状态码（495-498 不在标准表中）
pub fn status(code: u16) -> StatusCode {
    StatusCode::from_u16(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
}
