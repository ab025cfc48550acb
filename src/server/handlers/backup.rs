// 备份控制 API

use axum::{
    extract::{Form, Query, State},
    response::{IntoResponse, Json, Response},
};
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use super::{
    status, ApiResponse, STATUS_BACKUP_FAILED, STATUS_EMPTY_KEY, STATUS_PUT_KEY_FAILED,
};
use crate::server::AppState;

/// 查询参数：key
#[derive(Debug, Deserialize)]
pub struct AddKeyQuery {
    #[serde(default)]
    pub key: String,
}

fn error_response(code: u16, message: String) -> Response {
    (
        status(code),
        Json(ApiResponse::<()>::error(code as i32, message)),
    )
        .into_response()
}

/// 入队一个 key
///
/// GET|POST /addkey?key=xxx，POST 也接受表单请求体 `key=xxx`（优先于查询参数）
pub async fn add_key(
    State(state): State<AppState>,
    Query(query): Query<AddKeyQuery>,
    form: Option<Form<AddKeyQuery>>,
) -> Response {
    let key = match form {
        Some(Form(form)) if !form.key.is_empty() => form.key,
        _ => query.key,
    };
    if key.is_empty() {
        error!("No key to put");
        return error_response(STATUS_EMPTY_KEY, "No key to put".to_string());
    }

    let keys = state.keys.clone();
    let put_key = key.clone();
    let result = tokio::task::spawn_blocking(move || keys.put(&put_key)).await;

    match result {
        Ok(Ok(task_id)) => {
            info!("Success with the key : {}", key);
            Json(ApiResponse::success(task_id.to_string())).into_response()
        }
        Ok(Err(e)) => {
            error!("Error with the key : {}: {}", key, e);
            error_response(STATUS_PUT_KEY_FAILED, format!("Error with the key: {}", e))
        }
        Err(e) => {
            error!("Error with the key : {}: {}", key, e);
            error_response(STATUS_PUT_KEY_FAILED, format!("Error with the key: {}", e))
        }
    }
}

/// 触发一次备份（不等待结束）
///
/// GET|POST /backup
pub async fn trigger_backup(State(state): State<AppState>) -> Response {
    match state.runner.start_backup() {
        Ok(_) => {
            info!("API: 备份已启动");
            Json(ApiResponse::<()> {
                code: 0,
                message: "Backup started".to_string(),
                data: None,
            })
            .into_response()
        }
        Err(e) => {
            error!("Error starting backup: {}", e);
            error_response(STATUS_BACKUP_FAILED, format!("Error starting backup: {}", e))
        }
    }
}

/// 健康检查响应结构
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
}

/// 健康检查
///
/// GET /health
pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        service: "bucket-backup".to_string(),
    })
}
