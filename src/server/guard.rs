// IP 白名单中间件

use std::net::SocketAddr;

use axum::{
    extract::{ConnectInfo, Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use tracing::error;

use super::handlers::{status, ApiResponse, STATUS_IP_NOT_ALLOWED};
use super::state::AppState;

/// 白名单非空时拒绝不在列表中的调用方（496）
pub async fn ip_allowlist(
    State(state): State<AppState>,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    request: Request,
    next: Next,
) -> Response {
    if state.allowed_ips.is_empty() {
        return next.run(request).await;
    }

    let remote_ip = connect_info.map(|ConnectInfo(addr)| addr.ip().to_string());
    match remote_ip {
        Some(ip) if state.is_allowed(&ip) => next.run(request).await,
        ip => {
            let ip = ip.unwrap_or_else(|| "unknown".to_string());
            error!("IP {} is not allowed", ip);
            (
                status(STATUS_IP_NOT_ALLOWED),
                Json(ApiResponse::<()>::error(
                    STATUS_IP_NOT_ALLOWED as i32,
                    format!("IP {} is not allowed", ip),
                )),
            )
                .into_response()
        }
    }
}
