// Web服务器模块：控制面（入队 key、触发备份）

pub mod guard;
pub mod handlers;
pub mod state;

use std::net::SocketAddr;

use anyhow::Context;
use axum::{middleware, routing::get, Router};
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tracing::info;

pub use state::AppState;

/// 构建控制面路由
///
/// `/addkey` 和 `/backup` 受 IP 白名单限制，`/health` 不受限制
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/addkey", get(handlers::add_key).post(handlers::add_key))
        .route(
            "/backup",
            get(handlers::trigger_backup).post(handlers::trigger_backup),
        )
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            guard::ip_allowlist,
        ))
        .route("/health", get(handlers::health_check))
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
        .with_state(state)
}

/// 在 `0.0.0.0:{port}` 上运行控制面，直到收到 Ctrl+C
pub async fn serve(state: AppState, port: u16) -> anyhow::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("监听端口失败: {}", addr))?;

    info!("服务器启动在: http://{}", addr);
    info!("入队: http://{}/addkey?key=<key>", addr);
    info!("备份: http://{}/backup", addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("监听 Ctrl+C 失败: {}", e);
        }
        info!("收到 Ctrl+C，开始优雅关闭...");
    })
    .await
    .context("服务器错误")?;

    info!("服务器已退出");
    Ok(())
}
