//! MUD Web 伺服器

use std::sync::Arc;

use mudrelay::{SubscriberHub, TelnetRelay};
use mudweb::{router, AppState, WebConfig};
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> std::io::Result<()> {
    // 初始化日誌
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = WebConfig::load();

    let hub = Arc::new(SubscriberHub::new());
    let relay = TelnetRelay::builder()
        .config(config.relay.clone())
        .sink(hub.clone())
        .build();

    let app = router(AppState::new(relay.clone(), hub), &config.static_dir);
    let listener = TcpListener::bind(config.bind_addr()).await?;
    info!("應用程式啟動中，監聽埠號 {}", listener.local_addr()?.port());

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("正在關閉所有 MUD 連線");
    relay.shutdown().await;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("無法監聽關閉訊號: {}", e);
        std::future::pending::<()>().await;
    }
    info!("收到關閉訊號");
}
