//! WebSocket 端點與路由

use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    response::Response,
    routing::get,
    Router,
};
use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};
use mudrelay::{SubscriberHub, TelnetRelay};
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tracing::{debug, info, warn};

use crate::link::MudLink;
use crate::messages::{ClientMessage, ServerMessage};

/// WebSocket 路徑
pub const HUB_PATH: &str = "/mudhub";

static NEXT_CLIENT_ID: AtomicU64 = AtomicU64::new(1);

/// 路由共用狀態
#[derive(Clone)]
pub struct AppState {
    pub relay: TelnetRelay,
    pub hub: Arc<SubscriberHub>,
}

impl AppState {
    pub fn new(relay: TelnetRelay, hub: Arc<SubscriberHub>) -> Self {
        Self { relay, hub }
    }
}

/// 建立路由，靜態檔案目錄存在時一併提供
pub fn router(state: AppState, static_dir: &Path) -> Router {
    let mut router = Router::new()
        .route(HUB_PATH, get(mudhub_handler))
        .with_state(state);

    if static_dir.is_dir() {
        info!("提供靜態檔案: {}", static_dir.display());
        router = router.fallback_service(ServeDir::new(static_dir));
    } else {
        debug!("靜態檔案目錄不存在: {}", static_dir.display());
    }

    router.layer(CorsLayer::permissive())
}

async fn mudhub_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let client_id = NEXT_CLIENT_ID.fetch_add(1, Ordering::Relaxed);
    info!("瀏覽器已連線 (client {})", client_id);

    let (mut sender, mut receiver) = socket.split();
    let mut link = MudLink::new(state.relay, state.hub);

    loop {
        tokio::select! {
            incoming = receiver.next() => {
                let reply = match incoming {
                    Some(Ok(Message::Text(text))) => {
                        match serde_json::from_str::<ClientMessage>(&text) {
                            Ok(message) => link.handle(message).await,
                            Err(e) => {
                                debug!("無法解析訊息 (client {}): {}", client_id, e);
                                Some(ServerMessage::Error {
                                    message: "訊息格式錯誤".to_string(),
                                })
                            }
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => None,
                    Some(Err(e)) => {
                        debug!("WebSocket 錯誤 (client {}): {}", client_id, e);
                        break;
                    }
                };

                if let Some(reply) = reply {
                    if !send_message(&mut sender, &reply).await {
                        break;
                    }
                }
            }

            event = link.next_event() => {
                if !send_message(&mut sender, &event).await {
                    break;
                }
            }
        }
    }

    link.close().await;
    info!("瀏覽器已離線 (client {})", client_id);
}

/// 送出訊息，失敗表示瀏覽器已離線
async fn send_message(sender: &mut SplitSink<WebSocket, Message>, message: &ServerMessage) -> bool {
    let json = match serde_json::to_string(message) {
        Ok(json) => json,
        Err(e) => {
            warn!("無法序列化訊息: {}", e);
            return true;
        }
    };
    sender.send(Message::Text(json.into())).await.is_ok()
}
