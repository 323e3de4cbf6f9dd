//! 瀏覽器連線與 MUD session 的對應
//!
//! 每條 WebSocket 連線最多對應一個 MUD session，WebSocket 關閉時一併斷線。

use std::sync::Arc;

use mudrelay::{SessionId, SubscriberHub, TelnetRelay};
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use crate::messages::{ClientMessage, ServerMessage};

/// 單一瀏覽器連線的 MUD 狀態
pub struct MudLink {
    relay: TelnetRelay,
    hub: Arc<SubscriberHub>,
    session: Option<SessionId>,
    data_rx: Option<mpsc::Receiver<String>>,
}

impl MudLink {
    pub fn new(relay: TelnetRelay, hub: Arc<SubscriberHub>) -> Self {
        Self {
            relay,
            hub,
            session: None,
            data_rx: None,
        }
    }

    /// 目前對應的 session
    pub fn session(&self) -> Option<SessionId> {
        self.session
    }

    /// 處理瀏覽器的訊息，回傳需要立即回覆的內容
    pub async fn handle(&mut self, message: ClientMessage) -> Option<ServerMessage> {
        match message {
            ClientMessage::Connect { host, port } => {
                let success = self.connect(&host, port).await;
                Some(ServerMessage::ConnectResult { success })
            }
            ClientMessage::Command { text } => {
                let Some(id) = self.session else {
                    warn!("尚未連線，忽略指令");
                    return Some(ServerMessage::Error {
                        message: "尚未連線到 MUD 伺服器".to_string(),
                    });
                };
                match self.relay.send(id, &text).await {
                    Ok(()) => None,
                    Err(e) => Some(ServerMessage::Error {
                        message: e.to_string(),
                    }),
                }
            }
            ClientMessage::Disconnect => {
                if self.close().await {
                    Some(ServerMessage::Disconnected)
                } else {
                    None
                }
            }
        }
    }

    /// 等待下一筆要推送給瀏覽器的資料
    ///
    /// 沒有連線時永遠不會完成；session 結束時回傳一次 `Disconnected`。
    pub async fn next_event(&mut self) -> ServerMessage {
        let Some(rx) = self.data_rx.as_mut() else {
            return std::future::pending().await;
        };

        match rx.recv().await {
            Some(data) => ServerMessage::Data { data },
            None => {
                self.data_rx = None;
                if let Some(id) = self.session.take() {
                    info!("MUD 連線已結束 ({})", id);
                }
                ServerMessage::Disconnected
            }
        }
    }

    /// 斷開目前的 session，回傳是否真的有連線
    pub async fn close(&mut self) -> bool {
        self.data_rx = None;
        let Some(id) = self.session.take() else {
            return false;
        };

        info!("斷開 MUD 連線 ({})", id);
        self.relay.disconnect(id).await;
        self.hub.unsubscribe(id);
        true
    }

    async fn connect(&mut self, host: &str, port: u16) -> bool {
        self.close().await;

        let id = SessionId::new();
        info!("連線到 MUD 伺服器 {}:{} ({})", host, port, id);
        if !self.relay.connect(id, host, port).await {
            return false;
        }

        // 先訂閱再開始讀取，避免漏掉第一段資料
        let rx = self.hub.subscribe(id);
        if let Err(e) = self.relay.start_reading(id).await {
            error!("無法開始讀取 ({}): {}", id, e);
            self.hub.unsubscribe(id);
            self.relay.disconnect(id).await;
            return false;
        }

        self.session = Some(id);
        self.data_rx = Some(rx);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};
    use tokio::time::timeout;

    const WAIT: Duration = Duration::from_secs(5);
    const INIT_LEN: usize = 9;

    fn link() -> (MudLink, TelnetRelay) {
        let hub = Arc::new(SubscriberHub::new());
        let relay = TelnetRelay::builder().sink(hub.clone()).build();
        (MudLink::new(relay.clone(), hub), relay)
    }

    async fn listener() -> (TcpListener, u16) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        (listener, port)
    }

    async fn connect(link: &mut MudLink, listener: &TcpListener, port: u16) -> TcpStream {
        let reply = link
            .handle(ClientMessage::Connect {
                host: "127.0.0.1".to_string(),
                port,
            })
            .await;
        assert_eq!(reply, Some(ServerMessage::ConnectResult { success: true }));

        let (mut server, _) = listener.accept().await.unwrap();
        let mut init = [0u8; INIT_LEN];
        timeout(WAIT, server.read_exact(&mut init)).await.unwrap().unwrap();
        server
    }

    async fn next_event(link: &mut MudLink) -> ServerMessage {
        timeout(WAIT, link.next_event()).await.expect("no event")
    }

    #[tokio::test]
    async fn test_connect_and_receive_data() {
        let (mut link, relay) = link();
        let (listener, port) = listener().await;
        let mut server = connect(&mut link, &listener, port).await;
        assert!(link.session().is_some());
        assert_eq!(relay.session_count(), 1);

        server.write_all(b"Welcome\r\n").await.unwrap();

        assert_eq!(
            next_event(&mut link).await,
            ServerMessage::Data {
                data: "Welcome\r\n".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_connect_failure() {
        let (mut link, relay) = link();
        let (listener, port) = listener().await;
        drop(listener);

        let reply = link
            .handle(ClientMessage::Connect {
                host: "127.0.0.1".to_string(),
                port,
            })
            .await;

        assert_eq!(reply, Some(ServerMessage::ConnectResult { success: false }));
        assert!(link.session().is_none());
        assert_eq!(relay.session_count(), 0);
    }

    #[tokio::test]
    async fn test_command_without_session() {
        let (mut link, _) = link();
        let reply = link
            .handle(ClientMessage::Command {
                text: "look".to_string(),
            })
            .await;
        assert!(matches!(reply, Some(ServerMessage::Error { .. })));
    }

    #[tokio::test]
    async fn test_command_reaches_server() {
        let (mut link, _) = link();
        let (listener, port) = listener().await;
        let mut server = connect(&mut link, &listener, port).await;

        let reply = link
            .handle(ClientMessage::Command {
                text: "look".to_string(),
            })
            .await;
        assert_eq!(reply, None);

        let mut buf = [0u8; 6];
        timeout(WAIT, server.read_exact(&mut buf)).await.unwrap().unwrap();
        assert_eq!(&buf, b"look\r\n");
    }

    #[tokio::test]
    async fn test_server_close_reports_disconnected() {
        let (mut link, relay) = link();
        let (listener, port) = listener().await;
        let mut server = connect(&mut link, &listener, port).await;

        server.write_all(b"bye").await.unwrap();
        server.shutdown().await.unwrap();
        drop(server);

        assert_eq!(
            next_event(&mut link).await,
            ServerMessage::Data {
                data: "bye".to_string()
            }
        );
        assert_eq!(next_event(&mut link).await, ServerMessage::Disconnected);
        assert!(link.session().is_none());
        assert_eq!(relay.session_count(), 0);
    }

    #[tokio::test]
    async fn test_disconnect_message() {
        let (mut link, relay) = link();
        let (listener, port) = listener().await;
        let _server = connect(&mut link, &listener, port).await;

        let reply = link.handle(ClientMessage::Disconnect).await;
        assert_eq!(reply, Some(ServerMessage::Disconnected));
        assert_eq!(relay.session_count(), 0);

        let reply = link.handle(ClientMessage::Disconnect).await;
        assert_eq!(reply, None);
    }

    #[tokio::test]
    async fn test_reconnect_replaces_session() {
        let (mut link, relay) = link();
        let (listener, port) = listener().await;
        let _first = connect(&mut link, &listener, port).await;
        let first_id = link.session().unwrap();

        let _second = connect(&mut link, &listener, port).await;

        assert_ne!(link.session(), Some(first_id));
        assert!(!relay.contains(first_id));
        assert_eq!(relay.session_count(), 1);
    }

    #[tokio::test]
    async fn test_close_on_websocket_end() {
        let (mut link, relay) = link();
        let (listener, port) = listener().await;
        let _server = connect(&mut link, &listener, port).await;

        assert!(link.close().await);
        assert!(!link.close().await);
        assert_eq!(relay.session_count(), 0);
    }
}
