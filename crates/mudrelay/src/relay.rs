//! Relay 對外介面
//!
//! 外部呼叫者（例如 WebSocket 層）只透過 [`TelnetRelay`] 操作連線：
//! `connect` → `start_reading` → `send` / `disconnect`。
//! 解碼後的資料經由建立時注入的 [`DataSink`] 推送出去。

use std::sync::Arc;

use tokio::time::timeout;
use tracing::{error, info, warn};

use crate::config::RelayConfig;
use crate::encoding::encode_command;
use crate::error::RelayError;
use crate::registry::SessionRegistry;
use crate::session::{ReadLoop, Session, SessionId, SessionState};
use crate::sink::{DataSink, Notifier};

/// 由誰發起關閉
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TeardownOrigin {
    /// 呼叫端要求斷線，需要等待讀取迴圈結束
    Caller,
    /// 讀取迴圈自己結束
    ReadLoop,
}

struct RelayInner {
    config: RelayConfig,
    registry: SessionRegistry,
    notifier: Notifier,
}

/// Telnet session relay
///
/// 可以自由 clone，所有複本共用同一個登記表。
#[derive(Clone)]
pub struct TelnetRelay {
    inner: Arc<RelayInner>,
}

/// [`TelnetRelay`] 建構器
#[derive(Default)]
pub struct TelnetRelayBuilder {
    config: RelayConfig,
    sinks: Vec<Arc<dyn DataSink>>,
}

impl TelnetRelayBuilder {
    pub fn config(mut self, config: RelayConfig) -> Self {
        self.config = config;
        self
    }

    /// 加入一個接收資料的 sink
    pub fn sink(mut self, sink: Arc<dyn DataSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    pub fn build(self) -> TelnetRelay {
        TelnetRelay {
            inner: Arc::new(RelayInner {
                config: self.config,
                registry: SessionRegistry::new(),
                notifier: Notifier::new(self.sinks),
            }),
        }
    }
}

impl TelnetRelay {
    pub fn builder() -> TelnetRelayBuilder {
        TelnetRelayBuilder::default()
    }

    pub fn config(&self) -> &RelayConfig {
        &self.inner.config
    }

    /// 連線到 MUD 伺服器並送出開場協商
    ///
    /// 失敗時回傳 `false`，原因只寫入日誌。
    pub async fn connect(&self, id: SessionId, host: &str, port: u16) -> bool {
        match self.try_connect(id, host, port).await {
            Ok(()) => true,
            Err(e) => {
                error!("無法連線到 {}:{} ({}): {}", host, port, id, e);
                false
            }
        }
    }

    /// 與 [`connect`](Self::connect) 相同，但回傳失敗原因
    pub async fn try_connect(&self, id: SessionId, host: &str, port: u16) -> Result<(), RelayError> {
        if self.inner.registry.contains(id) {
            return Err(RelayError::SessionExists(id));
        }

        let session = Arc::new(Session::open(id, host, port, &self.inner.config).await?);
        if let Err(e) = self.inner.registry.insert(id, Arc::clone(&session)) {
            session.close().await;
            return Err(e);
        }

        session.send_initial_negotiation().await;
        Ok(())
    }

    /// 啟動讀取迴圈
    pub async fn start_reading(&self, id: SessionId) -> Result<(), RelayError> {
        let session = self.session(id).ok_or(RelayError::SessionNotFound(id))?;
        let reader = session
            .take_reader()
            .await
            .ok_or(RelayError::AlreadyReading(id))?;

        let read_loop = ReadLoop::new(
            id,
            reader,
            session.writer(),
            session.cancel_token(),
            self.inner.notifier.clone(),
            &self.inner.config,
        );

        // 鎖住 handle 位置直到存入，同時進行的 disconnect 才等得到迴圈結束
        let mut slot = session.read_task_slot().await;
        let relay = self.clone();
        *slot = Some(tokio::spawn(async move {
            let exit = read_loop.run().await;
            exit.log(id);
            relay.teardown(id, TeardownOrigin::ReadLoop).await;
        }));
        drop(slot);

        info!("開始讀取 ({})", id);
        Ok(())
    }

    /// 發送指令（自動加上 CR LF 並編碼為 Big5）
    pub async fn send(&self, id: SessionId, text: &str) -> Result<(), RelayError> {
        let session = self.session(id).ok_or(RelayError::SessionNotFound(id))?;

        if let Err(e) = session.write(&encode_command(text)).await {
            error!("發送指令失敗 ({}): {}", id, e);
            return Err(e);
        }

        info!("已發送指令 ({})", id);
        Ok(())
    }

    /// 斷開連線
    ///
    /// 對已斷線或不存在的 id 呼叫不會有任何效果。
    pub async fn disconnect(&self, id: SessionId) {
        self.teardown(id, TeardownOrigin::Caller).await;
    }

    /// 斷開所有連線
    pub async fn shutdown(&self) {
        let ids = self.inner.registry.ids();
        info!("正在關閉 {} 條連線", ids.len());
        for id in ids {
            self.disconnect(id).await;
        }
    }

    pub fn session(&self, id: SessionId) -> Option<Arc<Session>> {
        self.inner.registry.get(id)
    }

    pub fn contains(&self, id: SessionId) -> bool {
        self.inner.registry.contains(id)
    }

    pub fn session_count(&self) -> usize {
        self.inner.registry.len()
    }

    pub fn session_ids(&self) -> Vec<SessionId> {
        self.inner.registry.ids()
    }

    /// 關閉連線，所有結束路徑最後都會到這裡
    ///
    /// 只有從登記表移除成功的呼叫者會繼續執行，因此可以安全地重複呼叫。
    async fn teardown(&self, id: SessionId, origin: TeardownOrigin) {
        let Some(session) = self.inner.registry.remove(id) else {
            return;
        };

        session.set_state(SessionState::Closing);
        session.cancel();

        if origin == TeardownOrigin::Caller {
            if let Some(mut handle) = session.take_read_task().await {
                if timeout(self.inner.config.shutdown_timeout(), &mut handle)
                    .await
                    .is_err()
                {
                    warn!("讀取迴圈未在時限內結束，強制中止 ({})", id);
                    handle.abort();
                }
            }
        }

        session.close().await;
        session.set_state(SessionState::Closed);
        info!("已斷開連線 {}:{} ({})", session.host(), session.port(), id);

        self.inner.notifier.closed(id).await;
    }
}
