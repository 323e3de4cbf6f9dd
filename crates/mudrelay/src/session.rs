//! Session 與讀取迴圈
//!
//! 每個 Session 擁有一條 TCP 連線：
//! - 讀取端交給讀取迴圈獨佔，負責分框、回應協商、解碼與推送
//! - 寫入端由發送指令與協商回應共用
//! - 一個 `CancellationToken` 作為讀取迴圈的取消邊界

use std::fmt;
use std::io;
use std::net::SocketAddr;
use std::str::FromStr;
use std::sync::Arc;

use bytes::BytesMut;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::{watch, Mutex, MutexGuard};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::config::RelayConfig;
use crate::encoding::ChunkDecoder;
use crate::error::RelayError;
use crate::sink::Notifier;
use crate::telnet::{initial_negotiation, TelnetFramer};

// ============================================================================
// SessionId
// ============================================================================

/// Session 唯一識別碼
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(Uuid);

impl SessionId {
    /// 產生新的 SessionId
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl FromStr for SessionId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

impl From<Uuid> for SessionId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

// ============================================================================
// SessionState
// ============================================================================

/// 連線狀態
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Connecting,
    Open,
    Closing,
    Closed,
}

// ============================================================================
// Session
// ============================================================================

/// 讀取迴圈與發送指令共用的寫入端，關閉後為 `None`
pub(crate) type SharedWriter<W> = Arc<Mutex<Option<W>>>;

/// 單一 MUD 連線
pub struct Session {
    id: SessionId,
    host: String,
    port: u16,
    state: watch::Sender<SessionState>,
    writer: SharedWriter<OwnedWriteHalf>,
    /// 尚未交給讀取迴圈的讀取端
    reader: Mutex<Option<OwnedReadHalf>>,
    read_task: Mutex<Option<JoinHandle<()>>>,
    cancel: CancellationToken,
}

impl Session {
    /// 連線到 MUD 伺服器
    pub(crate) async fn open(
        id: SessionId,
        host: &str,
        port: u16,
        config: &RelayConfig,
    ) -> Result<Self, RelayError> {
        let (state, _) = watch::channel(SessionState::Connecting);
        info!("正在連線到 {}:{} ({})", host, port, id);

        // 解析主機名稱
        let addr = format!("{}:{}", host, port);
        let socket_addrs: Vec<SocketAddr> = tokio::net::lookup_host(&addr)
            .await
            .map_err(|e| RelayError::DnsResolutionFailed(e.to_string()))?
            .collect();

        let Some(target) = socket_addrs.first() else {
            return Err(RelayError::DnsResolutionFailed(format!(
                "無法解析主機: {}",
                host
            )));
        };

        debug!("已解析到位址: {:?}", socket_addrs);

        let stream = timeout(config.connect_timeout(), TcpStream::connect(target))
            .await
            .map_err(|_| RelayError::ConnectTimeout)??;

        stream.set_nodelay(true)?;
        let (reader, writer) = stream.into_split();

        state.send_replace(SessionState::Open);
        info!("已連線到 {}:{} ({})", host, port, id);

        Ok(Self {
            id,
            host: host.to_string(),
            port,
            state,
            writer: Arc::new(Mutex::new(Some(writer))),
            reader: Mutex::new(Some(reader)),
            read_task: Mutex::new(None),
            cancel: CancellationToken::new(),
        })
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// 目前的連線狀態
    pub fn state(&self) -> SessionState {
        *self.state.borrow()
    }

    /// 訂閱狀態變化
    pub fn watch_state(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    pub(crate) fn set_state(&self, state: SessionState) {
        self.state.send_replace(state);
    }

    /// 送出開場協商（WILL SGA、WILL ECHO、WILL NAWS）
    ///
    /// 失敗只記錄，不影響連線。
    pub(crate) async fn send_initial_negotiation(&self) {
        for command in initial_negotiation() {
            if let Err(e) = self.write(&command).await {
                error!("發送 Telnet 初始化失敗 ({}): {}", self.id, e);
                return;
            }
        }
        info!("已發送 Telnet 初始化 ({})", self.id);
    }

    /// 寫入原始位元組
    pub(crate) async fn write(&self, data: &[u8]) -> Result<(), RelayError> {
        write_shared(&self.writer, data).await
    }

    pub(crate) fn writer(&self) -> SharedWriter<OwnedWriteHalf> {
        Arc::clone(&self.writer)
    }

    pub(crate) async fn take_reader(&self) -> Option<OwnedReadHalf> {
        self.reader.lock().await.take()
    }

    /// 讀取迴圈 handle 的位置
    ///
    /// 持有期間 `take_read_task` 會等待，啟動迴圈時先鎖住再 spawn。
    pub(crate) async fn read_task_slot(&self) -> MutexGuard<'_, Option<JoinHandle<()>>> {
        self.read_task.lock().await
    }

    pub(crate) async fn take_read_task(&self) -> Option<JoinHandle<()>> {
        self.read_task.lock().await.take()
    }

    pub(crate) fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// 通知讀取迴圈結束
    pub(crate) fn cancel(&self) {
        self.cancel.cancel();
    }

    /// 釋放 socket 的兩端
    pub(crate) async fn close(&self) {
        drop(self.reader.lock().await.take());
        if let Some(mut writer) = self.writer.lock().await.take() {
            if let Err(e) = writer.shutdown().await {
                debug!("關閉寫入端失敗 ({}): {}", self.id, e);
            }
        }
    }
}

async fn write_shared<W>(writer: &Mutex<Option<W>>, data: &[u8]) -> Result<(), RelayError>
where
    W: AsyncWrite + Unpin,
{
    let mut guard = writer.lock().await;
    let stream = guard.as_mut().ok_or(RelayError::NotConnected)?;
    stream.write_all(data).await?;
    stream.flush().await?;
    Ok(())
}

// ============================================================================
// ReadLoop
// ============================================================================

/// 讀取迴圈結束的原因
#[derive(Debug)]
pub(crate) enum LoopExit {
    /// 收到取消信號
    Cancelled,
    /// 伺服器關閉連線（讀到 0 位元組）
    PeerClosed,
    /// 讀取錯誤
    Failed(io::Error),
}

/// 單一 session 的讀取迴圈
///
/// socket 讀取端、分框器與解碼器都只屬於這個迴圈。
pub(crate) struct ReadLoop<R, W> {
    session_id: SessionId,
    reader: R,
    writer: SharedWriter<W>,
    framer: TelnetFramer,
    decoder: ChunkDecoder,
    buffer: BytesMut,
    cancel: CancellationToken,
    notifier: Notifier,
}

impl<R, W> ReadLoop<R, W>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    pub(crate) fn new(
        session_id: SessionId,
        reader: R,
        writer: SharedWriter<W>,
        cancel: CancellationToken,
        notifier: Notifier,
        config: &RelayConfig,
    ) -> Self {
        Self {
            session_id,
            reader,
            writer,
            framer: TelnetFramer::new(),
            decoder: ChunkDecoder::new(config.reassemble_split_characters),
            buffer: BytesMut::with_capacity(config.read_buffer_size.max(1)),
            cancel,
            notifier,
        }
    }

    /// 執行到連線結束或被取消
    pub(crate) async fn run(mut self) -> LoopExit {
        loop {
            if self.cancel.is_cancelled() {
                return LoopExit::Cancelled;
            }

            self.buffer.clear();
            let read = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return LoopExit::Cancelled,
                result = self.reader.read_buf(&mut self.buffer) => result,
            };

            match read {
                Ok(0) => return LoopExit::PeerClosed,
                Ok(_) => {}
                Err(e) => return LoopExit::Failed(e),
            }

            let framed = self.framer.feed(&self.buffer);

            for reply in &framed.replies {
                match write_shared(&self.writer, reply).await {
                    Ok(()) => debug!("已回應 Telnet 選項 {} ({})", reply[2], self.session_id),
                    Err(e) => error!("回應 Telnet 協商失敗 ({}): {}", self.session_id, e),
                }
            }

            if framed.data.is_empty() {
                continue;
            }

            let text = self.decoder.decode(&framed.data);
            if !text.is_empty() {
                self.notifier.notify(self.session_id, &text).await;
            }
        }
    }
}

impl LoopExit {
    /// 記錄結束原因
    pub(crate) fn log(&self, session_id: SessionId) {
        match self {
            Self::Cancelled => debug!("讀取迴圈已取消 ({})", session_id),
            Self::PeerClosed => info!("伺服器已關閉連線 ({})", session_id),
            Self::Failed(e)
                if matches!(
                    e.kind(),
                    io::ErrorKind::ConnectionReset | io::ErrorKind::ConnectionAborted
                ) =>
            {
                error!("連線被伺服器重設 ({}): {}", session_id, e)
            }
            Self::Failed(e) => error!("讀取錯誤 ({}): {}", session_id, e),
        }
    }
}
