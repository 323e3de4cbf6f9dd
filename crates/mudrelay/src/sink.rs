//! 資料推送
//!
//! 讀取迴圈解碼出的文字透過 [`DataSink`] 送出。[`SubscriberHub`] 是預設的實作，
//! 以 session 為鍵對應到唯一的訂閱 channel。

use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::error::DeliveryError;
use crate::session::SessionId;

/// 訂閱 channel 的預設容量
pub const DEFAULT_SUBSCRIBER_CAPACITY: usize = 1024;

/// 接收 relay 事件的一方
#[async_trait]
pub trait DataSink: Send + Sync {
    /// 收到一段解碼後的資料
    async fn deliver(&self, session_id: SessionId, text: &str) -> Result<(), DeliveryError>;

    /// 連線已關閉
    async fn closed(&self, _session_id: SessionId) {}
}

/// 依序通知所有 sink，單一 sink 失敗只記錄
#[derive(Clone, Default)]
pub(crate) struct Notifier {
    sinks: Arc<Vec<Arc<dyn DataSink>>>,
}

impl Notifier {
    pub(crate) fn new(sinks: Vec<Arc<dyn DataSink>>) -> Self {
        Self {
            sinks: Arc::new(sinks),
        }
    }

    pub(crate) async fn notify(&self, session_id: SessionId, text: &str) {
        for sink in self.sinks.iter() {
            if let Err(e) = sink.deliver(session_id, text).await {
                warn!("推送資料失敗 ({}): {}", session_id, e);
            }
        }
    }

    pub(crate) async fn closed(&self, session_id: SessionId) {
        for sink in self.sinks.iter() {
            sink.closed(session_id).await;
        }
    }
}

/// 訂閱者登記表：每個 session 對應一個 channel
pub struct SubscriberHub {
    subscribers: DashMap<SessionId, mpsc::Sender<String>>,
    capacity: usize,
}

impl SubscriberHub {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_SUBSCRIBER_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            subscribers: DashMap::new(),
            capacity: capacity.max(1),
        }
    }

    /// 訂閱某個 session 的資料
    ///
    /// 同一個 session 只會有一個訂閱者，重複訂閱會取代舊的 channel。
    /// session 關閉時 channel 會被關閉，接收端會收到 `None`。
    pub fn subscribe(&self, session_id: SessionId) -> mpsc::Receiver<String> {
        let (tx, rx) = mpsc::channel(self.capacity);
        if self.subscribers.insert(session_id, tx).is_some() {
            debug!("取代 {} 的舊訂閱", session_id);
        }
        rx
    }

    /// 取消訂閱
    pub fn unsubscribe(&self, session_id: SessionId) -> bool {
        self.subscribers.remove(&session_id).is_some()
    }

    pub fn is_subscribed(&self, session_id: SessionId) -> bool {
        self.subscribers.contains_key(&session_id)
    }

    pub fn len(&self) -> usize {
        self.subscribers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subscribers.is_empty()
    }
}

impl Default for SubscriberHub {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DataSink for SubscriberHub {
    async fn deliver(&self, session_id: SessionId, text: &str) -> Result<(), DeliveryError> {
        // 先複製 sender，不在 await 期間持有 map 的鎖
        let tx = self
            .subscribers
            .get(&session_id)
            .map(|entry| entry.value().clone())
            .ok_or(DeliveryError::SubscriberGone(session_id))?;

        if tx.send(text.to_owned()).await.is_err() {
            self.subscribers
                .remove_if(&session_id, |_, current| current.same_channel(&tx));
            return Err(DeliveryError::SubscriberGone(session_id));
        }
        Ok(())
    }

    async fn closed(&self, session_id: SessionId) {
        self.unsubscribe(session_id);
    }
}
