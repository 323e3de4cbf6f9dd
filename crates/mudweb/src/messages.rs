//! WebSocket 訊息格式

use serde::{Deserialize, Serialize};

/// 瀏覽器送來的訊息
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// 連線到 MUD 伺服器
    Connect { host: String, port: u16 },
    /// 發送指令
    Command { text: String },
    /// 斷開連線
    Disconnect,
}

/// 送給瀏覽器的訊息
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// 連線結果
    ConnectResult { success: bool },
    /// 伺服器送來的文字
    Data { data: String },
    /// MUD 連線已結束
    Disconnected,
    /// 錯誤
    Error { message: String },
}
