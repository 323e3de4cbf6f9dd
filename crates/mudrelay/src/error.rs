//! 錯誤型別

use std::io;

use thiserror::Error;

use crate::session::SessionId;

/// Relay 操作錯誤
#[derive(Debug, Error)]
pub enum RelayError {
    #[error("找不到連線: {0}")]
    SessionNotFound(SessionId),

    #[error("連線已在讀取中: {0}")]
    AlreadyReading(SessionId),

    #[error("連線已存在: {0}")]
    SessionExists(SessionId),

    #[error("DNS 解析失敗: {0}")]
    DnsResolutionFailed(String),

    #[error("連線逾時")]
    ConnectTimeout,

    #[error("未連線")]
    NotConnected,

    #[error("IO 錯誤: {0}")]
    Io(#[from] io::Error),
}

impl RelayError {
    /// 是否為操作不存在或狀態不符的連線（而非 IO 失敗）
    pub fn is_invalid_state(&self) -> bool {
        matches!(
            self,
            Self::SessionNotFound(_)
                | Self::AlreadyReading(_)
                | Self::SessionExists(_)
                | Self::NotConnected
        )
    }
}

/// 推送資料給訂閱者時的錯誤
#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("訂閱者已離線: {0}")]
    SubscriberGone(SessionId),

    #[error("訂閱者拒絕資料: {0}")]
    Rejected(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_state_kinds() {
        let id = SessionId::new();
        assert!(RelayError::SessionNotFound(id).is_invalid_state());
        assert!(RelayError::AlreadyReading(id).is_invalid_state());
        assert!(!RelayError::ConnectTimeout.is_invalid_state());
        assert!(RelayError::NotConnected.is_invalid_state());
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = io::Error::new(io::ErrorKind::BrokenPipe, "pipe closed");
        let err: RelayError = io_err.into();
        assert!(matches!(err, RelayError::Io(_)));
        assert!(!err.is_invalid_state());
        assert!(err.to_string().contains("pipe closed"));
    }

    #[test]
    fn test_display_contains_session_id() {
        let id = SessionId::new();
        let err = RelayError::SessionNotFound(id);
        assert!(err.to_string().contains(&id.to_string()));
    }
}
