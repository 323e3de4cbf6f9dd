//! Relay 設定

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Relay 設定
///
/// 可直接嵌在上層的 JSON 設定檔中，缺少的欄位使用預設值。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelayConfig {
    /// 連線逾時（秒）
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    /// 讀取緩衝區大小
    #[serde(default = "default_read_buffer_size")]
    pub read_buffer_size: usize,
    /// 斷線時等待讀取迴圈結束的時間（毫秒）
    #[serde(default = "default_shutdown_timeout_ms")]
    pub shutdown_timeout_ms: u64,
    /// 保留跨讀取被拆開的 Big5 字元
    #[serde(default)]
    pub reassemble_split_characters: bool,
}

fn default_connect_timeout_secs() -> u64 {
    30
}

fn default_read_buffer_size() -> usize {
    4096
}

fn default_shutdown_timeout_ms() -> u64 {
    1000
}

impl RelayConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_millis(self.shutdown_timeout_ms)
    }
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            connect_timeout_secs: default_connect_timeout_secs(),
            read_buffer_size: default_read_buffer_size(),
            shutdown_timeout_ms: default_shutdown_timeout_ms(),
            reassemble_split_characters: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = RelayConfig::default();
        assert_eq!(config.connect_timeout(), Duration::from_secs(30));
        assert_eq!(config.shutdown_timeout(), Duration::from_secs(1));
        assert_eq!(config.read_buffer_size, 4096);
        assert!(!config.reassemble_split_characters);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: RelayConfig =
            serde_json::from_str(r#"{"read_buffer_size": 1024}"#).unwrap();
        assert_eq!(config.read_buffer_size, 1024);
        assert_eq!(config.connect_timeout_secs, 30);
        assert_eq!(config.shutdown_timeout_ms, 1000);
    }
}
