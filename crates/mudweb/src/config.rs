//! 設定檔載入
//!
//! 從 JSON 檔讀取伺服器設定，缺少的欄位使用預設值。
//! 環境變數 `PORT` 會覆寫設定檔中的埠號（雲端平台以此指定埠號）。

use mudrelay::RelayConfig;
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// 設定檔路徑的環境變數
pub const CONFIG_ENV: &str = "MUDWEB_CONFIG";

/// 預設設定檔
pub const DEFAULT_CONFIG_FILE: &str = "mudweb.json";

/// Web 伺服器設定
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebConfig {
    /// 綁定位址
    #[serde(default = "default_host")]
    pub host: String,
    /// 監聽埠號
    #[serde(default = "default_port")]
    pub port: u16,
    /// 靜態檔案目錄（不存在時不提供）
    #[serde(default = "default_static_dir")]
    pub static_dir: PathBuf,
    /// Telnet relay 設定
    #[serde(default)]
    pub relay: RelayConfig,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    5166
}

fn default_static_dir() -> PathBuf {
    PathBuf::from("wwwroot")
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            static_dir: default_static_dir(),
            relay: RelayConfig::default(),
        }
    }
}

impl WebConfig {
    /// 獲取設定檔路徑
    pub fn config_path() -> PathBuf {
        env::var_os(CONFIG_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE))
    }

    /// 載入設定檔並套用環境變數
    pub fn load() -> Self {
        let mut config = Self::load_from(&Self::config_path());
        config.apply_port_override(env::var("PORT").ok().as_deref());
        config
    }

    /// 從指定檔案載入，檔案不存在或格式錯誤時使用預設值
    pub fn load_from(path: &Path) -> Self {
        if !path.exists() {
            info!("找不到設定檔 {}，使用預設值", path.display());
            return Self::default();
        }

        match fs::read_to_string(path) {
            Ok(content) => match serde_json::from_str(&content) {
                Ok(config) => {
                    info!("已載入設定檔 {}", path.display());
                    config
                }
                Err(e) => {
                    warn!("設定檔格式錯誤 {}: {}", path.display(), e);
                    Self::default()
                }
            },
            Err(e) => {
                warn!("無法讀取設定檔 {}: {}", path.display(), e);
                Self::default()
            }
        }
    }

    /// 以環境變數覆寫埠號
    pub fn apply_port_override(&mut self, port: Option<&str>) {
        let Some(port) = port else {
            return;
        };
        match port.trim().parse() {
            Ok(port) => self.port = port,
            Err(_) => warn!("PORT 不是有效的埠號: {}", port),
        }
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
