//! MUD Telnet Relay
//!
//! 將瀏覽器端的終端機連到 Telnet MUD 伺服器：
//! - `telnet`: Telnet 分框與協商回應
//! - `encoding`: Big5/UTF-8 編解碼
//! - `session`: 單一連線與讀取迴圈
//! - `registry`: 連線登記表
//! - `relay`: 對外介面（connect / send / disconnect / start_reading）
//! - `sink`: 資料推送與訂閱

pub mod config;
pub mod encoding;
pub mod error;
pub mod registry;
pub mod relay;
pub mod session;
pub mod sink;
pub mod telnet;

pub use config::RelayConfig;
pub use encoding::{decode_big5, encode_big5, encode_command};
pub use error::{DeliveryError, RelayError};
pub use registry::SessionRegistry;
pub use relay::{TelnetRelay, TelnetRelayBuilder};
pub use session::{Session, SessionId, SessionState};
pub use sink::{DataSink, SubscriberHub};
pub use telnet::TelnetFramer;
