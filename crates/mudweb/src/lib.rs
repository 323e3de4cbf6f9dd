//! MUD Web 前端
//!
//! 透過 WebSocket 將瀏覽器終端機接到 `mudrelay`。

pub mod config;
pub mod link;
pub mod messages;
pub mod ws;

pub use config::WebConfig;
pub use link::MudLink;
pub use messages::{ClientMessage, ServerMessage};
pub use ws::{router, AppState};
