//! Telnet 位元組流分框器
//!
//! 逐位元組掃描伺服器送來的資料，去除協商命令並產生回應。
//! 狀態會跨越多次 `feed` 呼叫保留，命令被拆在兩次讀取之間也不會漏出。

use super::protocol::{reply_to_do, Negotiation, TelnetCommand, IAC};

/// 分框器的內部狀態
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum FramerState {
    /// 一般資料
    #[default]
    Data,
    /// 上一個緩衝區以單獨的 IAC 結尾
    PendingIac,
    /// 正在略過命令位元組
    Skipping(u8),
}

/// 一次 `feed` 的結果
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Framed {
    /// 去除命令後的資料位元組
    pub data: Vec<u8>,
    /// 需要寫回伺服器的協商回應
    pub replies: Vec<Negotiation>,
}

/// Telnet 分框器
#[derive(Debug, Default)]
pub struct TelnetFramer {
    state: FramerState,
}

impl TelnetFramer {
    /// 創建新的分框器
    pub fn new() -> Self {
        Self::default()
    }

    /// 沒有進行到一半的命令
    pub fn is_idle(&self) -> bool {
        self.state == FramerState::Data
    }

    /// 處理一次讀取到的位元組
    ///
    /// 只有 `IAC DO <option>` 三個位元組落在同一個緩衝區內時才會產生回應。
    ///
    /// # Example
    /// ```
    /// use mudrelay::telnet::TelnetFramer;
    ///
    /// let mut framer = TelnetFramer::new();
    /// let framed = framer.feed(&[255, 253, 1, b'h', b'i']);
    /// assert_eq!(framed.data, b"hi");
    /// assert_eq!(framed.replies, vec![[255, 251, 1]]);
    /// ```
    pub fn feed(&mut self, input: &[u8]) -> Framed {
        let mut framed = Framed {
            data: Vec::with_capacity(input.len()),
            replies: Vec::new(),
        };

        for (i, &b) in input.iter().enumerate() {
            match self.state {
                FramerState::Skipping(remaining) => {
                    self.state = if remaining > 1 {
                        FramerState::Skipping(remaining - 1)
                    } else {
                        FramerState::Data
                    };
                    continue;
                }
                FramerState::PendingIac => {
                    if TelnetCommand::is_negotiation(b) {
                        // 選項位元組還在後面，拆開的 DO 不回應
                        self.state = FramerState::Skipping(1);
                        continue;
                    }
                    framed.data.push(IAC);
                    self.state = FramerState::Data;
                }
                FramerState::Data => {}
            }

            if b == IAC {
                match input.get(i + 1) {
                    Some(&next) if TelnetCommand::is_negotiation(next) => {
                        self.state = FramerState::Skipping(2);
                        if next == TelnetCommand::Do as u8 {
                            if let Some(&option) = input.get(i + 2) {
                                framed.replies.push(reply_to_do(option));
                            }
                        }
                        continue;
                    }
                    None => {
                        self.state = FramerState::PendingIac;
                        continue;
                    }
                    Some(_) => {}
                }
            }

            framed.data.push(b);
        }

        framed
    }
}
