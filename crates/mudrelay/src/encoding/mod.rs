//! Big5/UTF-8 編解碼模組
//!
//! 處理台灣 MUD 伺服器常用的 Big5 編碼轉換

use encoding_rs::{CoderResult, Decoder, BIG5};

/// 指令結尾的換行
pub const LINE_TERMINATOR: &str = "\r\n";

/// 將 Big5 編碼的位元組轉換為 UTF-8 字串
///
/// # Arguments
/// * `bytes` - Big5 編碼的位元組切片
///
/// # Returns
/// 轉換後的 UTF-8 字串（無效字元會被替換為 U+FFFD）
///
/// # Example
/// ```
/// use mudrelay::encoding::decode_big5;
///
/// let big5_bytes = [0xa7, 0x41, 0xa6, 0x6e]; // "你好" in Big5
/// assert_eq!(decode_big5(&big5_bytes), "你好");
/// ```
pub fn decode_big5(bytes: &[u8]) -> String {
    let (decoded, _) = BIG5.decode_without_bom_handling(bytes);
    decoded.into_owned()
}

/// 將 UTF-8 字串轉換為 Big5 編碼的位元組
///
/// 無法編碼的字元會被替換為 HTML 數字字元參照（例如 `&#128512;`）。
pub fn encode_big5(text: &str) -> Vec<u8> {
    let (encoded, _, _) = BIG5.encode(text);
    encoded.into_owned()
}

/// 將要送往伺服器的指令加上 CR LF 並編碼為 Big5
///
/// # Example
/// ```
/// use mudrelay::encoding::encode_command;
///
/// assert_eq!(encode_command("look"), b"look\r\n");
/// ```
pub fn encode_command(command: &str) -> Vec<u8> {
    let mut line = String::with_capacity(command.len() + LINE_TERMINATOR.len());
    line.push_str(command);
    line.push_str(LINE_TERMINATOR);
    encode_big5(&line)
}

/// 讀取迴圈使用的解碼器
///
/// 預設每次讀取各自解碼，跨越讀取邊界的雙位元組字元會變成 U+FFFD。
/// `reassembling` 模式會保留尾端不完整的位元組，等到下一次讀取再一起解碼。
pub struct ChunkDecoder {
    streaming: Option<Decoder>,
}

impl ChunkDecoder {
    /// 每次讀取獨立解碼
    pub fn independent() -> Self {
        Self { streaming: None }
    }

    /// 跨讀取重組被拆開的字元
    pub fn reassembling() -> Self {
        Self {
            streaming: Some(BIG5.new_decoder_without_bom_handling()),
        }
    }

    /// 依設定選擇模式
    pub fn new(reassemble: bool) -> Self {
        if reassemble {
            Self::reassembling()
        } else {
            Self::independent()
        }
    }

    /// 是否保留跨讀取的不完整字元
    pub fn is_reassembling(&self) -> bool {
        self.streaming.is_some()
    }

    /// 解碼一段資料位元組
    pub fn decode(&mut self, bytes: &[u8]) -> String {
        let Some(decoder) = self.streaming.as_mut() else {
            return decode_big5(bytes);
        };

        let capacity = decoder
            .max_utf8_buffer_length(bytes.len())
            .unwrap_or(bytes.len() * 3 + 4);
        let mut output = String::with_capacity(capacity);
        let mut input = bytes;
        loop {
            let (result, read, _) = decoder.decode_to_string(input, &mut output, false);
            input = &input[read..];
            match result {
                CoderResult::InputEmpty => break,
                CoderResult::OutputFull => output.reserve(input.len() * 3 + 4),
            }
        }
        output
    }
}

impl Default for ChunkDecoder {
    fn default() -> Self {
        Self::independent()
    }
}
