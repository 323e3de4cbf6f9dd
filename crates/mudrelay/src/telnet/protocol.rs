//! Telnet 協定常數與協商回應
//!
//! 實作 RFC 854 Telnet 協定中 relay 會用到的命令與選項

/// Telnet IAC (Interpret As Command) - 0xFF
pub const IAC: u8 = 255;

/// Telnet 命令
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum TelnetCommand {
    /// Sub-negotiation End
    Se = 240,
    /// No Operation
    Nop = 241,
    /// Go Ahead
    GoAhead = 249,
    /// Sub-negotiation Begin
    Sb = 250,
    /// Will
    Will = 251,
    /// Won't
    Wont = 252,
    /// Do
    Do = 253,
    /// Don't
    Dont = 254,
}

impl TelnetCommand {
    /// 從位元組解析 Telnet 命令
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            240 => Some(Self::Se),
            241 => Some(Self::Nop),
            249 => Some(Self::GoAhead),
            250 => Some(Self::Sb),
            251 => Some(Self::Will),
            252 => Some(Self::Wont),
            253 => Some(Self::Do),
            254 => Some(Self::Dont),
            _ => None,
        }
    }

    /// 是否為三位元組的協商動詞（WILL/WONT/DO/DONT）
    pub fn is_negotiation(byte: u8) -> bool {
        matches!(
            Self::from_byte(byte),
            Some(Self::Will | Self::Wont | Self::Do | Self::Dont)
        )
    }
}

/// Telnet 選項
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TelnetOption {
    /// Echo
    Echo,
    /// Suppress Go Ahead
    SuppressGoAhead,
    /// Window Size (NAWS)
    Naws,
    /// Unknown option
    Unknown(u8),
}

impl TelnetOption {
    /// 從位元組解析 Telnet 選項
    pub fn from_byte(byte: u8) -> Self {
        match byte {
            1 => Self::Echo,
            3 => Self::SuppressGoAhead,
            31 => Self::Naws,
            other => Self::Unknown(other),
        }
    }

    /// 獲取選項的位元組值
    pub fn as_byte(&self) -> u8 {
        match self {
            Self::Echo => 1,
            Self::SuppressGoAhead => 3,
            Self::Naws => 31,
            Self::Unknown(b) => *b,
        }
    }
}

/// 伺服器要求 DO 時一律回應 WILL 的選項，其餘回應 WONT
pub const ACCEPTED_OPTIONS: &[TelnetOption] = &[TelnetOption::Echo, TelnetOption::SuppressGoAhead];

/// 一筆三位元組的協商命令（IAC + 動詞 + 選項）
pub type Negotiation = [u8; 3];

/// 組出一筆協商命令
pub fn negotiation(cmd: TelnetCommand, option: TelnetOption) -> Negotiation {
    [IAC, cmd as u8, option.as_byte()]
}

/// 對伺服器的 `IAC DO <option>` 產生回應
pub fn reply_to_do(option: u8) -> Negotiation {
    let option = TelnetOption::from_byte(option);
    if ACCEPTED_OPTIONS.contains(&option) {
        negotiation(TelnetCommand::Will, option)
    } else {
        negotiation(TelnetCommand::Wont, option)
    }
}

/// 連線建立後主動送出的協商：WILL SGA、WILL ECHO、WILL NAWS
///
/// 只送不等回應，伺服器不需要完整的雙向協商。
pub fn initial_negotiation() -> [Negotiation; 3] {
    [
        negotiation(TelnetCommand::Will, TelnetOption::SuppressGoAhead),
        negotiation(TelnetCommand::Will, TelnetOption::Echo),
        negotiation(TelnetCommand::Will, TelnetOption::Naws),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reply_accepts_echo_and_sga() {
        assert_eq!(reply_to_do(1), [IAC, TelnetCommand::Will as u8, 1]);
        assert_eq!(reply_to_do(3), [IAC, TelnetCommand::Will as u8, 3]);
    }

    #[test]
    fn test_reply_refuses_other_options() {
        assert_eq!(reply_to_do(24), [IAC, TelnetCommand::Wont as u8, 24]);
        assert_eq!(reply_to_do(31), [IAC, TelnetCommand::Wont as u8, 31]);
        assert_eq!(reply_to_do(86), [IAC, TelnetCommand::Wont as u8, 86]);
    }

    #[test]
    fn test_initial_negotiation_order() {
        let init = initial_negotiation();
        assert_eq!(init[0], [IAC, 251, 3]);
        assert_eq!(init[1], [IAC, 251, 1]);
        assert_eq!(init[2], [IAC, 251, 31]);
    }

    #[test]
    fn test_negotiation_verbs() {
        for byte in [251u8, 252, 253, 254] {
            assert!(TelnetCommand::is_negotiation(byte));
        }
        assert!(!TelnetCommand::is_negotiation(IAC));
        assert!(!TelnetCommand::is_negotiation(TelnetCommand::Sb as u8));
        assert!(!TelnetCommand::is_negotiation(b'A'));
    }

    #[test]
    fn test_unlisted_options_are_unknown() {
        assert_eq!(TelnetOption::from_byte(24), TelnetOption::Unknown(24));
        assert_eq!(TelnetOption::from_byte(201), TelnetOption::Unknown(201));
        assert_eq!(reply_to_do(201), [IAC, TelnetCommand::Wont as u8, 201]);
    }

    #[test]
    fn test_telnet_option_roundtrip() {
        for byte in 0..=255u8 {
            let option = TelnetOption::from_byte(byte);
            assert_eq!(option.as_byte(), byte);
        }
    }
}
