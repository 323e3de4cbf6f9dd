//! Telnet 協定模組
//!
//! 分框、協商回應與協定常數

mod framer;
mod protocol;

pub use framer::{Framed, TelnetFramer};
pub use protocol::{
    initial_negotiation, negotiation, reply_to_do, Negotiation, TelnetCommand, TelnetOption,
    ACCEPTED_OPTIONS, IAC,
};
