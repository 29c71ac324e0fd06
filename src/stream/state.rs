//! Connection lifecycle states for the stream transport, modeled directly
//! on the textbook TCP state diagram (minus TIME_WAIT, see `stream::mod`).

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    Closed,
    Listen,
    SynSent,
    SynRcvd,
    Established,
    FinWait1,
    FinWait2,
    CloseWait,
    Closing,
    LastAck,
}

impl fmt::Display for StreamState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            StreamState::Closed => "CLOSED",
            StreamState::Listen => "LISTEN",
            StreamState::SynSent => "SYN_SENT",
            StreamState::SynRcvd => "SYN_RCVD",
            StreamState::Established => "ESTABLISHED",
            StreamState::FinWait1 => "FIN_WAIT_1",
            StreamState::FinWait2 => "FIN_WAIT_2",
            StreamState::CloseWait => "CLOSE_WAIT",
            StreamState::Closing => "CLOSING",
            StreamState::LastAck => "LAST_ACK",
        };
        write!(f, "{s}")
    }
}

impl StreamState {
    pub fn is_established(&self) -> bool {
        matches!(self, StreamState::Established)
    }

    pub fn is_closed(&self) -> bool {
        matches!(self, StreamState::Closed)
    }
}
